//! Live tests against the real D&D Beyond endpoints.
//!
//! These tests require network access and, for the character test,
//! DDB_CHARACTER_ID pointing at a public character.
//! Run with: `cargo test -p beyond --test live_api -- --ignored`

use beyond::Beyond;

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

#[tokio::test]
#[ignore]
async fn test_fetch_config() {
    setup();
    let client = Beyond::from_env().expect("client should build");

    let config = client.fetch_config().await.expect("config should load");

    let stats = config["stats"].as_array().expect("stats list");
    assert_eq!(stats.len(), 6, "config should list six abilities");
    assert!(config["abilitySkills"].as_array().is_some());
}

#[tokio::test]
#[ignore]
async fn test_fetch_character() {
    setup();
    let Ok(id) = std::env::var("DDB_CHARACTER_ID") else {
        eprintln!("Skipping test: DDB_CHARACTER_ID not set");
        return;
    };
    let id: u64 = id.parse().expect("DDB_CHARACTER_ID should be numeric");
    let client = Beyond::from_env().expect("client should build");

    let character = client
        .fetch_character(id)
        .await
        .expect("character should load");

    assert!(character["name"].is_string());
    assert!(character["stats"].is_array());
}

#[tokio::test]
#[ignore]
async fn test_missing_character_is_error() {
    setup();
    let client = Beyond::from_env().expect("client should build");

    let result = client.fetch_character(0).await;
    assert!(result.is_err());
}
