//! Database tests

use super::*;
use crate::auth::{AccessCredential, ExternalIdentity, UserResolver};
use crate::osu::OsuUserStats;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

fn identity(screen_name: &str) -> ExternalIdentity {
    ExternalIdentity {
        provider_user_id: "42".to_string(),
        screen_name: screen_name.to_string(),
        display_name: "Cookiezi".to_string(),
        avatar_url: Some("https://pbs.twimg.com/42.png".to_string()),
    }
}

fn credential(token: &str) -> AccessCredential {
    AccessCredential {
        token: token.to_string(),
        secret: format!("{token}-secret"),
    }
}

fn stats(user_id: i64, username: &str, playcount: i64) -> OsuUserStats {
    serde_json::from_value(serde_json::json!({
        "user_id": user_id.to_string(),
        "username": username,
        "playcount": playcount.to_string(),
        "count_rank_ss": "3",
        "count_rank_ssh": "1",
        "pp_raw": "1234.5",
        "country": "KR"
    }))
    .unwrap()
}

#[tokio::test]
async fn test_database_connection() {
    let (db, _temp_dir) = create_test_db().await;
    assert_eq!(db.count_users().await.unwrap(), 0);
}

#[tokio::test]
async fn test_find_or_create_creates_then_reuses_user() {
    let (db, _temp_dir) = create_test_db().await;

    let created = db
        .find_or_create(&identity("cookiezi"), &credential("first"))
        .await
        .unwrap();
    assert_eq!(created.twitter_id, "42");
    assert!(!created.tweets_enabled);
    assert!(created.osu_player_id.is_none());

    // Second sign-in refreshes profile and tokens but keeps the same row
    let again = db
        .find_or_create(&identity("shigetora"), &credential("second"))
        .await
        .unwrap();
    assert_eq!(again.id, created.id);
    assert_eq!(again.screen_name, "shigetora");
    assert_eq!(again.access_token, "second");
    assert_eq!(again.access_token_secret, "second-secret");
    assert_eq!(again.created_at, created.created_at);

    assert_eq!(db.count_users().await.unwrap(), 1);
    let by_twitter = db.get_user_by_twitter_id("42").await.unwrap().unwrap();
    assert_eq!(by_twitter.id, created.id);
}

#[tokio::test]
async fn test_get_missing_user() {
    let (db, _temp_dir) = create_test_db().await;
    assert!(db.get_user("01ARZ3NDEKTSV4RRFFQ69G5FAV").await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_tweets_enabled() {
    let (db, _temp_dir) = create_test_db().await;
    let user = db
        .find_or_create(&identity("cookiezi"), &credential("t"))
        .await
        .unwrap();

    assert!(db.set_tweets_enabled(&user.id, true).await.unwrap());
    // Already enabled
    assert!(!db.set_tweets_enabled(&user.id, true).await.unwrap());

    let user = db.get_user(&user.id).await.unwrap().unwrap();
    assert!(user.tweets_enabled);

    assert!(db.set_tweets_enabled(&user.id, false).await.unwrap());
    assert!(!db.get_user(&user.id).await.unwrap().unwrap().tweets_enabled);
}

#[tokio::test]
async fn test_link_osu_player_records_snapshot_and_links_user() {
    let (db, _temp_dir) = create_test_db().await;
    let user = db
        .find_or_create(&identity("cookiezi"), &credential("t"))
        .await
        .unwrap();

    let linked = db
        .link_osu_player(&user.id, &stats(124493, "Cookiezi", 100), GameMode::Taiko)
        .await
        .unwrap();
    assert_eq!(linked.player.osu_user_id, 124493);
    assert_eq!(linked.snapshot.count_ss, 4);
    assert_eq!(linked.snapshot.mode, 1);

    let user = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(user.osu_player_id.as_deref(), Some(linked.player.id.as_str()));
    assert_eq!(user.game_mode(), GameMode::Taiko);

    let player = db.get_osu_player(&linked.player.id).await.unwrap().unwrap();
    assert_eq!(player.player_name, "Cookiezi");

    let snapshots = db
        .list_snapshots(&linked.player.id, GameMode::Taiko)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].play_count, 100);
    assert_eq!(snapshots[0].country, "KR");
    assert!(db
        .list_snapshots(&linked.player.id, GameMode::Standard)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_relinking_existing_player_reuses_row() {
    let (db, _temp_dir) = create_test_db().await;
    let user = db
        .find_or_create(&identity("cookiezi"), &credential("t"))
        .await
        .unwrap();

    let first = db
        .link_osu_player(&user.id, &stats(124493, "Cookiezi", 100), GameMode::Standard)
        .await
        .unwrap();
    let second = db
        .link_osu_player(&user.id, &stats(124493, "chocomint", 150), GameMode::Standard)
        .await
        .unwrap();

    assert_eq!(first.player.id, second.player.id);
    assert_eq!(second.player.player_name, "chocomint");

    let snapshots = db
        .list_snapshots(&first.player.id, GameMode::Standard)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[1].play_count, 150);
}

#[tokio::test]
async fn test_latest_snapshot_is_newest() {
    let (db, _temp_dir) = create_test_db().await;
    let user = db
        .find_or_create(&identity("cookiezi"), &credential("t"))
        .await
        .unwrap();

    let first = db
        .link_osu_player(&user.id, &stats(124493, "Cookiezi", 100), GameMode::Standard)
        .await
        .unwrap();
    assert!(
        db.latest_snapshot(&first.player.id, GameMode::Taiko)
            .await
            .unwrap()
            .is_none()
    );

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = db
        .link_osu_player(&user.id, &stats(124493, "Cookiezi", 150), GameMode::Standard)
        .await
        .unwrap();

    let latest = db
        .latest_snapshot(&first.player.id, GameMode::Standard)
        .await
        .unwrap()
        .expect("snapshot recorded");
    assert_eq!(latest.id, second.snapshot.id);
    assert_eq!(latest.play_count, 150);
}

#[tokio::test]
async fn test_link_for_unknown_user_rolls_back() {
    let (db, _temp_dir) = create_test_db().await;

    let error = db
        .link_osu_player("missing", &stats(2, "peppy", 1), GameMode::Standard)
        .await
        .unwrap_err();
    assert!(matches!(error, crate::error::AppError::NotFound));

    // Neither the player nor the snapshot survived
    let user = db
        .find_or_create(&identity("cookiezi"), &credential("t"))
        .await
        .unwrap();
    let linked = db
        .link_osu_player(&user.id, &stats(2, "peppy", 1), GameMode::Standard)
        .await
        .unwrap();
    let snapshots = db
        .list_snapshots(&linked.player.id, GameMode::Standard)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 1);
}
