//! SQLite database operations
//!
//! All database access goes through this module.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use super::models::*;
use crate::auth::{AccessCredential, ExternalIdentity, UserResolver};
use crate::error::AppError;
use crate::metrics::{OSU_SNAPSHOTS_TOTAL, USERS_TOTAL};
use crate::osu::OsuUserStats;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

/// Result of linking an osu! player to a user
#[derive(Debug, Clone)]
pub struct LinkedPlayer {
    pub player: OsuPlayer,
    pub snapshot: OsuStatsSnapshot,
}

impl Database {
    /// Connect to SQLite database with default pool settings
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        Self::connect_with(path, 5, Duration::from_secs(10)).await
    }

    /// Connect with explicit pool size and acquire timeout
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect_with(
        path: &Path,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        let db = Self { pool };
        USERS_TOTAL.set(db.count_users().await?);
        Ok(db)
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Get a user by internal ID
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get a user by Twitter user ID
    pub async fn get_user_by_twitter_id(&self, twitter_id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE twitter_id = ?")
            .bind(twitter_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn count_users(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Create the user for a Twitter identity, or refresh its profile and
    /// credentials if it already exists
    ///
    /// A single upsert keyed on `twitter_id`, so concurrent sign-ins of the
    /// same account converge on one row.
    pub async fn upsert_twitter_user(
        &self,
        identity: &ExternalIdentity,
        credential: &AccessCredential,
    ) -> Result<User, AppError> {
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, twitter_id, screen_name, display_name, avatar_url,
                access_token, access_token_secret, tweets_enabled, osu_player_id, osu_mode,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 0, NULL, 0, ?, ?)
            ON CONFLICT(twitter_id) DO UPDATE SET
                screen_name = excluded.screen_name,
                display_name = excluded.display_name,
                avatar_url = excluded.avatar_url,
                access_token = excluded.access_token,
                access_token_secret = excluded.access_token_secret,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(EntityId::new().0)
        .bind(&identity.provider_user_id)
        .bind(&identity.screen_name)
        .bind(&identity.display_name)
        .bind(&identity.avatar_url)
        .bind(&credential.token)
        .bind(&credential.secret)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        if user.created_at == user.updated_at {
            USERS_TOTAL.inc();
            tracing::info!(user_id = %user.id, screen_name = %user.screen_name, "User created");
        }

        Ok(user)
    }

    /// Turn statistics tweets on or off
    ///
    /// # Returns
    /// `true` if the stored value changed
    pub async fn set_tweets_enabled(&self, user_id: &str, enabled: bool) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET tweets_enabled = ?, updated_at = ? WHERE id = ? AND tweets_enabled != ?",
        )
        .bind(enabled)
        .bind(Utc::now())
        .bind(user_id)
        .bind(enabled)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // osu! players
    // =========================================================================

    pub async fn get_osu_player(&self, id: &str) -> Result<Option<OsuPlayer>, AppError> {
        let player = sqlx::query_as::<_, OsuPlayer>("SELECT * FROM osu_players WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(player)
    }

    /// Snapshots of a player in one mode, oldest first
    pub async fn list_snapshots(
        &self,
        osu_player_id: &str,
        mode: GameMode,
    ) -> Result<Vec<OsuStatsSnapshot>, AppError> {
        let snapshots = sqlx::query_as::<_, OsuStatsSnapshot>(
            "SELECT * FROM osu_stats_snapshots WHERE osu_player_id = ? AND mode = ? ORDER BY checked_at ASC",
        )
        .bind(osu_player_id)
        .bind(mode.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(snapshots)
    }

    /// Most recent snapshot of a player in one mode
    pub async fn latest_snapshot(
        &self,
        osu_player_id: &str,
        mode: GameMode,
    ) -> Result<Option<OsuStatsSnapshot>, AppError> {
        let snapshot = sqlx::query_as::<_, OsuStatsSnapshot>(
            "SELECT * FROM osu_stats_snapshots WHERE osu_player_id = ? AND mode = ? ORDER BY checked_at DESC, id DESC LIMIT 1",
        )
        .bind(osu_player_id)
        .bind(mode.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(snapshot)
    }

    /// Link a user to an osu! player and record the fetched statistics
    ///
    /// Runs in one transaction:
    /// 1. upsert the player row (keyed on the osu! user ID)
    /// 2. insert a statistics snapshot for `mode`
    /// 3. point the user at the player and mode
    pub async fn link_osu_player(
        &self,
        user_id: &str,
        stats: &OsuUserStats,
        mode: GameMode,
    ) -> Result<LinkedPlayer, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let player = sqlx::query_as::<_, OsuPlayer>(
            r#"
            INSERT INTO osu_players (id, osu_user_id, player_name, last_checked, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(osu_user_id) DO UPDATE SET
                player_name = excluded.player_name,
                last_checked = excluded.last_checked
            RETURNING *
            "#,
        )
        .bind(EntityId::new().0)
        .bind(stats.user_id)
        .bind(&stats.username)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let snapshot = OsuStatsSnapshot {
            id: EntityId::new().0,
            osu_player_id: player.id.clone(),
            mode: mode.as_i64(),
            checked_at: now,
            count_50: stats.count50,
            count_100: stats.count100,
            count_300: stats.count300,
            count_ss: stats.ss_count(),
            count_s: stats.s_count(),
            count_a: stats.count_rank_a,
            play_count: stats.playcount,
            ranked_score: stats.ranked_score,
            total_score: stats.total_score,
            pp_raw: stats.pp_raw,
            pp_rank: stats.pp_rank,
            pp_country_rank: stats.pp_country_rank,
            country: stats.country.clone(),
            level: stats.level,
            accuracy: stats.accuracy,
        };

        sqlx::query(
            r#"
            INSERT INTO osu_stats_snapshots (
                id, osu_player_id, mode, checked_at,
                count_50, count_100, count_300, count_ss, count_s, count_a, play_count,
                ranked_score, total_score, pp_raw, pp_rank, pp_country_rank,
                country, level, accuracy
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&snapshot.id)
        .bind(&snapshot.osu_player_id)
        .bind(snapshot.mode)
        .bind(snapshot.checked_at)
        .bind(snapshot.count_50)
        .bind(snapshot.count_100)
        .bind(snapshot.count_300)
        .bind(snapshot.count_ss)
        .bind(snapshot.count_s)
        .bind(snapshot.count_a)
        .bind(snapshot.play_count)
        .bind(snapshot.ranked_score)
        .bind(snapshot.total_score)
        .bind(snapshot.pp_raw)
        .bind(snapshot.pp_rank)
        .bind(snapshot.pp_country_rank)
        .bind(&snapshot.country)
        .bind(snapshot.level)
        .bind(snapshot.accuracy)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query(
            "UPDATE users SET osu_player_id = ?, osu_mode = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&player.id)
        .bind(mode.as_i64())
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        tx.commit().await?;

        OSU_SNAPSHOTS_TOTAL
            .with_label_values(&[mode.display_name()])
            .inc();
        tracing::info!(
            user_id,
            player = %player.player_name,
            mode = mode.display_name(),
            "osu! player linked"
        );

        Ok(LinkedPlayer { player, snapshot })
    }
}

#[async_trait]
impl UserResolver for Database {
    async fn find_or_create(
        &self,
        identity: &ExternalIdentity,
        credential: &AccessCredential,
    ) -> Result<User, AppError> {
        self.upsert_twitter_user(identity, credential).await
    }
}
