use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use scrim_core::room::MatchId;

/// Options recorded alongside a match row.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    pub map_id: Option<String>,
    pub mode: String,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            map_id: None,
            mode: "default".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("match {0} not found")]
    MatchNotFound(MatchId),
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),
}

/// Write interface for match history. Persistence is best-effort: the
/// room state machine never blocks on it and never fails because of it.
#[async_trait]
pub trait MatchRecorder: Send + Sync {
    /// Record that a room entered the match phase. Returns the id of
    /// the new match row.
    async fn record_match_start(
        &self,
        room_code: &str,
        opts: &MatchOptions,
    ) -> Result<MatchId, RecorderError>;

    /// Close out a match row with an optional winning team.
    async fn record_match_end(
        &self,
        match_id: MatchId,
        winner: Option<u8>,
    ) -> Result<(), RecorderError>;
}

/// Recorder used when no database is configured. Hands out sequential
/// match ids so the rest of the pipeline behaves identically.
pub struct DisabledRecorder {
    next_id: AtomicI64,
}

impl DisabledRecorder {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for DisabledRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MatchRecorder for DisabledRecorder {
    async fn record_match_start(
        &self,
        room_code: &str,
        _opts: &MatchOptions,
    ) -> Result<MatchId, RecorderError> {
        let match_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(room = room_code, match_id, "Match start noted (no database)");
        Ok(match_id)
    }

    async fn record_match_end(
        &self,
        match_id: MatchId,
        winner: Option<u8>,
    ) -> Result<(), RecorderError> {
        // Only ids this recorder handed out can be ended.
        if match_id < 1 || match_id >= self.next_id.load(Ordering::Relaxed) {
            return Err(RecorderError::MatchNotFound(match_id));
        }
        tracing::debug!(match_id, ?winner, "Match end noted (no database)");
        Ok(())
    }
}

#[cfg(feature = "postgres")]
pub use postgres::PostgresRecorder;

#[cfg(feature = "postgres")]
mod postgres {
    use async_trait::async_trait;
    use tokio_postgres::Client;

    use scrim_core::room::MatchId;

    use super::{MatchOptions, MatchRecorder, RecorderError};

    const SCHEMA: &str = r#"
        CREATE TABLE IF NOT EXISTS lobbies (
            lobby_id    BIGSERIAL PRIMARY KEY,
            room_code   TEXT NOT NULL UNIQUE,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );
        CREATE TABLE IF NOT EXISTS matches (
            match_id    BIGSERIAL PRIMARY KEY,
            room_code   TEXT NOT NULL REFERENCES lobbies (room_code),
            map_id      TEXT,
            mode        TEXT NOT NULL,
            started_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            ended_at    TIMESTAMPTZ,
            winner_team SMALLINT
        );
    "#;

    /// Recorder backed by a single tokio-postgres client. All match
    /// history INSERT/UPDATE queries are consolidated here.
    pub struct PostgresRecorder {
        client: Client,
    }

    impl PostgresRecorder {
        /// Connect and spawn the connection driver task.
        pub async fn connect(url: &str) -> Result<Self, RecorderError> {
            let (client, connection) =
                tokio_postgres::connect(url, tokio_postgres::NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "Postgres connection closed");
                }
            });
            Ok(Self { client })
        }

        /// Create the match history tables if they do not exist.
        pub async fn ensure_schema(&self) -> Result<(), RecorderError> {
            self.client.batch_execute(SCHEMA).await?;
            Ok(())
        }
    }

    #[async_trait]
    impl MatchRecorder for PostgresRecorder {
        async fn record_match_start(
            &self,
            room_code: &str,
            opts: &MatchOptions,
        ) -> Result<MatchId, RecorderError> {
            // Room codes are recyclable, so the lobby row is keyed by
            // code and reused across matches.
            self.client
                .execute(
                    "INSERT INTO lobbies (room_code) VALUES ($1) \
                     ON CONFLICT (room_code) DO NOTHING",
                    &[&room_code],
                )
                .await?;
            let row = self
                .client
                .query_one(
                    "INSERT INTO matches (room_code, map_id, mode) \
                     VALUES ($1, $2, $3) RETURNING match_id",
                    &[&room_code, &opts.map_id, &opts.mode],
                )
                .await?;
            Ok(row.get(0))
        }

        async fn record_match_end(
            &self,
            match_id: MatchId,
            winner: Option<u8>,
        ) -> Result<(), RecorderError> {
            let winner = winner.map(i16::from);
            let rows = self
                .client
                .execute(
                    "UPDATE matches SET ended_at = NOW(), winner_team = $2 \
                     WHERE match_id = $1",
                    &[&match_id, &winner],
                )
                .await?;
            if rows == 0 {
                return Err(RecorderError::MatchNotFound(match_id));
            }
            Ok(())
        }
    }
}
