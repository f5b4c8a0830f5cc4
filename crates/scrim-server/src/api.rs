use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use scrim_core::room::{MatchId, Phase};

use crate::error::AppError;
use crate::recorder::RecorderError;
use crate::state::AppState;

/// Summary of one active room for the listing endpoint.
#[derive(Debug, Serialize)]
pub struct RoomSummary {
    pub code: String,
    pub players: usize,
    pub phase: Phase,
    pub tick: u64,
}

/// GET /api/v1/rooms — list active rooms, sorted by code.
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    let reg = state.registry.read().await;
    let mut rooms: Vec<RoomSummary> = reg
        .iter_rooms()
        .map(|room| RoomSummary {
            code: room.code.clone(),
            players: room.players.len(),
            phase: room.state.phase,
            tick: room.state.tick,
        })
        .collect();
    rooms.sort_by(|a, b| a.code.cmp(&b.code));
    Json(rooms)
}

/// Request body for closing out a match.
#[derive(Debug, Deserialize)]
pub struct EndMatchBody {
    #[serde(default)]
    pub winner: Option<u8>,
}

/// Response for a successfully ended match.
#[derive(Debug, Serialize)]
pub struct EndMatchResponse {
    pub ended: bool,
    pub match_id: MatchId,
}

/// POST /api/v1/matches/{match_id}/end — close out a recorded match.
pub async fn end_match(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Json(body): Json<EndMatchBody>,
) -> Result<Json<EndMatchResponse>, AppError> {
    if let Some(winner) = body.winner
        && winner > 1
    {
        return Err(AppError::BadRequest(format!(
            "Invalid winner team: {winner}"
        )));
    }

    match state.recorder.record_match_end(match_id, body.winner).await {
        Ok(()) => Ok(Json(EndMatchResponse {
            ended: true,
            match_id,
        })),
        Err(RecorderError::MatchNotFound(id)) => {
            Err(AppError::NotFound(format!("Match {id} not found")))
        },
        #[cfg(feature = "postgres")]
        Err(e) => {
            tracing::error!(match_id, error = %e, "Failed to record match end");
            Err(AppError::Internal("Failed to record match end".to_string()))
        },
    }
}
