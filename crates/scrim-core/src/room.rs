use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerId};

/// Database-assigned match identifier.
pub type MatchId = i64;

/// Maximum roster size per room.
pub const MAX_PLAYERS: usize = 4;

/// Maximum players per team.
pub const TEAM_CAP: usize = 2;

/// Scheduler frequency in Hz.
pub const TICK_HZ: u32 = 10;

/// Lobby countdown length in seconds.
pub const COUNTDOWN_SECS: u32 = 10;

/// Length of generated room codes.
pub const CODE_LEN: usize = 4;

/// Shortest and longest code accepted on join. Generated codes are
/// always `CODE_LEN`, but the wire contract admits up to six characters.
pub const CODE_MIN_LEN: usize = 4;
pub const CODE_MAX_LEN: usize = 6;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Lifecycle phase of a room. There is no terminal phase: a room in
/// `Match` lives until its roster empties and the room is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lobby,
    Countdown,
    Match,
}

/// Per-team roster counts. Recomputed from the roster on every
/// membership or team change, never incrementally patched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamCounts {
    pub t0: u8,
    pub t1: u8,
}

/// Demo objective advanced by the tick loop. Fill level 0 to 100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturePoint {
    pub progress: u8,
}

/// Broadcast snapshot of a room's shared state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    pub phase: Phase,
    /// Ticks remaining in the countdown, 0 when not counting down.
    pub countdown: u32,
    pub teams: TeamCounts,
    pub tick: u64,
    pub point: CapturePoint,
    #[serde(default)]
    pub match_id: Option<MatchId>,
}

/// A room and its live state. Owned exclusively by the registry.
#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    /// Roster in join order.
    pub players: Vec<Player>,
    pub state: RoomState,
}

impl Room {
    /// Create an empty room in the lobby phase.
    pub fn new(code: String) -> Self {
        Self {
            code,
            players: Vec::new(),
            state: RoomState {
                phase: Phase::Lobby,
                countdown: 0,
                teams: TeamCounts::default(),
                tick: 0,
                point: CapturePoint::default(),
                match_id: None,
            },
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    /// Append a player to the roster. Callers handle capacity and phase
    /// checks and recompute team counts afterwards.
    pub fn add_player(&mut self, player: Player) {
        self.players.push(player);
    }

    /// Remove a player by id. Returns true when the roster changed.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.id != id);
        self.players.len() != before
    }

    fn team_tally(&self) -> (usize, usize) {
        let t0 = self.players.iter().filter(|p| p.team == 0).count();
        let t1 = self.players.iter().filter(|p| p.team == 1).count();
        (t0, t1)
    }

    /// Refresh `state.teams` from a full roster scan.
    pub fn recompute_teams(&mut self) {
        let (t0, t1) = self.team_tally();
        self.state.teams = TeamCounts {
            t0: t0 as u8,
            t1: t1 as u8,
        };
    }

    /// True when the room has at least two players and every one is ready.
    pub fn all_ready(&self) -> bool {
        self.players.len() >= 2 && self.players.iter().all(|p| p.ready)
    }

    /// Pick a team for the next joiner from a fresh roster scan: the
    /// smaller team wins and a tie goes to team 0. A pick already at
    /// `TEAM_CAP` falls back to the other side. Returns None when both
    /// teams are at capacity.
    pub fn assign_team(&self) -> Option<u8> {
        let (t0, t1) = self.team_tally();
        let (mut pick, mut count) = if t0 <= t1 { (0u8, t0) } else { (1u8, t1) };
        if count >= TEAM_CAP {
            (pick, count) = if pick == 0 { (1, t1) } else { (0, t0) };
        }
        if count >= TEAM_CAP { None } else { Some(pick) }
    }

    /// Begin the countdown once the lobby is all ready. Returns true
    /// when the phase actually changed.
    pub fn maybe_start_match(&mut self, countdown_ticks: u32) -> bool {
        if self.state.phase != Phase::Lobby || !self.all_ready() {
            return false;
        }
        self.state.phase = Phase::Countdown;
        self.state.countdown = countdown_ticks;
        true
    }

    /// Drop back to the lobby when readiness breaks mid-countdown.
    /// Returns true when a countdown was aborted.
    pub fn cancel_countdown_if_broken(&mut self) -> bool {
        if self.state.phase != Phase::Countdown || self.all_ready() {
            return false;
        }
        self.state.phase = Phase::Lobby;
        self.state.countdown = 0;
        true
    }

    /// Advance the room by one scheduler tick. Returns true when this
    /// tick completed the countdown and entered the match phase.
    pub fn advance_tick(&mut self) -> bool {
        self.state.tick += 1;
        let mut started = false;
        if self.state.phase == Phase::Countdown {
            if self.all_ready() {
                self.state.countdown = self.state.countdown.saturating_sub(1);
                if self.state.countdown == 0 {
                    self.state.phase = Phase::Match;
                    started = true;
                }
            } else {
                self.state.phase = Phase::Lobby;
                self.state.countdown = 0;
            }
        }
        self.state.point.progress = (self.state.point.progress + 1).min(100);
        started
    }
}

/// Generate a random room code from the uppercase A-Z 0-9 alphabet.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// True for codes in the generated format: `CODE_MIN_LEN` to
/// `CODE_MAX_LEN` characters drawn from the generation alphabet.
pub fn is_valid_room_code(code: &str) -> bool {
    (CODE_MIN_LEN..=CODE_MAX_LEN).contains(&code.len())
        && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}
