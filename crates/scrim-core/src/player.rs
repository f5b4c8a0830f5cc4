use serde::{Deserialize, Serialize};

/// Player identity, allocated per connection. A player has no lifecycle
/// outside the room that holds it.
pub type PlayerId = u64;

/// A member of a room's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Team slot, 0 or 1.
    pub team: u8,
    pub ready: bool,
}
