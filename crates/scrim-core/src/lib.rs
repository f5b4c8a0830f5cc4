pub mod net;
pub mod player;
pub mod room;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::{Player, PlayerId};
    use crate::room::Room;

    /// Create `n` test players with sequential IDs starting at 1,
    /// alternating teams in join order.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player {
                id: i as PlayerId + 1,
                name: format!("Player{}", i + 1),
                team: (i % 2) as u8,
                ready: false,
            })
            .collect()
    }

    /// Create a lobby-phase room populated with `n` players.
    pub fn lobby_with(n: usize) -> Room {
        let mut room = Room::new("AB12".to_string());
        for player in make_players(n) {
            room.add_player(player);
        }
        room.recompute_teams();
        room
    }

    /// Mark every player in the room ready.
    pub fn ready_all(room: &mut Room) {
        for player in &mut room.players {
            player.ready = true;
        }
    }
}
