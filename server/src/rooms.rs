//! Room directory: live rooms by public code.

use crate::error::RoomError;
use crate::room::Room;
use crate::utils::random_string;
use log::{info, warn};
use rand::Rng;
use shared::RoomCode;
use std::collections::HashMap;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 6;
const MAX_CODE_ATTEMPTS: usize = 16;

pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> RoomCode {
    random_string(rng, CODE_ALPHABET, CODE_LEN)
}

pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomCode, Room>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs an empty room hosted by `host_id` under a fresh code.
    pub fn create<R: Rng + ?Sized>(
        &mut self,
        host_id: &str,
        rng: &mut R,
    ) -> Result<&mut Room, RoomError> {
        let code = (0..MAX_CODE_ATTEMPTS)
            .map(|_| generate_room_code(rng))
            .find(|code| !self.rooms.contains_key(code))
            .ok_or_else(|| {
                warn!("Gave up allocating a room code after {} attempts", MAX_CODE_ATTEMPTS);
                RoomError::CodeSpaceExhausted
            })?;

        info!("Room created: {} by {}", code, host_id);
        Ok(self
            .rooms
            .entry(code.clone())
            .or_insert_with(|| Room::new(code, host_id.to_owned())))
    }

    pub fn find_by_code(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    /// Room `player_id` is seated in. Linear scan; rooms are few and small.
    pub fn find_by_player(&self, player_id: &str) -> Option<&Room> {
        self.rooms.values().find(|room| room.contains(player_id))
    }

    pub fn destroy(&mut self, code: &str) -> Option<Room> {
        let room = self.rooms.remove(code)?;
        info!("Room {} deleted (empty)", code);
        Some(room)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_room_code_format() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let code = generate_room_code(&mut rng);
            assert!(is_valid_room_code(&code), "bad code {}", code);
        }
        assert!(!is_valid_room_code("abc123"));
        assert!(!is_valid_room_code("ABC12"));
    }

    #[test]
    fn test_create_and_find() {
        let mut rooms = RoomDirectory::new();
        let mut rng = StdRng::seed_from_u64(2);

        let code = rooms.create("host", &mut rng).unwrap().code.clone();

        let room = rooms.find_by_code(&code).unwrap();
        assert_eq!(room.host_id, "host");
        assert!(room.members().is_empty());
        assert!(rooms.find_by_code("nope").is_none());
    }

    #[test]
    fn test_find_by_player() {
        let mut rooms = RoomDirectory::new();
        let mut rng = StdRng::seed_from_u64(3);

        let room = rooms.create("host", &mut rng).unwrap();
        room.seat("host").unwrap();
        let code = room.code.clone();

        assert_eq!(rooms.find_by_player("host").map(|r| r.code.as_str()), Some(code.as_str()));
        assert!(rooms.find_by_player("stranger").is_none());
    }

    #[test]
    fn test_destroy_once() {
        let mut rooms = RoomDirectory::new();
        let mut rng = StdRng::seed_from_u64(4);
        let code = rooms.create("host", &mut rng).unwrap().code.clone();

        assert_eq!(rooms.len(), 1);
        assert!(rooms.destroy(&code).is_some());
        assert!(rooms.destroy(&code).is_none());
        assert!(rooms.is_empty());
    }

    #[test]
    fn test_codes_do_not_collide_with_live_rooms() {
        let mut rooms = RoomDirectory::new();
        let mut rng = StdRng::seed_from_u64(5);

        for i in 0..200 {
            rooms.create(&format!("host{}", i), &mut rng).unwrap();
        }
        assert_eq!(rooms.len(), 200);
    }
}
