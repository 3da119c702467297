use crate::economy::Ledger;
use crate::wave::Spawner;
use log::info;
use shared::{Enemy, Waypoint, FALLBACK_SPAWN};
use std::collections::HashMap;

/// Shared match state of one room.
#[derive(Debug, Default)]
pub struct GameState {
    pub current_round: u32,
    pub wave_in_progress: bool,
    /// Enemies spawned and not yet reported dead
    pub enemies: HashMap<String, Enemy>,
    pub ledger: Ledger,
    pub path_points: Vec<Waypoint>,
    pub path_data_received: bool,
    pub paused: bool,
    pub spawner: Spawner,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the path and marks it received. An empty path counts as
    /// received too; enemies then appear at `FALLBACK_SPAWN`.
    pub fn set_path(&mut self, path_points: Vec<Waypoint>) {
        if let Some(first) = path_points.first() {
            info!(
                "Path with {} waypoints, first at ({}, {})",
                path_points.len(),
                first.x,
                first.z
            );
        }
        self.path_points = path_points;
        self.path_data_received = true;
    }

    /// Ground position new enemies appear at. Paths are laid out on the
    /// x/z plane, which clients render as x/y.
    pub fn spawn_origin(&self) -> (f32, f32) {
        self.path_points
            .first()
            .map(|point| (point.x, point.z))
            .unwrap_or(FALLBACK_SPAWN)
    }

    /// Instantiates the spawner's next enemy and adds it to the roster.
    pub fn spawn_next(&mut self, now_ms: u64) -> Option<Enemy> {
        let (slot, kind) = self.spawner.next_enemy()?;
        let (x, y) = self.spawn_origin();
        let enemy = Enemy::spawn(format!("enemy_{}_{}", now_ms, slot), kind, x, y);
        self.enemies.insert(enemy.id.clone(), enemy.clone());
        Some(enemy)
    }

    pub fn remove_enemy(&mut self, enemy_id: &str) -> bool {
        self.enemies.remove(enemy_id).is_some()
    }

    pub fn clear_enemies(&mut self) {
        self.enemies.clear();
    }
}
