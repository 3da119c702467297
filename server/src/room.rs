//! Room session and its round life-cycle
//!
//! A room moves through:
//! - lobby: players gather and toggle ready
//! - active, idle: game started, waiting for everyone to ready the next wave
//! - active, spawning: wave in progress, spawner running
//! - active, voting: wave over, upgrade vote open
//!
//! and back to idle once the vote resolves. A started room never returns to
//! the lobby; it only goes away when its last member leaves.
//!
//! Methods here only mutate state and report what happened. Sending events
//! and arming timers is the coordinator's job.

use crate::economy::tower_cost;
use crate::error::RoomError;
use crate::game::GameState;
use crate::utils::base36_token;
use crate::voting::{pick_upgrades, Voting};
use crate::wave::SpawnTimer;
use log::{debug, info};
use rand::Rng;
use shared::{Enemy, PlayerId, RoomCode, Waypoint, ROOM_CAPACITY};
use std::collections::HashSet;
use std::time::Duration;

const SEED_LEN: usize = 10;

/// Payload for `round_end` and `start-voting`.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub round: u32,
    pub upgrades: Vec<String>,
}

/// Result of a member leaving.
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub room_empty: bool,
    pub new_host: Option<PlayerId>,
}

/// Result of a reported kill.
#[derive(Debug, Clone, PartialEq)]
pub struct Kill {
    pub balance: i64,
    pub round_end: Option<RoundSummary>,
}

/// What the coordinator should do to get enemies flowing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpawnPlan {
    /// Tick every `cadence` with this generation.
    Armed { generation: u64, cadence: Duration },
    /// No path yet; retry later with this generation.
    AwaitingPath { generation: u64 },
    /// Nothing to spawn.
    Inactive,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Spawned(Enemy),
    Paused,
    /// Tick from a superseded timer.
    Stale,
    /// Game no longer active; timer dropped.
    Cancelled,
    /// Every enemy of the wave was emitted; timer dropped.
    Finished,
}

#[derive(Debug)]
pub struct Room {
    pub code: RoomCode,
    pub host_id: PlayerId,
    /// Members in join order
    members: Vec<PlayerId>,
    ready_players: HashSet<PlayerId>,
    ready_for_wave: HashSet<PlayerId>,
    pub game_started: bool,
    environment_seed: Option<String>,
    voting: Option<Voting>,
    pub game: GameState,
    spawn_timer: Option<SpawnTimer>,
}

impl Room {
    pub fn new(code: RoomCode, host_id: PlayerId) -> Self {
        Self {
            code,
            host_id,
            members: Vec::new(),
            ready_players: HashSet::new(),
            ready_for_wave: HashSet::new(),
            game_started: false,
            environment_seed: None,
            voting: None,
            game: GameState::new(),
            spawn_timer: None,
        }
    }

    pub fn members(&self) -> &[PlayerId] {
        &self.members
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.members.iter().any(|member| member == player_id)
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.host_id == player_id
    }

    pub fn environment_seed(&self) -> Option<&str> {
        self.environment_seed.as_deref()
    }

    pub fn voting(&self) -> Option<&Voting> {
        self.voting.as_ref()
    }

    /// Adds a player and opens their gold account.
    pub fn seat(&mut self, player_id: &str) -> Result<(), RoomError> {
        if self.members.len() >= ROOM_CAPACITY {
            return Err(RoomError::RoomFull);
        }
        if self.game_started {
            return Err(RoomError::GameInProgress);
        }
        if self.contains(player_id) {
            return Err(RoomError::AlreadyInRoom);
        }

        self.members.push(player_id.to_owned());
        self.game.ledger.open_account(player_id);
        info!(
            "Player {} seated in room {} ({} players)",
            player_id,
            self.code,
            self.members.len()
        );
        Ok(())
    }

    /// Removes a member from the roster and both ready sets. Wave and vote
    /// state are left alone.
    pub fn leave(&mut self, player_id: &str) -> Departure {
        self.members.retain(|member| member != player_id);
        self.ready_players.remove(player_id);
        self.ready_for_wave.remove(player_id);

        if self.members.is_empty() {
            self.spawn_timer = None;
            return Departure {
                room_empty: true,
                new_host: None,
            };
        }

        let mut new_host = None;
        if self.host_id == player_id {
            self.host_id = self.members[0].clone();
            info!("New host assigned in room {}: {}", self.code, self.host_id);
            new_host = Some(self.host_id.clone());
        }

        Departure {
            room_empty: false,
            new_host,
        }
    }

    pub fn set_ready(&mut self, player_id: &str, ready: bool) {
        if ready {
            self.ready_players.insert(player_id.to_owned());
        } else {
            self.ready_players.remove(player_id);
        }
    }

    /// Host-only transition out of the lobby. Returns the environment seed,
    /// generated on first start and kept for the room's lifetime.
    pub fn start_game<R: Rng + ?Sized>(
        &mut self,
        requester: &str,
        rng: &mut R,
    ) -> Result<&str, RoomError> {
        if !self.is_host(requester) {
            return Err(RoomError::NotHost);
        }
        if self.ready_players.len() != self.members.len() {
            return Err(RoomError::NotAllReady);
        }

        self.game_started = true;
        let seed = self
            .environment_seed
            .get_or_insert_with(|| base36_token(rng, SEED_LEN));
        info!("Game started in room {} with environment seed {}", self.code, seed);
        Ok(seed.as_str())
    }

    fn require_started(&self) -> Result<(), RoomError> {
        if self.game_started {
            Ok(())
        } else {
            Err(RoomError::GameNotStarted)
        }
    }

    /// Marks a player ready for the next wave. Returns the new round number
    /// when this was the last member missing.
    pub fn mark_ready_for_wave(&mut self, player_id: &str) -> Result<Option<u32>, RoomError> {
        self.require_started()?;
        if self.game.wave_in_progress {
            return Err(RoomError::WaveInProgress);
        }

        self.ready_for_wave.insert(player_id.to_owned());
        let all_ready = self
            .members
            .iter()
            .all(|member| self.ready_for_wave.contains(member));
        if !all_ready {
            debug!(
                "Room {}: {}/{} players ready for next wave",
                self.code,
                self.ready_for_wave.len(),
                self.members.len()
            );
            return Ok(None);
        }

        self.game.current_round += 1;
        self.game.wave_in_progress = true;
        self.ready_for_wave.clear();
        info!("Room {}: starting wave {}", self.code, self.game.current_round);
        Ok(Some(self.game.current_round))
    }

    /// Closes the running wave and opens the upgrade vote. A no-op when no
    /// wave is running, so repeated calls end a wave at most once.
    ///
    /// The spawner is left alone: enemies of this wave still queued keep
    /// arriving until the line-up is exhausted or the next wave re-arms.
    pub fn end_wave<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<RoundSummary> {
        if !self.game.wave_in_progress {
            debug!("Room {}: wave already ended", self.code);
            return None;
        }

        let upgrades = pick_upgrades(rng);
        self.voting = Some(Voting::new(upgrades.clone()));
        self.ready_for_wave.clear();
        self.game.wave_in_progress = false;

        info!(
            "Room {}: wave {} ended, voting on {:?}",
            self.code, self.game.current_round, upgrades
        );
        Some(RoundSummary {
            round: self.game.current_round,
            upgrades,
        })
    }

    /// Host-only: drop every enemy and end the wave.
    pub fn skip_round<R: Rng + ?Sized>(
        &mut self,
        requester: &str,
        rng: &mut R,
    ) -> Result<Option<RoundSummary>, RoomError> {
        self.require_started()?;
        if !self.is_host(requester) {
            return Err(RoomError::NotHost);
        }

        self.game.clear_enemies();
        info!("Room {}: round {} skipped by host", self.code, self.game.current_round);
        Ok(self.end_wave(rng))
    }

    /// Credits the killer and removes the enemy. Ends the wave when the
    /// roster runs dry.
    pub fn record_kill<R: Rng + ?Sized>(
        &mut self,
        player_id: &str,
        enemy_id: &str,
        gold_reward: i64,
        rng: &mut R,
    ) -> Result<Kill, RoomError> {
        self.require_started()?;

        let balance = self.game.ledger.grant(player_id, gold_reward);
        if !self.game.remove_enemy(enemy_id) {
            debug!("Room {}: kill for unknown enemy {}", self.code, enemy_id);
        }

        let round_end = if self.game.enemies.is_empty() {
            self.end_wave(rng)
        } else {
            None
        };

        Ok(Kill { balance, round_end })
    }

    /// Charges the tower price. Returns the buyer's new balance.
    pub fn place_tower(&mut self, player_id: &str, tower_type: &str) -> Result<i64, RoomError> {
        self.require_started()?;

        let cost = tower_cost(tower_type);
        self.game.ledger.spend(player_id, cost).map_err(|short| {
            info!(
                "Room {}: tower {} rejected for {}: {}",
                self.code, tower_type, player_id, short
            );
            RoomError::InsufficientGold
        })
    }

    pub fn sync_gold(&mut self, player_id: &str, gold: i64) -> Result<i64, RoomError> {
        self.require_started()?;
        Ok(self.game.ledger.sync_from_client(player_id, gold))
    }

    /// Records a ballot. Returns the winning upgrade once every current
    /// member has voted, closing the vote. Ballots of departed players stay
    /// recorded but no longer count.
    pub fn cast_vote<R: Rng + ?Sized>(
        &mut self,
        player_id: &str,
        upgrade_id: &str,
        rng: &mut R,
    ) -> Result<Option<String>, RoomError> {
        let voting = self.voting.as_mut().ok_or(RoomError::NoActiveVote)?;
        voting.cast(player_id, upgrade_id);

        let winner = voting.resolve(&self.members, rng);
        if let Some(selected) = &winner {
            info!("Room {}: voting complete, selected {}", self.code, selected);
            self.voting = None;
        }
        Ok(winner)
    }

    /// Stores the path. Returns true when a wave is already running, in
    /// which case spawning has to be restarted.
    pub fn set_path(&mut self, path_points: Vec<Waypoint>) -> bool {
        self.game.set_path(path_points);
        self.game.wave_in_progress
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.game.paused = paused;
    }

    /// Prepares a fresh spawn run for the current round. Any earlier run is
    /// invalidated; this is the only place a run is replaced.
    pub fn begin_spawning(&mut self) -> SpawnPlan {
        if !self.game_started {
            return SpawnPlan::Inactive;
        }

        self.spawn_timer = None;
        if !self.game.path_data_received {
            let generation = self.game.spawner.invalidate();
            return SpawnPlan::AwaitingPath { generation };
        }

        let (generation, cadence) = self.game.spawner.arm(self.game.current_round);
        SpawnPlan::Armed {
            generation,
            cadence,
        }
    }

    /// Whether a path-retry timer of `generation` should try again.
    pub fn retry_due(&self, generation: u64) -> bool {
        self.game.spawner.is_current(generation) && self.game_started
    }

    pub fn set_spawn_timer(&mut self, timer: SpawnTimer) {
        self.spawn_timer = Some(timer);
    }

    pub fn has_spawn_timer(&self) -> bool {
        self.spawn_timer.is_some()
    }

    /// One beat of the spawn timer.
    pub fn spawn_tick(&mut self, generation: u64, now_ms: u64) -> TickOutcome {
        if !self.game.spawner.is_current(generation) {
            return TickOutcome::Stale;
        }
        if !self.game_started {
            self.game.spawner.invalidate();
            self.spawn_timer = None;
            return TickOutcome::Cancelled;
        }
        if self.game.paused {
            return TickOutcome::Paused;
        }

        let outcome = match self.game.spawn_next(now_ms) {
            Some(enemy) => TickOutcome::Spawned(enemy),
            None => TickOutcome::Finished,
        };
        if self.game.spawner.is_exhausted() {
            self.spawn_timer = None;
        }
        outcome
    }
}
