//! Message dispatch and room fan-out
//!
//! The `Coordinator` owns the connection registry and the room directory and
//! is driven by exactly one task, so every handler and timer callback runs
//! to completion before the next one starts. Handlers validate, mutate the
//! room, then broadcast. A rejected action never changes room state; it
//! either answers the sender with an `error` event or is dropped quietly.

use crate::client_manager::{ClientManager, Outbound};
use crate::error::RoomError;
use crate::network::ServerEvent;
use crate::room::{Room, RoundSummary, SpawnPlan, TickOutcome};
use crate::rooms::RoomDirectory;
use crate::utils::get_timestamp;
use crate::wave::SpawnTimer;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ClientMessage, PlayerId, ServerMessage, Waypoint};
use std::time::Duration;
use tokio::sync::mpsc;

/// Runtime knobs for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// How long a wave waits for path data before trying again
    pub path_retry_delay: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            path_retry_delay: Duration::from_millis(2000),
        }
    }
}

pub struct Coordinator {
    clients: ClientManager,
    rooms: RoomDirectory,
    events: mpsc::UnboundedSender<ServerEvent>,
    settings: CoordinatorSettings,
    rng: StdRng,
}

/// Room the sender is seated in.
fn seated_room<'a>(
    clients: &ClientManager,
    rooms: &'a mut RoomDirectory,
    player_id: &str,
) -> Result<&'a mut Room, RoomError> {
    let code = clients.room_of(player_id).ok_or(RoomError::NotInRoom)?;
    rooms.get_mut(code).ok_or(RoomError::NotInRoom)
}

fn player_name<R: Rng + ?Sized>(requested: Option<String>, rng: &mut R) -> String {
    match requested.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("Player{}", rng.gen_range(0..1000)),
    }
}

impl Coordinator {
    /// `events` is the loop's own inbox; timers post back into it.
    pub fn new(events: mpsc::UnboundedSender<ServerEvent>, settings: CoordinatorSettings) -> Self {
        Self {
            clients: ClientManager::new(),
            rooms: RoomDirectory::new(),
            events,
            settings,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    pub fn rooms(&self) -> &RoomDirectory {
        &self.rooms
    }

    pub fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected { sender, reply } => {
                let player_id = self.connect(sender);
                if reply.send(player_id.clone()).is_err() {
                    // Connection task is already gone
                    self.disconnect(&player_id);
                }
            }
            ServerEvent::Frame { player_id, text } => self.handle_frame(&player_id, &text),
            ServerEvent::Disconnected { player_id } => self.disconnect(&player_id),
            ServerEvent::SpawnTick {
                room_code,
                generation,
            } => self.handle_spawn_tick(&room_code, generation),
            ServerEvent::SpawnRetry {
                room_code,
                generation,
            } => self.handle_spawn_retry(&room_code, generation),
        }
    }

    pub fn connect(&mut self, sender: Outbound) -> PlayerId {
        self.clients.register(sender, &mut self.rng)
    }

    /// Tears down a connection and, if it was seated, its room membership.
    pub fn disconnect(&mut self, player_id: &str) {
        let Some(client) = self.clients.unregister(player_id) else {
            return;
        };
        let Some(code) = client.room else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return;
        };

        let departure = room.leave(player_id);
        self.clients.broadcast(
            room.members(),
            &ServerMessage::PlayerLeft {
                player_id: player_id.to_owned(),
            },
            None,
        );

        if departure.room_empty {
            self.rooms.destroy(&code);
        } else if let Some(host) = departure.new_host {
            info!("Room {} handed to {}", code, host);
        }
    }

    /// Decodes and dispatches one inbound text frame.
    pub fn handle_frame(&mut self, player_id: &str, text: &str) {
        match ClientMessage::decode(text) {
            Ok(message) => self.handle_message(player_id, message),
            Err(e) => warn!("Dropping frame from {}: {}", player_id, e),
        }
    }

    pub fn handle_message(&mut self, player_id: &str, message: ClientMessage) {
        if !self.clients.contains(player_id) {
            warn!("Message from unregistered player {}", player_id);
            return;
        }

        let kind = message.kind();
        if let Err(err) = self.dispatch(player_id, message) {
            if err.is_user_facing() {
                info!("Rejected {} from {}: {}", kind, player_id, err);
                self.clients
                    .send_to(player_id, ServerMessage::error(err.to_string()));
            } else {
                debug!("Ignored {} from {}: {}", kind, player_id, err);
            }
        }
    }

    fn dispatch(&mut self, player_id: &str, message: ClientMessage) -> Result<(), RoomError> {
        match message {
            ClientMessage::CreateRoom { player_name } => self.create_room(player_id, player_name),
            ClientMessage::JoinRoom {
                room_code,
                player_name,
            } => self.join_room(player_id, &room_code, player_name),
            ClientMessage::Chat { message } => self.chat(player_id, message),
            ClientMessage::Ready { ready } => self.ready(player_id, ready),
            ClientMessage::StartGame {} => self.start_game(player_id),
            ClientMessage::Position { x, y, rotation } => self.position(player_id, x, y, rotation),
            ClientMessage::PlaceTower { x, y, tower_type } => {
                self.place_tower(player_id, x, y, tower_type)
            }
            ClientMessage::ReadyRound {} => self.ready_round(player_id),
            ClientMessage::SkipRound {} => self.skip_round(player_id),
            ClientMessage::SelectUpgrade { upgrade_id } => {
                self.relay(player_id, false, |player_id| ServerMessage::UpgradeSelected {
                    player_id,
                    upgrade_id,
                })
            }
            ClientMessage::AddBaseModule { module_type } => {
                self.relay(player_id, false, |player_id| ServerMessage::BaseModuleAdded {
                    player_id,
                    module_type,
                })
            }
            ClientMessage::MissileSiloLaunch {} => self.relay(player_id, true, |player_id| {
                ServerMessage::MissileSiloLaunch { player_id }
            }),
            ClientMessage::MissileSiloTarget { target_x, target_z } => {
                self.relay(player_id, true, |player_id| ServerMessage::MissileSiloTarget {
                    player_id,
                    target_x,
                    target_z,
                })
            }
            ClientMessage::PathData { path_points } => self.path_data(player_id, path_points),
            ClientMessage::PauseGame { paused } => self.pause_game(player_id, paused),
            ClientMessage::EnemyKilled {
                enemy_id,
                gold_reward,
            } => self.enemy_killed(player_id, enemy_id, gold_reward),
            ClientMessage::GoldSync { gold } => self.gold_sync(player_id, gold),
            ClientMessage::PlaceBomb { x, y, z } => {
                self.relay(player_id, true, |player_id| ServerMessage::BombPlaced {
                    player_id,
                    x,
                    y,
                    z,
                })
            }
            ClientMessage::DetonateBombs {} => self.relay(player_id, true, |player_id| {
                ServerMessage::BombsDetonated { player_id }
            }),
            ClientMessage::UseFreeze {} => self.relay(player_id, true, |player_id| {
                ServerMessage::FreezeUsed { player_id }
            }),
            ClientMessage::ShipSelected { ship_name } => self.ship_selected(player_id, ship_name),
            ClientMessage::VoteSubmitted {
                player_id: claimed,
                upgrade_id,
            } => {
                if let Some(claimed) = claimed.filter(|claimed| claimed != player_id) {
                    debug!("Vote from {} claimed to be from {}", player_id, claimed);
                }
                self.vote(player_id, upgrade_id)
            }
        }
    }

    /// Plain relay of a player action to the sender's room.
    fn relay(
        &mut self,
        player_id: &str,
        exclude_sender: bool,
        build: impl FnOnce(PlayerId) -> ServerMessage,
    ) -> Result<(), RoomError> {
        let room = seated_room(&self.clients, &mut self.rooms, player_id)?;
        let exclude = exclude_sender.then_some(player_id);
        self.clients
            .broadcast(room.members(), &build(player_id.to_owned()), exclude);
        Ok(())
    }

    fn create_room(&mut self, player_id: &str, requested: Option<String>) -> Result<(), RoomError> {
        if self.rooms.find_by_player(player_id).is_some() {
            return Err(RoomError::AlreadyInRoom);
        }

        let name = player_name(requested, &mut self.rng);
        let room = self.rooms.create(player_id, &mut self.rng)?;
        room.seat(player_id)?;
        let code = room.code.clone();

        if let Some(client) = self.clients.get_mut(player_id) {
            client.name = Some(name);
        }
        self.clients.bind_room(player_id, &code);

        self.clients.send_to(
            player_id,
            ServerMessage::RoomCreated {
                room_code: code.clone(),
            },
        );
        if let Some(me) = self.clients.summary(player_id) {
            self.clients.send_to(
                player_id,
                ServerMessage::PlayerJoined {
                    player_id: me.id,
                    name: me.name,
                    selected_ship: me.selected_ship,
                },
            );
        }
        Ok(())
    }

    fn join_room(
        &mut self,
        player_id: &str,
        room_code: &str,
        requested: Option<String>,
    ) -> Result<(), RoomError> {
        if self.rooms.find_by_player(player_id).is_some() {
            return Err(RoomError::AlreadyInRoom);
        }

        let name = player_name(requested, &mut self.rng);
        let code = room_code.trim().to_ascii_uppercase();
        let room = self.rooms.get_mut(&code).ok_or(RoomError::RoomNotFound)?;
        room.seat(player_id)?;

        if let Some(client) = self.clients.get_mut(player_id) {
            client.name = Some(name);
        }
        self.clients.bind_room(player_id, &code);
        info!("Player {} joined room {}", player_id, code);

        // Full roster to the newcomer, then the newcomer to everyone
        for member in room.members() {
            if let Some(summary) = self.clients.summary(member) {
                self.clients.send_to(
                    player_id,
                    ServerMessage::PlayerJoined {
                        player_id: summary.id,
                        name: summary.name,
                        selected_ship: summary.selected_ship,
                    },
                );
            }
        }
        if let Some(me) = self.clients.summary(player_id) {
            let joined = ServerMessage::PlayerJoined {
                player_id: me.id,
                name: me.name,
                selected_ship: me.selected_ship,
            };
            self.clients.broadcast(room.members(), &joined, None);
        }
        Ok(())
    }

    fn chat(&mut self, player_id: &str, message: String) -> Result<(), RoomError> {
        let room = seated_room(&self.clients, &mut self.rooms, player_id)?;
        let player_name = self
            .clients
            .get(player_id)
            .map(|client| client.display_name().to_string())
            .unwrap_or_default();
        debug!("Chat from {} ({}): {}", player_id, player_name, message);

        self.clients.broadcast(
            room.members(),
            &ServerMessage::Chat {
                player_id: player_id.to_owned(),
                player_name,
                message,
            },
            None,
        );
        Ok(())
    }

    fn ready(&mut self, player_id: &str, ready: bool) -> Result<(), RoomError> {
        let room = seated_room(&self.clients, &mut self.rooms, player_id)?;
        room.set_ready(player_id, ready);
        self.clients.broadcast(
            room.members(),
            &ServerMessage::PlayerReady {
                player_id: player_id.to_owned(),
                ready,
            },
            None,
        );
        Ok(())
    }

    fn start_game(&mut self, player_id: &str) -> Result<(), RoomError> {
        let room = seated_room(&self.clients, &mut self.rooms, player_id)?;
        let environment_seed = room.start_game(player_id, &mut self.rng)?.to_string();

        let players = room
            .members()
            .iter()
            .filter_map(|member| self.clients.summary(member))
            .collect();
        self.clients.broadcast(
            room.members(),
            &ServerMessage::GameStart {
                players,
                environment_seed,
            },
            None,
        );
        Ok(())
    }

    fn position(&mut self, player_id: &str, x: f32, y: f32, rotation: f32) -> Result<(), RoomError> {
        let room = seated_room(&self.clients, &mut self.rooms, player_id)?;
        if !room.game_started {
            return Err(RoomError::GameNotStarted);
        }

        let selected_ship = self
            .clients
            .get(player_id)
            .map(|client| client.selected_ship.clone())
            .unwrap_or_default();
        self.clients.broadcast(
            room.members(),
            &ServerMessage::Position {
                player_id: player_id.to_owned(),
                x,
                y,
                rotation,
                selected_ship,
            },
            Some(player_id),
        );
        Ok(())
    }

    fn place_tower(
        &mut self,
        player_id: &str,
        x: f32,
        y: f32,
        tower_type: String,
    ) -> Result<(), RoomError> {
        let room = seated_room(&self.clients, &mut self.rooms, player_id)?;
        let gold = room.place_tower(player_id, &tower_type)?;

        self.clients.broadcast(
            room.members(),
            &ServerMessage::GoldChanged {
                player_id: player_id.to_owned(),
                gold,
            },
            None,
        );
        self.clients.broadcast(
            room.members(),
            &ServerMessage::TowerPlaced {
                player_id: player_id.to_owned(),
                x,
                y,
                tower_type,
            },
            None,
        );
        Ok(())
    }

    fn ready_round(&mut self, player_id: &str) -> Result<(), RoomError> {
        let room = seated_room(&self.clients, &mut self.rooms, player_id)?;
        let Some(round) = room.mark_ready_for_wave(player_id)? else {
            return Ok(());
        };

        let code = room.code.clone();
        self.clients
            .broadcast(room.members(), &ServerMessage::WaveStart { round }, None);
        self.start_spawning(&code);
        Ok(())
    }

    fn skip_round(&mut self, player_id: &str) -> Result<(), RoomError> {
        let room = seated_room(&self.clients, &mut self.rooms, player_id)?;
        if let Some(summary) = room.skip_round(player_id, &mut self.rng)? {
            Self::announce_round_end(&self.clients, room, summary);
        }
        Ok(())
    }

    fn path_data(&mut self, player_id: &str, path_points: Vec<Waypoint>) -> Result<(), RoomError> {
        let room = seated_room(&self.clients, &mut self.rooms, player_id)?;
        info!(
            "Room {}: path data from {} ({} waypoints)",
            room.code,
            player_id,
            path_points.len()
        );

        if room.set_path(path_points) {
            let code = room.code.clone();
            info!("Room {}: wave in progress, restarting spawner", code);
            self.start_spawning(&code);
        }
        Ok(())
    }

    fn pause_game(&mut self, player_id: &str, paused: bool) -> Result<(), RoomError> {
        let room = seated_room(&self.clients, &mut self.rooms, player_id)?;
        room.set_paused(paused);
        info!(
            "Room {}: {} by {}",
            room.code,
            if paused { "paused" } else { "unpaused" },
            player_id
        );
        self.clients.broadcast(
            room.members(),
            &ServerMessage::PauseGame {
                paused,
                player_id: player_id.to_owned(),
            },
            None,
        );
        Ok(())
    }

    fn enemy_killed(
        &mut self,
        player_id: &str,
        enemy_id: String,
        gold_reward: i64,
    ) -> Result<(), RoomError> {
        let room = seated_room(&self.clients, &mut self.rooms, player_id)?;
        let kill = room.record_kill(player_id, &enemy_id, gold_reward, &mut self.rng)?;
        debug!(
            "Enemy {} killed by {}, balance now {}",
            enemy_id, player_id, kill.balance
        );

        self.clients.broadcast(
            room.members(),
            &ServerMessage::EnemyKilled {
                enemy_id,
                gold_reward,
                player_id: player_id.to_owned(),
            },
            None,
        );
        if let Some(summary) = kill.round_end {
            Self::announce_round_end(&self.clients, room, summary);
        }
        Ok(())
    }

    fn gold_sync(&mut self, player_id: &str, gold: i64) -> Result<(), RoomError> {
        let room = seated_room(&self.clients, &mut self.rooms, player_id)?;
        let gold = room.sync_gold(player_id, gold)?;
        self.clients.broadcast(
            room.members(),
            &ServerMessage::GoldChanged {
                player_id: player_id.to_owned(),
                gold,
            },
            None,
        );
        Ok(())
    }

    fn ship_selected(&mut self, player_id: &str, ship_name: String) -> Result<(), RoomError> {
        let room = seated_room(&self.clients, &mut self.rooms, player_id)?;
        if let Some(client) = self.clients.get_mut(player_id) {
            client.selected_ship = ship_name.clone();
        }
        self.clients.broadcast(
            room.members(),
            &ServerMessage::ShipSelected {
                player_id: player_id.to_owned(),
                ship_name,
            },
            None,
        );
        Ok(())
    }

    fn vote(&mut self, player_id: &str, upgrade_id: String) -> Result<(), RoomError> {
        let room = seated_room(&self.clients, &mut self.rooms, player_id)?;
        let winner = room.cast_vote(player_id, &upgrade_id, &mut self.rng)?;

        self.clients.broadcast(
            room.members(),
            &ServerMessage::VoteUpdate {
                player_id: player_id.to_owned(),
                upgrade_id,
            },
            None,
        );
        if let Some(selected_upgrade) = winner {
            self.clients.broadcast(
                room.members(),
                &ServerMessage::VotingComplete { selected_upgrade },
                None,
            );
        }
        Ok(())
    }

    fn announce_round_end(clients: &ClientManager, room: &Room, summary: RoundSummary) {
        clients.broadcast(
            room.members(),
            &ServerMessage::RoundEnd {
                round: summary.round,
                upgrades: summary.upgrades.clone(),
            },
            None,
        );
        clients.broadcast(
            room.members(),
            &ServerMessage::StartVoting {
                options: summary.upgrades,
            },
            None,
        );
    }

    /// Arms the room's spawn timer for the current wave, or a retry timer
    /// while no path is known. Replaces, and so cancels, any earlier timer.
    fn start_spawning(&mut self, room_code: &str) {
        let Some(room) = self.rooms.get_mut(room_code) else {
            return;
        };

        let timer = match room.begin_spawning() {
            SpawnPlan::Armed {
                generation,
                cadence,
            } => {
                info!(
                    "Room {}: spawning wave {} every {:?}",
                    room_code, room.game.current_round, cadence
                );
                SpawnTimer::every(self.events.clone(), room_code.to_owned(), generation, cadence)
            }
            SpawnPlan::AwaitingPath { generation } => {
                info!(
                    "Room {}: no path data yet, retrying in {:?}",
                    room_code, self.settings.path_retry_delay
                );
                SpawnTimer::after(
                    self.events.clone(),
                    room_code.to_owned(),
                    generation,
                    self.settings.path_retry_delay,
                )
            }
            SpawnPlan::Inactive => return,
        };
        room.set_spawn_timer(timer);
    }

    pub fn handle_spawn_tick(&mut self, room_code: &str, generation: u64) {
        let Some(room) = self.rooms.get_mut(room_code) else {
            return;
        };

        match room.spawn_tick(generation, get_timestamp()) {
            TickOutcome::Spawned(enemy) => {
                debug!("Room {}: spawning {} ({:?})", room_code, enemy.id, enemy.kind);
                self.clients
                    .broadcast(room.members(), &ServerMessage::EnemySpawn(enemy), None);
            }
            TickOutcome::Paused => debug!("Room {}: paused, skipping spawn", room_code),
            TickOutcome::Stale => debug!("Room {}: stale spawn tick {}", room_code, generation),
            TickOutcome::Cancelled => info!("Room {}: spawning cancelled", room_code),
            TickOutcome::Finished => info!("Room {}: finished spawning", room_code),
        }
    }

    pub fn handle_spawn_retry(&mut self, room_code: &str, generation: u64) {
        let due = self
            .rooms
            .find_by_code(room_code)
            .is_some_and(|room| room.retry_due(generation));
        if due {
            self.start_spawning(room_code);
        }
    }
}
