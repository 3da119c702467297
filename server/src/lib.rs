//! # Tower Relay Server Library
//!
//! This library provides the session coordinator for the cooperative tower
//! defense game. It groups up to three players into rooms, relays their
//! actions, and owns the few pieces of state every client must agree on:
//! wave timing, enemy spawns, per-player gold and the upgrade vote.
//!
//! ## Core Responsibilities
//!
//! ### Room Lifecycle
//! Players create a room and receive a six character code, share it, and
//! join. The host starts the match once everyone is ready; from then on the
//! room is closed to newcomers and lives until its last member leaves.
//!
//! ### Wave Coordination
//! The server decides when a wave starts, which enemies it contains and how
//! fast they appear. Clients simulate movement and combat locally and report
//! kills back, so spawns are the only enemy events the server originates.
//!
//! ### Economy and Voting
//! Tower purchases are validated against a server side balance. When a wave
//! ends the room votes on one of three randomly drawn upgrades.
//!
//! ## Architecture Design
//!
//! ### Single Owner Event Loop
//! All room and connection state lives in one [`coordinator::Coordinator`]
//! driven by one task. Connection tasks and timers never touch that state;
//! they post [`network::ServerEvent`]s into the loop's channel and each event
//! runs to completion before the next is taken.
//!
//! ### WebSocket Transport
//! Every connection gets a reader task forwarding text frames and a writer
//! task draining an unbounded outbound channel, so a slow socket never
//! stalls the loop.
//!
//! ### Spawn Timers
//! Each spawn run carries a generation number. Arming a new run bumps the
//! generation and aborts the old timer; any tick still in flight arrives
//! stale and is ignored. Ending a wave leaves the current run going.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection registry: id assignment, names, ship choice, outbound channels
//! and room binding.
//!
//! ### Room Modules (`rooms`, `room`)
//! The directory of live rooms by code, and the per-room state machine from
//! lobby through waves and votes.
//!
//! ### Game Modules (`game`, `economy`, `wave`, `voting`)
//! Match state, gold ledger and tower prices, wave composition and spawn
//! timers, upgrade catalog and ballot counting.
//!
//! ### Coordinator Module (`coordinator`)
//! Validates each inbound message against the sender's room, applies it and
//! fans the resulting events out to the room.
//!
//! ### Network Module (`network`)
//! Listener, per-connection tasks and the event loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::coordinator::CoordinatorSettings;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), server::error::ServerError> {
//!     let server = Server::bind("0.0.0.0:8080", CoordinatorSettings::default()).await?;
//!
//!     // Runs the accept loop and the coordinator until the process exits
//!     server.run().await
//! }
//! ```

pub mod client_manager;
pub mod coordinator;
pub mod economy;
pub mod error;
pub mod game;
pub mod network;
pub mod room;
pub mod rooms;
pub mod utils;
pub mod voting;
pub mod wave;
