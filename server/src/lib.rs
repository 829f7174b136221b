//! # Grid Battle Server Library
//!
//! This library provides the authoritative session server for a small
//! grid-based battle game. Clients connect over TCP, send one text command per
//! line, and receive the full game state after every event.
//!
//! ## Core Responsibilities
//!
//! ### Session Management
//! Each accepted connection is bound to one of a fixed number of slots. When
//! every slot is taken the peer receives `Server full` and is closed. A slot is
//! released exactly once, on `QUIT` or on disconnect, whichever comes first,
//! and is immediately available to the next connection.
//!
//! ### Command Interpretation
//! Lines are parsed into `MOVE <DIR>`, `ATTACK`, `QUIT` and `CHAT <msg>`.
//! Movement is blocked by walls and grid edges, attacks hit every other
//! active player at Manhattan distance one. Unrecognised input changes
//! nothing and is never reported back to the sender.
//!
//! ### State Broadcasting
//! After every join, leave or processed line the grid markers are recomputed
//! and one text frame is sent to every connected peer:
//!
//! ```text
//! STATE
//! A....
//! ...#.
//! ..#..
//! .....
//! .....
//! PLAYERS
//! A: (0,0) HP: 100
//! ```
//!
//! ## Concurrency Model
//!
//! ### One Lock
//! The grid and slot table live in a single `GameState` behind one
//! `tokio::sync::Mutex`. Every event takes that lock once and performs
//! mutate, refresh and broadcast before releasing it, so no peer ever sees a
//! frame mixing two commands, and every peer sees frames in lock order.
//!
//! ### Broadcast Without Blocking
//! Broadcasting only pushes the rendered frame onto each peer's bounded
//! channel. A dedicated writer task per peer performs the socket writes with
//! a per-write timeout. A slow peer therefore cannot stall other players'
//! commands. It is treated as disconnected, and its slot released, once a
//! write times out or its queue of pending frames is full.
//!
//! Connections hold their slot through a `Seat`, so a late release from a
//! connection that already quit never evicts the slot's next occupant.
//!
//! ### Input Limits
//! Command lines are read as raw bytes, decoded lossily and cut at
//! `MAX_COMMAND_LEN` bytes. Garbage or overlong input is an unrecognised
//! command, never a disconnect.
//!
//! ## Module Organization
//!
//! - `grid`: wall layout and the derived player overlay
//! - `slots`: player records and the fixed-capacity slot table
//! - `game`: command interpreter and broadcaster over `GameState`
//! - `network`: accept loop, per-connection sessions, peer writers
//! - `config`: network-facing settings
//! - `error`: server error taxonomy
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 4000,
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = Server::bind(&config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod grid;
pub mod network;
pub mod slots;
