//! Player registry and connection slot management for the battle server
//!
//! This module owns the fixed-capacity slot table, including:
//! - Player records (position, hit-points, active flag) per slot
//! - The outbound peer handle bound to each occupied slot
//! - Slot allocation on connect and release on quit/disconnect
//!
//! A slot is free exactly when its player is inactive and no peer handle is
//! bound. Released slots are reused by the next connection that arrives, so a
//! connection refers to its slot through a [`Seat`], which stops matching once
//! the slot has been released.

use crate::error::ServerError;
use log::info;
use shared::{marker, MAX_PLAYERS, STARTING_HP};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A fully rendered state frame, shared by every peer it is sent to.
pub type Frame = Arc<str>;

/// Outbound side of a connection; frames pushed here are written to the socket
/// by that connection's writer task. The queue is bounded so a lagging reader
/// cannot pile up frames without limit.
pub type PeerHandle = mpsc::Sender<Frame>;

/// One allocation of a slot, held by the connection that received it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seat {
    pub slot: usize,
    generation: u64,
}

/// Game-side record for one slot
///
/// The slot index doubles as the player's identity and grid marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub slot: usize,
    pub row: usize,
    pub col: usize,
    /// May go below zero; there is no death rule.
    pub hp: i32,
    pub active: bool,
}

impl Player {
    /// Fresh player for the given slot, placed at `(slot, 0)` with full hit-points
    pub fn spawn(slot: usize) -> Self {
        Self {
            slot,
            row: slot,
            col: 0,
            hp: STARTING_HP,
            active: true,
        }
    }

    fn vacant(slot: usize) -> Self {
        Self {
            active: false,
            ..Self::spawn(slot)
        }
    }

    pub fn marker(&self) -> char {
        marker(self.slot)
    }

    pub fn position(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// Manhattan distance between two players' coordinates
    pub fn distance_to(&self, other: &Player) -> usize {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

/// One entry of the slot table
#[derive(Debug)]
pub struct Slot {
    pub player: Player,
    pub peer: Option<PeerHandle>,
    generation: u64,
}

impl Slot {
    fn vacant(index: usize) -> Self {
        Self {
            player: Player::vacant(index),
            peer: None,
            generation: 0,
        }
    }

    pub fn is_free(&self) -> bool {
        self.peer.is_none()
    }
}

/// Fixed-capacity table binding connections to player records
///
/// Capacity is the hard upper bound on concurrent players. Allocation always
/// picks the lowest free index, so a released slot is handed out again to
/// the next connection.
#[derive(Debug)]
pub struct SlotTable {
    slots: Vec<Slot>,
    allocations: u64,
}

impl SlotTable {
    /// Creates a table of `MAX_PLAYERS` empty slots
    pub fn new() -> Self {
        Self::with_capacity(MAX_PLAYERS)
    }

    /// Creates a table with an explicit capacity, never more than `MAX_PLAYERS`
    /// since spawn positions are derived from the slot index.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity.min(MAX_PLAYERS)).map(Slot::vacant).collect(),
            allocations: 0,
        }
    }

    /// Binds `peer` to the first free slot and spawns a fresh player there
    ///
    /// Returns `CapacityExceeded` and leaves the table untouched when every
    /// slot is occupied.
    pub fn allocate(&mut self, peer: PeerHandle) -> Result<Seat, ServerError> {
        let capacity = self.capacity();
        let generation = self.allocations + 1;
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_free())
            .ok_or(ServerError::CapacityExceeded(capacity))?;

        slot.player = Player::spawn(index);
        slot.peer = Some(peer);
        slot.generation = generation;

        info!(
            "Player {} took slot {} at ({}, {})",
            slot.player.marker(),
            index,
            slot.player.row,
            slot.player.col
        );
        self.allocations = generation;
        Ok(Seat {
            slot: index,
            generation,
        })
    }

    /// True while `seat` still owns its slot, i.e. it has not been released
    /// and handed to a newer connection.
    pub fn is_current(&self, seat: Seat) -> bool {
        self.slots
            .get(seat.slot)
            .map_or(false, |slot| !slot.is_free() && slot.generation == seat.generation)
    }

    /// Releases the slot only if `seat` still owns it
    pub fn release_seat(&mut self, seat: Seat) -> bool {
        self.is_current(seat) && self.release(seat.slot)
    }

    /// Marks the slot's player inactive and drops its peer handle
    ///
    /// Returns true if the slot was occupied. Releasing a free or unknown slot
    /// is a no-op, which lets quit and disconnect both call this safely.
    pub fn release(&mut self, index: usize) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if !slot.is_free() => {
                slot.player.active = false;
                slot.peer = None;
                info!("Player {} released slot {}", slot.player.marker(), index);
                true
            }
            _ => false,
        }
    }

    /// Active player in the given slot
    pub fn player(&self, index: usize) -> Option<&Player> {
        self.slots
            .get(index)
            .map(|slot| &slot.player)
            .filter(|player| player.active)
    }

    pub fn player_mut(&mut self, index: usize) -> Option<&mut Player> {
        self.slots
            .get_mut(index)
            .map(|slot| &mut slot.player)
            .filter(|player| player.active)
    }

    /// All player records, active or not, in slot order
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.slots.iter().map(|slot| &slot.player)
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.slots.iter_mut().map(|slot| &mut slot.player)
    }

    /// Active players in slot order
    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players().filter(|player| player.active)
    }

    /// Bound peer handles with their slot index, used for broadcasting
    pub fn peers(&self) -> impl Iterator<Item = (usize, &PeerHandle)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.peer.as_ref().map(|peer| (index, peer)))
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_free()).count()
    }

    /// Returns true if no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SlotTable {
    fn default() -> Self {
        Self::new()
    }
}
