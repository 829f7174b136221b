//! Authoritative game state: command interpreter and broadcaster
//!
//! Every public mutation here ends with exactly one broadcast, so callers that
//! hold the state lock for the whole call get atomic apply-then-broadcast.

use crate::error::ServerError;
use crate::grid::Grid;
use crate::slots::{Frame, PeerHandle, Seat, SlotTable};
use log::{debug, info, warn};
use shared::{marker, Command, PlayerLine, StateSnapshot, ATTACK_DAMAGE};
use tokio::sync::mpsc::error::TrySendError;

/// What the connection loop should do after a line was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    /// The slot was released; stop reading and close the connection.
    Closed,
}

#[derive(Debug, Default)]
pub struct GameState {
    pub grid: Grid,
    pub slots: SlotTable,
    broadcasts: u64,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a slot for a new connection and broadcasts the new state.
    pub fn join(&mut self, peer: PeerHandle) -> Result<Seat, ServerError> {
        let seat = self.slots.allocate(peer)?;
        self.refresh_and_broadcast();
        Ok(seat)
    }

    /// Releases the seat's slot; broadcasts only if the seat still held it.
    ///
    /// A seat already released by QUIT or by a full send queue matches nothing,
    /// even if a newer connection has since been given the same slot.
    pub fn leave(&mut self, seat: Seat) -> bool {
        let released = self.slots.release_seat(seat);
        if released {
            self.refresh_and_broadcast();
        }
        released
    }

    /// Interprets one line from `slot` and broadcasts the resulting state,
    /// whether or not anything changed.
    pub fn handle_line(&mut self, seat: Seat, line: &str) -> Outcome {
        let slot = seat.slot;
        if !self.slots.is_current(seat) {
            debug!("Ignoring {:?} from released slot {}", line, slot);
            return Outcome::Closed;
        }

        let outcome = match line.parse::<Command>() {
            Ok(command) => {
                debug!("Slot {} sent {:?}", slot, command);
                self.apply(slot, &command)
            }
            Err(e) => {
                debug!("Slot {}: {}", slot, e);
                Outcome::Continue
            }
        };

        self.refresh_and_broadcast();
        outcome
    }

    /// Applies a parsed command without broadcasting.
    pub fn apply(&mut self, slot: usize, command: &Command) -> Outcome {
        match command {
            Command::Move(direction) => {
                let Some(player) = self.slots.player_mut(slot) else {
                    return Outcome::Closed;
                };
                if let Some((row, col)) = self.grid.step(player.position(), *direction) {
                    player.row = row;
                    player.col = col;
                }
                Outcome::Continue
            }
            Command::Attack => {
                let Some(attacker) = self.slots.player(slot).cloned() else {
                    return Outcome::Closed;
                };
                for target in self.slots.players_mut() {
                    if target.active
                        && target.slot != attacker.slot
                        && target.distance_to(&attacker) == 1
                    {
                        target.hp -= ATTACK_DAMAGE;
                        info!(
                            "Player {} hit {} (HP {})",
                            attacker.marker(),
                            target.marker(),
                            target.hp
                        );
                    }
                }
                Outcome::Continue
            }
            Command::Quit => {
                self.slots.release(slot);
                Outcome::Closed
            }
            Command::Chat(message) => {
                info!("Chat from slot {}: {}", slot, message);
                Outcome::Continue
            }
        }
    }

    pub fn refresh_markers(&mut self) {
        self.grid.refresh_markers(self.slots.players());
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            rows: self.grid.render_rows(),
            players: self
                .slots
                .active_players()
                .map(|p| PlayerLine {
                    marker: p.marker(),
                    row: p.row,
                    col: p.col,
                    hp: p.hp,
                })
                .collect(),
        }
    }

    /// Queues the current frame on every bound peer.
    ///
    /// Sending never blocks: the frame lands in the peer's channel and its
    /// writer task does the socket I/O after the lock is gone. A closed channel
    /// means that peer is going away; its own connection loop releases it.
    ///
    /// A peer whose queue is full is treated as disconnected and released
    /// here, and the resulting state is broadcast to the remaining peers. The
    /// returned frame is the last one sent.
    pub fn broadcast(&mut self) -> Frame {
        loop {
            let frame: Frame = self.snapshot().to_string().into();
            let mut lagging = Vec::new();

            for (slot, peer) in self.slots.peers() {
                match peer.try_send(Frame::clone(&frame)) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => lagging.push(slot),
                    Err(TrySendError::Closed(_)) => {
                        debug!("Peer in slot {} has no writer, skipping", slot)
                    }
                }
            }
            self.broadcasts += 1;

            if lagging.is_empty() {
                return frame;
            }
            for slot in lagging {
                warn!("Player {}: {}", marker(slot), ServerError::queue_full());
                self.slots.release(slot);
            }
            self.refresh_markers();
        }
    }

    /// Number of broadcasts performed so far.
    pub fn broadcast_count(&self) -> u64 {
        self.broadcasts
    }

    fn refresh_and_broadcast(&mut self) {
        self.refresh_markers();
        self.broadcast();
    }
}
