//! # Shared Controller State
//!
//! Guards the single [`ControllerState`] shared between the ingestion worker
//! (sole writer) and the state publisher (reader).
//!
//! Access is whole-value only: a reader copies the complete state out under the
//! lock, and a writer applies one complete command under the lock. A reader can
//! therefore never observe fields from two different commands mixed together.
//! No `await` happens while the lock is held.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::state::ControllerState;
use crate::protocol::InboundCommand;

/// Creates a fresh neutral state and returns its writer and reader handles.
///
/// There is exactly one [`StateWriter`]; readers can be cloned freely.
///
/// # Examples
///
/// ```
/// use hidplus_bridge::controller::{shared_state, BUTTON_B};
/// use hidplus_bridge::protocol::InboundCommand;
///
/// let (mut writer, reader) = shared_state();
/// writer.apply(&InboundCommand::SetButtons(BUTTON_B));
/// assert_eq!(reader.snapshot().buttons(), BUTTON_B);
/// ```
pub fn shared_state() -> (StateWriter, StateReader) {
    let cell = Arc::new(Mutex::new(ControllerState::default()));
    (
        StateWriter {
            cell: Arc::clone(&cell),
        },
        StateReader { cell },
    )
}

fn lock(cell: &Mutex<ControllerState>) -> MutexGuard<'_, ControllerState> {
    // Plain data, never left half-written.
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive write access to the shared state.
#[derive(Debug)]
pub struct StateWriter {
    cell: Arc<Mutex<ControllerState>>,
}

impl StateWriter {
    /// Applies one decoded command as a single atomic step.
    ///
    /// Returns `true` if the command mutates state (keepalives do not).
    pub fn apply(&mut self, command: &InboundCommand) -> bool {
        match *command {
            InboundCommand::SetButtons(buttons) => {
                lock(&self.cell).set_buttons(buttons);
                true
            }
            InboundCommand::SetStick { stick, position } => {
                lock(&self.cell).set_stick(stick, position);
                true
            }
            InboundCommand::Keepalive => false,
        }
    }

    /// Replaces the entire state.
    pub fn replace(&mut self, state: ControllerState) {
        *lock(&self.cell) = state;
    }

    /// A reader for the same state.
    pub fn reader(&self) -> StateReader {
        StateReader {
            cell: Arc::clone(&self.cell),
        }
    }
}

/// Read access to the shared state.
#[derive(Debug, Clone)]
pub struct StateReader {
    cell: Arc<Mutex<ControllerState>>,
}

impl StateReader {
    /// Copies out the current state as one consistent value.
    pub fn snapshot(&self) -> ControllerState {
        *lock(&self.cell)
    }
}
