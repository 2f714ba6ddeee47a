//! # Controller Module
//!
//! Virtual controller state shared across execution contexts.
//!
//! This module handles:
//! - The button/stick value model and its range invariants
//! - Whole-value guarded access between the ingestion worker and the publisher

pub mod shared;
pub mod state;

pub use shared::{shared_state, StateReader, StateWriter};
pub use state::*;
