//! Core data types for figure numbering.
//!
//! This module defines the intermediate representation that bridges markup
//! extraction and stylesheet generation: raw candidates straight out of the
//! extractor, canonical numbered records, and the per-document state machine
//! the controller tracks.

mod figure;
mod state;

pub use figure::{Figure, FigureKind, FigureStats, RawFigure};
pub use state::DocumentPhase;
