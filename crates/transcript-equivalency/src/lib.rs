//! Mapping and scoring engine for reconciling international transcripts against a canonical
//! subject catalog.
//!
//! The engine lives under [`workflows::equivalency`]; [`config`], [`error`] and [`telemetry`]
//! carry the ambient service concerns shared with the API binary.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
