//! pathwise-core — Attempt resolution, scenario evaluation and progress aggregation.
//!
//! This crate defines the courseware data model, the collaborator traits the
//! runtime consumes, and the computational core that keeps attempts,
//! evaluations and progress consistent across the courseware tree.

pub mod attempt;
pub mod bkt;
pub mod cache;
pub mod competency;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod parser;
pub mod progress;
pub mod results;
pub mod runtime;
pub mod traits;

pub use error::{Result, RuntimeError};
