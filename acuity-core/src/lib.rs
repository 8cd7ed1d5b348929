//! # Acuity Core Library
//!
//! Headless cognitive assessment engine.
//!
//! Six mini-games run as finite-state scoring machines, each probing one
//! construct from the cognitive testing literature:
//!
//! - **Stroop**: color-word interference (Stroop, 1935)
//! - **Sentence verification**: semantic truth judgement (Clark & Chase, 1972)
//! - **Pattern memory**: spatial sequence recall (Corsi, 1972)
//! - **Memory matrix**: visuospatial pattern span (Della Sala et al., 1999)
//! - **Reaction time**: simple response latency (Donders, 1868)
//! - **Number span**: digit span capacity (Jacobs, 1887)
//!
//! Around the games sit the assessment orchestrator ([`AssessmentFlow`]),
//! a SQLite session store, a local backup queue for offline resilience,
//! and the risk report heuristic.
//!
//! ## Determinism Contract
//!
//! Engines never read the wall clock or any ambient randomness:
//! - Every state-mutating call takes the current instant as an argument
//! - Timed transitions fire via `tick`, driven by the caller
//! - Stimulus generation flows from a seedable RNG (`with_seed`)
//!
//! A run replayed with the same seed and the same timestamped inputs
//! produces identical metrics.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backup;
pub mod config;
pub mod error;
pub mod flow;
pub mod games;
pub mod report;
pub mod store;
pub mod types;

pub use config::AcuityConfig;
pub use error::{AcuityError, Result};
pub use flow::AssessmentFlow;
pub use games::{GameKind, GameMetrics, GameRunRecord};
pub use types::*;
