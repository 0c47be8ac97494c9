//! Twinsight: the behavioral analytics and personalization engine behind a
//! personal-growth companion app.
//!
//! The engine turns daily emotional check-ins into derived wellbeing scores,
//! chat messages into personality-aware AI replies with deferred sentiment
//! analysis, quiz answers into trait scores with longitudinal comparisons,
//! and goals into a tracked progress state machine with bounded AI insight
//! ledgers. HTTP routing, auth, and the generative model itself live outside
//! this crate; the engine talks to them through the [`store::Store`] and
//! [`gateway::AiGateway`] traits.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod quiz;
pub mod ranker;
pub mod scores;
pub mod state;
pub mod store;
pub mod trends;
pub mod types;

#[cfg(test)]
pub mod testing;

#[cfg(test)]
mod integration_tests;

pub use engine::Engine;
pub use error::{EngineError, EngineErrorKind};
