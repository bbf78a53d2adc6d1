//! Shared domain types for tapflow.
//!
//! This crate contains the core domain types used across the tapflow engine:
//! geometry (positions, regions, frames), match results, workflow definitions,
//! progress events, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, thiserror.

pub mod config;
pub mod defaults;
pub mod error;
pub mod event;
pub mod frame;
pub mod geometry;
pub mod matching;
pub mod workflow;
