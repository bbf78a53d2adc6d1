//! Workflow engine and collaborator port definitions for tapflow.
//!
//! This crate defines the "ports" (frame source, template matcher, action
//! backend) that the infrastructure layer implements, plus the engine that
//! drives workflows against them. It depends only on `tapflow-types` -- never
//! on `tapflow-infra` or any capture/input crate.

pub mod engine;
pub mod event;
pub mod ports;
pub mod script;
