//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository reads into engine inputs.
//! - Own request validation for the log-communication command.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod communication_service;
pub mod due_status_service;
