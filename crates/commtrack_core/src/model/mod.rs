//! Domain model for companies, cadences and logged communications.
//!
//! # Responsibility
//! - Define canonical records read by the due-status engine.
//! - Validate required fields at the boundary, before persistence.
//!
//! # Invariants
//! - Every company and communication is identified by a stable UUID.
//! - Method names are compared in normalized (trimmed, lowercase) form.
//! - Communications are append-only; nothing here mutates a logged event.

pub mod cadence;
pub mod communication;
pub mod company;
