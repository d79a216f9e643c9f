//! FFI bridge crate for CommTrack core.
//!
//! Exposes use-case level functions to the dashboard UI via flutter_rust_bridge.

pub mod api;
