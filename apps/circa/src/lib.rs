//! # Circa Application Library
//!
//! HTTP API, live channel, CLI and configuration for the `circa` binary.
//! Exposed as a library so integration tests can build the router directly.

pub mod api;
pub mod cli;
pub mod config;
