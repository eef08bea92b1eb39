//! Aula Engine Library
//!
//! This library provides the core functionality of the aula backend.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Database persistence module
pub mod db;

/// Course provider client module
pub mod classroom;

/// Intent-detection service client module
pub mod intent;

/// Conversational gateway module
pub mod gateway;

/// Reconciliation engine module
pub mod sync;

/// HTTP API module
pub mod api;

/// Application context module
pub mod context;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
