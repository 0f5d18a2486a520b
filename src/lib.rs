#![doc = include_str!("../docs/rustdoc.md")]

/// REST client for counts, skill search and email availability.
pub mod api;
/// Platform broadcast handler.
pub mod broadcast;
/// Event channel adapter and handler registry.
pub mod channel;
/// Command-line argument definitions.
pub mod cli;
/// Shared connection state and integrity counters.
pub mod client_state;
/// Runtime configuration model.
pub mod config;
/// Pending and active counter synchronization.
pub mod counters;
/// Error types used across the crate.
pub mod error;
/// Channel events and transport signals.
pub mod events;
/// Metrics registry and exporter.
pub mod monitoring;
/// Transient notification presenter.
pub mod notifications;
/// Realtime client event loop and handles.
pub mod realtime;
/// Render targets for notifications, counters and broadcasts.
pub mod surface;
/// Tracing/logging initialization.
pub mod tracing_setup;
/// Event channel transports.
pub mod transport;
/// Skill Swap wire and REST data models.
pub mod types;
/// Terminal rendering.
pub mod ui;
/// Form field validation.
pub mod validation;

/// Primary crate error type.
pub use error::SkillSwapError;
