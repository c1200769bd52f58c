//! mrx-engine
//!
//! Management-frame receive reordering for multi-link radio devices.
//!
//! Frames arrive through one hardware pipeline per link, each with its own
//! monotonic packet counter plus a loosely synchronized global timestamp.
//! This crate restores a single, globally consistent delivery order:
//! ingestion folds firmware events and shared hardware snapshots into a
//! per-link tracker, a watermark over all live links proves which pending
//! entries can no longer be preceded by an unseen older frame, and the
//! dispatcher hands them to the consumer in that order. Anything that
//! cannot be proven in time leaves through an explicitly degraded path
//! (age-out, overflow, link teardown, force flush), never silently.
//!
//! Deterministic logic lives in pure modules (`tracker`, `list`,
//! `frontier`); [`ReorderEngine`] adds the locking and the snapshot source.
//! Time is an embedder-supplied tick counter; the engine never reads a
//! wall clock.

mod config;
mod engine;
pub mod frontier;
mod list;
mod stats;
mod tracker;
mod types;

pub use config::{from_yaml_str, LoadedReorderConfig, ReorderConfig, UnusedKeyPolicy};
pub use engine::{FrameConsumer, ReorderEngine};
pub use frontier::Frontier;
pub use list::{Entry, EntrySlot, InsertOutcome, ReorderList};
pub use stats::ReorderStats;
pub use tracker::{LinkTracker, UpdateOutcome};
pub use types::{
    DeliveryEvent, Disposition, DropKind, ManagementFrame, ReleaseReason, ReorderError,
};
