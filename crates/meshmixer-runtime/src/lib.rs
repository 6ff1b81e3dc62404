//! Policy snapshot runtime for meshmixer
//!
//! A [`Snapshot`] holds the rules, actions, handlers and instances of one
//! mesh configuration generation. Handlers and instances live in an arena
//! and are referenced by index, so identity (not content) decides whether
//! two references point at the same object.
//!
//! [`queries::instances_grouped_by_handler`] answers which instances feed
//! which handler.

pub mod queries;
pub mod snapshot;

pub use queries::{instances_grouped_by_handler, resolve, HandlerInstances};
pub use snapshot::{Action, Handler, HandlerId, Instance, InstanceId, Rule, Snapshot, SnapshotBuilder};
