//! Reactive layer — snapshot delivery for collection subscriptions.
//!
//! # Modules
//!
//! - [`change_bus`] — [`ChangeBus`], the per-collection local pub/sub.
//! - [`subscription`] — [`Subscription`] cancellation handles and the
//!   [`SnapshotStream`] stream form.

pub mod change_bus;
pub mod subscription;

pub use change_bus::{ChangeBus, ListenerId, SnapshotListener};
pub use subscription::{SnapshotStream, Subscription};
