//! `anchorsync-middleware` – the broadcast channel between participants.
//!
//! Moves frames, poses, anchor observations and control events around
//! without caring what they mean.
//!
//! # Modules
//!
//! - [`bus`] – Typed, topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels, with a non-blocking drain for tick-driven consumers.
//! - [`adapter`] – The [`AnchorTracker`] trait implemented by anchor-tracking
//!   services, and a forwarder that pumps their observations onto the bus.

pub mod adapter;
pub mod bus;

pub use adapter::{AnchorTracker, forward_observations};
pub use bus::{EventBus, Topic, TopicReceiver};
