//! `anchorsync-runtime` – the per-participant synchronisation engine.
//!
//! # Modules
//!
//! - [`session`] – [`SyncSession`][session::SyncSession]: owns the current
//!   anchor-set and frame snapshots, runs the `NoFrame` / `FrameEstablished`
//!   state machine, and dispatches to the encoder or decoder by role.
//! - [`participant`] – [`Participant`][participant::Participant]: the tick
//!   driver.  Drains bus events at the start of each tick, announces the
//!   authority's frame, publishes encoded poses, and applies decoded ones.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export.

pub mod participant;
pub mod session;
pub mod telemetry;

pub use participant::{Participant, TickReport};
pub use session::{Role, SessionDiagnostics, SessionMode, SyncSession};
pub use telemetry::{TracerProviderGuard, init_tracing};
