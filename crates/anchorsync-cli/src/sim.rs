//! Headless multi-device simulation.
//!
//! Every simulated device owns a private tracking space (a rigid transform
//! from the shared room into that device's coordinates) and a
//! [`SimulatedTracker`] that reports the room's three anchors in that space.
//! Device 0 is the authority; the rest are dependents.  Each tick the
//! authority publishes the pose of a tracked object moving on a circle, and
//! every dependent's placement is compared against where the object really is
//! in its own space.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anchorsync_middleware::{AnchorTracker, EventBus, forward_observations};
use anchorsync_runtime::{Participant, Role, SessionDiagnostics, SessionMode, SyncSession};
use anchorsync_spatial::Transform3D;
use anchorsync_types::{
    AnchorObservation, AnchorPoint, AnchorStatus, Quaternion, SyncError, SyncedPose, Vec3,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tracing::{debug, info};

use crate::config::Config;

/// Identifier of the object the authority moves around the room.
pub const TRACKED_OBJECT: &str = "letterboard";

// ────────────────────────────────────────────────────────────────────────────
// Simulated tracker
// ────────────────────────────────────────────────────────────────────────────

/// An [`AnchorTracker`] backed by a fixed set of room anchors.
///
/// Requested ids that exist in the room are reported `Located` in the
/// device's tracking space; unknown ids are reported `NotLocated`.
pub struct SimulatedTracker {
    room: Vec<AnchorPoint>,
    space: Transform3D,
    requested: Mutex<Vec<String>>,
}

impl SimulatedTracker {
    pub fn new(room: Vec<AnchorPoint>, space: Transform3D) -> Self {
        Self {
            room,
            space,
            requested: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AnchorTracker for SimulatedTracker {
    async fn locate(&self, ids: &[String]) -> Result<(), SyncError> {
        let mut requested = self
            .requested
            .lock()
            .map_err(|e| SyncError::Channel(e.to_string()))?;
        requested.clear();
        requested.extend_from_slice(ids);
        Ok(())
    }

    async fn observations(&self) -> BoxStream<'static, AnchorObservation> {
        let requested = match self.requested.lock() {
            Ok(ids) => ids.clone(),
            Err(_) => Vec::new(),
        };
        let results: Vec<AnchorObservation> = requested
            .into_iter()
            .map(|id| match self.room.iter().find(|a| a.id == id) {
                Some(anchor) => AnchorObservation {
                    anchor: self.space.apply_anchor(anchor),
                    status: AnchorStatus::Located,
                },
                None => AnchorObservation {
                    anchor: AnchorPoint::new(id, Vec3::zero(), Quaternion::identity()),
                    status: AnchorStatus::NotLocated,
                },
            })
            .collect();
        futures_util::stream::iter(results).boxed()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scene
// ────────────────────────────────────────────────────────────────────────────

/// Place three anchors the way a user creates them: one a metre ahead of the
/// head, one 0.3 m above it, one 0.4 m to its side.
pub fn anchor_triangle(head: Vec3, forward: Vec3) -> Vec<AnchorPoint> {
    let base = head.add(forward);
    [Vec3::zero(), Vec3::new(0.0, 0.3, 0.0), Vec3::new(0.4, 0.0, 0.0)]
        .into_iter()
        .enumerate()
        .map(|(i, offset)| {
            AnchorPoint::new(format!("anchor-{i}"), base.add(offset), Quaternion::identity())
        })
        .collect()
}

/// Room-to-device transform of the device at `index`.
pub fn device_space(index: usize) -> Transform3D {
    let i = index as f32;
    Transform3D::new(
        Vec3::new(0.6 * i - 0.4, 0.02 * i, 0.3 - 1.1 * i),
        Quaternion::from_axis_angle(Vec3::unit_y(), 0.35 + 1.3 * i),
    )
}

/// Room pose of the tracked object at `tick`.
pub fn object_pose(tick: u64) -> SyncedPose {
    let t = tick as f32 * 0.05;
    SyncedPose::new(
        Vec3::new(0.2 + 0.5 * t.cos(), 1.2, 1.5 + 0.5 * t.sin()),
        Quaternion::from_axis_angle(Vec3::unit_y(), t),
        Vec3::one(),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Run
// ────────────────────────────────────────────────────────────────────────────

/// Per-device outcome of a run.
#[derive(Debug, Clone)]
pub struct DeviceSummary {
    pub name: String,
    pub role: Role,
    pub final_mode: SessionMode,
    /// Ticks on which the device had both frames.
    pub synced_ticks: u64,
    /// Worst position error over synced ticks, in metres.
    pub max_position_error: f32,
    /// Worst rotation error over synced ticks, in degrees.
    pub max_rotation_error_deg: f32,
    pub diagnostics: SessionDiagnostics,
}

#[derive(Debug, Clone)]
pub struct SimSummary {
    pub ticks_run: u64,
    pub devices: Vec<DeviceSummary>,
}

struct Device {
    participant: Participant,
    tracker: SimulatedTracker,
    space: Transform3D,
    synced_ticks: u64,
    max_position_error: f32,
    max_rotation_error_deg: f32,
}

impl Device {
    async fn locate_anchors(&self, ids: &[String], bus: &EventBus) -> Result<usize, SyncError> {
        self.tracker.locate(ids).await?;
        forward_observations(&self.tracker, bus, &self.participant.tracker_source()).await
    }

    fn record(&mut self, room_pose: &SyncedPose) {
        let session = self.participant.session();
        if session.mode() != SessionMode::FrameEstablished || session.remote_frame().is_none() {
            return;
        }
        let Some(placed) = self.participant.placement(TRACKED_OBJECT) else {
            return;
        };
        let expected = self.space.apply_pose(room_pose);
        let position_error = placed.position.distance(expected.position);
        let cos_half = placed
            .rotation
            .normalize()
            .dot(expected.rotation.normalize())
            .abs()
            .min(1.0);
        let rotation_error = (2.0 * cos_half.acos()).to_degrees();

        self.synced_ticks += 1;
        self.max_position_error = self.max_position_error.max(position_error);
        self.max_rotation_error_deg = self.max_rotation_error_deg.max(rotation_error);
    }

    fn summary(&self) -> DeviceSummary {
        let session = self.participant.session();
        DeviceSummary {
            name: self.participant.name().to_string(),
            role: session.role(),
            final_mode: session.mode(),
            synced_ticks: self.synced_ticks,
            max_position_error: self.max_position_error,
            max_rotation_error_deg: self.max_rotation_error_deg,
            diagnostics: session.diagnostics(),
        }
    }
}

/// Run the simulation described by `cfg` until it completes or `shutdown`
/// is raised.
pub async fn run(cfg: &Config, shutdown: Arc<AtomicBool>) -> Result<SimSummary, SyncError> {
    let bus = EventBus::default();
    let room = anchor_triangle(Vec3::new(0.0, 1.6, 0.0), Vec3::unit_z());
    let anchor_ids: Vec<String> = room.iter().map(|a| a.id.clone()).collect();

    let mut devices: Vec<Device> = (0..=cfg.dependents)
        .map(|index| {
            let (name, role) = if index == 0 {
                ("host".to_string(), Role::Authority)
            } else {
                (format!("device-{index}"), Role::Dependent)
            };
            let space = device_space(index);
            let session = SyncSession::new(role, cfg.resolver, cfg.axis_convention);
            Device {
                participant: Participant::new(name, session, bus.clone()),
                tracker: SimulatedTracker::new(room.clone(), space),
                space,
                synced_ticks: 0,
                max_position_error: 0.0,
                max_rotation_error_deg: 0.0,
            }
        })
        .collect();

    for device in &devices {
        let n = device.locate_anchors(&anchor_ids, &bus).await?;
        debug!(device = device.participant.name(), observations = n, "anchors located");
    }

    info!(
        devices = devices.len(),
        ticks = cfg.ticks,
        convention = %cfg.axis_convention,
        "simulation started"
    );

    let mut ticks_run = 0;
    for tick in 0..cfg.ticks {
        if shutdown.load(Ordering::SeqCst) {
            info!(tick, "shutdown requested; stopping simulation");
            break;
        }

        let reset_now = cfg.reset_at_tick == Some(tick);
        if reset_now && let Some(host) = devices.first() {
            host.participant.request_reset()?;
        }

        let room_pose = object_pose(tick);
        for device in devices.iter_mut() {
            let local = device.space.apply_pose(&room_pose);
            let objects = [(TRACKED_OBJECT, local)];
            let report = device.participant.tick(&objects)?;
            debug!(device = device.participant.name(), ?report, "device ticked");
            device.record(&room_pose);
        }

        if reset_now {
            for device in &devices {
                device.locate_anchors(&anchor_ids, &bus).await?;
            }
        }

        ticks_run += 1;
        if cfg.tick_interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(cfg.tick_interval_ms)).await;
        }
    }

    let summary = SimSummary {
        ticks_run,
        devices: devices.iter().map(Device::summary).collect(),
    };
    for device in &summary.devices {
        info!(
            device = %device.name,
            synced_ticks = device.synced_ticks,
            max_position_error = device.max_position_error,
            "device summary\n{}",
            device.diagnostics
        );
    }
    Ok(summary)
}
