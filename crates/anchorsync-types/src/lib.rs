//! `anchorsync-types` – shared data model for anchor-triangle synchronisation.
//!
//! Everything that crosses the broadcast channel (frames, poses, anchor
//! observations, control events) is defined here with `serde` derives so
//! every participant agrees on the wire shape.

pub mod math;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use math::{Quaternion, Vec3};

// ────────────────────────────────────────────────────────────────────────────
// Anchors
// ────────────────────────────────────────────────────────────────────────────

/// Result of the external anchor-tracking service trying to locate an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnchorStatus {
    /// Freshly located in this session.
    Located,
    /// Rediscovered; the service was already tracking it.
    AlreadyTracked,
    /// The service gave up on this anchor.
    NotLocated,
}

impl AnchorStatus {
    /// Only `Located` and `AlreadyTracked` anchors carry a usable pose.
    pub fn is_tracked(self) -> bool {
        matches!(self, AnchorStatus::Located | AnchorStatus::AlreadyTracked)
    }
}

/// A resolved reference point in one participant's own tracking space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorPoint {
    /// Opaque identifier shared by every participant for the same physical
    /// anchor.
    pub id: String,
    pub position: Vec3,
    pub orientation: Quaternion,
}

impl AnchorPoint {
    pub fn new(id: impl Into<String>, position: Vec3, orientation: Quaternion) -> Self {
        Self {
            id: id.into(),
            position,
            orientation,
        }
    }
}

/// One event from the anchor-tracking feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorObservation {
    pub anchor: AnchorPoint,
    pub status: AnchorStatus,
}

// ────────────────────────────────────────────────────────────────────────────
// Frames and poses
// ────────────────────────────────────────────────────────────────────────────

/// Origin and axes derived from the anchor triangle.
///
/// Built only by the basis resolver (or received verbatim from the
/// authority), never patched in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateFrame {
    pub origin_position: Vec3,
    pub origin_rotation: Quaternion,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub z_axis: Vec3,
}

impl CoordinateFrame {
    /// Frame at the tracking-space origin with world-aligned axes.
    pub fn world_aligned() -> Self {
        Self {
            origin_position: Vec3::zero(),
            origin_rotation: Quaternion::identity(),
            x_axis: Vec3::unit_x(),
            y_axis: Vec3::unit_y(),
            z_axis: Vec3::unit_z(),
        }
    }
}

/// Position, rotation and scale of a tracked object.  Doubles as the wire
/// record published once per tick by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncedPose {
    pub position: Vec3,
    pub rotation: Quaternion,
    pub scale: Vec3,
}

impl SyncedPose {
    pub fn new(position: Vec3, rotation: Quaternion, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Pose at `position` with identity rotation and unit scale.
    pub fn at(position: Vec3) -> Self {
        Self::new(position, Quaternion::identity(), Vec3::one())
    }
}

/// How the authority produced the pose in a [`PoseUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoseEncoding {
    /// Pass-through: raw tracking-space values, no frame applied.
    Raw,
    /// Frame-relative encoding; must be decoded against the authority's frame.
    FrameRelative,
}

/// Envelope around the per-tick [`SyncedPose`] of one tracked object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseUpdate {
    pub object_id: String,
    pub tick: u64,
    pub encoding: PoseEncoding,
    pub pose: SyncedPose,
}

/// Mapping applied by the authority's encoder to the raw displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisConvention {
    /// raw-x → z-axis, raw-y → y-axis, raw-z → −x-axis; rotation `q * O`.
    #[default]
    Permuted,
    /// Projection onto the triangle axes; rotation `O⁻¹ * q * O`.
    Projected,
}

impl std::fmt::Display for AxisConvention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AxisConvention::Permuted => write!(f, "permuted"),
            AxisConvention::Projected => write!(f, "projected"),
        }
    }
}

impl std::str::FromStr for AxisConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permuted" => Ok(AxisConvention::Permuted),
            "projected" => Ok(AxisConvention::Projected),
            other => Err(format!("unknown axis convention: {other}")),
        }
    }
}

/// Tolerances used by the basis resolver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Any pairwise anchor distance below this (metres) is degenerate.
    pub min_edge_length: f32,
    /// Maximum `|dot(x_axis, y_axis)|` accepted before the legs are deemed
    /// too far from perpendicular (or collinear).
    pub orthogonality_tolerance: f32,
    /// Edge lengths closer than this are considered tied.
    pub tie_tolerance: f32,
    /// Fail with [`SyncError::AmbiguousRoleAssignment`] on a tie instead of
    /// applying the id-ordered tie-break.
    pub reject_ambiguous: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_edge_length: 0.01,
            orthogonality_tolerance: 0.2,
            tie_tolerance: 1e-4,
            reject_ambiguous: false,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bus envelope
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the broadcast channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "host/tracker", "host/session"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the broadcast channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// The authority's local frame, sent once per established frame.
    FrameAnnouncement(CoordinateFrame),
    /// Per-tick pose of one tracked object.
    Pose(PoseUpdate),
    /// Output of a participant's anchor-tracking service.
    AnchorObserved(AnchorObservation),
    /// An anchor was explicitly deleted on the emitting participant.
    AnchorDeleted { id: String },
    /// Every participant drops its anchors and frames.
    SessionReset,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error taxonomy for frame resolution and relay plumbing.
///
/// None of the resolution errors are ever published; a participant that hits
/// one stays in pass-through.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncError {
    #[error("Insufficient anchors: need 3, found {found}")]
    InsufficientAnchors { found: usize },

    #[error("Too many anchors: need exactly 3, found {found}")]
    TooManyAnchors { found: usize },

    #[error("Degenerate anchor triangle: {0}")]
    DegenerateTriangle(String),

    #[error("Ambiguous role assignment: edge lengths {longest} and {runner_up} are tied")]
    AmbiguousRoleAssignment { longest: f32, runner_up: f32 },

    #[error("Channel Error: {0}")]
    Channel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_status_tracked_variants() {
        assert!(AnchorStatus::Located.is_tracked());
        assert!(AnchorStatus::AlreadyTracked.is_tracked());
        assert!(!AnchorStatus::NotLocated.is_tracked());
    }

    #[test]
    fn frame_announcement_roundtrip() {
        let frame = CoordinateFrame {
            origin_position: Vec3::new(1.0, 2.0, 3.0),
            origin_rotation: Quaternion::from_axis_angle(Vec3::unit_y(), 0.5),
            x_axis: Vec3::unit_x(),
            y_axis: Vec3::unit_y(),
            z_axis: Vec3::unit_z(),
        };
        let event = Event::new("host/session", EventPayload::FrameAnnouncement(frame));
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
        match back.payload {
            EventPayload::FrameAnnouncement(f) => assert_eq!(f, frame),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn pose_update_roundtrip() {
        let update = PoseUpdate {
            object_id: "letterboard".to_string(),
            tick: 42,
            encoding: PoseEncoding::FrameRelative,
            pose: SyncedPose::new(
                Vec3::new(-3.0, 2.0, 1.0),
                Quaternion::identity(),
                Vec3::new(1.0, 2.0, 1.0),
            ),
        };
        let json = serde_json::to_string(&EventPayload::Pose(update.clone())).unwrap();
        let back: EventPayload = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, EventPayload::Pose(u) if u == update));
    }

    #[test]
    fn axis_convention_parses_and_displays() {
        assert_eq!("Projected".parse::<AxisConvention>(), Ok(AxisConvention::Projected));
        assert_eq!(" permuted ".parse::<AxisConvention>(), Ok(AxisConvention::Permuted));
        assert!("sideways".parse::<AxisConvention>().is_err());
        assert_eq!(AxisConvention::default().to_string(), "permuted");
    }

    #[test]
    fn resolver_config_fills_missing_fields_with_defaults() {
        let cfg: ResolverConfig = serde_json::from_str(r#"{"reject_ambiguous": true}"#).unwrap();
        assert!(cfg.reject_ambiguous);
        assert_eq!(cfg.min_edge_length, ResolverConfig::default().min_edge_length);
    }

    #[test]
    fn sync_error_display() {
        let err = SyncError::InsufficientAnchors { found: 2 };
        assert!(err.to_string().contains("found 2"));

        let err2 = SyncError::DegenerateTriangle("collinear".to_string());
        assert!(err2.to_string().contains("collinear"));
    }
}
