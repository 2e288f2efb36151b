//! [`SyncSession`] – one participant's view of the shared frame.
//!
//! The session owns immutable snapshots of its [`AnchorSet`] and of the local
//! and remote [`CoordinateFrame`]s.  Any change replaces a snapshot wholesale
//! (a single `Arc` swap), so readers holding a previous snapshot never see a
//! half-updated frame.
//!
//! # State machine
//!
//! ```text
//!   NoFrame ──(3 anchors resolved)──▶ FrameEstablished
//!      ▲                                     │
//!      └──────(anchor added/updated/removed, reset)
//! ```
//!
//! `NoFrame` publishes raw poses; `FrameEstablished` encodes (authority) or
//! decodes (dependent) them.

use std::fmt;
use std::sync::Arc;

use anchorsync_spatial::{AnchorChange, AnchorSet, BasisResolver, PoseDecoder, PoseEncoder};
use anchorsync_types::{
    AnchorObservation, AxisConvention, CoordinateFrame, PoseEncoding, PoseUpdate, ResolverConfig,
    SyncError, SyncedPose,
};
use tracing::{debug, info, warn};

/// Externally decided role of this participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Owns the object poses and publishes them.
    Authority,
    /// Receives and reconstructs the authority's poses.
    Dependent,
}

/// Whether a trustworthy local frame exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    NoFrame,
    FrameEstablished,
}

/// Synchronisation state for one participant.
#[derive(Debug)]
pub struct SyncSession {
    role: Role,
    resolver: BasisResolver,
    encoder: PoseEncoder,
    decoder: PoseDecoder,
    anchors: Arc<AnchorSet>,
    local_frame: Option<Arc<CoordinateFrame>>,
    remote_frame: Option<Arc<CoordinateFrame>>,
    /// Set when the authority has a frame nobody has been told about yet.
    announcement_pending: bool,
    last_error: Option<SyncError>,
}

impl SyncSession {
    pub fn new(role: Role, resolver: ResolverConfig, convention: AxisConvention) -> Self {
        Self {
            role,
            resolver: BasisResolver::new(resolver),
            encoder: PoseEncoder::new(convention),
            decoder: PoseDecoder::new(),
            anchors: Arc::new(AnchorSet::new()),
            local_frame: None,
            remote_frame: None,
            announcement_pending: false,
            last_error: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_authority(&self) -> bool {
        self.role == Role::Authority
    }

    /// Switch role.  A new authority forgets any remote frame and announces
    /// its own frame (if it has one) on the next opportunity.
    pub fn set_role(&mut self, role: Role) {
        if role == self.role {
            return;
        }
        info!(from = ?self.role, to = ?role, "role changed");
        self.role = role;
        match role {
            Role::Authority => {
                self.remote_frame = None;
                self.announcement_pending = self.local_frame.is_some();
            }
            Role::Dependent => self.announcement_pending = false,
        }
    }

    pub fn mode(&self) -> SessionMode {
        if self.local_frame.is_some() {
            SessionMode::FrameEstablished
        } else {
            SessionMode::NoFrame
        }
    }

    /// Current anchor snapshot.
    pub fn anchors(&self) -> Arc<AnchorSet> {
        Arc::clone(&self.anchors)
    }

    /// This participant's own resolved frame.
    pub fn local_frame(&self) -> Option<Arc<CoordinateFrame>> {
        self.local_frame.clone()
    }

    /// The authority's announced frame (dependents only).
    pub fn remote_frame(&self) -> Option<Arc<CoordinateFrame>> {
        self.remote_frame.clone()
    }

    /// Why the last rebuild left the session without a frame, if it did.
    pub fn last_error(&self) -> Option<&SyncError> {
        self.last_error.as_ref()
    }

    pub fn axis_convention(&self) -> AxisConvention {
        self.encoder.convention()
    }

    /// Feed one anchor-tracking result.  Returns `true` when the anchor set
    /// changed (and the frame was therefore rebuilt).
    pub fn observe_anchor(&mut self, observation: &AnchorObservation) -> bool {
        match self.anchors.with_observation(observation) {
            Some((anchors, change)) => {
                debug!(anchor = %observation.anchor.id, ?change, "anchor set changed");
                if change == AnchorChange::Updated {
                    info!(anchor = %observation.anchor.id, "anchor pose updated; rebuilding frame");
                }
                self.replace_anchors(anchors);
                true
            }
            None => false,
        }
    }

    /// Drop an anchor by id.  Returns `true` when it was present.
    pub fn remove_anchor(&mut self, id: &str) -> bool {
        match self.anchors.without(id) {
            Some((anchors, change)) => {
                info!(anchor = id, ?change, "anchor set changed");
                self.replace_anchors(anchors);
                true
            }
            None => false,
        }
    }

    /// Forget all anchors and frames.
    pub fn reset(&mut self) {
        info!("session reset");
        self.anchors = Arc::new(AnchorSet::new());
        self.local_frame = None;
        self.remote_frame = None;
        self.announcement_pending = false;
        self.last_error = None;
    }

    /// Store the authority's frame as received.  Ignored by the authority.
    pub fn receive_frame(&mut self, frame: CoordinateFrame) {
        if self.is_authority() {
            warn!("authority ignoring foreign frame announcement");
            return;
        }
        info!(origin = %frame.origin_position, "remote frame received");
        self.remote_frame = Some(Arc::new(frame));
    }

    /// The frame the authority still has to announce, at most once per
    /// resolved frame.
    pub fn take_frame_announcement(&mut self) -> Option<CoordinateFrame> {
        if !self.is_authority() || !self.announcement_pending {
            return None;
        }
        self.announcement_pending = false;
        self.local_frame.as_deref().copied()
    }

    /// Encode one object's pose for publication.  Raw pass-through until a
    /// local frame exists.
    pub fn encode(&self, object_id: &str, tick: u64, pose: &SyncedPose) -> PoseUpdate {
        let (encoding, pose) = match self.local_frame.as_deref() {
            Some(frame) => (PoseEncoding::FrameRelative, self.encoder.encode(pose, frame)),
            None => (PoseEncoding::Raw, self.encoder.pass_through(pose)),
        };
        PoseUpdate {
            object_id: object_id.to_string(),
            tick,
            encoding,
            pose,
        }
    }

    /// Rebuild a received pose in this participant's tracking space.
    ///
    /// Raw updates, and frame-relative updates arriving while either frame
    /// is missing, are applied verbatim.
    pub fn decode(&self, update: &PoseUpdate) -> SyncedPose {
        if update.encoding == PoseEncoding::Raw {
            return update.pose;
        }
        match (self.remote_frame.as_deref(), self.local_frame.as_deref()) {
            (Some(remote), Some(local)) => self.decoder.decode(&update.pose, remote, local),
            (remote, local) => {
                debug!(
                    object = %update.object_id,
                    has_remote = remote.is_some(),
                    has_local = local.is_some(),
                    "frame missing; applying received pose verbatim"
                );
                update.pose
            }
        }
    }

    /// Snapshot of everything worth printing about this session.
    pub fn diagnostics(&self) -> SessionDiagnostics {
        SessionDiagnostics {
            role: self.role,
            mode: self.mode(),
            axis_convention: self.axis_convention(),
            anchor_count: self.anchors.len(),
            local_frame: self.local_frame.as_deref().copied(),
            remote_frame: self.remote_frame.as_deref().copied(),
            last_error: self.last_error.clone(),
        }
    }

    fn replace_anchors(&mut self, anchors: AnchorSet) {
        self.anchors = Arc::new(anchors);
        self.local_frame = None;
        self.announcement_pending = false;

        if !self.anchors.is_complete() {
            self.last_error = Some(SyncError::InsufficientAnchors {
                found: self.anchors.len(),
            });
            return;
        }

        match self.resolver.resolve(self.anchors.anchors()) {
            Ok(frame) => {
                info!(
                    origin = %frame.origin_position,
                    x_axis = %frame.x_axis,
                    y_axis = %frame.y_axis,
                    z_axis = %frame.z_axis,
                    "frame established"
                );
                self.local_frame = Some(Arc::new(frame));
                self.announcement_pending = self.is_authority();
                self.last_error = None;
            }
            Err(e) => {
                warn!(error = %e, "anchor triangle rejected; staying in pass-through");
                self.last_error = Some(e);
            }
        }
    }
}

/// Point-in-time dump of a [`SyncSession`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDiagnostics {
    pub role: Role,
    pub mode: SessionMode,
    pub axis_convention: AxisConvention,
    pub anchor_count: usize,
    pub local_frame: Option<CoordinateFrame>,
    pub remote_frame: Option<CoordinateFrame>,
    pub last_error: Option<SyncError>,
}

impl fmt::Display for SessionDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "role: {:?}, mode: {:?}, convention: {}",
            self.role,
            self.mode,
            self.axis_convention
        )?;
        writeln!(f, "anchors: {}", self.anchor_count)?;
        for (label, frame) in [("local", &self.local_frame), ("remote", &self.remote_frame)] {
            match frame {
                Some(fr) => writeln!(
                    f,
                    "{label} frame: origin {} rot {} | x {} y {} z {}",
                    fr.origin_position, fr.origin_rotation, fr.x_axis, fr.y_axis, fr.z_axis
                )?,
                None => writeln!(f, "{label} frame: none")?,
            }
        }
        if let Some(e) = &self.last_error {
            writeln!(f, "last error: {e}")?;
        }
        Ok(())
    }
}
