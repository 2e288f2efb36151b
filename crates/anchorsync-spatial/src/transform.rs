//! Rigid-body transforms between tracking spaces.
//!
//! Every device tracks the room in its own private coordinate system.  A
//! [`Transform3D`] describes how that system relates to another one (for
//! example, a shared "room" space used by simulations and tests): to map a
//! point, rotate it by `rotation` then add `translation`.
//!
//! # Example
//!
//! ```rust
//! use anchorsync_spatial::transform::Transform3D;
//! use anchorsync_types::{Quaternion, Vec3};
//!
//! // Device space is the room shifted 1 m along +X.
//! let room_to_device = Transform3D::new(Vec3::new(1.0, 0.0, 0.0), Quaternion::identity());
//! let p = room_to_device.apply_point(Vec3::new(0.5, 0.0, 0.0));
//! assert!((p.x - 1.5).abs() < 1e-5);
//! ```

use anchorsync_types::{AnchorPoint, Quaternion, SyncedPose, Vec3};

/// A rigid-body 3-D transform: rotation followed by translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    /// Create a transform from a translation and rotation.
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Compose two transforms: `other` applied first, then `self`.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// The transform that undoes `self`.
    pub fn inverse(self) -> Self {
        let inv_rot = self.rotation.inverse();
        Self::new(inv_rot.rotate(self.translation).neg(), inv_rot)
    }

    pub fn apply_point(&self, p: Vec3) -> Vec3 {
        self.rotation.rotate(p).add(self.translation)
    }

    /// Re-express an orientation: `rotation * q`.
    pub fn apply_rotation(&self, q: Quaternion) -> Quaternion {
        self.rotation.mul(q)
    }

    /// Map a pose into the target space.  Scale is frame-independent.
    pub fn apply_pose(&self, pose: &SyncedPose) -> SyncedPose {
        SyncedPose::new(
            self.apply_point(pose.position),
            self.apply_rotation(pose.rotation),
            pose.scale,
        )
    }

    /// Map an anchor into the target space, keeping its id.
    pub fn apply_anchor(&self, anchor: &AnchorPoint) -> AnchorPoint {
        AnchorPoint::new(
            anchor.id.clone(),
            self.apply_point(anchor.position),
            self.apply_rotation(anchor.orientation),
        )
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
