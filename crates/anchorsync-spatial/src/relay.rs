//! Frame-relative pose relay.
//!
//! The authority runs a [`PoseEncoder`] against its own frame once per tick
//! and per tracked object; every other participant runs the [`PoseDecoder`]
//! against the authority's frame (received once) and its own frame.
//!
//! Decoding always rebuilds the displacement along the receiver's own
//! triangle axes.  Encoding depends on the [`AxisConvention`]:
//!
//! | Convention | Encoded displacement | Encoded rotation |
//! |---|---|---|
//! | `Permuted` | `d.x·Z + d.y·Y − d.z·X` | `q · O` |
//! | `Projected` | `(d·X, d·Y, d·Z)` | `O⁻¹ · q · O` |
//!
//! where `d` is the raw offset from the frame origin, `X/Y/Z` the frame axes
//! and `O` the origin rotation.  Only `Projected` makes
//! `decode(encode(p, F), F, F) == p` hold for an arbitrary frame.

use anchorsync_types::{AxisConvention, CoordinateFrame, SyncedPose, Vec3};

/// Authority-side encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoseEncoder {
    convention: AxisConvention,
}

impl PoseEncoder {
    pub fn new(convention: AxisConvention) -> Self {
        Self { convention }
    }

    pub fn convention(&self) -> AxisConvention {
        self.convention
    }

    /// Encode `pose` (in the authority's tracking space) against the
    /// authority's own frame.  Scale passes through.
    pub fn encode(&self, pose: &SyncedPose, local: &CoordinateFrame) -> SyncedPose {
        let delta = pose.position.sub(local.origin_position);
        let (encoded_delta, rotation) = match self.convention {
            AxisConvention::Permuted => (
                local
                    .z_axis
                    .scale(delta.x)
                    .add(local.y_axis.scale(delta.y))
                    .add(local.x_axis.neg().scale(delta.z)),
                pose.rotation.mul(local.origin_rotation),
            ),
            AxisConvention::Projected => (
                Vec3::new(
                    delta.dot(local.x_axis),
                    delta.dot(local.y_axis),
                    delta.dot(local.z_axis),
                ),
                local
                    .origin_rotation
                    .inverse()
                    .mul(pose.rotation)
                    .mul(local.origin_rotation),
            ),
        };

        SyncedPose::new(
            local.origin_position.add(encoded_delta),
            rotation,
            pose.scale,
        )
    }

    /// Pass-through mode used before any frame exists: the raw pose, as is.
    pub fn pass_through(&self, pose: &SyncedPose) -> SyncedPose {
        *pose
    }
}

/// Receiver-side decoder.  Stateless; both frames are supplied per call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoseDecoder;

impl PoseDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Rebuild `received` in this participant's tracking space.
    ///
    /// `remote` is the authority's announced frame, `local` this
    /// participant's own.  Scale passes through.
    pub fn decode(
        &self,
        received: &SyncedPose,
        remote: &CoordinateFrame,
        local: &CoordinateFrame,
    ) -> SyncedPose {
        let delta = received.position.sub(remote.origin_position);
        let delta_rotation = received.rotation.mul(remote.origin_rotation.inverse());

        let rebuilt = local
            .x_axis
            .scale(delta.x)
            .add(local.y_axis.scale(delta.y))
            .add(local.z_axis.scale(delta.z));

        SyncedPose::new(
            local.origin_position.add(rebuilt),
            local.origin_rotation.mul(delta_rotation),
            received.scale,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::BasisResolver;
    use crate::transform::Transform3D;
    use anchorsync_types::{AnchorPoint, Quaternion};

    const TOL: f32 = 1e-4;

    /// The shared physical triangle, expressed in room coordinates.
    fn room_anchors() -> Vec<AnchorPoint> {
        let q = Quaternion::from_axis_angle(Vec3::new(0.1, 1.0, 0.0), 0.35);
        vec![
            AnchorPoint::new("a", Vec3::new(0.2, 1.4, 1.0), q),
            AnchorPoint::new("b", Vec3::new(0.2, 1.7, 1.0), q),
            AnchorPoint::new("c", Vec3::new(0.6, 1.4, 1.0), q),
        ]
    }

    fn frame_in(space: &Transform3D) -> CoordinateFrame {
        let anchors: Vec<_> = room_anchors().iter().map(|a| space.apply_anchor(a)).collect();
        BasisResolver::default().resolve(&anchors).unwrap()
    }

    fn sample_pose() -> SyncedPose {
        SyncedPose::new(
            Vec3::new(1.3, 0.8, -2.1),
            Quaternion::from_axis_angle(Vec3::new(1.0, 0.5, 0.2), 1.2),
            Vec3::new(1.0, 2.0, 0.5),
        )
    }

    #[test]
    fn permuted_encode_of_world_aligned_frame() {
        let encoder = PoseEncoder::new(AxisConvention::Permuted);
        let frame = CoordinateFrame::world_aligned();
        let out = encoder.encode(&SyncedPose::at(Vec3::new(1.0, 2.0, 3.0)), &frame);
        assert!(out.position.approx_eq(Vec3::new(-3.0, 2.0, 1.0), TOL), "got {}", out.position);
    }

    #[test]
    fn permuted_encode_composes_rotation_with_origin() {
        let encoder = PoseEncoder::default();
        let o = Quaternion::from_axis_angle(Vec3::unit_y(), 0.5);
        let frame = CoordinateFrame {
            origin_rotation: o,
            ..CoordinateFrame::world_aligned()
        };
        let pose = sample_pose();
        let out = encoder.encode(&pose, &frame);
        assert!(out.rotation.same_rotation(pose.rotation.mul(o), 1e-6));
        assert_eq!(out.scale, pose.scale);
    }

    #[test]
    fn permuted_encode_offsets_from_origin() {
        let encoder = PoseEncoder::default();
        let frame = CoordinateFrame {
            origin_position: Vec3::new(10.0, 0.0, 0.0),
            ..CoordinateFrame::world_aligned()
        };
        // delta (1, 2, 3) -> (-3, 2, 1), re-anchored at the origin.
        let out = encoder.encode(&SyncedPose::at(Vec3::new(11.0, 2.0, 3.0)), &frame);
        assert!(out.position.approx_eq(Vec3::new(7.0, 2.0, 1.0), TOL), "got {}", out.position);
    }

    #[test]
    fn decode_identity_frames_is_noop() {
        let frame = CoordinateFrame::world_aligned();
        let pose = sample_pose();
        let out = PoseDecoder::new().decode(&pose, &frame, &frame);
        assert!(out.position.approx_eq(pose.position, TOL));
        assert!(out.rotation.same_rotation(pose.rotation, 1e-6));
        assert_eq!(out.scale, pose.scale);
    }

    #[test]
    fn decode_rebuilds_along_local_axes() {
        let remote = CoordinateFrame {
            origin_position: Vec3::new(1.0, 1.0, 1.0),
            ..CoordinateFrame::world_aligned()
        };
        // Local frame: origin at (5, 0, 0), axes rotated so x→y, y→-x.
        let local = CoordinateFrame {
            origin_position: Vec3::new(5.0, 0.0, 0.0),
            origin_rotation: Quaternion::identity(),
            x_axis: Vec3::unit_y(),
            y_axis: Vec3::unit_x().neg(),
            z_axis: Vec3::unit_z(),
        };
        let received = SyncedPose::at(Vec3::new(2.0, 3.0, 1.5));
        let out = PoseDecoder::new().decode(&received, &remote, &local);
        // delta (1, 2, 0.5) -> 1·(0,1,0) + 2·(-1,0,0) + 0.5·(0,0,1)
        assert!(out.position.approx_eq(Vec3::new(3.0, 1.0, 0.5), TOL), "got {}", out.position);
    }

    #[test]
    fn projected_round_trip_on_shared_frame() {
        let encoder = PoseEncoder::new(AxisConvention::Projected);
        let decoder = PoseDecoder::new();
        let frame = frame_in(&Transform3D::new(
            Vec3::new(-0.7, 0.1, 2.4),
            Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.3), 2.0),
        ));

        for pose in [
            sample_pose(),
            SyncedPose::at(Vec3::zero()),
            SyncedPose::new(
                Vec3::new(-4.0, 0.0, 9.5),
                Quaternion::from_axis_angle(Vec3::unit_x(), -2.5),
                Vec3::one(),
            ),
        ] {
            let out = decoder.decode(&encoder.encode(&pose, &frame), &frame, &frame);
            assert!(
                out.position.approx_eq(pose.position, TOL),
                "{} vs {}",
                out.position,
                pose.position
            );
            assert!(out.rotation.same_rotation(pose.rotation, 1e-5));
            assert_eq!(out.scale, pose.scale);
        }
    }

    #[test]
    fn projected_relay_reproduces_physical_pose_across_tracking_spaces() {
        // Two devices whose private tracking spaces are unrelated rigid
        // transforms of the room.
        let authority_space = Transform3D::new(
            Vec3::new(3.0, -0.2, 1.0),
            Quaternion::from_axis_angle(Vec3::unit_y(), 0.9),
        );
        let dependent_space = Transform3D::new(
            Vec3::new(-1.5, 0.4, 6.0),
            Quaternion::from_axis_angle(Vec3::new(0.2, 1.0, -0.1), -2.3),
        );
        let authority_frame = frame_in(&authority_space);
        let dependent_frame = frame_in(&dependent_space);

        let room_pose = sample_pose();
        let seen_by_authority = authority_space.apply_pose(&room_pose);
        let expected = dependent_space.apply_pose(&room_pose);

        let encoder = PoseEncoder::new(AxisConvention::Projected);
        let wire = encoder.encode(&seen_by_authority, &authority_frame);
        let out = PoseDecoder::new().decode(&wire, &authority_frame, &dependent_frame);

        assert!(
            out.position.approx_eq(expected.position, 1e-3),
            "{} vs {}",
            out.position,
            expected.position
        );
        assert!(out.rotation.same_rotation(expected.rotation, 1e-5));
    }

    #[test]
    fn pass_through_is_exact() {
        let pose = sample_pose();
        assert_eq!(PoseEncoder::default().pass_through(&pose), pose);
    }
}
