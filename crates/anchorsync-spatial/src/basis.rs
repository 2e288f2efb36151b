//! Basis resolution from three unordered anchors.
//!
//! The three anchors are expected to form a near-right triangle.  Roles are
//! assigned purely from pairwise distances, so every participant that sees
//! the same physical anchors picks the same roles no matter how its own
//! tracking space is placed:
//!
//! ```text
//!      B            A = apex (vertex opposite the hypotenuse) → origin
//!      | \          C = far end of the longer leg             → x axis
//!      A - C        B = far end of the shorter leg            → y axis
//! ```
//!
//! Edges whose lengths differ by no more than `tie_tolerance` count as
//! equal, and equal edges keep the order of the id-sorted anchors.  Anchor
//! ids are shared between participants, so the tie-break depends neither on
//! discovery order nor on each device's measurement noise.

use anchorsync_types::{AnchorPoint, CoordinateFrame, ResolverConfig, SyncError};
use tracing::{debug, warn};

use crate::anchor_set::MAX_ANCHORS;

/// The role each anchor plays in the triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleRoles<'a> {
    /// Right-angle vertex; becomes the frame origin.
    pub apex: &'a AnchorPoint,
    /// Far end of the longer leg.
    pub x_target: &'a AnchorPoint,
    /// Far end of the shorter leg.
    pub y_target: &'a AnchorPoint,
}

/// One side of the triangle, by index into the id-ordered anchors.
#[derive(Debug, Clone, Copy)]
struct Edge {
    a: usize,
    b: usize,
    opposite: usize,
    length: f32,
}

impl Edge {
    /// The endpoint that is not `vertex`.
    fn far_end(&self, vertex: usize) -> usize {
        if self.a == vertex { self.b } else { self.a }
    }
}

/// Builds a [`CoordinateFrame`] from exactly three anchors.
#[derive(Debug, Clone, Default)]
pub struct BasisResolver {
    config: ResolverConfig,
}

impl BasisResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Assign apex / x / y roles to `anchors`.
    ///
    /// # Errors
    ///
    /// * [`SyncError::InsufficientAnchors`] / [`SyncError::TooManyAnchors`]
    ///   unless exactly three anchors are given.
    /// * [`SyncError::DegenerateTriangle`] when two anchors (nearly) coincide.
    /// * [`SyncError::AmbiguousRoleAssignment`] on tied edge lengths when
    ///   `reject_ambiguous` is set.
    pub fn assign_roles<'a>(
        &self,
        anchors: &'a [AnchorPoint],
    ) -> Result<TriangleRoles<'a>, SyncError> {
        match anchors.len() {
            n if n < MAX_ANCHORS => return Err(SyncError::InsufficientAnchors { found: n }),
            MAX_ANCHORS => {}
            n => return Err(SyncError::TooManyAnchors { found: n }),
        }

        let mut order = [0usize, 1, 2];
        order.sort_by(|&i, &j| anchors[i].id.cmp(&anchors[j].id));
        let sorted: [&'a AnchorPoint; 3] = order.map(|i| &anchors[i]);

        let edges = [(0, 1, 2), (0, 2, 1), (1, 2, 0)].map(|(a, b, opposite)| Edge {
            a,
            b,
            opposite,
            length: sorted[a].position.distance(sorted[b].position),
        });

        if let Some(short) = edges
            .iter()
            .find(|e| !e.length.is_finite() || e.length < self.config.min_edge_length)
        {
            return Err(SyncError::DegenerateTriangle(format!(
                "anchors {} and {} are {:.4} m apart (minimum {:.4} m)",
                sorted[short.a].id,
                sorted[short.b].id,
                short.length,
                self.config.min_edge_length
            )));
        }

        // Edges are listed in id order; a later edge only takes precedence
        // when it is longer by more than the tie tolerance.
        let mut hyp = 0;
        for (i, edge) in edges.iter().enumerate().skip(1) {
            if self.outranks(edge, &edges[hyp]) {
                hyp = i;
            }
        }
        let [first, second] = match hyp {
            0 => [edges[1], edges[2]],
            1 => [edges[0], edges[2]],
            _ => [edges[0], edges[1]],
        };
        let (long_leg, short_leg) = if self.outranks(&second, &first) {
            (second, first)
        } else {
            (first, second)
        };
        let hypotenuse = edges[hyp];
        self.check_tie(&hypotenuse, &long_leg)?;
        self.check_tie(&long_leg, &short_leg)?;

        let apex = hypotenuse.opposite;
        Ok(TriangleRoles {
            apex: sorted[apex],
            x_target: sorted[long_leg.far_end(apex)],
            y_target: sorted[short_leg.far_end(apex)],
        })
    }

    /// Resolve the frame spanned by `anchors`.
    ///
    /// `x_axis` points from the apex to the long-leg end, `y_axis` to the
    /// short-leg end, and `z_axis = -(y_axis × x_axis)`.  The origin takes the
    /// apex anchor's position and orientation.
    ///
    /// # Errors
    ///
    /// Everything [`assign_roles`][Self::assign_roles] returns, plus
    /// [`SyncError::DegenerateTriangle`] when the legs are further from
    /// perpendicular than `orthogonality_tolerance` allows.
    pub fn resolve(&self, anchors: &[AnchorPoint]) -> Result<CoordinateFrame, SyncError> {
        let roles = self.assign_roles(anchors)?;
        let origin = roles.apex.position;

        let x_axis = roles
            .x_target
            .position
            .sub(origin)
            .try_normalize(self.config.min_edge_length)
            .ok_or_else(|| SyncError::DegenerateTriangle("x leg has zero length".to_string()))?;
        let y_axis = roles
            .y_target
            .position
            .sub(origin)
            .try_normalize(self.config.min_edge_length)
            .ok_or_else(|| SyncError::DegenerateTriangle("y leg has zero length".to_string()))?;

        let cos = x_axis.dot(y_axis);
        if cos.abs() > self.config.orthogonality_tolerance {
            return Err(SyncError::DegenerateTriangle(format!(
                "legs meet at {:.1}° (|cos| {:.3} exceeds {:.3})",
                cos.clamp(-1.0, 1.0).acos().to_degrees(),
                cos.abs(),
                self.config.orthogonality_tolerance
            )));
        }

        let z_axis = y_axis.cross(x_axis).neg();

        debug!(
            apex = %roles.apex.id,
            x_target = %roles.x_target.id,
            y_target = %roles.y_target.id,
            x_axis = %x_axis,
            y_axis = %y_axis,
            z_axis = %z_axis,
            "resolved anchor-triangle basis"
        );

        Ok(CoordinateFrame {
            origin_position: origin,
            origin_rotation: roles.apex.orientation,
            x_axis,
            y_axis,
            z_axis,
        })
    }

    /// `l` is longer than `r` by more than the tie tolerance.
    fn outranks(&self, l: &Edge, r: &Edge) -> bool {
        l.length - r.length > self.config.tie_tolerance
    }

    fn check_tie(&self, longer: &Edge, shorter: &Edge) -> Result<(), SyncError> {
        if (longer.length - shorter.length).abs() > self.config.tie_tolerance {
            return Ok(());
        }
        if self.config.reject_ambiguous {
            return Err(SyncError::AmbiguousRoleAssignment {
                longest: longer.length,
                runner_up: shorter.length,
            });
        }
        warn!(
            longer = longer.length,
            shorter = shorter.length,
            "tied anchor distances; roles assigned by anchor id order"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Transform3D;
    use anchorsync_types::{Quaternion, Vec3};

    const TOL: f32 = 1e-4;

    fn anchor(id: &str, x: f32, y: f32, z: f32) -> AnchorPoint {
        AnchorPoint::new(id, Vec3::new(x, y, z), Quaternion::identity())
    }

    /// Apex at the origin, 0.4 m x leg, 0.3 m y leg.
    fn right_triangle() -> Vec<AnchorPoint> {
        vec![
            anchor("apex", 0.0, 0.0, 0.0),
            anchor("long", 0.4, 0.0, 0.0),
            anchor("short", 0.0, 0.3, 0.0),
        ]
    }

    fn permutations(v: &[AnchorPoint]) -> Vec<Vec<AnchorPoint>> {
        let idx = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        idx.iter()
            .map(|p| p.iter().map(|&i| v[i].clone()).collect())
            .collect()
    }

    #[test]
    fn three_four_five_triangle_resolves_to_world_axes() {
        let frame = BasisResolver::default().resolve(&right_triangle()).unwrap();
        assert!(frame.origin_position.approx_eq(Vec3::zero(), TOL));
        assert!(frame.x_axis.approx_eq(Vec3::unit_x(), TOL));
        assert!(frame.y_axis.approx_eq(Vec3::unit_y(), TOL));
        // -(y × x) = x × y
        assert!(frame.z_axis.approx_eq(Vec3::unit_z(), TOL), "z = {}", frame.z_axis);
    }

    #[test]
    fn roles_are_independent_of_input_order() {
        let resolver = BasisResolver::default();
        for perm in permutations(&right_triangle()) {
            let roles = resolver.assign_roles(&perm).unwrap();
            assert_eq!(roles.apex.id, "apex");
            assert_eq!(roles.x_target.id, "long");
            assert_eq!(roles.y_target.id, "short");
        }
    }

    #[test]
    fn origin_takes_apex_orientation() {
        let q = Quaternion::from_axis_angle(Vec3::unit_y(), 0.8);
        let mut anchors = right_triangle();
        anchors[0].orientation = q;
        let frame = BasisResolver::default().resolve(&anchors).unwrap();
        assert_eq!(frame.origin_rotation, q);
    }

    #[test]
    fn axes_are_unit_length_for_rigidly_moved_triangle() {
        let t = Transform3D::new(
            Vec3::new(3.0, -1.0, 7.5),
            Quaternion::from_axis_angle(Vec3::new(0.3, 1.0, -0.4), 2.1),
        );
        let moved: Vec<_> = right_triangle().iter().map(|a| t.apply_anchor(a)).collect();
        let frame = BasisResolver::default().resolve(&moved).unwrap();
        for axis in [frame.x_axis, frame.y_axis, frame.z_axis] {
            assert!((axis.length() - 1.0).abs() < TOL);
        }
        assert!(frame.origin_position.approx_eq(t.translation, TOL));
        assert!(frame.x_axis.approx_eq(t.rotation.rotate(Vec3::unit_x()), TOL));
        assert!(frame.y_axis.approx_eq(t.rotation.rotate(Vec3::unit_y()), TOL));
        assert!(frame.z_axis.approx_eq(t.rotation.rotate(Vec3::unit_z()), TOL));
    }

    #[test]
    fn fewer_than_three_anchors_is_insufficient() {
        let resolver = BasisResolver::default();
        let anchors = right_triangle();
        for n in 0..3 {
            assert_eq!(
                resolver.resolve(&anchors[..n]),
                Err(SyncError::InsufficientAnchors { found: n })
            );
        }
    }

    #[test]
    fn four_anchors_are_rejected() {
        let mut anchors = right_triangle();
        anchors.push(anchor("extra", 1.0, 1.0, 1.0));
        assert_eq!(
            BasisResolver::default().resolve(&anchors),
            Err(SyncError::TooManyAnchors { found: 4 })
        );
    }

    #[test]
    fn coincident_anchors_are_degenerate() {
        let anchors = vec![
            anchor("a", 0.0, 0.0, 0.0),
            anchor("b", 0.0, 0.0, 0.001),
            anchor("c", 0.4, 0.0, 0.0),
        ];
        let err = BasisResolver::default().resolve(&anchors).unwrap_err();
        assert!(matches!(err, SyncError::DegenerateTriangle(_)), "got {err:?}");
    }

    #[test]
    fn collinear_anchors_are_degenerate() {
        let anchors = vec![
            anchor("a", 0.0, 0.0, 0.0),
            anchor("b", 1.0, 0.0, 0.0),
            anchor("c", 2.0, 0.02, 0.0),
        ];
        let err = BasisResolver::default().resolve(&anchors).unwrap_err();
        assert!(matches!(err, SyncError::DegenerateTriangle(_)), "got {err:?}");
    }

    #[test]
    fn obtuse_triangle_is_degenerate() {
        // Legs meet at 120°.
        let anchors = vec![
            anchor("a", 0.0, 0.0, 0.0),
            anchor("b", 0.4, 0.0, 0.0),
            anchor("c", -0.15, 0.26, 0.0),
        ];
        let err = BasisResolver::default().resolve(&anchors).unwrap_err();
        assert!(matches!(err, SyncError::DegenerateTriangle(_)), "got {err:?}");
    }

    #[test]
    fn tied_legs_break_by_anchor_id() {
        // Isosceles right triangle: both legs 1 m.  Ordered by id, edge
        // (p1, p2) precedes (p1, p3), so p2 becomes the x target.
        let anchors = vec![
            anchor("p3", 1.0, 0.0, 0.0),
            anchor("p1", 0.0, 0.0, 0.0),
            anchor("p2", 0.0, 1.0, 0.0),
        ];
        let resolver = BasisResolver::default();
        for perm in permutations(&anchors) {
            let roles = resolver.assign_roles(&perm).unwrap();
            assert_eq!(roles.apex.id, "p1");
            assert_eq!(roles.x_target.id, "p2");
            assert_eq!(roles.y_target.id, "p3");
        }
        let frame = resolver.resolve(&anchors).unwrap();
        assert!(frame.x_axis.approx_eq(Vec3::unit_y(), TOL));
        assert!(frame.y_axis.approx_eq(Vec3::unit_x(), TOL));
    }

    #[test]
    fn near_tied_legs_keep_id_order_in_both_directions() {
        // p1-p3 is 50 µm longer in one layout and 50 µm shorter in the other.
        let resolver = BasisResolver::default();
        for dz in [0.00005, -0.00005] {
            let anchors = vec![
                anchor("p1", 0.0, 0.0, 0.0),
                anchor("p2", 0.5, 0.0, 0.0),
                anchor("p3", 0.0, 0.0, 0.5 + dz),
            ];
            let roles = resolver.assign_roles(&anchors).unwrap();
            assert_eq!(roles.apex.id, "p1");
            assert_eq!(roles.x_target.id, "p2", "dz = {dz}");
            assert_eq!(roles.y_target.id, "p3", "dz = {dz}");
        }
    }

    #[test]
    fn isosceles_roles_agree_across_device_spaces() {
        // 0.5 m legs, neither aligned with a room axis.
        let room = vec![
            anchor("p1", 1.3, 1.6, 2.1),
            anchor("p2", 1.6, 2.0, 2.1),
            anchor("p3", 1.3, 1.6, 2.6),
        ];
        let resolver = BasisResolver::default();
        for i in 0..200 {
            let k = i as f32;
            let space = Transform3D::new(
                Vec3::new(0.05 * k - 5.0, 0.3 * (i % 7) as f32, 4.0 - 0.03 * k),
                Quaternion::from_axis_angle(
                    Vec3::new((0.37 * k).sin(), 1.0, (0.91 * k).cos()),
                    0.173 * k,
                ),
            );
            let seen: Vec<_> = room.iter().map(|a| space.apply_anchor(a)).collect();
            let roles = resolver.assign_roles(&seen).unwrap();
            assert_eq!(roles.apex.id, "p1", "device space {i}");
            assert_eq!(roles.x_target.id, "p2", "device space {i}");
            assert_eq!(roles.y_target.id, "p3", "device space {i}");
        }
    }

    #[test]
    fn tied_legs_can_be_rejected() {
        let anchors = vec![
            anchor("p1", 0.0, 0.0, 0.0),
            anchor("p2", 0.0, 1.0, 0.0),
            anchor("p3", 1.0, 0.0, 0.0),
        ];
        let resolver = BasisResolver::new(ResolverConfig {
            reject_ambiguous: true,
            ..ResolverConfig::default()
        });
        let err = resolver.resolve(&anchors).unwrap_err();
        assert!(matches!(err, SyncError::AmbiguousRoleAssignment { .. }), "got {err:?}");
    }
}
