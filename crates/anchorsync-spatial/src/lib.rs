//! `anchorsync-spatial` – anchor-triangle geometry.
//!
//! Turns three shared physical anchors into a coordinate frame that every
//! participant can compute independently, and relays object poses between
//! participants through that frame.
//!
//! # Modules
//!
//! - [`anchor_set`] – [`AnchorSet`][anchor_set::AnchorSet]: immutable snapshot
//!   of the (at most three) anchors a participant has resolved.
//! - [`basis`] – [`BasisResolver`][basis::BasisResolver]: assigns apex / x /
//!   y roles to three unordered anchors and builds a
//!   [`CoordinateFrame`][anchorsync_types::CoordinateFrame].
//! - [`relay`] – [`PoseEncoder`][relay::PoseEncoder] and
//!   [`PoseDecoder`][relay::PoseDecoder]: frame-relative pose encoding on the
//!   authority and reconstruction on every other participant.
//! - [`transform`] – [`Transform3D`][transform::Transform3D]: rigid transform
//!   used to describe how a device's private tracking space sits in the room.

pub mod anchor_set;
pub mod basis;
pub mod relay;
pub mod transform;

pub use anchor_set::{AnchorChange, AnchorSet, MAX_ANCHORS};
pub use basis::{BasisResolver, TriangleRoles};
pub use relay::{PoseDecoder, PoseEncoder};
pub use transform::Transform3D;
