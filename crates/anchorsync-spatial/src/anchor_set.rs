//! [`AnchorSet`] – the anchors one participant has resolved so far.
//!
//! A set is an immutable snapshot.  Feeding it an observation or a deletion
//! returns a *new* set when something changed and `None` otherwise, so the
//! owner can swap the snapshot in one assignment and rebuild its frame.

use anchorsync_types::{AnchorObservation, AnchorPoint};
use tracing::{debug, warn};

/// A frame needs exactly this many anchors.
pub const MAX_ANCHORS: usize = 3;

/// How a new snapshot differs from the one it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorChange {
    Added,
    Updated,
    Removed,
}

/// Up to [`MAX_ANCHORS`] anchors in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorSet {
    anchors: Vec<AnchorPoint>,
}

impl AnchorSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// `true` once the set holds enough anchors to resolve a frame.
    pub fn is_complete(&self) -> bool {
        self.anchors.len() == MAX_ANCHORS
    }

    /// Anchors in discovery order.
    pub fn anchors(&self) -> &[AnchorPoint] {
        &self.anchors
    }

    pub fn get(&self, id: &str) -> Option<&AnchorPoint> {
        self.anchors.iter().find(|a| a.id == id)
    }

    /// Apply one tracker observation.
    ///
    /// * `NotLocated` is ignored.
    /// * A known id replaces that anchor's pose (no change if identical).
    /// * A new id is appended while there is room, ignored once full.
    pub fn with_observation(&self, obs: &AnchorObservation) -> Option<(AnchorSet, AnchorChange)> {
        if !obs.status.is_tracked() {
            debug!(anchor = %obs.anchor.id, status = ?obs.status, "ignoring untracked anchor");
            return None;
        }

        if let Some(idx) = self.anchors.iter().position(|a| a.id == obs.anchor.id) {
            if self.anchors[idx] == obs.anchor {
                return None;
            }
            let mut anchors = self.anchors.clone();
            anchors[idx] = obs.anchor.clone();
            return Some((Self { anchors }, AnchorChange::Updated));
        }

        if self.is_complete() {
            warn!(
                anchor = %obs.anchor.id,
                "anchor set already holds {MAX_ANCHORS} anchors; ignoring"
            );
            return None;
        }

        let mut anchors = self.anchors.clone();
        anchors.push(obs.anchor.clone());
        Some((Self { anchors }, AnchorChange::Added))
    }

    /// Drop the anchor with `id`.  `None` when it is not in the set.
    pub fn without(&self, id: &str) -> Option<(AnchorSet, AnchorChange)> {
        self.get(id)?;
        let anchors = self.anchors.iter().filter(|a| a.id != id).cloned().collect();
        Some((Self { anchors }, AnchorChange::Removed))
    }
}
