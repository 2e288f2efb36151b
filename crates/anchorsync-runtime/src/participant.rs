//! [`Participant`] – tick driver wiring a [`SyncSession`] to the bus.
//!
//! Each tick:
//!
//! 1. **Ingest** – drain control, anchor and frame events that arrived since
//!    the previous tick and feed them to the session.
//! 2. **Announce** – the authority publishes its frame when a new one was
//!    resolved.
//! 3. **Relay** – the authority encodes and publishes every tracked object's
//!    pose; a dependent decodes every pose update it received.  Placements
//!    are last-write-wins per object.
//!
//! Nothing here blocks: the bus is drained with non-blocking reads.

use std::collections::HashMap;

use anchorsync_middleware::{EventBus, Topic, TopicReceiver};
use anchorsync_types::{Event, EventPayload, SyncError, SyncedPose};
use tracing::{debug, info};

use crate::session::{SessionMode, SyncSession};

/// What happened during one [`Participant::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub mode: SessionMode,
    /// Pose updates published (authority).
    pub published: usize,
    /// Pose updates applied (dependent).
    pub applied: usize,
}

/// One device taking part in a synchronised session.
pub struct Participant {
    name: String,
    session: SyncSession,
    bus: EventBus,
    control_rx: TopicReceiver,
    anchors_rx: TopicReceiver,
    frames_rx: TopicReceiver,
    poses_rx: TopicReceiver,
    tick: u64,
    placements: HashMap<String, SyncedPose>,
}

impl Participant {
    /// Subscribe `session` to every topic on `bus`.
    pub fn new(name: impl Into<String>, session: SyncSession, bus: EventBus) -> Self {
        Self {
            name: name.into(),
            control_rx: bus.subscribe_to(Topic::Control),
            anchors_rx: bus.subscribe_to(Topic::Anchors),
            frames_rx: bus.subscribe_to(Topic::Frames),
            poses_rx: bus.subscribe_to(Topic::Poses),
            session,
            bus,
            tick: 0,
            placements: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `source` tag this participant's anchor tracker must use.
    pub fn tracker_source(&self) -> String {
        format!("{}/tracker", self.name)
    }

    fn session_source(&self) -> String {
        format!("{}/session", self.name)
    }

    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SyncSession {
        &mut self.session
    }

    /// Latest placement of `object_id` in this participant's tracking space.
    pub fn placement(&self, object_id: &str) -> Option<&SyncedPose> {
        self.placements.get(object_id)
    }

    pub fn placements(&self) -> &HashMap<String, SyncedPose> {
        &self.placements
    }

    /// Ask every participant (this one included) to drop anchors and frames.
    pub fn request_reset(&self) -> Result<usize, SyncError> {
        info!(participant = %self.name, "requesting session reset");
        self.bus.publish_to(
            Topic::Control,
            Event::new(self.session_source(), EventPayload::SessionReset),
        )
    }

    /// Advance one tick.
    ///
    /// `objects` are the live poses of the tracked objects in this
    /// participant's tracking space; only the authority uses them.
    pub fn tick(&mut self, objects: &[(&str, SyncedPose)]) -> Result<TickReport, SyncError> {
        let tick = self.tick;
        self.tick += 1;

        self.ingest();

        let mut published = 0;
        let mut applied = 0;

        if self.session.is_authority() {
            if let Some(frame) = self.session.take_frame_announcement() {
                info!(
                    participant = %self.name,
                    origin = %frame.origin_position,
                    "announcing frame"
                );
                self.bus.publish_to(
                    Topic::Frames,
                    Event::new(self.session_source(), EventPayload::FrameAnnouncement(frame)),
                )?;
            }
            for (object_id, pose) in objects {
                let update = self.session.encode(object_id, tick, pose);
                self.bus.publish_to(
                    Topic::Poses,
                    Event::new(self.session_source(), EventPayload::Pose(update)),
                )?;
                self.placements.insert((*object_id).to_string(), *pose);
                published += 1;
            }
            // Own pose stream; nothing to apply.
            self.poses_rx.drain();
        } else {
            for event in self.poses_rx.drain() {
                if let EventPayload::Pose(update) = event.payload {
                    let pose = self.session.decode(&update);
                    self.placements.insert(update.object_id, pose);
                    applied += 1;
                }
            }
        }

        let report = TickReport {
            tick,
            mode: self.session.mode(),
            published,
            applied,
        };
        debug!(participant = %self.name, ?report, "tick complete");
        Ok(report)
    }

    fn ingest(&mut self) {
        for event in self.control_rx.drain() {
            if let EventPayload::SessionReset = event.payload {
                info!(participant = %self.name, from = %event.source, "session reset received");
                self.session.reset();
                self.placements.clear();
            }
        }

        let tracker_source = self.tracker_source();
        for event in self.anchors_rx.drain() {
            if event.source != tracker_source {
                continue;
            }
            match event.payload {
                EventPayload::AnchorObserved(observation) => {
                    self.session.observe_anchor(&observation);
                }
                EventPayload::AnchorDeleted { id } => {
                    self.session.remove_anchor(&id);
                }
                _ => {}
            }
        }

        let own_source = self.session_source();
        for event in self.frames_rx.drain() {
            if event.source == own_source {
                continue;
            }
            if let EventPayload::FrameAnnouncement(frame) = event.payload {
                self.session.receive_frame(frame);
            }
        }
    }
}
