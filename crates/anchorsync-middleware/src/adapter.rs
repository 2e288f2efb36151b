//! The anchor-tracking adapter seam.
//!
//! Acquisition, cloud persistence and rediscovery of anchors belong to an
//! external service.  The core only sees that service through
//! [`AnchorTracker`]; [`forward_observations`] turns whatever the tracker
//! reports into [`EventPayload::AnchorObserved`] events on the bus, where the
//! owning participant picks them up at the start of its next tick.

use anchorsync_types::{AnchorObservation, Event, EventPayload, SyncError};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tracing::debug;

use crate::bus::{EventBus, Topic};

/// Every anchor-tracking service must implement this trait.
///
/// # Contract
///
/// * `locate` – asks the service to start looking for previously persisted
///   anchors.  Results arrive later through `observations`.
///
/// * `observations` – returns a stream of located / rediscovered / failed
///   anchors, each already expressed in this device's tracking space.
#[async_trait]
pub trait AnchorTracker: Send + Sync {
    /// Start locating the anchors with the given ids.
    async fn locate(&self, ids: &[String]) -> Result<(), SyncError>;

    /// Stream of tracking results.
    async fn observations(&self) -> BoxStream<'static, AnchorObservation>;
}

/// Pump every observation from `tracker` onto [`Topic::Anchors`], tagged with
/// `source`.  Returns the number of observations forwarded once the tracker's
/// stream ends.
pub async fn forward_observations(
    tracker: &dyn AnchorTracker,
    bus: &EventBus,
    source: &str,
) -> Result<usize, SyncError> {
    let mut stream = tracker.observations().await;
    let mut forwarded = 0;
    while let Some(observation) = stream.next().await {
        debug!(
            source,
            anchor = %observation.anchor.id,
            status = ?observation.status,
            "forwarding anchor observation"
        );
        bus.publish_to(
            Topic::Anchors,
            Event::new(source, EventPayload::AnchorObserved(observation)),
        )?;
        forwarded += 1;
    }
    Ok(forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorsync_types::{AnchorPoint, AnchorStatus, Quaternion, Vec3};
    use std::sync::Mutex;

    struct FixedTracker {
        requested: Mutex<Vec<String>>,
        results: Vec<AnchorObservation>,
    }

    #[async_trait]
    impl AnchorTracker for FixedTracker {
        async fn locate(&self, ids: &[String]) -> Result<(), SyncError> {
            self.requested
                .lock()
                .map_err(|e| SyncError::Channel(e.to_string()))?
                .extend_from_slice(ids);
            Ok(())
        }

        async fn observations(&self) -> BoxStream<'static, AnchorObservation> {
            futures_util::stream::iter(self.results.clone()).boxed()
        }
    }

    fn observation(id: &str, status: AnchorStatus) -> AnchorObservation {
        AnchorObservation {
            anchor: AnchorPoint::new(id, Vec3::zero(), Quaternion::identity()),
            status,
        }
    }

    #[tokio::test]
    async fn forwards_every_observation_with_source() -> Result<(), Box<dyn std::error::Error>> {
        let tracker = FixedTracker {
            requested: Mutex::new(Vec::new()),
            results: vec![
                observation("a", AnchorStatus::Located),
                observation("b", AnchorStatus::NotLocated),
            ],
        };
        tracker.locate(&["a".to_string(), "b".to_string()]).await?;
        assert_eq!(tracker.requested.lock().unwrap().len(), 2);

        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Anchors);
        let n = forward_observations(&tracker, &bus, "device-1/tracker").await?;
        assert_eq!(n, 2);

        let events = rx.drain();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.source == "device-1/tracker"));
        match &events[1].payload {
            EventPayload::AnchorObserved(o) => assert_eq!(o.status, AnchorStatus::NotLocated),
            other => panic!("unexpected payload {other:?}"),
        }
        Ok(())
    }
}
