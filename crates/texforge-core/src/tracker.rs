//! Core-side bookkeeping for asynchronous upscale requests.
//!
//! The backend owns request execution and assigns ids; the tracker records
//! which fingerprint each id belongs to so that
//!
//! - a second submit of content that is already in flight reuses the
//!   existing request instead of loading the backend twice, and
//! - a request leaves the books exactly once, when its result is collected
//!   (or its failure observed).  Any later lookup is "not found", whatever
//!   the backend itself might answer.
//!
//! There is no fallback path that fakes asynchrony over a synchronous
//! backend: if the backend cannot submit, nothing is tracked.

use std::collections::HashMap;

use crate::backend::{RequestId, RequestState};
use crate::error::{Result, UpscaleError};
use crate::fingerprint::Fingerprint;

/// One request as seen by the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackedRequest {
    pub fingerprint: Fingerprint,
    pub state: RequestState,
    /// Input dimensions, kept for diagnostics.
    pub input_dims: (u32, u32),
}

#[derive(Debug, Default)]
pub struct RequestTracker {
    by_id: HashMap<RequestId, TrackedRequest>,
    by_fingerprint: HashMap<Fingerprint, RequestId>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a freshly submitted request in the `Pending` state.
    ///
    /// # Errors
    ///
    /// [`UpscaleError::InvariantViolation`] if the backend handed out an id
    /// that is still live.  Nothing is modified in that case.
    pub fn track(&mut self, id: RequestId, fingerprint: Fingerprint, input_dims: (u32, u32)) -> Result<()> {
        if self.by_id.contains_key(&id) {
            return Err(UpscaleError::InvariantViolation(format!(
                "backend reissued live request id {id}"
            )));
        }
        self.by_id.insert(
            id,
            TrackedRequest {
                fingerprint,
                state: RequestState::Pending,
                input_dims,
            },
        );
        self.by_fingerprint.insert(fingerprint, id);
        Ok(())
    }

    /// The live request already working on `fingerprint`, if any.
    pub fn in_flight(&self, fingerprint: Fingerprint) -> Option<RequestId> {
        self.by_fingerprint.get(&fingerprint).copied()
    }

    pub fn get(&self, id: RequestId) -> Option<&TrackedRequest> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Record a state observed from the backend.
    ///
    /// A request leaves `Pending` once; a later poll reporting a different
    /// terminal state is an invariant violation and is not applied.
    pub fn update(&mut self, id: RequestId, state: RequestState) -> Result<()> {
        let entry = self
            .by_id
            .get_mut(&id)
            .ok_or(UpscaleError::RequestNotFound(id))?;
        match (entry.state, state) {
            (RequestState::Pending, _) => {
                entry.state = state;
                Ok(())
            }
            (current, next) if current == next => Ok(()),
            (current, next) => Err(UpscaleError::InvariantViolation(format!(
                "request {id} moved from {current:?} to {next:?}"
            ))),
        }
    }

    /// Remove a request from the books.  Succeeds at most once per id.
    pub fn finish(&mut self, id: RequestId) -> Result<TrackedRequest> {
        let entry = self
            .by_id
            .remove(&id)
            .ok_or(UpscaleError::RequestNotFound(id))?;
        if self.by_fingerprint.get(&entry.fingerprint) == Some(&id) {
            self.by_fingerprint.remove(&entry.fingerprint);
        }
        Ok(entry)
    }

    /// Forget every request, returning what was outstanding.
    pub fn drain(&mut self) -> Vec<(RequestId, TrackedRequest)> {
        self.by_fingerprint.clear();
        self.by_id.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: i32) -> RequestId {
        RequestId::from_raw(n).expect("non-zero id")
    }

    #[test]
    fn in_flight_lookup_finds_pending_request() {
        let mut tracker = RequestTracker::new();
        let fp = Fingerprint::from_raw(11);
        tracker.track(id(1), fp, (8, 8)).expect("track");
        assert_eq!(tracker.in_flight(fp), Some(id(1)));
        assert_eq!(tracker.get(id(1)).map(|r| r.state), Some(RequestState::Pending));
    }

    #[test]
    fn finish_succeeds_once() {
        let mut tracker = RequestTracker::new();
        let fp = Fingerprint::from_raw(12);
        tracker.track(id(2), fp, (1, 1)).expect("track");
        tracker.update(id(2), RequestState::Ready).expect("ready");

        let done = tracker.finish(id(2)).expect("first finish");
        assert_eq!(done.state, RequestState::Ready);
        assert!(tracker.in_flight(fp).is_none());
        assert!(matches!(
            tracker.finish(id(2)),
            Err(UpscaleError::RequestNotFound(_))
        ));
    }

    #[test]
    fn reissued_live_id_is_rejected() {
        let mut tracker = RequestTracker::new();
        tracker
            .track(id(3), Fingerprint::from_raw(1), (1, 1))
            .expect("track");
        let err = tracker
            .track(id(3), Fingerprint::from_raw(2), (1, 1))
            .expect_err("duplicate id");
        assert!(matches!(err, UpscaleError::InvariantViolation(_)));
        assert_eq!(tracker.in_flight(Fingerprint::from_raw(1)), Some(id(3)));
        assert!(tracker.in_flight(Fingerprint::from_raw(2)).is_none());
    }

    #[test]
    fn terminal_state_does_not_flip() {
        let mut tracker = RequestTracker::new();
        tracker
            .track(id(4), Fingerprint::from_raw(4), (1, 1))
            .expect("track");
        tracker.update(id(4), RequestState::Failed).expect("failed");
        tracker
            .update(id(4), RequestState::Failed)
            .expect("same state again is fine");
        assert!(tracker.update(id(4), RequestState::Ready).is_err());
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let mut tracker = RequestTracker::new();
        assert!(matches!(
            tracker.update(id(5), RequestState::Ready),
            Err(UpscaleError::RequestNotFound(_))
        ));
    }

    #[test]
    fn drain_empties_both_indexes() {
        let mut tracker = RequestTracker::new();
        tracker
            .track(id(6), Fingerprint::from_raw(6), (1, 1))
            .expect("track");
        tracker
            .track(id(7), Fingerprint::from_raw(7), (1, 1))
            .expect("track");
        assert_eq!(tracker.drain().len(), 2);
        assert!(tracker.is_empty());
        assert!(tracker.in_flight(Fingerprint::from_raw(6)).is_none());
    }
}
