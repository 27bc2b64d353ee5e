use std::collections::VecDeque;
use std::fmt;

use ragchat_logging::chat_debug;

/// Number of resolved request ids remembered for duplicate detection.
const RESOLVED_MEMORY: usize = 32;

/// Client-issued identifier binding a query to its responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub kind: RequestKind,
}

/// Why an incoming event was not attributed to the pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A newer request replaced this one before it resolved.
    Superseded,
    /// The request already received its response (or timed out).
    Resolved,
    /// The id was never issued by this client.
    Unknown,
    /// The event carried no id and nothing is pending.
    NonePending,
}

/// Tracks the single current query and classifies incoming ids against it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestCorrelator {
    last_issued: u64,
    current: Option<PendingRequest>,
    resolved: VecDeque<RequestId>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<RequestId> {
        self.current.as_ref().map(|pending| pending.request_id)
    }

    pub fn pending(&self) -> Option<&PendingRequest> {
        self.current.as_ref()
    }

    /// Issues a fresh id for a query, superseding any pending one.
    ///
    /// Returns the new id and the superseded id, if there was one. The
    /// superseded request is not cancelled on the wire; its responses are
    /// simply no longer attributed.
    pub fn submit(&mut self) -> (RequestId, Option<RequestId>) {
        self.last_issued += 1;
        let request_id = RequestId(self.last_issued);
        let superseded = self.current.replace(PendingRequest {
            request_id,
            kind: RequestKind::Query,
        });
        let superseded = superseded.map(|pending| pending.request_id);
        if let Some(old) = superseded {
            chat_debug!("request {} superseded by {}", old, request_id);
        }
        (request_id, superseded)
    }

    /// Attributes an incoming event to the current request.
    ///
    /// Untagged events are attributed to the current request when one is
    /// pending. Performs no mutation.
    pub fn attribute(&self, tagged: Option<RequestId>) -> Result<RequestId, Disposition> {
        let current = self.current();
        match (tagged, current) {
            (None, Some(current)) => Ok(current),
            (None, None) => Err(Disposition::NonePending),
            (Some(id), Some(current)) if id == current => Ok(id),
            (Some(id), _) => Err(self.classify_other(id)),
        }
    }

    /// Marks the current request as answered. Later events for it are
    /// classified as [`Disposition::Resolved`].
    pub fn resolve(&mut self, request_id: RequestId) -> bool {
        if self.current() != Some(request_id) {
            return false;
        }
        self.current = None;
        self.remember_resolved(request_id);
        true
    }

    /// Drops the pending request without issuing a new one (chat cleared).
    pub fn abandon(&mut self) -> Option<RequestId> {
        let abandoned = self.current.take().map(|pending| pending.request_id);
        if let Some(id) = abandoned {
            chat_debug!("request {} abandoned", id);
        }
        abandoned
    }

    fn classify_other(&self, id: RequestId) -> Disposition {
        if id.0 == 0 || id.0 > self.last_issued {
            Disposition::Unknown
        } else if self.resolved.contains(&id) {
            Disposition::Resolved
        } else {
            Disposition::Superseded
        }
    }

    fn remember_resolved(&mut self, request_id: RequestId) {
        if self.resolved.len() == RESOLVED_MEMORY {
            self.resolved.pop_front();
        }
        self.resolved.push_back(request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_submit_supersedes_first() {
        let mut correlator = RequestCorrelator::new();
        let (first, none) = correlator.submit();
        let (second, superseded) = correlator.submit();

        assert_eq!(none, None);
        assert_eq!(superseded, Some(first));
        assert_eq!(correlator.attribute(Some(first)), Err(Disposition::Superseded));
        assert_eq!(correlator.attribute(Some(second)), Ok(second));
    }

    #[test]
    fn resolved_request_rejects_duplicates() {
        let mut correlator = RequestCorrelator::new();
        let (id, _) = correlator.submit();
        assert!(correlator.resolve(id));

        assert_eq!(correlator.attribute(Some(id)), Err(Disposition::Resolved));
        assert_eq!(correlator.attribute(None), Err(Disposition::NonePending));
        assert!(!correlator.resolve(id));
    }

    #[test]
    fn never_issued_ids_are_unknown() {
        let mut correlator = RequestCorrelator::new();
        correlator.submit();
        assert_eq!(
            correlator.attribute(Some(RequestId::new(99))),
            Err(Disposition::Unknown)
        );
        assert_eq!(
            correlator.attribute(Some(RequestId::new(0))),
            Err(Disposition::Unknown)
        );
    }

    #[test]
    fn untagged_events_follow_the_current_request() {
        let mut correlator = RequestCorrelator::new();
        let (id, _) = correlator.submit();
        assert_eq!(correlator.attribute(None), Ok(id));

        correlator.abandon();
        assert_eq!(correlator.attribute(None), Err(Disposition::NonePending));
        assert_eq!(correlator.attribute(Some(id)), Err(Disposition::Superseded));
    }

    #[test]
    fn resolved_memory_is_bounded() {
        let mut correlator = RequestCorrelator::new();
        for _ in 0..(RESOLVED_MEMORY + 5) {
            let (id, _) = correlator.submit();
            correlator.resolve(id);
        }
        assert_eq!(correlator.resolved.len(), RESOLVED_MEMORY);
        // Forgotten resolutions still never apply.
        assert!(correlator.attribute(Some(RequestId::new(1))).is_err());
    }
}
