//! Request/response correlation: a fixed pool of pending requests, each keyed
//! by `(message id, correlation key)` with an individual deadline.
//!
//! The tracker is a plain synchronous structure. All mutation happens on the
//! session's single logical thread of control (the pump loop), which calls
//! [`RequestTracker::expire`] with the current time instead of arming
//! independent OS timers; no internal locking is needed under that model.
use crate::error::ResponseError;

/// Maximum number of simultaneously pending requests.
pub const MAX_PENDING_REQUESTS: usize = 16;

/// Correlation key used by status, version, and other key-less waits.
pub const KEY_NONE: u8 = 0;

/// Correlation key of acknowledgement waits. Keeps an ack wait for a command
/// distinct from a report wait on the same identifier, and timeouts name the
/// command rather than the acknowledgement.
pub const KEY_ACK: u8 = 1;

/// Completion value of a pending request.
pub type Completion = Result<(), ResponseError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Opaque handle to a registered request.
///
/// Carries the slot's sequence stamp so a stale handle can never observe a
/// recycled slot.
pub struct SlotId {
    index: usize,
    seq: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingState {
    Waiting,
    Done(Completion),
}

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    msg_id: u8,
    key: u8,
    seq: u32,
    deadline_ms: u64,
    state: PendingState,
}

/// Pool of outstanding request correlations.
#[derive(Debug)]
pub struct RequestTracker {
    slots: [Option<PendingRequest>; MAX_PENDING_REQUESTS],
    next_seq: u32,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTracker {
    /// Instantiate an empty tracker.
    pub const fn new() -> Self {
        Self {
            slots: [None; MAX_PENDING_REQUESTS],
            next_seq: 0,
        }
    }

    /// Register a pending request and return its handle.
    ///
    /// A second registration for an already-pending `(msg_id, key)` pair
    /// queues behind the first: resolution always picks the oldest match.
    pub fn register(&mut self, msg_id: u8, key: u8, deadline_ms: u64) -> Option<SlotId> {
        let index = self.slots.iter().position(Option::is_none)?;
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        self.slots[index] = Some(PendingRequest {
            msg_id,
            key,
            seq,
            deadline_ms,
            state: PendingState::Waiting,
        });
        Some(SlotId { index, seq })
    }

    /// Settle the oldest waiting request matching `(msg_id, key)`.
    ///
    /// Resolving a pair that was never registered (late or duplicate
    /// response) is a silent no-op. A settled entry is never resolved twice.
    pub fn resolve(&mut self, msg_id: u8, key: u8, result: Completion) -> bool {
        let oldest = self
            .slots
            .iter_mut()
            .flatten()
            .filter(|r| {
                r.msg_id == msg_id && r.key == key && r.state == PendingState::Waiting
            })
            .min_by_key(|r| r.seq);

        match oldest {
            Some(request) => {
                request.state = PendingState::Done(result);
                true
            }
            None => false,
        }
    }

    /// Settle every waiting request whose deadline has passed with a timeout
    /// naming its message id.
    pub fn expire(&mut self, now_ms: u64) {
        for request in self.slots.iter_mut().flatten() {
            if request.state == PendingState::Waiting && request.deadline_ms <= now_ms {
                request.state =
                    PendingState::Done(Err(ResponseError::Timeout { msg_id: request.msg_id }));
            }
        }
    }

    /// Earliest deadline among waiting requests, if any.
    pub fn next_deadline(&self) -> Option<u64> {
        self.slots
            .iter()
            .flatten()
            .filter(|r| r.state == PendingState::Waiting)
            .map(|r| r.deadline_ms)
            .min()
    }

    /// Settle every waiting request with `err` (close/reset path).
    pub fn flush_all(&mut self, err: ResponseError) {
        for request in self.slots.iter_mut().flatten() {
            if request.state == PendingState::Waiting {
                request.state = PendingState::Done(Err(err));
            }
        }
    }

    /// Whether the request behind `slot` has settled (or vanished).
    pub fn is_settled(&self, slot: SlotId) -> bool {
        match &self.slots[slot.index] {
            Some(request) if request.seq == slot.seq => {
                matches!(request.state, PendingState::Done(_))
            }
            // Slot recycled or already consumed: nothing left to wait for.
            _ => true,
        }
    }

    /// Consume a settled request's completion and free its slot.
    ///
    /// Returns `None` while the request is still waiting or when the handle
    /// is stale.
    pub fn take(&mut self, slot: SlotId) -> Option<Completion> {
        match &self.slots[slot.index] {
            Some(request) if request.seq == slot.seq => match request.state {
                PendingState::Done(completion) => {
                    self.slots[slot.index] = None;
                    Some(completion)
                }
                PendingState::Waiting => None,
            },
            _ => None,
        }
    }

    /// Drop a registration regardless of its state (abort path).
    pub fn remove(&mut self, slot: SlotId) {
        if let Some(request) = &self.slots[slot.index] {
            if request.seq == slot.seq {
                self.slots[slot.index] = None;
            }
        }
    }

    /// Number of occupied slots, settled entries included.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Whether no request is tracked at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
