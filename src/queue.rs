//! Publish queue and ack correlator.
//!
//! Every channel owns an [`AckQueue`] of in-flight publishes in submission
//! order, plus a holding list of [`QueuedMessage`]s accepted before the
//! channel reached Attached. Acknowledgements may arrive in any order; the
//! queue records outcomes as they land and releases completions strictly
//! head-first, so callers observe FIFO completion per channel no matter how
//! the transport reorders acks.

use std::collections::VecDeque;

use crate::error::ErrorInfo;
use crate::protocol::ProtocolMessage;

/// Caller-supplied completion for one publish. Invoked exactly once.
pub type Completion = Box<dyn FnOnce(Result<(), ErrorInfo>) + Send>;

/// A publish accepted while the channel was not yet Attached. Flushed in
/// submission order on attach, or failed as a batch.
pub struct QueuedMessage {
    pub message: ProtocolMessage,
    pub completion: Completion,
}

struct PendingPublish {
    /// First serial covered by this publish.
    serial: u64,
    /// Outcome, once the matching ack/nack has arrived.
    outcome: Option<Result<(), ErrorInfo>>,
    completion: Completion,
}

/// Ordered queue of in-flight publishes awaiting acknowledgement.
#[derive(Default)]
pub struct AckQueue {
    pending: VecDeque<PendingPublish>,
}

impl AckQueue {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Record an in-flight publish. Serials must be pushed in increasing
    /// order; that order defines completion order.
    pub fn push(&mut self, serial: u64, completion: Completion) {
        debug_assert!(self
            .pending
            .back()
            .map(|p| p.serial < serial)
            .unwrap_or(true));
        self.pending.push_back(PendingPublish {
            serial,
            outcome: None,
            completion,
        });
    }

    /// Record an acknowledgement covering `count` serials starting at
    /// `serial`, then release every completion at the head of the queue
    /// whose outcome is known. Returned completions must be invoked by the
    /// caller, in order, outside any lock.
    pub fn acknowledge(
        &mut self,
        serial: u64,
        count: u32,
        outcome: Result<(), ErrorInfo>,
    ) -> Vec<(Completion, Result<(), ErrorInfo>)> {
        let end = serial + u64::from(count.max(1));
        for entry in self.pending.iter_mut() {
            if entry.serial >= serial && entry.serial < end && entry.outcome.is_none() {
                entry.outcome = Some(outcome.clone());
            }
        }
        self.release_resolved_head()
    }

    /// Fail every in-flight publish (connection lost, channel failed).
    /// Entries keep their submission order.
    pub fn fail_all(&mut self, error: ErrorInfo) -> Vec<(Completion, Result<(), ErrorInfo>)> {
        for entry in self.pending.iter_mut() {
            if entry.outcome.is_none() {
                entry.outcome = Some(Err(error.clone()));
            }
        }
        self.release_resolved_head()
    }

    fn release_resolved_head(&mut self) -> Vec<(Completion, Result<(), ErrorInfo>)> {
        let mut released = Vec::new();
        while matches!(self.pending.front(), Some(p) if p.outcome.is_some()) {
            let entry = self.pending.pop_front().expect("front checked above");
            released.push((entry.completion, entry.outcome.expect("outcome checked")));
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Completion that appends `(tag, ok)` to a shared log.
    fn logging_completion(log: &Arc<Mutex<Vec<(u64, bool)>>>, tag: u64) -> Completion {
        let log = log.clone();
        Box::new(move |outcome| log.lock().unwrap().push((tag, outcome.is_ok())))
    }

    fn run(released: Vec<(Completion, Result<(), ErrorInfo>)>) {
        for (completion, outcome) in released {
            completion(outcome);
        }
    }

    #[test]
    fn test_in_order_acks_release_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut q = AckQueue::new();
        q.push(0, logging_completion(&log, 0));
        q.push(1, logging_completion(&log, 1));

        run(q.acknowledge(0, 1, Ok(())));
        run(q.acknowledge(1, 1, Ok(())));

        assert_eq!(*log.lock().unwrap(), vec![(0, true), (1, true)]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_out_of_order_acks_still_release_fifo() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut q = AckQueue::new();
        for serial in 0..3 {
            q.push(serial, logging_completion(&log, serial));
        }

        // Ack the tail first: nothing can be released yet.
        run(q.acknowledge(2, 1, Ok(())));
        assert!(log.lock().unwrap().is_empty());

        run(q.acknowledge(1, 1, Ok(())));
        assert!(log.lock().unwrap().is_empty());

        // Head resolves: everything drains at once, in submission order.
        run(q.acknowledge(0, 1, Ok(())));
        assert_eq!(*log.lock().unwrap(), vec![(0, true), (1, true), (2, true)]);
    }

    #[test]
    fn test_interleaved_success_and_failure_keep_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut q = AckQueue::new();
        for serial in 0..4 {
            q.push(serial, logging_completion(&log, serial));
        }

        run(q.acknowledge(1, 1, Err(ErrorInfo::protocol("rejected"))));
        run(q.acknowledge(3, 1, Ok(())));
        run(q.acknowledge(0, 1, Ok(())));
        run(q.acknowledge(2, 1, Ok(())));

        assert_eq!(
            *log.lock().unwrap(),
            vec![(0, true), (1, false), (2, true), (3, true)]
        );
    }

    #[test]
    fn test_ack_count_spans_multiple_serials() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut q = AckQueue::new();
        for serial in 0..3 {
            q.push(serial, logging_completion(&log, serial));
        }

        run(q.acknowledge(0, 3, Ok(())));
        assert_eq!(*log.lock().unwrap(), vec![(0, true), (1, true), (2, true)]);
    }

    #[test]
    fn test_duplicate_ack_does_not_fire_twice() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut q = AckQueue::new();
        q.push(0, logging_completion(&log, 0));

        run(q.acknowledge(0, 1, Ok(())));
        run(q.acknowledge(0, 1, Ok(())));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_fail_all_preserves_order_and_recorded_outcomes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut q = AckQueue::new();
        for serial in 0..3 {
            q.push(serial, logging_completion(&log, serial));
        }

        // Serial 1 already succeeded; the head has not, so nothing released.
        run(q.acknowledge(1, 1, Ok(())));
        assert!(log.lock().unwrap().is_empty());

        run(q.fail_all(ErrorInfo::connection_lost("dropped")));
        assert_eq!(
            *log.lock().unwrap(),
            vec![(0, false), (1, true), (2, false)]
        );
        assert!(q.is_empty());
    }
}
