//! Audit trail for authorization decisions and ACL mutations
//!
//! Write-only and best-effort:
//! - lock-free ring buffer, `log` never blocks the caller
//! - background flush thread hands batches to a sink callback
//! - a full ring drops events (counted) rather than stalling a check
//!
//! Logging failure never changes an authorization outcome; events are
//! recorded after the decision is finalized.

use chrono::{DateTime, Utc};
use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::info;

use crate::model::{Decision, ObjectIdentity};
use crate::permission::PermissionMask;
use crate::sid::SecurityIdentifier;

/// Kind of ACL mutation being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    CreateIdentity,
    Grant,
    Deny,
    Revoke,
    SetParent,
    SetInherit,
}

/// One audit record
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Outcome of one authorization check
    Decision {
        identity: ObjectIdentity,
        sids: Vec<SecurityIdentifier>,
        requested: PermissionMask,
        outcome: Decision,
        at: DateTime<Utc>,
    },
    /// One committed ACL mutation
    Mutation {
        kind: MutationKind,
        identity: ObjectIdentity,
        sid: Option<SecurityIdentifier>,
        detail: String,
        at: DateTime<Utc>,
    },
}

impl AuditEvent {
    /// Record a finalized authorization decision
    pub fn decision(
        identity: &ObjectIdentity,
        sids: &[SecurityIdentifier],
        requested: PermissionMask,
        outcome: Decision,
    ) -> Self {
        AuditEvent::Decision {
            identity: identity.clone(),
            sids: sids.to_vec(),
            requested,
            outcome,
            at: Utc::now(),
        }
    }

    /// Record a committed mutation
    pub fn mutation(
        kind: MutationKind,
        identity: &ObjectIdentity,
        sid: Option<&SecurityIdentifier>,
        detail: String,
    ) -> Self {
        AuditEvent::Mutation {
            kind,
            identity: identity.clone(),
            sid: sid.cloned(),
            detail,
            at: Utc::now(),
        }
    }
}

/// Ring-buffered audit logger with background flushing
pub struct AuditLogger {
    /// Lock-free ring of pending events
    ring: Arc<ArrayQueue<AuditEvent>>,
    /// Background flush thread handle
    flush_thread: Option<JoinHandle<()>>,
    /// How often the flush thread drains the ring
    flush_interval: Duration,
    /// Whether the flush thread should keep running
    running: Arc<Mutex<bool>>,
    /// Events dropped because the ring was full
    dropped: Arc<AtomicU64>,
}

impl AuditLogger {
    /// Create a logger with the given ring capacity and flush interval
    ///
    /// A capacity of zero is treated as one; the ring always holds at
    /// least a single slot.
    pub fn new(capacity: usize, flush_interval: Duration) -> Self {
        AuditLogger {
            ring: Arc::new(ArrayQueue::new(capacity.max(1))),
            flush_thread: None,
            flush_interval,
            running: Arc::new(Mutex::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start the flush thread with a custom sink
    ///
    /// The sink receives drained batches in arrival order.
    pub fn start<F>(&mut self, sink: F)
    where
        F: Fn(&[AuditEvent]) + Send + 'static,
    {
        *self.running.lock() = true;

        let ring = Arc::clone(&self.ring);
        let running = Arc::clone(&self.running);
        let flush_interval = self.flush_interval;

        self.flush_thread = Some(thread::spawn(move || {
            while *running.lock() {
                // Sleep in slices so stop() is not held up by a long interval
                let mut slept = Duration::ZERO;
                while slept < flush_interval && *running.lock() {
                    let slice = (flush_interval - slept).min(Duration::from_millis(10));
                    thread::sleep(slice);
                    slept += slice;
                }

                let batch = drain(&ring, 1000);
                if !batch.is_empty() {
                    sink(&batch);
                }
            }
            // Final drain so a clean stop loses nothing
            let batch = drain(&ring, usize::MAX);
            if !batch.is_empty() {
                sink(&batch);
            }
        }));
    }

    /// Start the flush thread with the default sink: one JSON line per
    /// event on the `audit` tracing target
    pub fn start_default(&mut self) {
        self.start(|events| {
            for event in events {
                match serde_json::to_string(event) {
                    Ok(line) => info!(target: "audit", "{}", line),
                    Err(err) => info!(target: "audit", "unserializable audit event: {}", err),
                }
            }
        });
    }

    /// Stop the flush thread, draining what remains
    pub fn stop(&mut self) {
        *self.running.lock() = false;
        if let Some(handle) = self.flush_thread.take() {
            let _ = handle.join();
        }
    }

    /// Enqueue an event without blocking; drops (and counts) when full
    pub fn log(&self, event: AuditEvent) {
        if self.ring.push(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Events currently queued and events dropped so far
    pub fn stats(&self) -> (usize, u64) {
        (self.ring.len(), self.dropped.load(Ordering::Relaxed))
    }
}

impl Drop for AuditLogger {
    fn drop(&mut self) {
        self.stop();
    }
}

fn drain(ring: &ArrayQueue<AuditEvent>, max: usize) -> Vec<AuditEvent> {
    let mut batch = Vec::new();
    while batch.len() < max {
        match ring.pop() {
            Some(event) => batch.push(event),
            None => break,
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn sample_event() -> AuditEvent {
        AuditEvent::decision(
            &ObjectIdentity::new("Comment", "42"),
            &[SecurityIdentifier::principal("alice")],
            PermissionMask::READ,
            Decision::Allow,
        )
    }

    #[test]
    fn test_log_is_nonblocking_and_lossy() {
        let logger = AuditLogger::new(2, Duration::from_millis(100));

        logger.log(sample_event());
        logger.log(sample_event());
        logger.log(sample_event()); // ring full, dropped

        let (queued, dropped) = logger.stats();
        assert_eq!(queued, 2);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_zero_capacity_clamped_to_one() {
        let logger = AuditLogger::new(0, Duration::from_millis(100));

        logger.log(sample_event());
        logger.log(sample_event()); // second event exceeds the single slot

        let (queued, dropped) = logger.stats();
        assert_eq!(queued, 1);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_flush_delivers_batches() {
        let mut logger = AuditLogger::new(64, Duration::from_millis(20));
        let delivered = Arc::new(AtomicUsize::new(0));
        let delivered_clone = Arc::clone(&delivered);

        logger.start(move |events| {
            delivered_clone.fetch_add(events.len(), Ordering::SeqCst);
        });

        for _ in 0..10 {
            logger.log(sample_event());
        }

        thread::sleep(Duration::from_millis(100));
        logger.stop();

        assert_eq!(delivered.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_stop_drains_remaining() {
        let mut logger = AuditLogger::new(64, Duration::from_secs(3600));
        let delivered = Arc::new(AtomicUsize::new(0));
        let delivered_clone = Arc::clone(&delivered);

        logger.start(move |events| {
            delivered_clone.fetch_add(events.len(), Ordering::SeqCst);
        });

        logger.log(sample_event());
        logger.log(sample_event());

        // Interval never elapses; the final drain on stop must deliver
        logger.stop();
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_event_serializes_to_json() {
        let json = serde_json::to_string(&sample_event()).unwrap();
        assert!(json.contains("\"event\":\"decision\""));
        assert!(json.contains("Comment"));
    }
}
