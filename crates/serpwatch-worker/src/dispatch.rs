//! Priority dispatch: two bounded lanes feeding a shared worker pool.
//!
//! The high lane carries critical/high-priority and never-fetched terms so a
//! deep backlog of routine refetches cannot starve them. Workers always
//! drain the high lane before touching the default lane.

use std::sync::Arc;

use serpwatch_core::Priority;
use serpwatch_db::EligibleTerm;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::Mutex;

/// A unit of work: one term execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermJob {
    pub term_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    High,
    Default,
}

/// Sending half, held by the scheduler and the watchdog.
pub struct Dispatcher {
    high: mpsc::Sender<TermJob>,
    default_lane: mpsc::Sender<TermJob>,
}

/// Receiving half, shared by every worker.
#[derive(Clone)]
pub struct Lanes {
    high: Arc<Mutex<mpsc::Receiver<TermJob>>>,
    default_lane: Arc<Mutex<mpsc::Receiver<TermJob>>>,
}

/// Creates a dispatcher/lanes pair with `capacity` slots per lane.
#[must_use]
pub fn lanes(capacity: usize) -> (Dispatcher, Lanes) {
    let (high_tx, high_rx) = mpsc::channel(capacity);
    let (default_tx, default_rx) = mpsc::channel(capacity);
    (
        Dispatcher {
            high: high_tx,
            default_lane: default_tx,
        },
        Lanes {
            high: Arc::new(Mutex::new(high_rx)),
            default_lane: Arc::new(Mutex::new(default_rx)),
        },
    )
}

/// Picks the lane for a term: cold (never fetched) and critical/high
/// priorities go to the high lane, everything else to the default lane.
fn lane_for(term: &EligibleTerm) -> Lane {
    if term.is_cold()
        || matches!(
            Priority::parse(&term.priority),
            Priority::Critical | Priority::High
        )
    {
        Lane::High
    } else {
        Lane::Default
    }
}

impl Dispatcher {
    /// Enqueues a term without blocking. Returns the lane used.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`TrySendError`] when the lane is full or the
    /// workers are gone; the caller decides whether to release the term's
    /// in-flight flag or leave it to the watchdog.
    pub fn dispatch(&self, term: &EligibleTerm) -> Result<Lane, TrySendError<TermJob>> {
        let job = TermJob { term_id: term.id };
        let lane = lane_for(term);
        match lane {
            Lane::High => self.high.try_send(job)?,
            Lane::Default => self.default_lane.try_send(job)?,
        }
        Ok(lane)
    }
}

impl Lanes {
    /// Receives the next job, always preferring the high lane. A waiting
    /// worker wakes as soon as either lane has a job. Returns `None` once
    /// the dispatcher is dropped and both lanes are drained.
    ///
    /// Both receiver mutexes are held while waiting, so idle workers queue
    /// behind one waiter and take over as jobs hand off.
    pub async fn next(&self) -> Option<TermJob> {
        let mut high = self.high.lock().await;
        match high.try_recv() {
            Ok(job) => return Some(job),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                drop(high);
                return self.default_lane.lock().await.recv().await;
            }
        }

        let mut default_lane = self.default_lane.lock().await;
        tokio::select! {
            biased;
            job = high.recv() => match job {
                Some(job) => Some(job),
                None => default_lane.recv().await,
            },
            job = default_lane.recv() => match job {
                Some(job) => Some(job),
                None => high.recv().await,
            },
        }
    }
}
