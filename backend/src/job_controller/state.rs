//! Tracks offer-letter runs that execute outside the request/response cycle.
//!
//! Two pieces of state live here:
//! - the lease set, which guarantees that at most one run per applicant is in
//!   flight. Claiming a lease is synchronous so two requests racing for the
//!   same applicant cannot both win; the lease is released when its
//!   [`JobLease`] is dropped, whatever way the run ends.
//! - `jobs`, a view of the runs currently holding a lease, served by
//!   `GET /api/offer_letter/jobs`. Runs report into it through `JobUpdate`
//!   messages on an MPSC channel that `start_job_updater` drains, so a
//!   worker never waits on the map's lock.

use chrono::Utc;
use common::jobs::InFlightJob;
use common::model::offer::OfferPhase;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

const UPDATE_CHANNEL_CAPACITY: usize = 100;

/// Shared job registry, injected into the Actix application as `web::Data`.
#[derive(Clone)]
pub struct JobsState {
    /// In-flight runs keyed by applicant id.
    pub jobs: Arc<RwLock<HashMap<i64, InFlightJob>>>,
    /// Sender used by leases to publish their progress.
    pub tx: mpsc::Sender<JobUpdate>,
    leases: Arc<Mutex<HashSet<i64>>>,
}

/// Progress message published by a running job.
#[derive(Debug, Clone)]
pub enum JobUpdate {
    Started(InFlightJob),
    Phase {
        applicant_id: i64,
        run_id: String,
        phase: OfferPhase,
    },
    Finished {
        applicant_id: i64,
        run_id: String,
    },
}

/// Returned when an applicant already has a run in flight.
#[derive(Debug, thiserror::Error)]
#[error("an offer letter run is already in progress for applicant {applicant_id}")]
pub struct JobBusy {
    pub applicant_id: i64,
}

impl JobsState {
    /// Builds an empty registry plus the receiving end of its update channel.
    pub fn new() -> (Self, mpsc::Receiver<JobUpdate>) {
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let state = Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            tx,
            leases: Arc::new(Mutex::new(HashSet::new())),
        };
        (state, rx)
    }

    /// Reserves `applicant_id` for a new run.
    pub fn claim(&self, applicant_id: i64) -> Result<JobLease, JobBusy> {
        {
            let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
            if !leases.insert(applicant_id) {
                return Err(JobBusy { applicant_id });
            }
        }

        let lease = JobLease {
            applicant_id,
            run_id: Uuid::new_v4().to_string(),
            leases: self.leases.clone(),
            tx: self.tx.clone(),
        };
        lease.publish(JobUpdate::Started(InFlightJob {
            applicant_id,
            run_id: lease.run_id.clone(),
            phase: OfferPhase::Pending,
            started_at: Utc::now(),
        }));
        Ok(lease)
    }

    pub fn is_running(&self, applicant_id: i64) -> bool {
        self.leases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&applicant_id)
    }

    /// Snapshot of the in-flight runs, oldest first.
    pub async fn in_flight(&self) -> Vec<InFlightJob> {
        let jobs = self.jobs.read().await;
        let mut list: Vec<InFlightJob> = jobs.values().cloned().collect();
        list.sort_by_key(|job| job.started_at);
        list
    }
}

/// Exclusive right to run the offer-letter pipeline for one applicant.
#[derive(Debug)]
pub struct JobLease {
    applicant_id: i64,
    run_id: String,
    leases: Arc<Mutex<HashSet<i64>>>,
    tx: mpsc::Sender<JobUpdate>,
}

impl JobLease {
    pub fn applicant_id(&self) -> i64 {
        self.applicant_id
    }

    /// Identifier of this run, used to correlate log lines.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn report(&self, phase: OfferPhase) {
        self.publish(JobUpdate::Phase {
            applicant_id: self.applicant_id,
            run_id: self.run_id.clone(),
            phase,
        });
    }

    // `try_send` works from both async handlers and blocking workers. The
    // registry is informational, so a full channel only costs a stale view.
    fn publish(&self, update: JobUpdate) {
        if let Err(err) = self.tx.try_send(update) {
            debug!("dropped job update for applicant {}: {}", self.applicant_id, err);
        }
    }
}

impl Drop for JobLease {
    fn drop(&mut self) {
        self.leases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.applicant_id);
        self.publish(JobUpdate::Finished {
            applicant_id: self.applicant_id,
            run_id: self.run_id.clone(),
        });
    }
}

/// Applies `JobUpdate` messages to `state.jobs`.
///
/// Spawned once at startup and runs for the lifetime of the server.
pub async fn start_job_updater(state: JobsState, mut rx: mpsc::Receiver<JobUpdate>) {
    while let Some(update) = rx.recv().await {
        let mut jobs = state.jobs.write().await;
        match update {
            JobUpdate::Started(job) => {
                info!(
                    "offer letter run {} started for applicant {}",
                    job.run_id, job.applicant_id
                );
                jobs.insert(job.applicant_id, job);
            }
            JobUpdate::Phase {
                applicant_id,
                run_id,
                phase,
            } => {
                if let Some(job) = jobs.get_mut(&applicant_id) {
                    if job.run_id == run_id {
                        job.phase = phase;
                    }
                }
            }
            JobUpdate::Finished {
                applicant_id,
                run_id,
            } => {
                if jobs
                    .get(&applicant_id)
                    .is_some_and(|job| job.run_id == run_id)
                {
                    jobs.remove(&applicant_id);
                }
            }
        }
    }
}
