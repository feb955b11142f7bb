use crate::model::offer::OfferPhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An offer-letter run that currently holds its applicant's lease.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InFlightJob {
    pub applicant_id: i64,
    pub run_id: String,
    pub phase: OfferPhase,
    pub started_at: DateTime<Utc>,
}
