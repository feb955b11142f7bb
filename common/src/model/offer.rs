use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Phase of one applicant's offer-letter generation run.
///
/// Successful runs move strictly forward through
/// `Pending -> DocxGenerated -> ConvertingPdf -> PdfReady -> EmailSent`.
/// `Failed` can be entered from any phase that is not terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferPhase {
    Pending,
    DocxGenerated,
    ConvertingPdf,
    PdfReady,
    EmailSent,
    Failed,
}

impl OfferPhase {
    /// Every phase in run order, `Failed` last.
    pub const ALL: [OfferPhase; 6] = [
        OfferPhase::Pending,
        OfferPhase::DocxGenerated,
        OfferPhase::ConvertingPdf,
        OfferPhase::PdfReady,
        OfferPhase::EmailSent,
        OfferPhase::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferPhase::Pending => "pending",
            OfferPhase::DocxGenerated => "docx_generated",
            OfferPhase::ConvertingPdf => "converting_pdf",
            OfferPhase::PdfReady => "pdf_ready",
            OfferPhase::EmailSent => "email_sent",
            OfferPhase::Failed => "failed",
        }
    }

    /// Advisory progress percentage shown to polling clients.
    pub fn progress(&self) -> u8 {
        match self {
            OfferPhase::Pending => 0,
            OfferPhase::DocxGenerated => 30,
            OfferPhase::ConvertingPdf => 50,
            OfferPhase::PdfReady => 90,
            OfferPhase::EmailSent => 100,
            OfferPhase::Failed => 0,
        }
    }

    /// Position on the success path. `Failed` has none.
    fn rank(&self) -> Option<u8> {
        match self {
            OfferPhase::Pending => Some(0),
            OfferPhase::DocxGenerated => Some(1),
            OfferPhase::ConvertingPdf => Some(2),
            OfferPhase::PdfReady => Some(3),
            OfferPhase::EmailSent => Some(4),
            OfferPhase::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OfferPhase::EmailSent | OfferPhase::Failed)
    }

    /// Whether a run currently in `self` may move to `next`.
    ///
    /// Forward moves may not skip backwards or repeat; `Failed` is allowed
    /// from every non-terminal phase.
    pub fn can_advance_to(&self, next: OfferPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(current), Some(target)) => target > current,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for OfferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPhase(pub String);

impl fmt::Display for UnknownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown offer letter phase '{}'", self.0)
    }
}

impl std::error::Error for UnknownPhase {}

impl FromStr for OfferPhase {
    type Err = UnknownPhase;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        OfferPhase::ALL
            .iter()
            .copied()
            .find(|phase| phase.as_str() == value)
            .ok_or_else(|| UnknownPhase(value.to_string()))
    }
}

/// Body of `GET /offer_letter/status/{applicant_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferLetterStatus {
    pub status: OfferPhase,
    pub progress: u8,
    pub docx_url: Option<String>,
    pub pdf_url: Option<String>,
}

/// Body returned once the source document is stored and the background run
/// has been handed off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendLetterResponse {
    pub detail: String,
    pub status: String,
    pub docx_url: String,
}
