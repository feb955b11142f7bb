//! Background unit of work that turns a rendered DOCX into a delivered
//! offer letter.
//!
//! [`OfferPipeline::start`] withdraws the previous PDF, stores the DOCX and
//! moves the job to `docx_generated` on a blocking worker before returning.
//! Everything after that runs on a blocking worker spawned from a tokio
//! task, and reports through the applicant row and the run's [`JobLease`].

use super::convert::{ConversionError, DocumentConverter};
use super::notify::{Notifications, OfferNotice};
use super::records::{self, AdmittedApplicant, RecordError};
use crate::db::{Database, StorageError};
use crate::job_controller::state::JobLease;
use crate::media::{MediaStore, StoredFile};
use common::model::offer::OfferPhase;
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Media directory holding generated letters.
pub const LETTER_DIR: &str = "admission_template";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Records(#[from] RecordError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("offer letter worker stopped: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// PDF stored and the applicant notified.
    Delivered,
    /// PDF stored but notification failed; the job stays `pdf_ready`.
    NotificationFailed,
    /// The job was moved to `failed`.
    Failed,
}

/// Handle on a started run.
#[derive(Debug)]
pub struct OfferJobHandle {
    applicant_id: i64,
    run_id: String,
    docx: StoredFile,
    task: JoinHandle<JobOutcome>,
}

impl OfferJobHandle {
    pub fn applicant_id(&self) -> i64 {
        self.applicant_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The DOCX stored before the run went to the background.
    pub fn docx(&self) -> &StoredFile {
        &self.docx
    }

    /// Waits for the run to end.
    pub async fn wait(self) -> JobOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    "offer letter run {} for applicant {} was lost: {}",
                    self.run_id, self.applicant_id, err
                );
                JobOutcome::Failed
            }
        }
    }
}

/// Part of the run that failed, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Session,
    Conversion,
    PdfStorage,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Session => "converter session",
            Stage::Conversion => "pdf conversion",
            Stage::PdfStorage => "pdf storage",
        })
    }
}

struct StageFailure {
    stage: Stage,
    error: PipelineError,
}

fn at<E: Into<PipelineError>>(stage: Stage) -> impl FnOnce(E) -> StageFailure {
    move |err| StageFailure {
        stage,
        error: err.into(),
    }
}

pub fn letter_path(applicant_id: i64, extension: &str) -> String {
    format!("{LETTER_DIR}/{}.{extension}", letter_stem(applicant_id))
}

fn letter_stem(applicant_id: i64) -> String {
    format!("OfferLetter_{applicant_id}")
}

/// Everything a run needs; shared with the HTTP layer as `web::Data`.
#[derive(Clone)]
pub struct OfferPipeline {
    db: Database,
    media: MediaStore,
    converter: Arc<dyn DocumentConverter>,
    notifications: Notifications,
}

impl OfferPipeline {
    pub fn new(
        db: Database,
        media: MediaStore,
        converter: Arc<dyn DocumentConverter>,
        notifications: Notifications,
    ) -> Self {
        Self {
            db,
            media,
            converter,
            notifications,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// Stores `docx`, records `docx_generated` and hands the rest of the
    /// run to the background.
    ///
    /// The previous run's PDF is deleted first, so `/media` never serves a
    /// letter that does not match the new DOCX. The lease is held until the
    /// background work has finished, including the failure bookkeeping.
    pub async fn start(
        &self,
        lease: JobLease,
        applicant: &AdmittedApplicant,
        docx: Vec<u8>,
    ) -> Result<OfferJobHandle, PipelineError> {
        let applicant_id = applicant.application_id;
        let run_id = lease.run_id().to_string();
        let pdf_path = letter_path(applicant_id, "pdf");
        let notice = OfferNotice {
            applicant_id,
            recipient: applicant.email.clone(),
            full_name: format!("{} {}", applicant.first_name.trim(), applicant.last_name.trim()),
            program_name: applicant.program_name.clone(),
            pdf_url: self.media.url_for(&pdf_path),
            attachment: pdf_path,
        };

        let pipeline = self.clone();
        let (docx_file, docx) =
            tokio::task::spawn_blocking(move || pipeline.prepare(applicant_id, docx)).await??;
        lease.report(OfferPhase::DocxGenerated);
        info!(
            "offer letter run {} for applicant {}: {}",
            run_id,
            applicant_id,
            OfferPhase::DocxGenerated
        );

        let run = Run {
            pipeline: self.clone(),
            lease: Arc::new(lease),
            docx,
            notice,
        };
        let task = tokio::spawn(run.execute());

        Ok(OfferJobHandle {
            applicant_id,
            run_id,
            docx: docx_file,
            task,
        })
    }

    fn prepare(
        &self,
        applicant_id: i64,
        docx: Vec<u8>,
    ) -> Result<(StoredFile, Vec<u8>), PipelineError> {
        self.media.remove(&letter_path(applicant_id, "pdf"))?;
        let docx_file = self.media.save(&letter_path(applicant_id, "docx"), &docx)?;
        let conn = self.db.open()?;
        records::begin_run(&conn, applicant_id, &docx_file)?;
        Ok((docx_file, docx))
    }
}

/// State moved into the background task.
struct Run {
    pipeline: OfferPipeline,
    lease: Arc<JobLease>,
    docx: Vec<u8>,
    notice: OfferNotice,
}

impl Run {
    async fn execute(self) -> JobOutcome {
        let applicant_id = self.lease.applicant_id();
        let run_id = self.lease.run_id().to_string();
        let pipeline = self.pipeline.clone();
        let lease = self.lease.clone();

        let worker = tokio::task::spawn_blocking(move || self.convert_and_deliver());
        let outcome = match worker.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(failure)) => {
                error!(
                    "offer letter run {} for applicant {} failed at {}: {}",
                    run_id, applicant_id, failure.stage, failure.error
                );
                pipeline.mark_failed(&lease);
                JobOutcome::Failed
            }
            Err(err) => {
                error!(
                    "offer letter run {} for applicant {} panicked: {}",
                    run_id, applicant_id, err
                );
                pipeline.mark_failed(&lease);
                JobOutcome::Failed
            }
        };
        info!(
            "offer letter run {} for applicant {} finished: {:?}",
            run_id, applicant_id, outcome
        );
        outcome
    }

    fn convert_and_deliver(&self) -> Result<JobOutcome, StageFailure> {
        let applicant_id = self.lease.applicant_id();
        let pipeline = &self.pipeline;

        let _session = pipeline.converter.begin_session().map_err(at(Stage::Session))?;
        let conn = pipeline.db.open().map_err(at(Stage::Conversion))?;
        self.transition(&conn, OfferPhase::DocxGenerated, OfferPhase::ConvertingPdf)
            .map_err(at(Stage::Conversion))?;

        debug!(
            "offer letter run {} for applicant {}: converting with {}",
            self.lease.run_id(),
            applicant_id,
            pipeline.converter.name()
        );
        let pdf = pipeline
            .converter
            .convert(&self.docx, &letter_stem(applicant_id))
            .map_err(at(Stage::Conversion))?;

        self.transition(&conn, OfferPhase::ConvertingPdf, OfferPhase::PdfReady)
            .map_err(at(Stage::PdfStorage))?;
        let pdf_file = pipeline
            .media
            .save(&self.notice.attachment, &pdf)
            .map_err(at(Stage::PdfStorage))?;
        if let Err(err) = records::record_pdf(&conn, applicant_id, &pdf_file) {
            if let Err(cleanup) = pipeline.media.remove(&pdf_file.relative_path) {
                warn!(
                    "offer letter run {} for applicant {}: could not remove unrecorded {}: {}",
                    self.lease.run_id(),
                    applicant_id,
                    pdf_file.relative_path,
                    cleanup
                );
            }
            return Err(at(Stage::PdfStorage)(err));
        }
        drop(conn);

        Ok(self.notify())
    }

    fn notify(&self) -> JobOutcome {
        let applicant_id = self.lease.applicant_id();
        let run_id = self.lease.run_id();

        if let Err(err) = self.pipeline.notifications.deliver(&self.notice) {
            warn!(
                "offer letter run {} for applicant {}: notification failed, letter kept at {}: {}",
                run_id, applicant_id, OfferPhase::PdfReady, err
            );
            return JobOutcome::NotificationFailed;
        }

        let sent = self
            .pipeline
            .db
            .open()
            .map_err(RecordError::from)
            .and_then(|mut conn| records::mark_letter_sent(&mut conn, applicant_id));
        match sent {
            Ok(()) => {
                self.lease.report(OfferPhase::EmailSent);
                info!(
                    "offer letter run {} for applicant {}: {}",
                    run_id,
                    applicant_id,
                    OfferPhase::EmailSent
                );
                JobOutcome::Delivered
            }
            Err(err) => {
                warn!(
                    "offer letter run {} for applicant {}: notified but could not record delivery: {}",
                    run_id, applicant_id, err
                );
                JobOutcome::NotificationFailed
            }
        }
    }

    fn transition(
        &self,
        conn: &rusqlite::Connection,
        from: OfferPhase,
        to: OfferPhase,
    ) -> Result<(), RecordError> {
        records::advance(conn, self.lease.applicant_id(), from, to)?;
        self.lease.report(to);
        info!(
            "offer letter run {} for applicant {}: {}",
            self.lease.run_id(),
            self.lease.applicant_id(),
            to
        );
        Ok(())
    }
}

impl OfferPipeline {
    fn mark_failed(&self, lease: &JobLease) {
        let applicant_id = lease.applicant_id();
        let failed = self
            .db
            .open()
            .map_err(RecordError::from)
            .and_then(|conn| records::fail(&conn, applicant_id));
        match failed {
            Ok(_) => lease.report(OfferPhase::Failed),
            Err(err) => error!(
                "offer letter run {} for applicant {}: could not record failure: {}",
                lease.run_id(),
                applicant_id,
                err
            ),
        }
    }
}
