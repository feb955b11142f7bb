#![allow(dead_code)]

use backend::config::{MailConfig, ReadinessPolicy};
use backend::db::Database;
use backend::job_controller::state::{start_job_updater, JobsState};
use backend::media::MediaStore;
use backend::services::offer_letter::convert::HeadlessOfficeConverter;
use backend::services::offer_letter::notify::{
    InAppNotifier, MailMessage, Mailer, NotificationError, Notifications, OutboxMailer,
    PortalNotifier,
};
use backend::services::templates::store::{self, NewTemplate};
use backend::PortalState;
use chrono::{TimeZone, Utc};
use common::model::template::TemplateStatus;
use rusqlite::params;
use std::fs;
use std::io::{Cursor, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const PROGRAM_ID: i64 = 10;

/// Office suite stand-in writing `<stem>.pdf` into the `--outdir` directory.
pub const CONVERTS: &str = r#"
for arg in "$@"; do
  case "$arg" in
    *.docx) input="$arg" ;;
  esac
  last="$arg"
done
stem=$(basename "$input" .docx)
printf '%%PDF-1.4 offer letter' > "$last/$stem.pdf"
"#;

/// Converts on the first call and fails on every later one.
pub const CONVERTS_ONCE: &str = r#"
if [ -f "$0.used" ]; then
  echo 'office suite crashed' >&2
  exit 1
fi
touch "$0.used"
for arg in "$@"; do
  case "$arg" in
    *.docx) input="$arg" ;;
  esac
  last="$arg"
done
stem=$(basename "$input" .docx)
printf '%%PDF-1.4 offer letter' > "$last/$stem.pdf"
"#;

pub const CRASHES: &str = "echo 'source file could not be loaded' >&2\nexit 1";

pub enum Delivery {
    Works,
    MailRelayDown,
}

pub struct Portal {
    pub dir: tempfile::TempDir,
    pub state: PortalState,
}

struct RelayDown;

impl Mailer for RelayDown {
    fn send(&self, _message: &MailMessage) -> Result<(), NotificationError> {
        Err(NotificationError::Channel("mail relay unavailable".to_string()))
    }
}

/// Builds a portal on a fresh database and media root, with `converter`
/// as the office suite's script body.
pub fn portal(converter: &str, delivery: Delivery) -> Portal {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::new(dir.path().join("portal.sqlite"));
    db.init_schema().expect("schema");
    let media_root = dir.path().join("media");
    fs::create_dir_all(&media_root).expect("media root");
    let media = MediaStore::new(&media_root, "/media");

    let tool = dir.path().join("soffice");
    fs::write(&tool, format!("#!/bin/sh\n{converter}\n")).expect("script");
    let mut perms = fs::metadata(&tool).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&tool, perms).expect("chmod");

    let converter = HeadlessOfficeConverter::new(
        tool.display().to_string(),
        Some(dir.path().join("work")),
        ReadinessPolicy {
            attempts: 5,
            interval: Duration::from_millis(20),
        },
    );
    let mail = MailConfig {
        from: "admissions@ndu.example".to_string(),
        institution: "Ndejje University".to_string(),
    };
    let mailer: Arc<dyn Mailer> = match delivery {
        Delivery::Works => Arc::new(OutboxMailer::new(db.clone())),
        Delivery::MailRelayDown => Arc::new(RelayDown),
    };
    let in_app: Arc<dyn InAppNotifier> = Arc::new(PortalNotifier::new(db.clone()));

    let (jobs, rx) = JobsState::new();
    tokio::spawn(start_job_updater(jobs.clone(), rx));

    let state = PortalState::new(
        db,
        media,
        jobs,
        Arc::new(converter),
        Notifications::new(mailer, in_app, mail),
    );
    Portal { dir, state }
}

impl Portal {
    pub fn seed_program(&self) {
        let conn = self.state.db.open().expect("open");
        conn.execute(
            "INSERT OR IGNORE INTO programs (id, name, code, min_years, max_years, tuition_fee)
             VALUES (?1, 'Bachelor of Science in Nursing', 'BSN', 4, 6, 'UGX 1,850,000')",
            params![PROGRAM_ID],
        )
        .expect("program");
        conn.execute(
            "INSERT OR IGNORE INTO campuses (id, name, code) VALUES (1, 'Main Campus', 'MC')",
            [],
        )
        .expect("campus");
    }

    pub fn seed_applicant(&self, applicant_id: i64) {
        let conn = self.state.db.open().expect("open");
        conn.execute(
            "INSERT INTO applications (id, first_name, last_name, email, study_mode, status)
             VALUES (?1, 'Amina', 'Nakato', ?2, 'Day', 'Pending')",
            params![applicant_id, format!("applicant{applicant_id}@example.org")],
        )
        .expect("application");
    }

    pub fn seed_admitted(&self, applicant_id: i64) {
        self.seed_program();
        self.seed_applicant(applicant_id);
        let conn = self.state.db.open().expect("open");
        conn.execute(
            "INSERT INTO admitted_students
                (application_id, student_id, reg_no, admitted_program_id, admitted_campus_id, admission_date)
             VALUES (?1, '2500001', '25/U/0001', ?2, 1, '2025-08-04')",
            params![applicant_id, PROGRAM_ID],
        )
        .expect("admission");
    }

    /// Stores an active template for the seeded program.
    pub fn seed_template(&self) {
        self.seed_template_file(&letter_template());
    }

    /// Stores `document` as the active template for the seeded program.
    pub fn seed_template_file(&self, document: &[u8]) {
        let stored = self
            .state
            .media
            .save("offer_templates/seeded.docx", document)
            .expect("template file");
        let mut conn = self.state.db.open().expect("open");
        store::insert(
            &mut conn,
            NewTemplate {
                name: "Undergraduate offer".to_string(),
                file_path: stored.relative_path,
                file_url: stored.url,
                status: TemplateStatus::Active,
                programs: vec![PROGRAM_ID],
                uploaded_at: Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap(),
            },
        )
        .expect("template row");
    }

    pub fn media_file(&self, relative: &str) -> std::path::PathBuf {
        self.state.media.absolute(relative)
    }

    /// Waits until no run holds the applicant's lease.
    pub async fn wait_until_idle(&self, applicant_id: i64) {
        for _ in 0..250 {
            if !self.state.jobs.is_running(applicant_id) {
                return;
            }
            actix_web::rt::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("offer letter run for applicant {applicant_id} did not finish");
    }

    pub fn count(&self, sql: &str) -> i64 {
        let conn = self.state.db.open().expect("open");
        conn.query_row(sql, [], |row| row.get(0)).expect("count")
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// A DOCX offer letter using a few of the known placeholders.
pub fn letter_template() -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer
        .start_file("[Content_Types].xml", options)
        .expect("content types");
    writer
        .write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
        .expect("write");
    writer.start_file("word/document.xml", options).expect("document");
    writer
        .write_all(
            br#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Dear {{ full_name }}, you are admitted to {{ program_name }} ({{ reg_no }}).</w:t></w:r></w:p></w:body></w:document>"#,
        )
        .expect("write");
    writer.finish().expect("finish").into_inner()
}
