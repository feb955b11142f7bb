//! Tells an applicant that their offer letter is ready.
//!
//! Email goes to the `mail_outbox` table, which the portal's mail relay
//! drains; the in-app message goes to `portal_notifications`. Both sit
//! behind traits so the pipeline can be driven with other channels.

use crate::config::MailConfig;
use crate::db::{now, Database, StorageError};
use log::info;
use rusqlite::params;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("invalid recipient address '{recipient}'")]
    InvalidRecipient { recipient: String },
    #[error("notification channel failed: {0}")]
    Channel(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<rusqlite::Error> for NotificationError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Sqlite(err))
    }
}

/// What the applicant is told about.
#[derive(Debug, Clone)]
pub struct OfferNotice {
    pub applicant_id: i64,
    pub recipient: String,
    pub full_name: String,
    pub program_name: String,
    /// Media-relative path of the PDF to attach.
    pub attachment: String,
    pub pdf_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<String>,
}

pub trait Mailer: Send + Sync {
    fn send(&self, message: &MailMessage) -> Result<(), NotificationError>;
}

pub trait InAppNotifier: Send + Sync {
    fn notify(&self, applicant_id: i64, title: &str, message: &str) -> Result<(), NotificationError>;
}

/// Queues mail in the `mail_outbox` table.
#[derive(Debug, Clone)]
pub struct OutboxMailer {
    db: Database,
}

impl OutboxMailer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, message: &MailMessage) -> Result<(), NotificationError> {
        if !is_plausible_address(&message.to) {
            return Err(NotificationError::InvalidRecipient {
                recipient: message.to.clone(),
            });
        }
        let conn = self.db.open()?;
        conn.execute(
            "INSERT INTO mail_outbox (sender, recipient, subject, body, attachment, queued_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.from,
                message.to,
                message.subject,
                message.body,
                message.attachment,
                now()
            ],
        )?;
        info!("queued mail '{}' for {}", message.subject, message.to);
        Ok(())
    }
}

/// Writes portal notifications shown on the applicant dashboard.
#[derive(Debug, Clone)]
pub struct PortalNotifier {
    db: Database,
}

impl PortalNotifier {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl InAppNotifier for PortalNotifier {
    fn notify(&self, applicant_id: i64, title: &str, message: &str) -> Result<(), NotificationError> {
        let conn = self.db.open()?;
        conn.execute(
            "INSERT INTO portal_notifications (application_id, title, message, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![applicant_id, title, message, now()],
        )?;
        Ok(())
    }
}

/// Both notification channels plus the sender identity.
#[derive(Clone)]
pub struct Notifications {
    mailer: Arc<dyn Mailer>,
    in_app: Arc<dyn InAppNotifier>,
    mail: MailConfig,
}

impl Notifications {
    pub fn new(mailer: Arc<dyn Mailer>, in_app: Arc<dyn InAppNotifier>, mail: MailConfig) -> Self {
        Self {
            mailer,
            in_app,
            mail,
        }
    }

    /// Database-backed channels.
    pub fn portal(db: &Database, mail: MailConfig) -> Self {
        Self::new(
            Arc::new(OutboxMailer::new(db.clone())),
            Arc::new(PortalNotifier::new(db.clone())),
            mail,
        )
    }

    /// Sends the email, then the in-app notification. The first failure
    /// stops delivery.
    pub fn deliver(&self, notice: &OfferNotice) -> Result<(), NotificationError> {
        let institution = &self.mail.institution;
        let message = MailMessage {
            from: self.mail.from.clone(),
            to: notice.recipient.clone(),
            subject: format!("Your offer of admission to {institution}"),
            body: format!(
                "Dear {},\n\n\
                 Congratulations! You have been admitted to {} at {}.\n\
                 Your offer letter is attached and can also be downloaded from the portal.\n\n\
                 Admissions Office\n{}",
                notice.full_name, notice.program_name, institution, institution
            ),
            attachment: Some(notice.attachment.clone()),
        };
        self.mailer.send(&message)?;

        self.in_app.notify(
            notice.applicant_id,
            "Offer letter ready",
            &format!(
                "Your offer letter for {} is ready: {}",
                notice.program_name, notice.pdf_url
            ),
        )
    }
}

fn is_plausible_address(address: &str) -> bool {
    match address.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}
