//! Email delivery of the run report.
//!
//! Credentials come from an INI file (`[credentials] email_address,
//! email_password`). Messages are multipart: a plain-text body followed by
//! every attachment as `application/octet-stream`, sent over STARTTLS.

use crate::report::Report;
use crate::result::{VisregError, VisregResult};
use ini::Ini;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Fixed subject line
pub const REPORT_SUBJECT: &str = "Automated Test Report";

/// Default SMTP relay
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// STARTTLS submission port
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// First line of every report email
pub const BODY_PREAMBLE: &str = "Please find the attached test report and screenshots.";

const CREDENTIALS_SECTION: &str = "credentials";

/// Sender address and password
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpCredentials {
    /// Sender address, also the SMTP user name
    pub email_address: String,
    /// SMTP password
    pub email_password: String,
}

impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("email_address", &self.email_address)
            .field("email_password", &"<redacted>")
            .finish()
    }
}

impl SmtpCredentials {
    /// Read the `[credentials]` section of an INI file
    pub fn load(path: &Path) -> VisregResult<Self> {
        if !path.is_file() {
            return Err(VisregError::config_missing(format!(
                "credentials file {} not found",
                path.display()
            )));
        }
        let ini = Ini::load_from_file(path).map_err(|e| {
            VisregError::config_missing(format!("cannot read {}: {e}", path.display()))
        })?;
        let section = ini.section(Some(CREDENTIALS_SECTION)).ok_or_else(|| {
            VisregError::config_missing(format!(
                "section [{CREDENTIALS_SECTION}] missing in {}",
                path.display()
            ))
        })?;
        let get = |key: &str| {
            section
                .get(key)
                .map(str::to_string)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    VisregError::config_missing(format!(
                        "key {key} missing in [{CREDENTIALS_SECTION}] of {}",
                        path.display()
                    ))
                })
        };
        Ok(Self {
            email_address: get("email_address")?,
            email_password: get("email_password")?,
        })
    }
}

/// Email body: preamble followed by the text report
#[must_use]
pub fn report_body(report: &Report) -> String {
    format!("{BODY_PREAMBLE}\n\n{}", report.render())
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Files to attach for a run
///
/// The spreadsheet and every screenshot of the run are attached when they
/// exist. The highlighted diff is attached only when it is at least as new
/// as the newest screenshot or as the run itself.
#[must_use]
pub fn select_attachments(
    spreadsheet: &Path,
    screenshots: &[PathBuf],
    highlight: &Path,
    run_started: SystemTime,
) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if spreadsheet.is_file() {
        files.push(spreadsheet.to_path_buf());
    }

    let mut latest: Option<SystemTime> = None;
    for shot in screenshots {
        if let Some(time) = modified(shot) {
            latest = Some(latest.map_or(time, |l| l.max(time)));
            files.push(shot.clone());
        }
    }

    if let Some(time) = modified(highlight) {
        let fresh = latest.is_some_and(|l| time >= l) || time >= run_started;
        if fresh {
            files.push(highlight.to_path_buf());
        }
    }
    files
}

/// SMTP settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    /// Relay host
    pub host: String,
    /// Relay port
    pub port: u16,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SMTP_HOST.to_string(),
            port: DEFAULT_SMTP_PORT,
        }
    }
}

/// Report mailer
#[derive(Debug, Clone)]
pub struct Notifier {
    smtp: SmtpConfig,
    credentials: SmtpCredentials,
}

impl Notifier {
    /// Create a notifier
    #[must_use]
    pub const fn new(smtp: SmtpConfig, credentials: SmtpCredentials) -> Self {
        Self { smtp, credentials }
    }

    /// SMTP settings
    #[must_use]
    pub const fn smtp(&self) -> &SmtpConfig {
        &self.smtp
    }

    /// Build the multipart message
    pub fn compose(
        &self,
        subject: &str,
        body: &str,
        recipient: &str,
        attachments: &[PathBuf],
    ) -> VisregResult<Message> {
        let from: Mailbox =
            self.credentials
                .email_address
                .parse()
                .map_err(|e| VisregError::InvalidInput {
                    message: format!("sender address: {e}"),
                })?;
        let to: Mailbox = recipient.parse().map_err(|e| VisregError::InvalidInput {
            message: format!("recipient address {recipient:?}: {e}"),
        })?;
        let octet_stream = ContentType::parse("application/octet-stream").map_err(|e| {
            VisregError::Email {
                message: e.to_string(),
            }
        })?;

        let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(body.to_string()));
        for path in attachments {
            let bytes = std::fs::read(path)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".to_string());
            multipart = multipart.singlepart(Attachment::new(name).body(bytes, octet_stream.clone()));
        }

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(multipart)
            .map_err(|e| VisregError::Email {
                message: e.to_string(),
            })
    }

    /// Compose and deliver over STARTTLS
    pub fn send(
        &self,
        subject: &str,
        body: &str,
        recipient: &str,
        attachments: &[PathBuf],
    ) -> VisregResult<()> {
        let message = self.compose(subject, body, recipient, attachments)?;
        let mailer = SmtpTransport::starttls_relay(&self.smtp.host)
            .map_err(|e| VisregError::Email {
                message: e.to_string(),
            })?
            .port(self.smtp.port)
            .credentials(Credentials::new(
                self.credentials.email_address.clone(),
                self.credentials.email_password.clone(),
            ))
            .build();

        mailer.send(&message).map_err(|e| VisregError::Email {
            message: e.to_string(),
        })?;
        tracing::info!(
            recipient,
            attachments = attachments.len(),
            "report email sent via {}:{}",
            self.smtp.host,
            self.smtp.port
        );
        Ok(())
    }

    /// Send, logging instead of returning failures
    pub fn send_logged(
        &self,
        subject: &str,
        body: &str,
        recipient: &str,
        attachments: &[PathBuf],
    ) -> bool {
        match self.send(subject, body, recipient, attachments) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(recipient, error = %e, "report email not sent");
                false
            }
        }
    }
}
