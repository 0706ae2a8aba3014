//! Summary mail for a processed file.
//!
//! The message carries a plain-text summary (chunk count, average score,
//! chunks with detected patterns) and the file's CSV export as an
//! attachment. Delivery goes through the [`Mailer`] trait; [`SmtpMailer`]
//! sends over SMTP with STARTTLS using `[mail]` from the config.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use parallel_text_core::aggregate::{summarize, Summary};
use parallel_text_core::models::ScoredChunk;
use parallel_text_core::Error;

use crate::config::MailConfig;
use crate::export::{export_filename, render_csv};
use crate::pipeline::Pipeline;

/// A fully rendered summary message, independent of transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment_name: String,
    pub attachment_csv: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

pub fn subject_for(file_id: &str) -> String {
    format!("Text Processing Summary - {}", file_id)
}

pub fn summary_body(summary: &Summary) -> String {
    format!(
        "Text Processing Summary for File ID: {}\n\n\
         Total Chunks: {}\n\
         Average Score: {:.2}\n\
         Chunks with Detected Patterns: {}\n\n\
         Attached: Full CSV export of all chunks.\n",
        summary.file_id, summary.total_chunks, summary.average_score, summary.chunks_with_matches
    )
}

/// Reject recipients that are not a parseable mailbox.
pub fn validate_recipient(to: &str) -> parallel_text_core::Result<()> {
    to.parse::<Mailbox>()
        .map(|_| ())
        .map_err(|e| Error::invalid(format!("invalid recipient '{}': {}", to, e)))
}

/// Render the summary message for `rows`.
pub fn compose_summary(file_id: &str, rows: &[ScoredChunk], to: &str) -> Result<OutgoingMail> {
    let summary = summarize(file_id, rows);
    Ok(OutgoingMail {
        to: to.to_string(),
        subject: subject_for(file_id),
        body: summary_body(&summary),
        attachment_name: export_filename(file_id),
        attachment_csv: render_csv(rows)?,
    })
}

/// Build and send the summary mail for `file_id`.
///
/// Shared by `ptx email` and `GET /email_summary`. Checks run in a fixed
/// order: recipient, then file, then whether mail is configured at all.
pub async fn send_summary(
    pipeline: &Pipeline,
    mailer: Option<&dyn Mailer>,
    file_id: &str,
    to: &str,
) -> parallel_text_core::Result<OutgoingMail> {
    validate_recipient(to)?;
    let rows = pipeline.with_scores(file_id).await?;
    let mailer = mailer.ok_or_else(|| {
        Error::invalid("email is not configured; add a [mail] section to the config")
    })?;

    let mail = compose_summary(file_id, &rows, to).map_err(Error::Internal)?;
    mailer
        .send(&mail)
        .await
        .map_err(|e| Error::Internal(e.context("Failed to send email")))?;
    tracing::info!(file_id, to, "summary mail sent");
    Ok(mail)
}

/// SMTP delivery via an async STARTTLS relay.
pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, mail: &OutgoingMail) -> Result<Message> {
        let from: Mailbox = self
            .config
            .from_address()
            .parse()
            .map_err(|e| anyhow!("invalid from address: {}", e))?;
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e| anyhow!("invalid to address: {}", e))?;
        let csv_type = ContentType::parse("text/csv").context("csv content type")?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject.clone())
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(mail.body.clone()))
                    .singlepart(
                        Attachment::new(mail.attachment_name.clone())
                            .body(mail.attachment_csv.clone(), csv_type),
                    ),
            )
            .context("failed to build summary message")
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let message = self.build_message(mail)?;
        let password = self.config.resolved_password().unwrap_or_default();
        let creds = Credentials::new(self.config.username.clone(), password);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
            .with_context(|| format!("SMTP relay {}", self.config.smtp_host))?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build();

        transport
            .send(message)
            .await
            .with_context(|| format!("failed to send email to {}", mail.to))?;
        Ok(())
    }
}
