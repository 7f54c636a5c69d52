use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport as _};
use quick_xml::escape::escape;
use std::fmt::Write as _;
use tracing::{debug, info};

use crate::config::EmailConfig;

use super::client::{RankedOccupation, SkillsMatchResult};

pub const EMAIL_SUBJECT: &str = "Work4Success: Your Results from the CWC Survey";

const JOB_PROFILE_URL: &str =
    "https://www.careeronestop.org/Toolkit/Careers/Occupations/occupation-profile.aspx";

const INTRO_TEXT: &str = "Thank you for completing the CWC survey!
Based on how you rated your skills, these are the jobs that match you best.
Follow a job title to learn more about the work, the pay and how to get started.";

const TABLE_HEADERS: [&str; 5] = [
    "Your Match Rank",
    "Job Title",
    "Typical Wages (Annual)",
    "Typical Education",
    "Link",
];
const HEADER_STYLE: &str = "font-weight: bold; font-size: 20px;";
const CELL_STYLE: &str = "font-weight: normal; font-size: 16px;";
const MESSAGE_STYLE: &str = "font-weight: bold; font-style: italic; font-size: 16px;";
const SECTION_SEPARATOR: &str = "<br><hr><br>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub html_body: String,
    pub table_html: String,
}

/// Public occupation profile page for a recommended job.
pub fn create_job_url(job_title: &str, onet_code: &str) -> String {
    format!(
        "{JOB_PROFILE_URL}?keyword={}&location=US&lang=en&onetCode={onet_code}",
        urlencoding::encode(job_title)
    )
}

/// `$61,190` style whole-dollar amount.
pub fn format_wage(wage: Option<f64>) -> String {
    let Some(wage) = wage.filter(|wage| wage.is_finite()) else {
        return "N/A".to_string();
    };
    let dollars = wage.round().abs() as u64;
    let digits = dollars.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if wage < 0.0 && dollars > 0 { "-" } else { "" };
    format!("{sign}${grouped}")
}

fn table_row(job: &RankedOccupation) -> [String; 5] {
    let url = create_job_url(&job.occupation_title, &job.onet_code);
    [
        job.rank.to_string(),
        format!(
            "<a href=\"{}\">{}</a>",
            escape(url.as_str()),
            escape(job.occupation_title.as_str())
        ),
        format_wage(job.annual_wages),
        escape(job.typical_education.as_deref().unwrap_or("N/A")).into_owned(),
        escape(url.as_str()).into_owned(),
    ]
}

/// Builds the recommendation email; `None` when there is nothing to send.
pub fn compose_email(
    result: &SkillsMatchResult,
    max_recommendations: usize,
) -> Option<EmailMessage> {
    let jobs = &result.ranked[..result.ranked.len().min(max_recommendations)];
    if jobs.is_empty() {
        return None;
    }

    let mut table_html = String::from("<table><tr>");
    for header in TABLE_HEADERS {
        let _ = write!(table_html, "<th style='{HEADER_STYLE}'>{header}</th>");
    }
    table_html.push_str("</tr>");
    for job in jobs {
        table_html.push_str("<tr>");
        for cell in table_row(job) {
            let _ = write!(table_html, "<td style='{CELL_STYLE}'>{cell}</td>");
        }
        table_html.push_str("</tr>");
    }
    table_html.push_str("</table>");

    let message_text = INTRO_TEXT.replace('\n', "<br>");
    let html_body = format!(
        "<div style=\"{MESSAGE_STYLE}\">{message_text}{SECTION_SEPARATOR}</div>{table_html}"
    );

    Some(EmailMessage {
        subject: EMAIL_SUBJECT.to_string(),
        html_body,
        table_html,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid email address {address}: {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },
    #[error("could not build email message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Outbound delivery of a composed email.
pub trait Mailer: Send + Sync {
    fn send(
        &self,
        response_id: &str,
        recipient: &str,
        message: &EmailMessage,
    ) -> Result<(), NotifyError>;
}

/// STARTTLS submission with basic credentials.
pub struct SmtpMailer {
    transport: SmtpTransport,
    sender: String,
}

impl SmtpMailer {
    pub fn from_config(config: &EmailConfig) -> Result<Self, NotifyError> {
        let transport = SmtpTransport::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(Credentials::new(config.sender.clone(), config.password.clone()))
            .build();
        Ok(Self {
            transport,
            sender: config.sender.clone(),
        })
    }
}

fn mailbox(address: &str) -> Result<lettre::message::Mailbox, NotifyError> {
    address.parse().map_err(|source| NotifyError::Address {
        address: address.to_string(),
        source,
    })
}

impl Mailer for SmtpMailer {
    fn send(
        &self,
        response_id: &str,
        recipient: &str,
        message: &EmailMessage,
    ) -> Result<(), NotifyError> {
        let email = Message::builder()
            .from(mailbox(&self.sender)?)
            .to(mailbox(recipient)?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())?;

        self.transport.send(&email)?;
        info!(response_id, recipient, "recommendation email sent");
        Ok(())
    }
}

/// Logs instead of sending; used in test mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunMailer;

impl Mailer for DryRunMailer {
    fn send(
        &self,
        response_id: &str,
        recipient: &str,
        message: &EmailMessage,
    ) -> Result<(), NotifyError> {
        debug!(
            response_id,
            recipient,
            subject = %message.subject,
            "test mode, skipping email send"
        );
        Ok(())
    }
}
