//! Relay plan assembly.

use anyhow::{Context, Result};
use mailgate_core::{
    MailGateway, UserAccount, addresses_from_header, build_email_body, extract_attachments,
    parse_sender_email,
};
use mailgate_mime::Message;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use crate::cli::RelayArgs;

/// Everything needed to forward one inbound message.
#[derive(Debug, Serialize)]
pub struct RelayPlan {
    pub subject: Option<String>,
    pub sender_address: Option<String>,
    pub sender: Option<SenderSummary>,
    pub recipients: Vec<String>,
    pub attachments: Vec<AttachmentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SenderSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl From<UserAccount> for SenderSummary {
    fn from(user: UserAccount) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            roles: user.roles.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttachmentSummary {
    pub filename: Option<String>,
    pub mimetype: String,
    pub size: usize,
}

/// Read the raw message from a file or stdin.
async fn read_message(args: &RelayArgs) -> Result<Vec<u8>> {
    match &args.file {
        Some(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read message from stdin")?;
            Ok(buf)
        }
    }
}

pub async fn plan(gateway: &MailGateway, args: &RelayArgs) -> Result<RelayPlan> {
    let raw = read_message(args).await?;
    let message = Message::parse(&raw).context("Failed to parse message")?;

    let candidates = if args.recipients.is_empty() {
        message
            .headers
            .get_all("to")
            .into_iter()
            .chain(message.headers.get_all("cc"))
            .flat_map(addresses_from_header)
            .collect()
    } else {
        args.recipients.clone()
    };
    let recipients = gateway.resolve_recipients(&candidates).await?;

    let sender_address = parse_sender_email(message.from())?;
    let sender = match &sender_address {
        Some(address) => gateway.lookup_sender(address).await?,
        None => {
            warn!("Message has no sender");
            None
        }
    };

    let attachments = extract_attachments(&message)
        .into_iter()
        .map(|a| AttachmentSummary {
            size: a.content.len(),
            filename: a.filename,
            mimetype: a.mimetype,
        })
        .collect();

    let body = if args.print_body {
        Some(build_email_body(&message)?)
    } else {
        None
    };

    info!(
        "Planned relay to {} recipient(s), sender {}",
        recipients.len(),
        sender.as_ref().map_or("unknown", |s| s.username.as_str())
    );

    Ok(RelayPlan {
        subject: message.subject().map(ToString::to_string),
        sender_address,
        sender: sender.map(SenderSummary::from),
        recipients,
        attachments,
        body,
    })
}
