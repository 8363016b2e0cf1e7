//! Body rendering and attachment extraction.

use mailgate_mime::Message;
use tracing::info;

use crate::Result;

/// A decoded attachment ready for relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name, if the part declares one.
    pub filename: Option<String>,
    /// Decoded content. Never empty.
    pub content: Vec<u8>,
    /// MIME type, e.g. `application/pdf`.
    pub mimetype: String,
}

/// Escape text for inclusion in an HTML document.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the message body as a complete HTML document.
///
/// HTML bodies are embedded as they are. Plain text is escaped first.
///
/// # Errors
///
/// Returns an error if the body part has an invalid content type or cannot
/// be transfer-decoded.
pub fn build_email_body(message: &Message) -> Result<String> {
    let content = match message.preferred_body()? {
        Some(body) if body.is_html() => body.text,
        Some(body) => escape_html(&body.text),
        None => String::new(),
    };

    Ok(format!(
        "<html>
  <head>
    <meta charset=\"UTF-8\">
    <title>Email Content</title>
  </head>
  <body>
    {content}
  </body>
</html>"
    ))
}

/// Decode every attachment part, in message order.
///
/// Parts that decode to nothing, or fail to decode, are skipped.
#[must_use]
pub fn extract_attachments(message: &Message) -> Vec<Attachment> {
    let mut attachments = Vec::new();

    for part in message.attachments() {
        let filename = part.filename();
        let content = match part.decode_body() {
            Ok(content) if !content.is_empty() => content,
            Ok(_) => {
                info!("Skipping attachment {filename:?}: no content");
                continue;
            }
            Err(e) => {
                info!("Skipping attachment {filename:?}: {e}");
                continue;
            }
        };

        let mimetype = part.content_type().mime_type();

        attachments.push(Attachment {
            filename,
            content,
            mimetype,
        });
    }

    attachments
}
