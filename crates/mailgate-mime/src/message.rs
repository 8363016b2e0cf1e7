//! MIME message structure and parsing.

use crate::content_type::ContentType;
use crate::disposition::ContentDisposition;
use crate::encoding::{decode_base64, decode_charset, decode_quoted_printable, decode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;
use tracing::warn;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }

    /// Reads the encoding from a header block, defaulting to 7bit.
    fn from_headers(headers: &Headers) -> Self {
        headers
            .get("content-transfer-encoding")
            .map_or(Self::SevenBit, Self::parse)
    }

    /// Decodes a raw body according to this encoding.
    fn decode(self, body: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(&String::from_utf8_lossy(body)),
            Self::QuotedPrintable => decode_quoted_printable(body),
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(body.to_vec()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Content type of a header block.
///
/// A missing header is `text/plain`. An unparsable one falls back to
/// `application/octet-stream` for attachments and `text/plain` otherwise.
fn content_type_of(headers: &Headers) -> ContentType {
    let Some(value) = headers.get("content-type") else {
        return ContentType::text_plain();
    };

    ContentType::parse(value).unwrap_or_else(|e| {
        let attachment = headers
            .get("content-disposition")
            .map(ContentDisposition::parse)
            .is_some_and(|d| d.is_attachment());
        let fallback = if attachment {
            ContentType::new("application", "octet-stream")
        } else {
            ContentType::text_plain()
        };
        warn!("{e}, treating part as {fallback}");
        fallback
    })
}

/// Decodes body bytes to text using the declared charset.
fn decode_text(content_type: &ContentType, bytes: &[u8]) -> String {
    decode_charset(content_type.charset(), bytes)
}

/// A decoded text body together with the content type it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBody {
    /// Content type of the part the text was taken from.
    pub content_type: ContentType,
    /// Decoded text.
    pub text: String,
}

impl TextBody {
    /// Returns true if the text is HTML.
    #[must_use]
    pub fn is_html(&self) -> bool {
        self.content_type.is_html()
    }
}

/// MIME message part.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body (raw bytes, still transfer-encoded). Empty for multiparts.
    pub body: Vec<u8>,
    /// Child parts when this part is itself a multipart.
    pub parts: Vec<Part>,
}

impl Part {
    /// Creates a new leaf part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self {
            headers,
            body,
            parts: Vec::new(),
        }
    }

    /// Parses a part from its raw bytes (headers, blank line, body).
    ///
    /// Never fails: a nested multipart that cannot be split is kept as a
    /// leaf holding its raw body.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let (head, body) = split_head_body(raw);
        let headers = Headers::parse(&String::from_utf8_lossy(head));
        let content_type = content_type_of(&headers);

        if content_type.is_multipart() {
            match parse_multipart(&content_type, body) {
                Ok(parts) => {
                    return Self {
                        headers,
                        body: Vec::new(),
                        parts,
                    };
                }
                Err(e) => warn!("Keeping nested {content_type} as a single part: {e}"),
            }
        }

        Self::new(headers, body.to_vec())
    }

    /// Gets the content type.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        content_type_of(&self.headers)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        TransferEncoding::from_headers(&self.headers)
    }

    /// Gets the Content-Disposition, if present.
    #[must_use]
    pub fn disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .map(ContentDisposition::parse)
    }

    /// Returns true if this part is flagged as an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition()
            .is_some_and(|d| d.is_attachment())
    }

    /// Returns the attachment filename.
    ///
    /// Reads the Content-Disposition `filename` parameter, falling back to
    /// the Content-Type `name` parameter. Encoded words are decoded.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        let raw = self
            .disposition()
            .and_then(|d| d.filename().map(ToString::to_string))
            .or_else(|| self.content_type().name().map(ToString::to_string))?;

        Some(decode_rfc2047(&raw).unwrap_or(raw))
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        self.transfer_encoding().decode(&self.body)
    }

    /// Gets the decoded body as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or UTF-8 conversion fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        String::from_utf8(decoded).map_err(Into::into)
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Self>) {
        if self.parts.is_empty() {
            out.push(self);
        } else {
            for part in &self.parts {
                part.collect_leaves(out);
            }
        }
    }
}

/// MIME message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    /// Message parts (empty for single-part messages).
    pub parts: Vec<Part>,
    /// Body for single-part messages.
    pub body: Option<Vec<u8>>,
}

impl Message {
    /// Creates a single-part message.
    #[must_use]
    pub const fn single_part(headers: Headers, body: Vec<u8>) -> Self {
        Self {
            headers,
            parts: Vec::new(),
            body: Some(body),
        }
    }

    /// Creates a multipart message.
    #[must_use]
    pub const fn multipart(headers: Headers, parts: Vec<Part>) -> Self {
        Self {
            headers,
            parts,
            body: None,
        }
    }

    /// Parses a raw RFC 5322 message.
    ///
    /// Bodies are kept as bytes, so 8bit content in any charset survives
    /// until it is decoded. Unparsable content types fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is multipart but its body lacks a
    /// usable boundary.
    pub fn parse(raw: impl AsRef<[u8]>) -> Result<Self> {
        let (head, body) = split_head_body(raw.as_ref());
        let headers = Headers::parse(&String::from_utf8_lossy(head));
        let content_type = content_type_of(&headers);

        if content_type.is_multipart() {
            let parts = parse_multipart(&content_type, body)?;
            Ok(Self::multipart(headers, parts))
        } else {
            Ok(Self::single_part(headers, body.to_vec()))
        }
    }

    /// Gets the content type.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        content_type_of(&self.headers)
    }

    /// Checks if this is a multipart message.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.content_type().is_multipart()
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Gets the body as text for single-part messages.
    ///
    /// # Errors
    ///
    /// Returns an error if this is a multipart message or decoding fails.
    pub fn body_text(&self) -> Result<String> {
        let body = self.body.as_ref().ok_or_else(|| {
            Error::InvalidMultipart("Use parts for multipart messages".to_string())
        })?;

        let decoded = TransferEncoding::from_headers(&self.headers).decode(body)?;
        String::from_utf8(decoded).map_err(Into::into)
    }

    /// Returns every leaf part in document order (depth-first).
    #[must_use]
    pub fn leaves(&self) -> Vec<&Part> {
        let mut out = Vec::new();
        for part in &self.parts {
            part.collect_leaves(&mut out);
        }
        out
    }

    /// Returns the leaf parts flagged as attachments, in document order.
    pub fn attachments(&self) -> impl Iterator<Item = &Part> {
        self.leaves().into_iter().filter(|part| part.is_attachment())
    }

    /// Returns the preferred body: HTML first, then plain text.
    ///
    /// Attachment parts are never considered. Returns `None` when the
    /// message carries no text body. Text is decoded with the part's
    /// charset; unknown charsets are read as UTF-8, replacing bad bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen part cannot be transfer-decoded.
    pub fn preferred_body(&self) -> Result<Option<TextBody>> {
        if let Some(body) = &self.body {
            let content_type = self.content_type();
            if !(content_type.is_html() || content_type.is_plain()) {
                return Ok(None);
            }
            let decoded = TransferEncoding::from_headers(&self.headers).decode(body)?;
            return Ok(Some(TextBody {
                text: decode_text(&content_type, &decoded),
                content_type,
            }));
        }

        let mut html = None;
        let mut plain = None;
        for part in self.leaves() {
            if part.is_attachment() {
                continue;
            }
            let content_type = part.content_type();
            if html.is_none() && content_type.is_html() {
                html = Some((part, content_type));
            } else if plain.is_none() && content_type.is_plain() {
                plain = Some((part, content_type));
            }
        }

        html.or(plain)
            .map(|(part, content_type)| -> Result<TextBody> {
                let decoded = part.decode_body()?;
                Ok(TextBody {
                    text: decode_text(&content_type, &decoded),
                    content_type,
                })
            })
            .transpose()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Splits raw bytes at the first blank line into (headers, body).
fn split_head_body(raw: &[u8]) -> (&[u8], &[u8]) {
    if let Some(rest) = raw.strip_prefix(b"\r\n").or_else(|| raw.strip_prefix(b"\n")) {
        return (&[], rest);
    }

    let crlf = find(raw, b"\r\n\r\n").map(|i| (i, 4));
    let lf = find(raw, b"\n\n").map(|i| (i, 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match split {
        Some((index, len)) => (&raw[..index], &raw[index + len..]),
        None => (raw, &[]),
    }
}

fn parse_multipart(content_type: &ContentType, body: &[u8]) -> Result<Vec<Part>> {
    let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
    Ok(split_multipart(body, boundary)?
        .into_iter()
        .map(Part::parse)
        .collect())
}

/// Splits a multipart body into the raw bytes of each part.
///
/// The line break before a delimiter belongs to the delimiter. Preamble and
/// epilogue are dropped. A body that ends without the close delimiter keeps
/// its last part.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let delimiter = format!("--{boundary}");
    let close = format!("--{boundary}--");

    let mut sections = Vec::new();
    let mut current: Option<usize> = None;
    let mut seen_delimiter = false;
    let mut offset = 0;

    for line in body.split_inclusive(|&b| b == b'\n') {
        let trimmed = line.trim_ascii_end();
        let is_close = trimmed == close.as_bytes();

        if is_close || trimmed == delimiter.as_bytes() {
            seen_delimiter = true;
            if let Some(start) = current.take() {
                sections.push(strip_line_break(&body[start..offset]));
            }
            if is_close {
                return Ok(sections);
            }
            current = Some(offset + line.len());
        }

        offset += line.len();
    }

    if !seen_delimiter {
        return Err(Error::InvalidMultipart(format!(
            "no part delimited by {delimiter}"
        )));
    }

    if let Some(start) = current {
        sections.push(&body[start..]);
    }

    Ok(sections)
}

fn strip_line_break(s: &[u8]) -> &[u8] {
    s.strip_suffix(b"\r\n")
        .or_else(|| s.strip_suffix(b"\n"))
        .unwrap_or(s)
}
