//! # mailgate-mime
//!
//! MIME parsing for messages arriving at the mailgate relay.
//!
//! ## Features
//!
//! - **Message parsing**: Parse MIME messages, including nested multipart trees
//! - **Decoding**: Base64, Quoted-Printable, RFC 2047 encoded words
//! - **Content types**: Content-Type and Content-Disposition with parameters
//! - **Body selection**: HTML-over-plain preferred body, attachment discovery
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailgate_mime::Message;
//!
//! let raw_message = "From: sender@example.com\r\n\
//!                    To: recipient@example.com\r\n\
//!                    Subject: Test\r\n\
//!                    Content-Type: text/plain\r\n\
//!                    \r\n\
//!                    Hello, World!";
//!
//! let message = Message::parse(raw_message)?;
//! println!("Subject: {}", message.subject().unwrap_or("(no subject)"));
//!
//! if let Some(body) = message.preferred_body()? {
//!     println!("{} body: {}", body.content_type, body.text);
//! }
//!
//! for part in message.attachments() {
//!     println!("attachment: {:?}", part.filename());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod disposition;
mod error;
mod header;
mod message;

pub mod encoding;

pub use content_type::ContentType;
pub use disposition::{ContentDisposition, DispositionKind};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TextBody, TransferEncoding};
