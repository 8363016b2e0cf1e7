//! Transfer and header decoding.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 encoded words, and charset
//! conversion to UTF-8.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use encoding_rs::{Encoding, UTF_8};

/// Decodes Base64 data.
///
/// Whitespace (line breaks inside a MIME body) is ignored.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045) into raw bytes.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(data: impl AsRef<[u8]>) -> Result<Vec<u8>> {
    let bytes = data.as_ref();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'=' {
            result.push(bytes[i]);
            i += 1;
            continue;
        }

        // Soft line break
        match bytes.get(i + 1..) {
            Some([b'\r', b'\n', ..]) => {
                i += 3;
                continue;
            }
            Some([b'\n', ..]) => {
                i += 2;
                continue;
            }
            _ => {}
        }

        let hex = bytes
            .get(i + 1..i + 3)
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        let hex = std::str::from_utf8(hex)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        let byte = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        result.push(byte);
        i += 3;
    }

    Ok(result)
}

/// Decodes bytes in the named charset.
///
/// Unknown or missing labels read as UTF-8, and so does `us-ascii`, since
/// mislabelled UTF-8 is far more common than real 7-bit text. Invalid
/// sequences become U+FFFD.
#[must_use]
pub fn decode_charset(charset: Option<&str>, bytes: &[u8]) -> String {
    let encoding = charset
        .map(str::trim)
        .filter(|label| {
            !label.eq_ignore_ascii_case("us-ascii") && !label.eq_ignore_ascii_case("ascii")
        })
        .and_then(|label| Encoding::for_label_no_replacement(label.as_bytes()))
        .unwrap_or(UTF_8);
    encoding.decode_with_bom_removal(bytes).0.into_owned()
}

/// Decodes an RFC 2047 encoded header value.
///
/// Each `=?charset?encoding?encoded-text?=` word is decoded on its own.
/// Whitespace between two adjacent encoded words is dropped; everything
/// else is kept as written.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text.trim();
    let mut space = "";
    let mut after_word = false;

    while !rest.is_empty() {
        let token_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (token, tail) = rest.split_at(token_end);
        let space_end = tail
            .find(|c: char| !c.is_whitespace())
            .unwrap_or(tail.len());
        let (next_space, tail) = tail.split_at(space_end);

        match decode_encoded_word(token)? {
            Some(decoded) => {
                if !after_word {
                    out.push_str(space);
                }
                out.push_str(&decoded);
                after_word = true;
            }
            None => {
                out.push_str(space);
                out.push_str(token);
                after_word = false;
            }
        }

        space = next_space;
        rest = tail;
    }

    Ok(out)
}

/// Decodes one encoded word, or returns `None` if `word` is plain text.
fn decode_encoded_word(word: &str) -> Result<Option<String>> {
    let Some(inner) = word.strip_prefix("=?").and_then(|w| w.strip_suffix("?=")) else {
        return Ok(None);
    };

    let mut parts = inner.split('?');
    let (Some(charset), Some(encoding), Some(encoded_text), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::InvalidEncoding(format!(
            "Invalid RFC 2047 word: {word}"
        )));
    };

    let decoded = match encoding.to_uppercase().as_str() {
        "B" => decode_base64(encoded_text)?,
        // Q encoding uses underscore for space
        "Q" => decode_quoted_printable(encoded_text.replace('_', " "))?,
        other => {
            return Err(Error::InvalidEncoding(format!(
                "Unknown encoding: {other}"
            )));
        }
    };

    // RFC 2231 language suffix: `utf-8*en`
    let charset = charset.split('*').next().unwrap_or(charset);
    Ok(Some(decode_charset(Some(charset), &decoded)))
}
