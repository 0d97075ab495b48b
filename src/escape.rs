//! Filename-safe encoding of path components.
//!
//! The server hosts every object file under an escaped stem followed by its unmodified
//! extension.  The encoding must be byte-for-byte identical on both sides: the publisher writes
//! escaped names and the metadata view reconstructs the same names when it builds object keys.

use std::string::FromUtf8Error;

fn is_word_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Escapes a string so that it can be used as a file name.
///
/// ASCII letters, digits and `_` are kept as they are.  Every other byte (including each byte of
/// a multi-byte UTF-8 sequence) is written as `%` followed by two uppercase hex digits.
pub fn escape_for_file_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for &byte in name.as_bytes() {
        if is_word_char(byte) {
            escaped.push(byte as char);
        } else {
            escaped.push('%');
            escaped.push_str(&hex::encode_upper([byte]));
        }
    }
    escaped
}

/// Reverses [`escape_for_file_name`].
///
/// A `%` that isn't followed by two hex digits is kept literally, so this accepts any input.  It
/// fails only if the decoded bytes are not valid UTF-8.
pub fn unescape_for_file_name(escaped: &str) -> Result<String, FromUtf8Error> {
    let bytes = escaped.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] == b'%' {
            let mut byte = [0u8];
            if let Some(digits) = bytes.get(pos + 1..pos + 3) {
                if hex::decode_to_slice(digits, &mut byte).is_ok() {
                    decoded.push(byte[0]);
                    pos += 3;
                    continue;
                }
            }
        }
        decoded.push(bytes[pos]);
        pos += 1;
    }

    String::from_utf8(decoded)
}
