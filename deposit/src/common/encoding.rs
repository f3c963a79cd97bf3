use std::fmt::Write;

#[inline]
fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(byte, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
}

/// Percent-encodes a key segment so that it can never contain the `:` separator.
///
/// The unreserved set matches URI component encoding; every other byte of the UTF-8
/// representation becomes `%XX`.
pub fn percent_encode(segment: &str) -> String {
    // Fast path: nothing to escape
    if segment.bytes().all(is_unreserved) {
        return segment.to_string();
    }

    let mut encoded = String::with_capacity(segment.len() * 3);
    for byte in segment.bytes() {
        if is_unreserved(byte) {
            encoded.push(byte as char);
        } else {
            // writing into a String cannot fail
            let _ = write!(encoded, "%{:02X}", byte);
        }
    }
    encoded
}
