//! Incremental UTF-8 decoding for byte streams that split characters across
//! reads (PTY output, HTTP chunks).

/// Lossy UTF-8 decoder that carries an incomplete trailing sequence over to
/// the next chunk instead of replacing it.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, prefixed by any carried-over partial sequence.
    ///
    /// Invalid sequences become U+FFFD. A truncated sequence at the end is
    /// held back until the next call or [`finish`](Self::finish).
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        let mut start = 0;

        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(text) => {
                    out.push_str(text);
                    start = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid_end = start + err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + bad;
                        }
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
        out
    }

    /// Flush whatever is still pending, replacing it lossily.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }

    /// Whether a partial sequence is being held back.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.push(b"hello"), "hello");
        assert!(!d.has_pending());
    }

    #[test]
    fn split_multibyte_is_reassembled() {
        let bytes = "héllo".as_bytes();
        let mut d = Utf8Decoder::new();
        // 'é' is two bytes starting at index 1.
        assert_eq!(d.push(&bytes[..2]), "h");
        assert!(d.has_pending());
        assert_eq!(d.push(&bytes[2..]), "éllo");
        assert!(!d.has_pending());
    }

    #[test]
    fn invalid_byte_is_replaced_and_decoding_continues() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.push(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn finish_flushes_truncated_tail() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.push(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(d.finish(), "\u{FFFD}");
        assert!(!d.has_pending());
    }
}
