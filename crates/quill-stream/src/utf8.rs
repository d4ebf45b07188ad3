//! Incremental UTF-8 decoding across read boundaries.

const REPLACEMENT: char = '\u{FFFD}';

/// Turns byte chunks into text without splitting a multi-byte character.
///
/// An incomplete sequence at the end of a chunk is held back until the next
/// chunk completes it. Invalid sequences are replaced with U+FFFD rather than
/// dropping the whole chunk.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    // At most 3 bytes: the longest proper prefix of a 4-byte sequence.
    carry: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, returning every complete character it finishes.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let joined;
        let mut input: &[u8] = if self.carry.is_empty() {
            chunk
        } else {
            self.carry.extend_from_slice(chunk);
            joined = std::mem::take(&mut self.carry);
            &joined
        };

        let mut out = String::with_capacity(input.len());
        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(bad) => {
                            out.push(REPLACEMENT);
                            input = &rest[bad..];
                        }
                        None => {
                            // truncated sequence at the end: wait for more bytes
                            self.carry.extend_from_slice(rest);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// End of stream: a dangling partial character becomes U+FFFD.
    pub fn finish(&mut self) -> Option<String> {
        if self.carry.is_empty() {
            None
        } else {
            self.carry.clear();
            Some(REPLACEMENT.to_string())
        }
    }

    /// Bytes currently held back waiting for the rest of a character.
    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        let mut dec = Utf8Decoder::new();
        assert_eq!(dec.decode(b"hello"), "hello");
        assert_eq!(dec.pending_bytes(), 0);
    }

    #[test]
    fn multibyte_split_across_chunks() {
        let bytes = "日本".as_bytes(); // 6 bytes
        let mut dec = Utf8Decoder::new();
        assert_eq!(dec.decode(&bytes[..1]), "");
        assert_eq!(dec.pending_bytes(), 1);
        assert_eq!(dec.decode(&bytes[1..4]), "日");
        assert_eq!(dec.decode(&bytes[4..]), "本");
        assert_eq!(dec.finish(), None);
    }

    #[test]
    fn four_byte_char_one_byte_at_a_time() {
        let bytes = "🦀".as_bytes();
        let mut dec = Utf8Decoder::new();
        let mut out = String::new();
        for b in bytes {
            out.push_str(&dec.decode(std::slice::from_ref(b)));
        }
        assert_eq!(out, "🦀");
    }

    #[test]
    fn invalid_byte_is_replaced_not_dropped() {
        let mut dec = Utf8Decoder::new();
        assert_eq!(dec.decode(b"ab\xffcd"), "ab\u{FFFD}cd");
    }

    #[test]
    fn dangling_tail_flushed_as_replacement() {
        let mut dec = Utf8Decoder::new();
        assert_eq!(dec.decode(&"é".as_bytes()[..1]), "");
        assert_eq!(dec.finish().as_deref(), Some("\u{FFFD}"));
        assert_eq!(dec.pending_bytes(), 0);
    }
}
