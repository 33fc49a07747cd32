//! Record framing for the session wire protocol.
//!
//! Envelopes travel as UTF-8 JSON text delimited by a single reserved byte
//! (ASCII BEL, [`RECORD_DELIMITER`]):
//!
//! ```text
//! {"action":"JOIN_ROOM","clientId":0,"roomId":1}<BEL>{"action":"LEAVE_ROOM","clientId":0}<BEL>
//! ```
//!
//! The delimiter is not printable and never occurs inside the JSON text, so
//! it fully determines record boundaries. [`RecordDecoder`] reassembles
//! records from arbitrary byte chunks: a TCP read may deliver half a record,
//! three records, or a record and a half, and the decoder buffers whatever is
//! left over until a later feed completes it.

use anyhow::{bail, Result};

use crate::constants::{MAX_RECORD_SIZE, RECORD_DELIMITER};

/// Encode a serialized envelope into a wire record.
///
/// Appends the record delimiter so the result can be written to the stream
/// in a single call. The payload must not contain the delimiter byte; this
/// is a protocol contract of the JSON text encoding, not checked here.
pub fn encode_record(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 1);
    buf.extend_from_slice(payload);
    buf.push(RECORD_DELIMITER);
    buf
}

/// Incremental record decoder that handles partial reads.
///
/// Feed bytes via [`RecordDecoder::feed`] and extract complete records.
/// Handles TCP-style byte stream reassembly.
#[derive(Debug)]
pub struct RecordDecoder {
    buf: Vec<u8>,
}

impl RecordDecoder {
    /// Create a new decoder with empty buffer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed bytes into the decoder and extract all complete records.
    ///
    /// Returns the payload of every record completed by this chunk, delimiter
    /// excluded, in wire order. Trailing bytes after the last delimiter are
    /// buffered for the next call.
    ///
    /// # Errors
    ///
    /// Returns an error if a record exceeds [`MAX_RECORD_SIZE`]: the peer is
    /// either not speaking this protocol or attempting to exhaust memory, and
    /// the connection should be dropped.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.buf.extend_from_slice(bytes);
        let mut records = Vec::new();

        loop {
            let Some(end) = self.buf.iter().position(|&b| b == RECORD_DELIMITER) else {
                if self.buf.len() > MAX_RECORD_SIZE {
                    bail!(
                        "record too large: {} bytes buffered without a delimiter (max {MAX_RECORD_SIZE})",
                        self.buf.len()
                    );
                }
                break; // Incomplete record, wait for more data
            };

            if end > MAX_RECORD_SIZE {
                bail!("record too large: {end} bytes (max {MAX_RECORD_SIZE})");
            }

            records.push(self.buf[..end].to_vec());

            // Remove consumed bytes including the delimiter
            self.buf.drain(..=end);
        }

        Ok(records)
    }

    /// Returns true if the decoder has buffered partial data.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }
}

impl Default for RecordDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_record_round_trip() {
        let payload = br#"{"action":"LEAVE_ROOM","clientId":3}"#;
        let encoded = encode_record(payload);
        let mut decoder = RecordDecoder::new();
        let records = decoder.feed(&encoded).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], payload);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_multiple_records_in_single_feed() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&encode_record(b"one"));
        buf.extend_from_slice(&encode_record(b"two"));
        buf.extend_from_slice(&encode_record(b"three"));

        let mut decoder = RecordDecoder::new();
        let records = decoder.feed(&buf).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], b"one");
        assert_eq!(records[1], b"two");
        assert_eq!(records[2], b"three");
    }

    #[test]
    fn test_partial_record_reassembly() {
        let encoded = encode_record(br#"{"action":"GET_ROOMS_INFO","clientId":0}"#);
        let mut decoder = RecordDecoder::new();

        // Feed first half
        let mid = encoded.len() / 2;
        let records = decoder.feed(&encoded[..mid]).unwrap();
        assert_eq!(records.len(), 0);
        assert!(decoder.has_partial());

        // Feed second half
        let records = decoder.feed(&encoded[mid..]).unwrap();
        assert_eq!(records.len(), 1);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_byte_at_a_time() {
        let encoded = encode_record(b"x");
        let mut decoder = RecordDecoder::new();
        for (i, byte) in encoded.iter().enumerate() {
            let records = decoder.feed(&[*byte]).unwrap();
            if i < encoded.len() - 1 {
                assert_eq!(records.len(), 0);
            } else {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0], b"x");
            }
        }
    }

    #[test]
    fn test_record_and_a_half_buffers_remainder() {
        let mut buf = encode_record(b"complete");
        buf.extend_from_slice(b"parti");

        let mut decoder = RecordDecoder::new();
        let records = decoder.feed(&buf).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], b"complete");
        assert!(decoder.has_partial());

        let records = decoder.feed(b"al").unwrap();
        assert_eq!(records.len(), 0);
        let records = decoder.feed(&[RECORD_DELIMITER]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], b"partial");
    }

    #[test]
    fn test_empty_record_emitted() {
        // Two consecutive delimiters produce a zero-length record; the codec
        // upstream discards it as malformed.
        let buf = [RECORD_DELIMITER, RECORD_DELIMITER];
        let mut decoder = RecordDecoder::new();
        let records = decoder.feed(&buf).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_empty());
        assert!(records[1].is_empty());
    }

    #[test]
    fn test_oversized_partial_rejected() {
        let mut decoder = RecordDecoder::new();
        let chunk = vec![b'a'; MAX_RECORD_SIZE + 1];
        assert!(decoder.feed(&chunk).is_err());
    }

    #[test]
    fn test_oversized_delimited_record_rejected() {
        let mut buf = vec![b'a'; MAX_RECORD_SIZE + 1];
        buf.push(RECORD_DELIMITER);
        let mut decoder = RecordDecoder::new();
        assert!(decoder.feed(&buf).is_err());
    }

    #[test]
    fn test_utf8_payload_preserved() {
        let payload = r#"{"message":"héllo wörld ✓"}"#.as_bytes();
        let encoded = encode_record(payload);
        let mut decoder = RecordDecoder::new();
        let records = decoder.feed(&encoded).unwrap();
        assert_eq!(records[0], payload);
        assert_eq!(std::str::from_utf8(&records[0]).unwrap(), r#"{"message":"héllo wörld ✓"}"#);
    }
}
