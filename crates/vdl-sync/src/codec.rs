//! Incremental framing for the sync wire format.
//!
//! The transfer is one JSON array of record objects, produced and consumed
//! as a stream: opening bracket, comma-separated records, closing bracket.
//! The encoder turns a record iterator into chunks; the decoder accepts
//! arbitrary byte chunks and yields each record as soon as it closes, so a
//! merge can start before the peer finishes exporting.

use crate::error::{SyncError, SyncResult};
use crate::record::SyncRecord;

/// Adapts an iterator of records into JSON-array chunks.
///
/// Yields `[`, then one chunk per record (comma-prefixed after the first),
/// then `]`. An error from the inner iterator ends the stream without the
/// closing bracket, which the receiving decoder reports as truncation.
pub struct JsonArrayEncoder<I> {
    inner: I,
    state: EncodeState,
}

enum EncodeState {
    Start,
    Items { first: bool },
    Done,
}

impl<I> JsonArrayEncoder<I>
where
    I: Iterator<Item = SyncResult<SyncRecord>>,
{
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            state: EncodeState::Start,
        }
    }
}

impl<I> Iterator for JsonArrayEncoder<I>
where
    I: Iterator<Item = SyncResult<SyncRecord>>,
{
    type Item = SyncResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            EncodeState::Start => {
                self.state = EncodeState::Items { first: true };
                Some(Ok("[".to_owned()))
            }
            EncodeState::Items { first } => match self.inner.next() {
                Some(Ok(record)) => {
                    let json = match serde_json::to_string(&record) {
                        Ok(json) => json,
                        Err(e) => {
                            self.state = EncodeState::Done;
                            return Some(Err(SyncError::Codec(e.to_string())));
                        }
                    };
                    self.state = EncodeState::Items { first: false };
                    Some(Ok(if first { json } else { format!(",{json}") }))
                }
                Some(Err(e)) => {
                    self.state = EncodeState::Done;
                    Some(Err(e))
                }
                None => {
                    self.state = EncodeState::Done;
                    Some(Ok("]".to_owned()))
                }
            },
            EncodeState::Done => None,
        }
    }
}

/// Pull-based incremental decoder for the JSON-array wire format.
///
/// Feed it byte chunks as they arrive and drain records with
/// [`next_record`](Self::next_record); call [`finish`](Self::finish) once
/// the input ends to catch truncated streams. Record boundaries may fall
/// anywhere, including inside string escapes.
pub struct JsonArrayDecoder {
    buf: Vec<u8>,
    pos: usize,
    state: DecodeState,
    // Scanning state for the record currently being accumulated.
    value_start: usize,
    depth: i32,
    in_string: bool,
    escaped: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecodeState {
    /// Nothing consumed yet; expecting `[`.
    Start,
    /// Just past `[`; expecting a record or `]`.
    FirstValue,
    /// Just past `,`; expecting a record.
    Value,
    /// Mid-record; accumulating bytes until it closes.
    InValue,
    /// Just past a record; expecting `,` or `]`.
    Separator,
    /// Closing bracket seen; only whitespace may follow.
    Done,
}

impl JsonArrayDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            state: DecodeState::Start,
            value_start: 0,
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }

    /// Append a chunk of input.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Whether the closing bracket has been consumed.
    pub fn is_done(&self) -> bool {
        self.state == DecodeState::Done
    }

    /// Must be called after the input ends; errors if the stream stopped
    /// before the array closed.
    pub fn finish(&self) -> SyncResult<()> {
        if self.state == DecodeState::Done {
            Ok(())
        } else {
            Err(SyncError::Codec("truncated sync stream".into()))
        }
    }

    /// The next complete record, or `None` if more input is needed (or the
    /// array has closed).
    pub fn next_record(&mut self) -> SyncResult<Option<SyncRecord>> {
        loop {
            match self.state {
                DecodeState::Start => {
                    if !self.skip_whitespace() {
                        return Ok(None);
                    }
                    self.expect_byte(b'[', "expected opening bracket")?;
                    self.state = DecodeState::FirstValue;
                }
                DecodeState::FirstValue => {
                    if !self.skip_whitespace() {
                        return Ok(None);
                    }
                    if self.buf[self.pos] == b']' {
                        self.pos += 1;
                        self.state = DecodeState::Done;
                        continue;
                    }
                    self.begin_value()?;
                }
                DecodeState::Value => {
                    if !self.skip_whitespace() {
                        return Ok(None);
                    }
                    self.begin_value()?;
                }
                DecodeState::InValue => {
                    return self.scan_value();
                }
                DecodeState::Separator => {
                    if !self.skip_whitespace() {
                        return Ok(None);
                    }
                    match self.buf[self.pos] {
                        b',' => {
                            self.pos += 1;
                            self.state = DecodeState::Value;
                        }
                        b']' => {
                            self.pos += 1;
                            self.state = DecodeState::Done;
                        }
                        other => {
                            return Err(SyncError::Codec(format!(
                                "expected ',' or ']' between records, got {:?}",
                                other as char
                            )));
                        }
                    }
                }
                DecodeState::Done => {
                    if !self.skip_whitespace() {
                        return Ok(None);
                    }
                    return Err(SyncError::Codec(
                        "trailing data after closing bracket".into(),
                    ));
                }
            }
        }
    }

    /// Skip whitespace; returns false when the buffer runs dry.
    fn skip_whitespace(&mut self) -> bool {
        while self.pos < self.buf.len() {
            match self.buf[self.pos] {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                _ => return true,
            }
        }
        false
    }

    fn expect_byte(&mut self, expected: u8, message: &str) -> SyncResult<()> {
        let got = self.buf[self.pos];
        if got != expected {
            return Err(SyncError::Codec(format!("{message}, got {:?}", got as char)));
        }
        self.pos += 1;
        Ok(())
    }

    fn begin_value(&mut self) -> SyncResult<()> {
        if self.buf[self.pos] != b'{' {
            return Err(SyncError::Codec(format!(
                "expected record object, got {:?}",
                self.buf[self.pos] as char
            )));
        }
        self.value_start = self.pos;
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
        self.state = DecodeState::InValue;
        Ok(())
    }

    fn scan_value(&mut self) -> SyncResult<Option<SyncRecord>> {
        while self.pos < self.buf.len() {
            let b = self.buf[self.pos];
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
            } else {
                match b {
                    b'"' => self.in_string = true,
                    b'{' | b'[' => self.depth += 1,
                    b'}' | b']' => {
                        self.depth -= 1;
                        if self.depth == 0 {
                            let raw = &self.buf[self.value_start..=self.pos];
                            let record: SyncRecord = serde_json::from_slice(raw)
                                .map_err(|e| SyncError::Codec(e.to_string()))?;
                            self.pos += 1;
                            self.state = DecodeState::Separator;
                            self.compact();
                            return Ok(Some(record));
                        }
                        if self.depth < 0 {
                            return Err(SyncError::Codec("unbalanced brackets".into()));
                        }
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }
        Ok(None)
    }

    /// Drop consumed bytes so memory stays bounded by one record plus one
    /// chunk.
    fn compact(&mut self) {
        self.buf.drain(..self.pos);
        self.pos = 0;
    }
}

impl Default for JsonArrayDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<SyncRecord> {
        (0..n)
            .map(|i| SyncRecord::new(format!("key{i}"), format!("value{i}").into_bytes()))
            .collect()
    }

    fn encode(records: &[SyncRecord]) -> String {
        JsonArrayEncoder::new(records.iter().cloned().map(Ok))
            .map(|chunk| chunk.unwrap())
            .collect()
    }

    fn decode_all(input: &[u8], chunk_size: usize) -> SyncResult<Vec<SyncRecord>> {
        let mut decoder = JsonArrayDecoder::new();
        let mut out = Vec::new();
        for chunk in input.chunks(chunk_size.max(1)) {
            decoder.feed(chunk);
            while let Some(record) = decoder.next_record()? {
                out.push(record);
            }
        }
        decoder.finish()?;
        Ok(out)
    }

    #[test]
    fn encoder_frames_an_array() {
        let encoded = encode(&records(2));
        assert!(encoded.starts_with('['));
        assert!(encoded.ends_with(']'));
        let parsed: Vec<SyncRecord> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(parsed, records(2));
    }

    #[test]
    fn empty_export_is_an_empty_array() {
        assert_eq!(encode(&[]), "[]");
        assert_eq!(decode_all(b"[]", 1).unwrap(), vec![]);
    }

    #[test]
    fn roundtrip_survives_any_chunking() {
        let expected = records(5);
        let encoded = encode(&expected);
        for chunk_size in [1, 2, 3, 7, 64, encoded.len()] {
            let decoded = decode_all(encoded.as_bytes(), chunk_size).unwrap();
            assert_eq!(decoded, expected, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn whitespace_between_tokens_is_tolerated() {
        let input = b" [ {\"key\":\"k\",\"value\":\"\"} ,\n {\"key\":\"l\",\"value\":\"\"} ] ";
        let decoded = decode_all(input, 4).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].key, "k");
    }

    #[test]
    fn braces_inside_string_values_do_not_confuse_framing() {
        let tricky = SyncRecord::new("a}b-{\"c", b"\x00\x01\xff".to_vec());
        let encoded = encode(&[tricky.clone()]);
        let decoded = decode_all(encoded.as_bytes(), 1).unwrap();
        assert_eq!(decoded, vec![tricky]);
    }

    #[test]
    fn missing_opening_bracket_is_an_error() {
        let mut decoder = JsonArrayDecoder::new();
        decoder.feed(b"{\"key\":\"k\",\"value\":\"\"}");
        assert!(decoder.next_record().is_err());
    }

    #[test]
    fn non_object_element_is_an_error() {
        let mut decoder = JsonArrayDecoder::new();
        decoder.feed(b"[42]");
        assert!(decoder.next_record().is_err());
    }

    #[test]
    fn trailing_comma_is_an_error() {
        let mut decoder = JsonArrayDecoder::new();
        decoder.feed(b"[{\"key\":\"k\",\"value\":\"\"},]");
        decoder.next_record().unwrap();
        assert!(decoder.next_record().is_err());
    }

    #[test]
    fn trailing_garbage_is_an_error() {
        let mut decoder = JsonArrayDecoder::new();
        decoder.feed(b"[] nonsense");
        assert!(decoder.next_record().is_err());
    }

    #[test]
    fn truncated_stream_fails_finish() {
        let encoded = encode(&records(3));
        let cut = &encoded.as_bytes()[..encoded.len() - 5];
        let mut decoder = JsonArrayDecoder::new();
        decoder.feed(cut);
        while let Some(_record) = decoder.next_record().unwrap() {}
        assert!(decoder.finish().is_err());
    }
}
