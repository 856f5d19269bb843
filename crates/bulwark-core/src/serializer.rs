//! Pluggable record codecs.
//!
//! A job names its codec once in its configuration; workers rebuild the same
//! codec from the tagged form stored there. Records are JSON values so that
//! every codec in the set yields the same record type.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single deserialized record.
pub type Record = serde_json::Value;

/// Lazy sequence of records decoded from one resource.
pub type RecordIter = Box<dyn Iterator<Item = Result<Record>> + Send>;

/// Encodes records to bytes and decodes bytes back to records.
pub trait RecordSerializer: Send + Sync {
    /// Serializes records into one payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if a record cannot be encoded.
    fn encode_records(&self, records: &[Record]) -> Result<Bytes>;

    /// Returns a lazy iterator over the records in `data`.
    ///
    /// Decoding happens as the iterator is advanced; a malformed record
    /// surfaces as an `Err` item at its position.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be decoded at all.
    fn decode_records(&self, data: Bytes) -> Result<RecordIter>;
}

/// The closed set of codecs a job can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SerializerKind {
    /// One UTF-8 text line per record; records are JSON strings.
    ///
    /// Decoding accepts `\r\n` endings, so records never contain `\r`.
    Lines,
    /// One JSON document per line; blank lines are skipped.
    JsonLines,
}

impl RecordSerializer for SerializerKind {
    fn encode_records(&self, records: &[Record]) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        for record in records {
            match self {
                Self::Lines => {
                    let line = record.as_str().ok_or_else(|| {
                        Error::serialization("line serializer only encodes string records")
                    })?;
                    if line.contains(['\n', '\r']) {
                        return Err(Error::serialization(
                            "line record contains a line terminator",
                        ));
                    }
                    buf.put_slice(line.as_bytes());
                }
                Self::JsonLines => {
                    buf.put_slice(&serde_json::to_vec(record)?);
                }
            }
            buf.put_u8(b'\n');
        }
        Ok(buf.freeze())
    }

    fn decode_records(&self, data: Bytes) -> Result<RecordIter> {
        Ok(Box::new(LineRecords {
            data,
            pos: 0,
            kind: *self,
        }))
    }
}

/// Walks a payload line by line, decoding each line on demand.
struct LineRecords {
    data: Bytes,
    pos: usize,
    kind: SerializerKind,
}

impl LineRecords {
    fn next_line(&mut self) -> Option<Bytes> {
        if self.pos >= self.data.len() {
            return None;
        }
        let rest = &self.data[self.pos..];
        let (len, advance) = match rest.iter().position(|b| *b == b'\n') {
            Some(i) => (i, i + 1),
            None => (rest.len(), rest.len()),
        };
        let mut line = self.data.slice(self.pos..self.pos + len);
        self.pos += advance;
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Some(line)
    }
}

impl Iterator for LineRecords {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.next_line()?;
            match self.kind {
                SerializerKind::Lines => {
                    return Some(
                        std::str::from_utf8(&line)
                            .map(|s| Record::String(s.to_string()))
                            .map_err(Error::serialization),
                    );
                }
                SerializerKind::JsonLines => {
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Some(serde_json::from_slice(&line).map_err(Error::from));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collect(kind: SerializerKind, data: &'static [u8]) -> Vec<Result<Record>> {
        kind.decode_records(Bytes::from_static(data)).unwrap().collect()
    }

    #[test]
    fn lines_yield_one_record_per_line() {
        let records: Vec<Record> = collect(SerializerKind::Lines, b"s1\ns2\r\ns3")
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(records, vec![json!("s1"), json!("s2"), json!("s3")]);
    }

    #[test]
    fn empty_payload_yields_nothing() {
        assert!(collect(SerializerKind::Lines, b"").is_empty());
        assert!(collect(SerializerKind::JsonLines, b"\n\n").is_empty());
    }

    #[test]
    fn json_lines_surface_bad_records_in_place() {
        let records = collect(SerializerKind::JsonLines, b"{\"a\":1}\nnot json\n{\"a\":2}\n");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].as_ref().unwrap(), &json!({"a": 1}));
        assert!(matches!(records[1], Err(Error::Serialization { .. })));
        assert_eq!(records[2].as_ref().unwrap(), &json!({"a": 2}));
    }

    #[test]
    fn json_lines_survive_encode_then_decode() {
        let input = vec![json!({"name": "alice"}), json!([1, 2]), json!("x")];
        let bytes = SerializerKind::JsonLines.encode_records(&input).unwrap();
        let output: Vec<Record> = SerializerKind::JsonLines
            .decode_records(bytes)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(output, input);
    }

    #[test]
    fn line_serializer_rejects_non_strings() {
        let err = SerializerKind::Lines.encode_records(&[json!(1)]).unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[test]
    fn lines_survive_encode_then_decode() {
        let input = vec![json!("s1"), json!(""), json!("with spaces\tand tabs")];
        let bytes = SerializerKind::Lines.encode_records(&input).unwrap();
        let output: Vec<Record> = SerializerKind::Lines
            .decode_records(bytes)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(output, input);
    }

    #[test]
    fn line_serializer_rejects_line_terminators() {
        for record in ["a\r", "a\nb", "a\r\nb"] {
            let err = SerializerKind::Lines
                .encode_records(&[json!(record)])
                .unwrap_err();
            assert!(matches!(err, Error::Serialization { .. }), "{record:?}");
        }
    }

    #[test]
    fn kind_is_tagged_in_json() {
        let json = serde_json::to_string(&SerializerKind::JsonLines).unwrap();
        assert_eq!(json, r#"{"type":"json_lines"}"#);
    }
}
