//! Binary wire format for splits.
//!
//! This is the one artifact that must be byte-compatible between the
//! planning process and every worker.
//!
//! # Wire Format
//!
//! Every field is framed as a signed 32-bit big-endian length followed by
//! that many bytes:
//!
//! ```text
//! i32 len | split id (UTF-8 ULID)
//! i32 len | resource count (i32 big-endian, len = 4)
//! repeated `count` times:
//!   i32 len | resource (JSON)
//!   i32 len | connection detail (JSON, carries its "type" tag)
//! ```
//!
//! Decoding rejects any negative length or count before allocating, any
//! length beyond [`MAX_FIELD_BYTES`] or beyond the remaining input, and
//! trailing bytes after the last entry.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use bulwark_core::{ConnectionDetail, Resource, SplitId};

use crate::error::{Error, Result};
use crate::split::ResourceSplit;

/// Largest single field accepted on either side of the wire (16 MiB).
pub const MAX_FIELD_BYTES: usize = 16 * 1024 * 1024;

const LENGTH_PREFIX_BYTES: usize = 4;

/// Encodes a split into its wire form.
///
/// # Errors
///
/// Returns [`Error::Encode`] if a field exceeds [`MAX_FIELD_BYTES`], or a
/// core serialization error if a resource cannot be encoded.
pub fn encode_split(split: &ResourceSplit) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(64 + split.resources().len() * 128);

    put_field(&mut buf, split.id().to_string().as_bytes())?;

    let count = i32::try_from(split.resources().len())
        .map_err(|_| Error::encode("resource count does not fit in i32"))?;
    put_field(&mut buf, &count.to_be_bytes())?;

    for (resource, connection) in split.resources() {
        let resource = serde_json::to_vec(resource).map_err(bulwark_core::Error::from)?;
        put_field(&mut buf, &resource)?;
        let connection = serde_json::to_vec(connection).map_err(bulwark_core::Error::from)?;
        put_field(&mut buf, &connection)?;
    }

    Ok(buf.freeze())
}

/// Decodes a split from its wire form.
///
/// # Errors
///
/// Returns [`Error::Decode`] for any malformed input.
pub fn decode_split(mut buf: impl Buf) -> Result<ResourceSplit> {
    let id = take_field(&mut buf, "split id")?;
    let id = std::str::from_utf8(&id)
        .map_err(|e| Error::decode(format!("split id is not UTF-8: {e}")))?;
    let id: SplitId = id
        .parse()
        .map_err(|e| Error::decode(format!("split id: {e}")))?;

    let count = take_field(&mut buf, "resource count")?;
    let count: [u8; 4] = count.as_ref().try_into().map_err(|_| {
        Error::decode(format!(
            "resource count field must be 4 bytes (got {})",
            count.len()
        ))
    })?;
    let count = i32::from_be_bytes(count);
    let count = usize::try_from(count)
        .map_err(|_| Error::decode(format!("illegal negative resource count {count}")))?;

    let mut resources = BTreeMap::new();
    for index in 0..count {
        let resource = take_field(&mut buf, "resource")?;
        let resource: Resource = serde_json::from_slice(&resource)
            .map_err(|e| Error::decode(format!("resource {index}: {e}")))?;
        let connection = take_field(&mut buf, "connection detail")?;
        let connection: ConnectionDetail = serde_json::from_slice(&connection)
            .map_err(|e| Error::decode(format!("connection detail {index}: {e}")))?;
        if resources.insert(resource, connection).is_some() {
            return Err(Error::decode(format!("duplicate resource at entry {index}")));
        }
    }

    if buf.has_remaining() {
        return Err(Error::decode(format!(
            "{} trailing bytes after split",
            buf.remaining()
        )));
    }

    Ok(ResourceSplit::with_id(id, resources))
}

fn put_field(buf: &mut BytesMut, data: &[u8]) -> Result<()> {
    if data.len() > MAX_FIELD_BYTES {
        return Err(Error::encode(format!(
            "field too large: {} bytes (max {MAX_FIELD_BYTES})",
            data.len()
        )));
    }
    let len = i32::try_from(data.len())
        .map_err(|_| Error::encode(format!("field length {} does not fit in i32", data.len())))?;
    buf.put_i32(len);
    buf.put_slice(data);
    Ok(())
}

fn take_field(buf: &mut impl Buf, what: &str) -> Result<Bytes> {
    if buf.remaining() < LENGTH_PREFIX_BYTES {
        return Err(Error::decode(format!(
            "truncated input reading {what} length: need {LENGTH_PREFIX_BYTES} bytes, have {}",
            buf.remaining()
        )));
    }
    let len = buf.get_i32();
    let len = usize::try_from(len)
        .map_err(|_| Error::decode(format!("illegal negative length {len} for {what}")))?;
    if len > MAX_FIELD_BYTES {
        return Err(Error::decode(format!(
            "{what} too large: {len} bytes (max {MAX_FIELD_BYTES})"
        )));
    }
    if buf.remaining() < len {
        return Err(Error::decode(format!(
            "truncated input reading {what}: need {len} bytes, have {}",
            buf.remaining()
        )));
    }
    Ok(buf.copy_to_bytes(len))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_split() -> ResourceSplit {
        let resources = [
            ("a", ConnectionDetail::service("hr")),
            ("b", ConnectionDetail::local("/mnt/data")),
        ]
        .into_iter()
        .map(|(id, conn)| {
            (
                Resource::new("employee", id, "jsonl").with_attribute("region", "eu"),
                conn,
            )
        })
        .collect();
        ResourceSplit::new(resources)
    }

    #[test]
    fn decode_restores_encoded_split() {
        let split = sample_split();
        let decoded = decode_split(encode_split(&split).unwrap()).unwrap();
        assert_eq!(decoded, split);
        assert_eq!(decoded.id(), split.id());
    }

    #[test]
    fn empty_split_decodes_structurally() {
        let split = ResourceSplit::new(BTreeMap::new());
        let decoded = decode_split(encode_split(&split).unwrap()).unwrap();
        assert!(decoded.resources().is_empty());
    }

    #[test]
    fn layout_starts_with_id_then_count() {
        let split = sample_split();
        let mut bytes = encode_split(&split).unwrap();

        let id_len = bytes.get_i32();
        assert_eq!(id_len, 26);
        let id = bytes.copy_to_bytes(26);
        assert_eq!(id.as_ref(), split.id().to_string().as_bytes());

        assert_eq!(bytes.get_i32(), 4);
        assert_eq!(bytes.get_i32(), 2);
    }

    #[test]
    fn negative_leading_length_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_i32(-1);
        buf.put_slice(&[0; 16]);
        let err = decode_split(buf.freeze()).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn negative_resource_count_is_rejected() {
        let mut buf = BytesMut::new();
        put_field(&mut buf, SplitId::generate().to_string().as_bytes()).unwrap();
        put_field(&mut buf, &(-5i32).to_be_bytes()).unwrap();
        let err = decode_split(buf.freeze()).unwrap_err();
        assert!(err.to_string().contains("negative resource count"));
    }

    #[test]
    fn negative_entry_length_is_rejected() {
        let mut buf = BytesMut::new();
        put_field(&mut buf, SplitId::generate().to_string().as_bytes()).unwrap();
        put_field(&mut buf, &1i32.to_be_bytes()).unwrap();
        buf.put_i32(i32::MIN);
        let err = decode_split(buf.freeze()).unwrap_err();
        assert!(err.to_string().contains("negative length"));
    }

    #[test]
    fn truncated_and_trailing_input_is_rejected() {
        let bytes = encode_split(&sample_split()).unwrap();

        let truncated = bytes.slice(..bytes.len() - 3);
        assert!(matches!(
            decode_split(truncated),
            Err(Error::Decode { .. })
        ));

        let mut extended = BytesMut::from(bytes.as_ref());
        extended.put_u8(0);
        let err = decode_split(extended.freeze()).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn oversized_length_is_rejected_before_reading() {
        let mut buf = BytesMut::new();
        buf.put_i32(i32::try_from(MAX_FIELD_BYTES + 1).unwrap());
        let err = decode_split(buf.freeze()).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn oversized_field_is_an_encode_error() {
        let resource = Resource::new("t", "big", "lines")
            .with_attribute("blob", "x".repeat(MAX_FIELD_BYTES));
        let split = ResourceSplit::new(BTreeMap::from([(resource, ConnectionDetail::service("s"))]));
        let err = encode_split(&split).unwrap_err();
        assert!(matches!(err, Error::Encode { .. }), "{err}");
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn unknown_connection_tag_is_a_decode_error() {
        let mut buf = BytesMut::new();
        put_field(&mut buf, SplitId::generate().to_string().as_bytes()).unwrap();
        put_field(&mut buf, &1i32.to_be_bytes()).unwrap();
        put_field(
            &mut buf,
            &serde_json::to_vec(&Resource::new("t", "a", "lines")).unwrap(),
        )
        .unwrap();
        put_field(&mut buf, br#"{"type":"ftp","host":"x"}"#).unwrap();
        let err = decode_split(buf.freeze()).unwrap_err();
        assert!(err.to_string().contains("connection detail 0"));
    }
}
