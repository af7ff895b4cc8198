//! Hand-rolled OSC wire codec. Kept hand-rolled rather than delegated to
//! an OSC crate since the wire format is core, fully specified
//! functionality, not a peripheral integration — `byteorder` supplies the
//! big-endian primitives.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{EngineError, EngineResult};
use crate::osc::value::{TimeTag, Value};

pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Default oversize-blob / packet-size rejection limit; overridable by the
/// `OSC_MAX_MESSAGE_SIZE` env var read once at server construction.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<Value>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    pub fn type_tag_string(&self) -> String {
        let mut s = String::with_capacity(self.args.len() + 1);
        s.push(',');
        for a in &self.args {
            a.push_type_tag(&mut s);
        }
        s
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OscElement {
    Message(OscMessage),
    Bundle(OscBundle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OscBundle {
    pub time_tag: TimeTag,
    pub elements: Vec<OscElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OscPacket {
    Message(OscMessage),
    Bundle(OscBundle),
}

fn padded_len(len: usize) -> usize {
    (len + 4) & !3
}

fn write_padded_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

fn read_padded_string(bytes: &[u8], offset: &mut usize) -> EngineResult<String> {
    let start = *offset;
    let mut end = start;
    while end < bytes.len() && bytes[end] != 0 {
        end += 1;
    }
    if end >= bytes.len() {
        return Err(EngineError::OscDecodeError("unterminated string".into()));
    }
    let s = std::str::from_utf8(&bytes[start..end])
        .map_err(|e| EngineError::OscDecodeError(format!("invalid utf-8 in string: {e}")))?
        .to_string();
    let padded = padded_len(end - start);
    let next = start + padded;
    if next > bytes.len() {
        return Err(EngineError::OscDecodeError("truncated padded string".into()));
    }
    *offset = next;
    Ok(s)
}

pub fn encode_message(msg: &OscMessage) -> Vec<u8> {
    let mut out = Vec::new();
    write_padded_string(&mut out, &msg.address);
    write_padded_string(&mut out, &msg.type_tag_string());
    for arg in &msg.args {
        encode_arg(&mut out, arg);
    }
    out
}

fn encode_arg(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Int32(v) => {
            let mut buf = [0u8; 4];
            BigEndian::write_i32(&mut buf, *v);
            out.extend_from_slice(&buf);
        }
        Value::Int64(v) => {
            let mut buf = [0u8; 8];
            BigEndian::write_i64(&mut buf, *v);
            out.extend_from_slice(&buf);
        }
        Value::Float32(v) => {
            let mut buf = [0u8; 4];
            BigEndian::write_f32(&mut buf, *v);
            out.extend_from_slice(&buf);
        }
        Value::Float64(v) => {
            let mut buf = [0u8; 8];
            BigEndian::write_f64(&mut buf, *v);
            out.extend_from_slice(&buf);
        }
        Value::Str(s) | Value::Symbol(s) => write_padded_string(out, s),
        Value::Blob(bytes) => {
            let mut len_buf = [0u8; 4];
            BigEndian::write_i32(&mut len_buf, bytes.len() as i32);
            out.extend_from_slice(&len_buf);
            out.extend_from_slice(bytes);
            while out.len() % 4 != 0 {
                out.push(0);
            }
        }
        Value::Time(t) => {
            let mut buf = [0u8; 8];
            BigEndian::write_u32(&mut buf[0..4], t.seconds);
            BigEndian::write_u32(&mut buf[4..8], t.fraction);
            out.extend_from_slice(&buf);
        }
        Value::Char(c) => {
            let mut buf = [0u8; 4];
            BigEndian::write_i32(&mut buf, *c as i32);
            out.extend_from_slice(&buf);
        }
        Value::Rgba(bytes) => out.extend_from_slice(bytes),
        Value::Midi(bytes) => out.extend_from_slice(bytes),
        Value::True | Value::False | Value::Nil | Value::Infinitum => {}
        Value::Array(elements) => {
            // The `[`/`]` delimiters carry no data of their own; only the
            // element bytes are written, in order.
            for el in elements {
                encode_arg(out, el);
            }
        }
    }
}

pub fn encode_bundle(bundle: &OscBundle) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(BUNDLE_TAG);
    let mut tag_buf = [0u8; 8];
    BigEndian::write_u32(&mut tag_buf[0..4], bundle.time_tag.seconds);
    BigEndian::write_u32(&mut tag_buf[4..8], bundle.time_tag.fraction);
    out.extend_from_slice(&tag_buf);
    for element in &bundle.elements {
        let encoded = encode_packet(&element_as_packet(element));
        let mut len_buf = [0u8; 4];
        BigEndian::write_i32(&mut len_buf, encoded.len() as i32);
        out.extend_from_slice(&len_buf);
        out.extend_from_slice(&encoded);
    }
    out
}

fn element_as_packet(element: &OscElement) -> OscPacket {
    match element {
        OscElement::Message(m) => OscPacket::Message(m.clone()),
        OscElement::Bundle(b) => OscPacket::Bundle(b.clone()),
    }
}

pub fn encode_packet(packet: &OscPacket) -> Vec<u8> {
    match packet {
        OscPacket::Message(m) => encode_message(m),
        OscPacket::Bundle(b) => encode_bundle(b),
    }
}

pub fn decode_message(bytes: &[u8]) -> EngineResult<OscMessage> {
    if bytes.first() != Some(&b'/') {
        return Err(EngineError::OscAddressError(
            "address does not start with '/'".into(),
        ));
    }
    let mut offset = 0;
    let address = read_padded_string(bytes, &mut offset)?;
    let type_tags = read_padded_string(bytes, &mut offset)?;
    if !type_tags.starts_with(',') {
        return Err(EngineError::OscDecodeError(
            "type tag string missing leading ','".into(),
        ));
    }

    // `stack` holds the element lists of arrays currently open; the
    // outermost frame (the message's own argument list) is `args` itself,
    // so a value is pushed onto `stack`'s top if non-empty, else into
    // `args` directly — mirroring how `[`/`]` nest one or more levels deep.
    let mut args = Vec::new();
    let mut stack: Vec<Vec<Value>> = Vec::new();
    for tag in type_tags[1..].chars() {
        match tag {
            '[' => {
                stack.push(Vec::new());
                continue;
            }
            ']' => {
                let completed = stack
                    .pop()
                    .ok_or_else(|| EngineError::OscDecodeError("unmatched ']'".into()))?;
                let value = Value::Array(completed);
                match stack.last_mut() {
                    Some(parent) => parent.push(value),
                    None => args.push(value),
                }
                continue;
            }
            _ => {
                let value = decode_arg(tag, bytes, &mut offset)?;
                match stack.last_mut() {
                    Some(parent) => parent.push(value),
                    None => args.push(value),
                }
            }
        }
    }
    if !stack.is_empty() {
        return Err(EngineError::OscDecodeError("unclosed array".into()));
    }
    Ok(OscMessage { address, args })
}

fn decode_arg(tag: char, bytes: &[u8], offset: &mut usize) -> EngineResult<Value> {
    let need = |n: usize, offset: usize| -> EngineResult<()> {
        if offset + n > bytes.len() {
            Err(EngineError::OscDecodeError("truncated argument data".into()))
        } else {
            Ok(())
        }
    };
    match tag {
        'i' => {
            need(4, *offset)?;
            let v = BigEndian::read_i32(&bytes[*offset..*offset + 4]);
            *offset += 4;
            Ok(Value::Int32(v))
        }
        'h' => {
            need(8, *offset)?;
            let v = BigEndian::read_i64(&bytes[*offset..*offset + 8]);
            *offset += 8;
            Ok(Value::Int64(v))
        }
        'f' => {
            need(4, *offset)?;
            let v = BigEndian::read_f32(&bytes[*offset..*offset + 4]);
            *offset += 4;
            Ok(Value::Float32(v))
        }
        'd' => {
            need(8, *offset)?;
            let v = BigEndian::read_f64(&bytes[*offset..*offset + 8]);
            *offset += 8;
            Ok(Value::Float64(v))
        }
        's' => Ok(Value::Str(read_padded_string(bytes, offset)?)),
        'S' => Ok(Value::Symbol(read_padded_string(bytes, offset)?)),
        'b' => {
            need(4, *offset)?;
            let len = BigEndian::read_i32(&bytes[*offset..*offset + 4]);
            if len < 0 {
                return Err(EngineError::OscDecodeError("negative blob length".into()));
            }
            let len = len as usize;
            if len > DEFAULT_MAX_PACKET_SIZE {
                return Err(EngineError::OscDecodeError("oversize blob".into()));
            }
            *offset += 4;
            need(len, *offset)?;
            let data = bytes[*offset..*offset + len].to_vec();
            // Blob content is padded to a 4-byte multiple counting only
            // the content bytes, independent of the 4-byte length prefix
            // already consumed above.
            *offset += padded_len_content(len);
            Ok(Value::Blob(data))
        }
        't' => {
            need(8, *offset)?;
            let seconds = BigEndian::read_u32(&bytes[*offset..*offset + 4]);
            let fraction = BigEndian::read_u32(&bytes[*offset + 4..*offset + 8]);
            *offset += 8;
            Ok(Value::Time(TimeTag { seconds, fraction }))
        }
        'c' => {
            need(4, *offset)?;
            let v = BigEndian::read_i32(&bytes[*offset..*offset + 4]);
            *offset += 4;
            char::from_u32(v as u32)
                .map(Value::Char)
                .ok_or_else(|| EngineError::OscDecodeError("invalid char value".into()))
        }
        'r' => {
            need(4, *offset)?;
            let mut rgba = [0u8; 4];
            rgba.copy_from_slice(&bytes[*offset..*offset + 4]);
            *offset += 4;
            Ok(Value::Rgba(rgba))
        }
        'm' => {
            need(4, *offset)?;
            let mut midi = [0u8; 4];
            midi.copy_from_slice(&bytes[*offset..*offset + 4]);
            *offset += 4;
            Ok(Value::Midi(midi))
        }
        'T' => Ok(Value::True),
        'F' => Ok(Value::False),
        'N' => Ok(Value::Nil),
        'I' => Ok(Value::Infinitum),
        other => Err(EngineError::OscDecodeError(format!(
            "unknown type tag '{other}'"
        ))),
    }
}

fn padded_len_content(len: usize) -> usize {
    (len + 3) & !3
}

pub fn decode_bundle(bytes: &[u8]) -> EngineResult<OscBundle> {
    if bytes.len() < 16 || &bytes[0..8] != BUNDLE_TAG {
        return Err(EngineError::OscDecodeError("missing bundle tag".into()));
    }
    let seconds = BigEndian::read_u32(&bytes[8..12]);
    let fraction = BigEndian::read_u32(&bytes[12..16]);
    let mut offset = 16;
    let mut elements = Vec::new();
    while offset < bytes.len() {
        if offset + 4 > bytes.len() {
            return Err(EngineError::OscDecodeError(
                "truncated bundle element size".into(),
            ));
        }
        let size = BigEndian::read_i32(&bytes[offset..offset + 4]);
        if size < 0 {
            return Err(EngineError::OscDecodeError("negative element size".into()));
        }
        let size = size as usize;
        offset += 4;
        if offset + size > bytes.len() {
            return Err(EngineError::OscDecodeError(
                "truncated bundle element".into(),
            ));
        }
        let element_bytes = &bytes[offset..offset + size];
        let packet = decode_packet(element_bytes)?;
        elements.push(match packet {
            OscPacket::Message(m) => OscElement::Message(m),
            OscPacket::Bundle(b) => OscElement::Bundle(b),
        });
        offset += size;
    }
    Ok(OscBundle {
        time_tag: TimeTag { seconds, fraction },
        elements,
    })
}

/// Decodes `bytes` as either a bundle or a message by inspecting the
/// first 8 bytes.
pub fn decode_packet(bytes: &[u8]) -> EngineResult<OscPacket> {
    if bytes.len() >= 8 && &bytes[0..8] == BUNDLE_TAG {
        Ok(OscPacket::Bundle(decode_bundle(bytes)?))
    } else {
        Ok(OscPacket::Message(decode_message(bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_round_trips_every_type_tag() {
        let msg = OscMessage::new(
            "/test/addr",
            vec![
                Value::Int32(-7),
                Value::Int64(123_456_789_000),
                Value::Float32(1.5),
                Value::Float64(-2.25),
                Value::Str("hello".into()),
                Value::Symbol("sym".into()),
                Value::Blob(vec![1, 2, 3, 4, 5]),
                Value::Time(TimeTag {
                    seconds: 10,
                    fraction: 20,
                }),
                Value::Char('x'),
                Value::Rgba([1, 2, 3, 4]),
                Value::Midi([0x90, 60, 127, 0]),
                Value::True,
                Value::False,
                Value::Nil,
                Value::Infinitum,
            ],
        );
        let bytes = encode_message(&msg);
        let decoded = decode_message(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn rejects_non_slash_address() {
        let mut bytes = Vec::new();
        write_padded_string(&mut bytes, "noslash");
        write_padded_string(&mut bytes, ",");
        assert!(decode_message(&bytes).is_err());
    }

    #[test]
    fn rejects_unknown_type_tag() {
        let mut bytes = Vec::new();
        write_padded_string(&mut bytes, "/addr");
        write_padded_string(&mut bytes, ",z");
        assert!(decode_message(&bytes).is_err());
    }

    #[test]
    fn nested_bundle_round_trips() {
        let inner = OscBundle {
            time_tag: TimeTag::IMMEDIATE,
            elements: vec![OscElement::Message(OscMessage::new(
                "/inner",
                vec![Value::Int32(1)],
            ))],
        };
        let outer = OscBundle {
            time_tag: TimeTag {
                seconds: 42,
                fraction: 0,
            },
            elements: vec![
                OscElement::Message(OscMessage::new("/outer", vec![Value::Float32(0.5)])),
                OscElement::Bundle(inner.clone()),
            ],
        };
        let bytes = encode_bundle(&outer);
        let decoded = decode_bundle(&bytes).unwrap();
        assert_eq!(decoded, outer);
    }

    #[test]
    fn nested_array_argument_decodes_one_level_deep() {
        // `[i[f]i]`: a 3-element array whose middle element is itself a
        // 1-element array.
        let msg = OscMessage::new(
            "/arr",
            vec![Value::Array(vec![
                Value::Int32(1),
                Value::Array(vec![Value::Float32(2.5)]),
                Value::Int32(3),
            ])],
        );
        assert_eq!(msg.type_tag_string(), ",[i[f]i]");
        let bytes = encode_message(&msg);
        let decoded = decode_message(&bytes).unwrap();
        assert_eq!(decoded, msg);
        match &decoded.args[0] {
            Value::Array(outer) => {
                assert_eq!(outer.len(), 3);
                match &outer[1] {
                    Value::Array(inner) => assert_eq!(inner, &vec![Value::Float32(2.5)]),
                    other => panic!("expected nested array, got {other:?}"),
                }
            }
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn unmatched_closing_bracket_is_rejected() {
        let mut bytes = Vec::new();
        write_padded_string(&mut bytes, "/addr");
        write_padded_string(&mut bytes, ",i]");
        let mut buf = [0u8; 4];
        BigEndian::write_i32(&mut buf, 1);
        bytes.extend_from_slice(&buf);
        assert!(decode_message(&bytes).is_err());
    }

    #[test]
    fn truncated_packet_is_rejected() {
        let msg = OscMessage::new("/addr", vec![Value::Int32(1)]);
        let mut bytes = encode_message(&msg);
        bytes.truncate(bytes.len() - 2);
        assert!(decode_message(&bytes).is_err());
    }
}
