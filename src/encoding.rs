//! Primitive wire encodings shared by every packet: the Remaining Length
//! varint and MQTT's 16-bit-length-prefixed text and binary fields.

use crate::error::{MqttError, Result};
use bytes::{Buf, BufMut, BytesMut};

/// Largest value a four-byte Remaining Length can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Encodes a Remaining Length as a base-128 varint, low group first,
/// continuation bit on every byte but the last.
pub fn encode_remaining_length(buf: &mut BytesMut, len: usize) -> Result<()> {
    if len > MAX_REMAINING_LENGTH {
        return Err(MqttError::PacketTooLarge(len));
    }
    let mut value = len as u32;
    loop {
        let mut byte = (value % 128) as u8;
        value /= 128;
        if value > 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            return Ok(());
        }
    }
}

/// Decodes a Remaining Length from an in-memory buffer.
///
/// Fails with `MalformedPacket` if a fifth continuation byte is seen and
/// with `UnexpectedEof` if the buffer runs out mid-varint.
pub fn decode_remaining_length(buf: &mut impl Buf) -> Result<u32> {
    let mut value: u32 = 0;
    let mut multiplier: u32 = 1;
    for i in 0..4 {
        if !buf.has_remaining() {
            return Err(MqttError::UnexpectedEof);
        }
        let byte = buf.get_u8();
        value += u32::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        if i < 3 {
            multiplier *= 128;
        }
    }
    Err(MqttError::MalformedPacket(
        "remaining length exceeds 4 bytes".to_string(),
    ))
}

/// Encodes a UTF-8 string as a 16-bit big-endian length followed by its
/// bytes.
pub fn encode_string(buf: &mut BytesMut, s: &str) -> Result<()> {
    encode_bytes(buf, s.as_bytes())
}

pub fn decode_string(buf: &mut impl Buf) -> Result<String> {
    let bytes = decode_bytes(buf)?;
    String::from_utf8(bytes)
        .map_err(|e| MqttError::MalformedPacket(format!("invalid UTF-8 in string field: {e}")))
}

/// Encodes a length-prefixed binary field (used for the password).
pub fn encode_bytes(buf: &mut BytesMut, data: &[u8]) -> Result<()> {
    let len: u16 = data
        .len()
        .try_into()
        .map_err(|_| MqttError::StringTooLong(data.len()))?;
    buf.put_u16(len);
    buf.put_slice(data);
    Ok(())
}

pub fn decode_bytes(buf: &mut impl Buf) -> Result<Vec<u8>> {
    let len = decode_u16(buf)? as usize;
    if buf.remaining() < len {
        return Err(MqttError::MalformedPacket(format!(
            "truncated field: need {len} bytes, have {}",
            buf.remaining()
        )));
    }
    let mut data = vec![0u8; len];
    buf.copy_to_slice(&mut data);
    Ok(data)
}

pub fn decode_u16(buf: &mut impl Buf) -> Result<u16> {
    if buf.remaining() < 2 {
        return Err(MqttError::MalformedPacket(
            "truncated 16-bit field".to_string(),
        ));
    }
    Ok(buf.get_u16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn round_trip(len: usize) -> (usize, u32) {
        let mut buf = BytesMut::new();
        encode_remaining_length(&mut buf, len).unwrap();
        let encoded_len = buf.len();
        let decoded = decode_remaining_length(&mut buf).unwrap();
        (encoded_len, decoded)
    }

    #[test]
    fn test_remaining_length_boundaries() {
        // (value, encoded width) at every varint width boundary
        let cases = [
            (0, 1),
            (127, 1),
            (128, 2),
            (16_383, 2),
            (16_384, 3),
            (2_097_151, 3),
            (2_097_152, 4),
            (268_435_455, 4),
        ];
        for (value, width) in cases {
            let (encoded_len, decoded) = round_trip(value);
            assert_eq!(encoded_len, width, "width for {value}");
            assert_eq!(decoded as usize, value);
        }
    }

    #[test]
    fn test_remaining_length_known_bytes() {
        let mut buf = BytesMut::new();
        encode_remaining_length(&mut buf, 321).unwrap();
        assert_eq!(&buf[..], &[0xC1, 0x02]);
    }

    #[test]
    fn test_remaining_length_rejects_fifth_byte() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01][..]);
        assert!(matches!(
            decode_remaining_length(&mut buf),
            Err(MqttError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_remaining_length_rejects_oversized_value() {
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_remaining_length(&mut buf, MAX_REMAINING_LENGTH + 1),
            Err(MqttError::PacketTooLarge(_))
        ));
    }

    #[test]
    fn test_remaining_length_truncated() {
        let mut buf = BytesMut::from(&[0x80][..]);
        assert!(matches!(
            decode_remaining_length(&mut buf),
            Err(MqttError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_string_round_trip() {
        let mut buf = BytesMut::new();
        encode_string(&mut buf, "sensors/kitchen/temp").unwrap();
        assert_eq!(&buf[..2], &[0x00, 0x14]);
        assert_eq!(decode_string(&mut buf).unwrap(), "sensors/kitchen/temp");
    }

    #[test]
    fn test_string_truncated() {
        let mut buf = BytesMut::from(&[0x00, 0x05, b'a', b'b'][..]);
        assert!(decode_string(&mut buf).is_err());
    }

    #[test]
    fn test_string_invalid_utf8() {
        let mut buf = BytesMut::from(&[0x00, 0x02, 0xFF, 0xFE][..]);
        assert!(matches!(
            decode_string(&mut buf),
            Err(MqttError::MalformedPacket(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_remaining_length_round_trip(value in 0usize..=MAX_REMAINING_LENGTH) {
            let (_, decoded) = round_trip(value);
            prop_assert_eq!(decoded as usize, value);
        }

        #[test]
        fn prop_string_round_trip(s in "\\PC{0,64}") {
            let mut buf = BytesMut::new();
            encode_string(&mut buf, &s).unwrap();
            prop_assert_eq!(decode_string(&mut buf).unwrap(), s);
        }
    }
}
