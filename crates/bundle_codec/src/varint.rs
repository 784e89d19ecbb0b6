//! VarCodec: the primitive integer, float, and string encodings every other
//! component builds on (spec §4.1).
//!
//! Grounded on the teacher's `zenit_utils::packed` module, which defines a
//! `PackedData` trait with one `read_packed`/`write_packed` impl per fixed
//! little-endian primitive via `byteorder`. This module keeps that shape
//! (free functions over any `Read`/`Write`, `byteorder` for the fixed-width
//! cases) but switches to big-endian per spec, and adds the variable-length
//! encodings the teacher's format never needed.

use byteorder::{ReadBytesExt, WriteBytesExt, BE};
use std::io::{self, Read, Write};

use crate::error::DecodeError;
use bundle_codec_utils::SeekableTakeExt;

/// Maximum byte length of a VarInt (ceil(32 / 7)).
pub const MAX_VARINT_LEN: usize = 5;

/// Maximum byte length of a VarLong (ceil(64 / 7)).
pub const MAX_VARLONG_LEN: usize = 10;

/// An upper bound on a single length-prefixed string/byte run, independent of
/// how much the surrounding stream actually has left. This exists purely to
/// reject obviously-impossible VarInt lengths (e.g. a truncated stream whose
/// leftover bytes happen to decode to a huge count) before we even attempt to
/// bound the read against the stream - see [`read_length_prefixed`].
const SANITY_LENGTH_CAP: u32 = u32::MAX / 2;

pub fn write_u8<W: Write>(w: &mut W, v: u8) -> io::Result<()> {
    w.write_u8(v)
}

pub fn read_u8<R: Read>(r: &mut R) -> Result<u8, DecodeError> {
    r.read_u8().map_err(DecodeError::from)
}

pub fn write_u16<W: Write>(w: &mut W, v: u16) -> io::Result<()> {
    w.write_u16::<BE>(v)
}

pub fn read_u16<R: Read>(r: &mut R) -> Result<u16, DecodeError> {
    r.read_u16::<BE>().map_err(DecodeError::from)
}

pub fn write_i16<W: Write>(w: &mut W, v: i16) -> io::Result<()> {
    w.write_i16::<BE>(v)
}

pub fn read_i16<R: Read>(r: &mut R) -> Result<i16, DecodeError> {
    r.read_i16::<BE>().map_err(DecodeError::from)
}

pub fn write_i32<W: Write>(w: &mut W, v: i32) -> io::Result<()> {
    w.write_i32::<BE>(v)
}

pub fn read_i32<R: Read>(r: &mut R) -> Result<i32, DecodeError> {
    r.read_i32::<BE>().map_err(DecodeError::from)
}

pub fn write_i64<W: Write>(w: &mut W, v: i64) -> io::Result<()> {
    w.write_i64::<BE>(v)
}

pub fn read_i64<R: Read>(r: &mut R) -> Result<i64, DecodeError> {
    r.read_i64::<BE>().map_err(DecodeError::from)
}

pub fn write_f64<W: Write>(w: &mut W, v: f64) -> io::Result<()> {
    w.write_f64::<BE>(v)
}

pub fn read_f64<R: Read>(r: &mut R) -> Result<f64, DecodeError> {
    r.read_f64::<BE>().map_err(DecodeError::from)
}

/// Writes an unsigned 32-bit VarInt: little-endian 7-bit groups, high bit set
/// iff another byte follows.
pub fn write_var_int<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
    let mut value = value;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            w.write_u8(byte)?;
            return Ok(());
        } else {
            w.write_u8(byte | 0x80)?;
        }
    }
}

pub fn read_var_int<R: Read>(r: &mut R) -> Result<u32, DecodeError> {
    let mut result: u32 = 0;
    for i in 0..MAX_VARINT_LEN {
        let byte = read_u8(r)?;
        result |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }
    Err(DecodeError::InvalidFormat(
        "VarInt exceeded maximum length".into(),
    ))
}

/// Splits a count so its low bits can be spliced into spare header bits, per
/// spec §4.1's "VarInt with pre-read base". `base` is the exclusive upper
/// bound of what fits directly in the header (e.g. `7` for the 3-bit
/// property-count discriminator). Returns `(header_value, overflow)`: write
/// `header_value` into the header bits, and if `overflow` is `Some`, follow
/// the header with `write_var_int(overflow)`.
pub fn split_count_for_header(count: u32, base: u32) -> (u32, Option<u32>) {
    if count < base {
        (count, None)
    } else {
        (base, Some(count - base))
    }
}

/// Inverse of [`split_count_for_header`]: given the value already unpacked
/// from header bits, reconstructs the full count, reading the VarInt
/// continuation only if the header value hit `base`.
pub fn read_count_with_base<R: Read>(r: &mut R, header_value: u32, base: u32) -> Result<u32, DecodeError> {
    if header_value < base {
        Ok(header_value)
    } else {
        let overflow = read_var_int(r)?;
        Ok(base + overflow)
    }
}

/// Zig-zag encodes a signed 64-bit integer into its unsigned bit pattern.
pub const fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
pub const fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Writes a signed 64-bit VarLong: zig-zag encode, then emit 7-bit groups
/// with a continuation bit on every non-final byte (spec §4.1). A 64-bit
/// value needs at most 10 such groups (9 full groups cover 63 bits, the
/// 10th carries the remaining bit).
pub fn write_var_long<W: Write>(w: &mut W, value: i64) -> io::Result<()> {
    let mut zz = zigzag_encode(value);
    loop {
        let byte = (zz & 0x7F) as u8;
        zz >>= 7;
        if zz == 0 {
            w.write_u8(byte)?;
            return Ok(());
        } else {
            w.write_u8(byte | 0x80)?;
        }
    }
}

pub fn read_var_long<R: Read>(r: &mut R) -> Result<i64, DecodeError> {
    let mut result: u64 = 0;
    for i in 0..MAX_VARLONG_LEN {
        let byte = read_u8(r)?;
        result |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(zigzag_decode(result));
        }
    }
    Err(DecodeError::InvalidFormat(
        "VarLong exceeded maximum length".into(),
    ))
}

/// Writes a length-prefixed byte run: `VarInt(len) || bytes`.
pub fn write_length_prefixed<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    write_var_int(w, bytes.len() as u32)?;
    w.write_all(bytes)
}

/// Reads a length-prefixed byte run, bounding the read to what the
/// surrounding stream actually has left (spec §4.1: "decoders MUST bound
/// buffer sizes to prevent attacker-controlled huge allocations").
pub fn read_length_prefixed<R: Read + io::Seek>(r: &mut R) -> Result<Vec<u8>, DecodeError> {
    let len = read_var_int(r)?;
    if len > SANITY_LENGTH_CAP {
        return Err(DecodeError::InvalidFormat(format!(
            "implausible length prefix: {len}"
        )));
    }

    let mut bounded = r
        .seekable_take(len as u64)
        .map_err(DecodeError::from)?;
    let mut buf = Vec::with_capacity(len.min(1 << 16) as usize);
    bounded
        .read_to_end(&mut buf)
        .map_err(DecodeError::from)?;

    if buf.len() != len as usize {
        return Err(DecodeError::Truncated);
    }

    Ok(buf)
}

/// Reads a length-prefixed UTF-8 string.
pub fn read_utf8<R: Read + io::Seek>(r: &mut R) -> Result<String, DecodeError> {
    let bytes = read_length_prefixed(r)?;
    String::from_utf8(bytes)
        .map_err(|e| DecodeError::InvalidFormat(format!("invalid UTF-8: {e}")))
}

/// Writes a length-prefixed UTF-8 string.
pub fn write_utf8<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    write_length_prefixed(w, s.as_bytes())
}

/// Writes a boolean-gated optional value, used by the V1/V2 legacy layout
/// for `NodeId?` and `Decimal?` fields (spec §4.1).
pub fn write_optional<W: Write>(
    w: &mut W,
    value: Option<&[u8]>,
) -> io::Result<()> {
    match value {
        Some(bytes) => {
            w.write_u8(1)?;
            w.write_all(bytes)
        }
        None => w.write_u8(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn var_int_round_trips_boundary_values() {
        for &value in &[0u32, 1, 127, 128, 16383, 16384, 2097151, 2097152, u32::MAX] {
            let mut buf = Vec::new();
            write_var_int(&mut buf, value).unwrap();
            assert!(buf.len() <= MAX_VARINT_LEN);
            let mut cursor = Cursor::new(buf);
            assert_eq!(read_var_int(&mut cursor).unwrap(), value);
        }
    }

    #[test]
    fn var_int_single_byte_boundary_is_127() {
        let mut buf = Vec::new();
        write_var_int(&mut buf, 127).unwrap();
        assert_eq!(buf, vec![127]);

        let mut buf = Vec::new();
        write_var_int(&mut buf, 128).unwrap();
        assert_eq!(buf, vec![0x80, 0x01]);
    }

    #[test]
    fn var_long_round_trips_including_negatives_and_extremes() {
        for &value in &[0i64, 1, -1, 42, -42, i64::MAX, i64::MIN, 1i64 << 56, -(1i64 << 56)] {
            let mut buf = Vec::new();
            write_var_long(&mut buf, value).unwrap();
            assert!(buf.len() <= MAX_VARLONG_LEN);
            let mut cursor = Cursor::new(buf);
            assert_eq!(read_var_long(&mut cursor).unwrap(), value);
        }
    }

    #[test]
    fn zigzag_maps_small_negatives_to_small_unsigned() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_decode(0), 0);
        assert_eq!(zigzag_decode(1), -1);
    }

    #[test]
    fn count_splitting_round_trips_around_the_base() {
        for base in [1u32, 3, 7] {
            for count in 0..(base * 3) {
                let (header, overflow) = split_count_for_header(count, base);
                let mut buf = Vec::new();
                if let Some(v) = overflow {
                    write_var_int(&mut buf, v).unwrap();
                }
                let mut cursor = Cursor::new(buf);
                let restored = read_count_with_base(&mut cursor, header, base).unwrap();
                assert_eq!(restored, count);
            }
        }
    }

    #[test]
    fn length_prefixed_strings_round_trip() {
        let mut buf = Vec::new();
        write_utf8(&mut buf, "hello, bundle").unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_utf8(&mut cursor).unwrap(), "hello, bundle");
    }

    #[test]
    fn truncated_length_prefix_is_reported_as_truncated() {
        let mut buf = Vec::new();
        write_var_int(&mut buf, 100).unwrap(); // claims 100 bytes, provides none
        let mut cursor = Cursor::new(buf);
        assert!(matches!(read_length_prefixed(&mut cursor), Err(DecodeError::Truncated)));
    }
}
