//! Video-frame transport codec.
//!
//! The preferred transport for frame data is a plain byte array. Older core
//! payloads instead packed each pixel byte pair into one UTF-16 code unit and
//! shipped the result as a string; [`unpack_utf16`] keeps those payloads
//! working. The packed form cannot represent code units in the surrogate
//! range (a JSON/Rust string has nowhere to put them), so frames whose pixel
//! data happens to land there arrive corrupted — which is why the string form
//! is decode-only here and new emitters must send bytes.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramePackError {
    #[error("frame of {0} bytes cannot be split into byte pairs")]
    OddLength(usize),

    #[error("byte pair at offset {offset} packs to surrogate code unit {unit:#06x}")]
    SurrogateRange { offset: usize, unit: u16 },
}

/// Reconstruct raw frame bytes from the legacy packed-string transport.
///
/// Each UTF-16 code unit of `packed` becomes one little-endian byte pair.
pub fn unpack_utf16(packed: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(packed.len() * 2);
    for unit in packed.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

/// Pack raw frame bytes into the legacy string transport.
///
/// Fails on byte pairs that land in the UTF-16 surrogate range; such frames
/// are exactly the ones the legacy transport loses, so refusing loudly beats
/// producing a frame that will not round-trip.
pub fn pack_utf16(bytes: &[u8]) -> Result<String, FramePackError> {
    if bytes.len() % 2 != 0 {
        return Err(FramePackError::OddLength(bytes.len()));
    }
    let mut packed = String::with_capacity(bytes.len() / 2);
    for (index, pair) in bytes.chunks_exact(2).enumerate() {
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        match char::from_u32(unit as u32) {
            Some(ch) => packed.push(ch),
            None => {
                return Err(FramePackError::SurrogateRange {
                    offset: index * 2,
                    unit,
                })
            }
        }
    }
    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_and_unpacks_byte_pairs() {
        let bytes = vec![0x00, 0x00, 0x34, 0x12, 0xff, 0x7f];
        let packed = pack_utf16(&bytes).unwrap();
        assert_eq!(unpack_utf16(&packed), bytes);
    }

    #[test]
    fn rejects_odd_length_frames() {
        assert_eq!(pack_utf16(&[1, 2, 3]), Err(FramePackError::OddLength(3)));
    }

    #[test]
    fn rejects_surrogate_range_pairs() {
        // 0xd800 little-endian.
        let err = pack_utf16(&[0x00, 0xd8]).unwrap_err();
        assert_eq!(
            err,
            FramePackError::SurrogateRange {
                offset: 0,
                unit: 0xd800
            }
        );
    }

    #[test]
    fn unpack_is_little_endian() {
        assert_eq!(unpack_utf16("\u{0201}"), vec![0x01, 0x02]);
    }
}
