//! XOR checksum engine for command packets.
//!
//! The integrity check over a command packet is a byte-wise XOR across the whole
//! serialized packet, seeded with [CHECKSUM_SEED]. The checksum byte stored in the
//! command secondary header is chosen so that the XOR over the complete packet,
//! checksum byte included, reduces to zero. Validation therefore needs no stored
//! expected value and works identically on the sending and the receiving side.
//!
//! The number of participating bytes is always taken from the length field of the
//! primary header, never from the capacity of the passed buffer.
use crate::tc::{CHECKSUM_OFFSET, CMD_MIN_LEN};
use crate::{zc, ByteConversionError, CcsdsPacket, CCSDS_HEADER_LEN};

/// Initial accumulator value. The non-zero seed ensures that an all-zero buffer
/// does not checksum to zero and pass validation.
pub const CHECKSUM_SEED: u8 = 0xFF;

/// Compute the XOR checksum over the full declared length of the packet.
///
/// The checksum byte at [CHECKSUM_OFFSET] participates with whatever value it
/// currently holds. Returns an error if the slice is shorter than the primary header
/// or shorter than the total length declared by it.
pub fn compute(packet: &[u8]) -> Result<u8, ByteConversionError> {
    if packet.len() < CCSDS_HEADER_LEN {
        return Err(ByteConversionError::FromSliceTooSmall {
            found: packet.len(),
            expected: CCSDS_HEADER_LEN,
        });
    }
    let sp_header = zc::SpHeader::from_bytes(&packet[0..CCSDS_HEADER_LEN])
        .ok_or(ByteConversionError::ZeroCopyFromError)?;
    let total_len = sp_header.total_len();
    if packet.len() < total_len {
        return Err(ByteConversionError::FromSliceTooSmall {
            found: packet.len(),
            expected: total_len,
        });
    }
    Ok(packet[0..total_len]
        .iter()
        .fold(CHECKSUM_SEED, |checksum, byte| checksum ^ byte))
}

/// Compute the checksum of a command packet and store it in the secondary header.
///
/// The checksum field is zeroed first so that the previously stored value does not
/// participate in its own computation. Returns the stored checksum.
pub fn load(packet: &mut [u8]) -> Result<u8, ByteConversionError> {
    if packet.len() < CMD_MIN_LEN {
        return Err(ByteConversionError::ToSliceTooSmall {
            found: packet.len(),
            expected: CMD_MIN_LEN,
        });
    }
    packet[CHECKSUM_OFFSET] = 0;
    let checksum = compute(packet)?;
    packet[CHECKSUM_OFFSET] = checksum;
    Ok(checksum)
}

/// Validate the checksum of a received command packet.
///
/// Recomputes the XOR over the declared packet length with the stored checksum byte
/// included and returns true if and only if the result reduces to zero. Buffers
/// shorter than the declared length are reported as invalid, not as an error:
/// whether to drop such a packet is up to the caller.
pub fn is_valid(packet: &[u8]) -> bool {
    matches!(compute(packet), Ok(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tc::build_telecommand;

    #[test]
    fn test_load_and_validate() {
        let mut buf = [0_u8; 16];
        let total_len = build_telecommand(&mut buf, 0x42, 3, 0x01, Some(b"ABCD")).unwrap();
        assert_eq!(total_len, 12);
        assert!(is_valid(&buf[0..total_len]));
        assert_eq!(compute(&buf[0..total_len]).unwrap(), 0);
        // Loading again is idempotent
        let checksum = buf[CHECKSUM_OFFSET];
        assert_eq!(load(&mut buf[0..total_len]).unwrap(), checksum);
        assert!(is_valid(&buf[0..total_len]));
    }

    #[test]
    fn test_all_zero_buffer_is_invalid() {
        // Declared total length is 7, all participating bytes are zero. The non-zero
        // seed keeps the XOR from reducing to zero.
        let buf = [0_u8; 8];
        assert_eq!(compute(&buf).unwrap(), CHECKSUM_SEED);
        assert!(!is_valid(&buf));
    }

    #[test]
    fn test_single_bit_flip_invalidates() {
        let mut buf = [0_u8; 16];
        let total_len = build_telecommand(&mut buf, 0x42, 3, 0x01, Some(b"ABCD")).unwrap();
        // Bytes 4 and 5 are skipped: corrupting the length field changes the declared
        // XOR range itself, so the reduction-to-zero argument does not apply to it
        for byte_idx in (0..total_len).filter(|idx| *idx != 4 && *idx != 5) {
            for bit in 0..8 {
                buf[byte_idx] ^= 1 << bit;
                assert!(!is_valid(&buf[0..total_len]));
                buf[byte_idx] ^= 1 << bit;
            }
            assert!(is_valid(&buf[0..total_len]));
        }
    }

    #[test]
    fn test_short_slice_errors() {
        let mut buf = [0_u8; 16];
        let total_len = build_telecommand(&mut buf, 0x42, 3, 0x01, Some(b"ABCD")).unwrap();
        // Slice shorter than the declared total length
        assert_eq!(
            compute(&buf[0..total_len - 1]),
            Err(ByteConversionError::FromSliceTooSmall {
                found: total_len - 1,
                expected: total_len,
            })
        );
        assert!(!is_valid(&buf[0..total_len - 1]));
        // Slice shorter than the primary header
        assert_eq!(
            compute(&buf[0..4]),
            Err(ByteConversionError::FromSliceTooSmall {
                found: 4,
                expected: CCSDS_HEADER_LEN,
            })
        );
        assert_eq!(
            load(&mut buf[0..7]),
            Err(ByteConversionError::ToSliceTooSmall {
                found: 7,
                expected: CMD_MIN_LEN,
            })
        );
    }
}
