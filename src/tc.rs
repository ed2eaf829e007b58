//! Telecommand packet support: command secondary header, packet builder and parser.
//!
//! A command packet consists of the 6 byte primary header, the 2 byte command
//! secondary header and an optional payload, laid out contiguously in a single
//! caller-supplied buffer. [build_telecommand] is the one-call entry point for
//! producing a complete, checksummed packet; [CmdPacket::from_raw_slice] is the
//! receiving-side mirror which validates the checksum before exposing any field.
use crate::{
    checksum, ByteConversionError, CcsdsPacket, PacketId, PacketSequenceCtrl, PacketType,
    SpHeader, CCSDS_HEADER_LEN, MAX_TOTAL_LEN,
};
use core::fmt::{Display, Formatter};
use delegate::delegate;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "std")]
use std::error::Error;

/// Length of the command secondary header in bytes.
pub const CMD_SEC_HEADER_LEN: usize = core::mem::size_of::<zc::CmdSecHeader>();
/// Minimum length of a command packet: both headers, no payload.
pub const CMD_MIN_LEN: usize = CCSDS_HEADER_LEN + CMD_SEC_HEADER_LEN;
/// Byte offset of the checksum inside a serialized command packet.
pub const CHECKSUM_OFFSET: usize = CCSDS_HEADER_LEN + 1;
/// Maximum value of the 7 bit function code field.
pub const MAX_FUNCTION_CODE: u8 = 0x7F;

const RESERVED_BIT_MASK: u8 = 0x80;

/// Generic trait to access fields of a command secondary header.
pub trait CmdSecondaryHeader {
    fn function_code(&self) -> u8;
    fn checksum(&self) -> u8;
}

pub mod zc {
    use super::{CmdSecondaryHeader, MAX_FUNCTION_CODE, RESERVED_BIT_MASK};
    use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

    /// Raw rendition of the 2 byte command secondary header.
    ///
    /// Byte 0 holds a reserved bit followed by the 7 bit function code, byte 1 holds
    /// the checksum.
    #[derive(FromZeroes, FromBytes, AsBytes, Unaligned, Debug)]
    #[repr(C)]
    pub struct CmdSecHeader {
        command: [u8; 2],
    }

    impl CmdSecHeader {
        pub fn new(function_code: u8, checksum: u8) -> Self {
            CmdSecHeader {
                command: [function_code & MAX_FUNCTION_CODE, checksum],
            }
        }

        /// Set the function code, truncated to its 7 bit field width. The reserved bit
        /// already present in the header is preserved.
        pub fn set_function_code(&mut self, function_code: u8) {
            self.command[0] =
                (self.command[0] & RESERVED_BIT_MASK) | (function_code & MAX_FUNCTION_CODE);
        }

        pub fn set_checksum(&mut self, checksum: u8) {
            self.command[1] = checksum;
        }

        pub fn from_bytes(slice: &[u8]) -> Option<Self> {
            CmdSecHeader::read_from(slice)
        }

        pub fn to_bytes(&self, slice: &mut [u8]) -> Option<()> {
            self.write_to(slice)
        }
    }

    impl CmdSecondaryHeader for CmdSecHeader {
        #[inline]
        fn function_code(&self) -> u8 {
            self.command[0] & MAX_FUNCTION_CODE
        }

        #[inline]
        fn checksum(&self) -> u8 {
            self.command[1]
        }
    }
}

/// High-level command secondary header.
///
/// [Default] yields the canonical cleared state with both the function code and the
/// checksum set to zero.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CmdSecHeader {
    function_code: u8,
    pub checksum: u8,
}

impl CmdSecHeader {
    /// Create a new command secondary header with a cleared checksum field. The
    /// function code is truncated to its 7 bit field width.
    pub fn new(function_code: u8) -> Self {
        CmdSecHeader {
            function_code: function_code & MAX_FUNCTION_CODE,
            checksum: 0,
        }
    }

    /// Set the function code, truncated to its 7 bit field width.
    pub fn set_function_code(&mut self, function_code: u8) {
        self.function_code = function_code & MAX_FUNCTION_CODE;
    }
}

impl CmdSecondaryHeader for CmdSecHeader {
    #[inline]
    fn function_code(&self) -> u8 {
        self.function_code
    }

    #[inline]
    fn checksum(&self) -> u8 {
        self.checksum
    }
}

impl From<CmdSecHeader> for zc::CmdSecHeader {
    fn from(value: CmdSecHeader) -> Self {
        zc::CmdSecHeader::new(value.function_code, value.checksum)
    }
}

impl From<zc::CmdSecHeader> for CmdSecHeader {
    fn from(value: zc::CmdSecHeader) -> Self {
        CmdSecHeader {
            function_code: value.function_code(),
            checksum: value.checksum(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CmdError {
    ByteConversion(ByteConversionError),
    /// The required total length exceeds the 16 bit length field limit. Contains the
    /// required length.
    PacketTooLarge(usize),
    /// The passed slice is shorter than the packet it is supposed to hold. Contains
    /// the slice length.
    RawDataTooShort(usize),
    /// The XOR across the declared packet length did not reduce to zero. Contains the
    /// stored checksum byte.
    ChecksumFailure(u8),
}

impl From<ByteConversionError> for CmdError {
    #[inline]
    fn from(value: ByteConversionError) -> Self {
        Self::ByteConversion(value)
    }
}

impl Display for CmdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ByteConversion(e) => {
                write!(f, "low level byte conversion error: {e}")
            }
            Self::PacketTooLarge(len) => {
                write!(f, "packet with length {len} exceeds the 16 bit length limit")
            }
            Self::RawDataTooShort(len) => {
                write!(f, "raw data with length {len} too short for command packet")
            }
            Self::ChecksumFailure(checksum) => {
                write!(f, "checksum failure, stored checksum byte was {checksum:#04x}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl Error for CmdError {}

/// Command packet consisting of a primary header, a command secondary header and an
/// optional borrowed payload.
///
/// The packet never owns its serialized storage: [Self::write_to_bytes] assembles the
/// wire representation into a caller-supplied buffer and [Self::from_raw_slice] borrows
/// the payload from the received buffer.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct CmdPacket<'slice> {
    pub sp_header: SpHeader,
    pub sec_header: CmdSecHeader,
    payload: Option<&'slice [u8]>,
}

impl<'slice> CmdPacket<'slice> {
    /// Create a new command packet. The APID, sequence count and function code are
    /// truncated to their field widths of 11, 14 and 7 bits respectively. The packet
    /// type and the secondary header flag are set accordingly, the version is 0 and
    /// the sequence flags mark the packet as unsegmented.
    pub fn new(
        apid: u16,
        seq_count: u16,
        function_code: u8,
        payload: Option<&'slice [u8]>,
    ) -> Self {
        let mut sp_header = SpHeader::new(PacketType::Tc, true, apid, seq_count, 0);
        // An oversized payload is rejected in write_to_bytes before anything is written
        sp_header.set_total_len((CMD_MIN_LEN + payload.map_or(0, |payload| payload.len())) as u16);
        CmdPacket {
            sp_header,
            sec_header: CmdSecHeader::new(function_code),
            payload,
        }
    }

    /// Total serialized packet length: both headers plus the payload.
    pub fn len_packed(&self) -> usize {
        CMD_MIN_LEN + self.payload.map_or(0, |payload| payload.len())
    }

    pub fn payload(&self) -> Option<&'slice [u8]> {
        self.payload
    }

    /// Serialize the packet into the provided buffer and load the checksum.
    ///
    /// All size checks happen before the first byte is written: if the required total
    /// length exceeds the buffer capacity or the 16 bit length field limit, an error
    /// is returned and the buffer is left untouched. On success the returned length
    /// equals [Self::len_packed] and `slice[0..len]` is a fully valid command packet.
    pub fn write_to_bytes(&self, slice: &mut [u8]) -> Result<usize, CmdError> {
        let total_len = self.len_packed();
        if total_len > MAX_TOTAL_LEN {
            return Err(CmdError::PacketTooLarge(total_len));
        }
        if slice.len() < total_len {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: slice.len(),
                expected: total_len,
            }
            .into());
        }
        let mut sp_header = self.sp_header;
        sp_header.set_total_len(total_len as u16);
        let mut curr_idx = sp_header.write_to_bytes(slice)?;
        zc::CmdSecHeader::from(self.sec_header)
            .to_bytes(&mut slice[curr_idx..curr_idx + CMD_SEC_HEADER_LEN])
            .ok_or(ByteConversionError::ZeroCopyToError)?;
        curr_idx += CMD_SEC_HEADER_LEN;
        if let Some(payload) = self.payload {
            slice[curr_idx..curr_idx + payload.len()].copy_from_slice(payload);
            curr_idx += payload.len();
        }
        checksum::load(&mut slice[0..curr_idx])?;
        Ok(curr_idx)
    }

    /// Serialize the packet into a newly allocated vector.
    #[cfg(feature = "alloc")]
    pub fn to_vec(&self) -> Result<alloc::vec::Vec<u8>, CmdError> {
        let mut vec = alloc::vec![0_u8; self.len_packed()];
        self.write_to_bytes(&mut vec)?;
        Ok(vec)
    }

    /// Create a command packet view from a received raw buffer.
    ///
    /// The checksum is validated over the self-declared packet length before any field
    /// is exposed. The payload is borrowed from the passed slice. Returns the packet
    /// view and the total packet length on success.
    pub fn from_raw_slice(slice: &'slice [u8]) -> Result<(Self, usize), CmdError> {
        let raw_data_len = slice.len();
        if raw_data_len < CMD_MIN_LEN {
            return Err(CmdError::RawDataTooShort(raw_data_len));
        }
        let sp_header = SpHeader::from_raw_slice(slice)?;
        let total_len = sp_header.total_len();
        if total_len < CMD_MIN_LEN || raw_data_len < total_len {
            return Err(CmdError::RawDataTooShort(raw_data_len));
        }
        if !checksum::is_valid(&slice[0..total_len]) {
            return Err(CmdError::ChecksumFailure(slice[CHECKSUM_OFFSET]));
        }
        let sec_header = zc::CmdSecHeader::from_bytes(&slice[CCSDS_HEADER_LEN..CMD_MIN_LEN])
            .ok_or(ByteConversionError::ZeroCopyFromError)?;
        let payload = if total_len > CMD_MIN_LEN {
            Some(&slice[CMD_MIN_LEN..total_len])
        } else {
            None
        };
        Ok((
            CmdPacket {
                sp_header,
                sec_header: sec_header.into(),
                payload,
            },
            total_len,
        ))
    }
}

impl CcsdsPacket for CmdPacket<'_> {
    delegate!(to self.sp_header {
        fn ccsds_version(&self) -> u8;
        fn packet_id(&self) -> PacketId;
        fn psc(&self) -> PacketSequenceCtrl;
        fn data_len(&self) -> u16;
    });
}

impl CmdSecondaryHeader for CmdPacket<'_> {
    delegate!(to self.sec_header {
        fn function_code(&self) -> u8;
        fn checksum(&self) -> u8;
    });
}

/// Build a complete checksummed telecommand packet into the caller-provided buffer.
///
/// The APID, sequence count and function code are truncated to their field widths of
/// 11, 14 and 7 bits respectively; out-of-range values are not rejected. A missing or
/// empty payload produces a legal header-only packet of 8 bytes. Returns the total
/// packet length written, which always equals 8 plus the payload length.
pub fn build_telecommand(
    buf: &mut [u8],
    apid: u16,
    seq_count: u16,
    function_code: u8,
    payload: Option<&[u8]>,
) -> Result<usize, CmdError> {
    CmdPacket::new(apid, seq_count, function_code, payload).write_to_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SequenceFlags;
    use std::vec;
    use zerocopy::AsBytes;

    #[test]
    fn test_build_telecommand() {
        let mut buf = [0_u8; 32];
        let total_len = build_telecommand(&mut buf, 0x1A5, 0, 0x0A, Some(b"CMD_SEQ_0\0"))
            .expect("building telecommand failed");
        assert_eq!(total_len, 18);
        // Version 0, type 1, secondary header flag 1, APID high bits 0b001
        assert_eq!(buf[0], 0x19);
        assert_eq!(buf[1], 0xA5);
        // Unsegmented, sequence count 0
        assert_eq!(buf[2], 0xC0);
        assert_eq!(buf[3], 0x00);
        // Length field stores the total length minus 7
        assert_eq!(buf[4], 0x00);
        assert_eq!(buf[5], 0x0B);
        // Function code with cleared reserved bit
        assert_eq!(buf[6], 0x0A);
        assert_eq!(buf[7], 0xBF);
        assert_eq!(&buf[8..18], b"CMD_SEQ_0\0");
        assert!(checksum::is_valid(&buf[0..total_len]));
    }

    #[test]
    fn test_decode_roundtrip() {
        let mut buf = [0_u8; 32];
        let total_len =
            build_telecommand(&mut buf, 0x1A5, 1337, 0x0A, Some(b"CMD_SEQ_0\0")).unwrap();
        let (packet, read_len) = CmdPacket::from_raw_slice(&buf[0..total_len])
            .expect("creating command packet from raw buffer failed");
        assert_eq!(read_len, total_len);
        assert_eq!(packet.apid(), 0x1A5);
        assert_eq!(packet.seq_count(), 1337);
        assert_eq!(packet.function_code(), 0x0A);
        assert_eq!(packet.payload(), Some(b"CMD_SEQ_0\0".as_slice()));
        assert_eq!(packet.total_len(), total_len);
        assert!(packet.is_tc());
        assert!(packet.sec_header_flag());
        assert_eq!(packet.ccsds_version(), 0b000);
        assert_eq!(packet.sequence_flags(), SequenceFlags::Unsegmented);
        assert_eq!(packet.checksum(), buf[CHECKSUM_OFFSET]);
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = [0_u8; 16];
        let total_len = build_telecommand(&mut buf, 0x42, 5, 0x01, None).unwrap();
        assert_eq!(total_len, CMD_MIN_LEN);
        assert!(checksum::is_valid(&buf[0..total_len]));
        let (packet, _) = CmdPacket::from_raw_slice(&buf[0..total_len]).unwrap();
        assert_eq!(packet.payload(), None);
        assert_eq!(packet.len_packed(), CMD_MIN_LEN);

        // An empty payload slice behaves like an absent payload on the wire
        let mut buf_empty = [0_u8; 16];
        let total_len_empty =
            build_telecommand(&mut buf_empty, 0x42, 5, 0x01, Some(b"")).unwrap();
        assert_eq!(total_len_empty, CMD_MIN_LEN);
        assert_eq!(buf[0..CMD_MIN_LEN], buf_empty[0..CMD_MIN_LEN]);
    }

    #[test]
    fn test_corruption_detected() {
        let mut buf = [0_u8; 32];
        let total_len =
            build_telecommand(&mut buf, 0x1A5, 0, 0x0A, Some(b"CMD_SEQ_0\0")).unwrap();
        buf[10] ^= 0x01;
        assert!(!checksum::is_valid(&buf[0..total_len]));
        assert_eq!(
            CmdPacket::from_raw_slice(&buf[0..total_len]),
            Err(CmdError::ChecksumFailure(buf[CHECKSUM_OFFSET]))
        );
    }

    #[test]
    fn test_exact_fit_and_overflow() {
        let payload = [0x55_u8; 4];
        let mut buf = [0_u8; 12];
        // Required size equals the capacity
        let total_len = build_telecommand(&mut buf, 0x42, 0, 0x01, Some(&payload)).unwrap();
        assert_eq!(total_len, 12);

        // One byte short: rejected with no observable write
        let mut small_buf = [0_u8; 11];
        assert_eq!(
            build_telecommand(&mut small_buf, 0x42, 0, 0x01, Some(&payload)),
            Err(CmdError::ByteConversion(
                ByteConversionError::ToSliceTooSmall {
                    found: 11,
                    expected: 12,
                }
            ))
        );
        assert_eq!(small_buf, [0_u8; 11]);
    }

    #[test]
    fn test_length_field_limit() {
        let payload = vec![0_u8; MAX_TOTAL_LEN - CMD_MIN_LEN + 1];
        let mut buf = vec![0_u8; MAX_TOTAL_LEN + 16];
        assert_eq!(
            build_telecommand(&mut buf, 0x42, 0, 0x01, Some(&payload)),
            Err(CmdError::PacketTooLarge(MAX_TOTAL_LEN + 1))
        );
        assert!(buf.iter().all(|byte| *byte == 0));

        // Largest representable packet is fine
        let payload = vec![0_u8; MAX_TOTAL_LEN - CMD_MIN_LEN];
        let total_len = build_telecommand(&mut buf, 0x42, 0, 0x01, Some(&payload)).unwrap();
        assert_eq!(total_len, MAX_TOTAL_LEN);
        assert!(checksum::is_valid(&buf[0..total_len]));
    }

    #[test]
    fn test_field_truncation() {
        let mut buf = [0_u8; 16];
        let total_len = build_telecommand(&mut buf, 0xFFFF, 0xFFFF, 0xFF, None).unwrap();
        let (packet, _) = CmdPacket::from_raw_slice(&buf[0..total_len]).unwrap();
        assert_eq!(packet.apid(), 0x7FF);
        assert_eq!(packet.seq_count(), 0x3FFF);
        assert_eq!(packet.function_code(), 0x7F);
    }

    #[test]
    fn test_reserved_bit_preserved() {
        let mut sec_header = zc::CmdSecHeader::from_bytes(&[0x85, 0x00]).unwrap();
        assert_eq!(sec_header.function_code(), 0x05);
        sec_header.set_function_code(0x0A);
        assert_eq!(sec_header.as_bytes()[0], 0x8A);
        assert_eq!(sec_header.function_code(), 0x0A);
        // Truncation applies to the function code write as well
        sec_header.set_function_code(0xFF);
        assert_eq!(sec_header.as_bytes()[0], 0xFF);
        assert_eq!(sec_header.function_code(), 0x7F);
    }

    #[test]
    fn test_raw_data_too_short() {
        let mut buf = [0_u8; 16];
        let total_len = build_telecommand(&mut buf, 0x42, 0, 0x01, Some(b"ABCD")).unwrap();
        assert_eq!(
            CmdPacket::from_raw_slice(&buf[0..CMD_MIN_LEN - 1]),
            Err(CmdError::RawDataTooShort(CMD_MIN_LEN - 1))
        );
        // Corrupt the length field so the packet declares more data than was received
        buf[5] = 0x20;
        assert_eq!(
            CmdPacket::from_raw_slice(&buf[0..total_len]),
            Err(CmdError::RawDataTooShort(total_len))
        );
    }

    #[test]
    #[cfg(feature = "alloc")]
    fn test_to_vec() {
        let mut buf = [0_u8; 32];
        let packet = CmdPacket::new(0x1A5, 0, 0x0A, Some(b"CMD_SEQ_0\0"));
        let total_len = packet.write_to_bytes(&mut buf).unwrap();
        let vec = packet.to_vec().unwrap();
        assert_eq!(vec.len(), total_len);
        assert_eq!(&buf[0..total_len], vec.as_slice());
    }
}
