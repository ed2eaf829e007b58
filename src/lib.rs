//! # CCSDS command packet header codec
//!
//! This crate contains generic implementations for the header formats used by
//! CCSDS (Consultative Committee for Space Data Systems) style command packets:
//!
//!  - The 6 byte Space Packet Primary Header common to all space packets
//!  - The 2 byte command secondary header carrying a function code and an
//!    XOR checksum byte
//!  - A bounds-checked telecommand builder and parser operating on
//!    caller-supplied buffers
//!
//! All multi-byte fields are serialized most-significant-byte first,
//! independent of the host architecture. Sub-byte fields like the 11 bit
//! Application Process ID (APID) or the 14 bit sequence count are packed with
//! explicit shift and mask operations; values exceeding a field width are
//! truncated to that width instead of being rejected, matching the wire
//! convention of flight software receivers.
//!
//! ## Features
//!
//! `cmdpackets` supports various runtime environments and is also suitable for
//! `no_std` environments.
//!
//! It also offers optional support for [`serde`](https://serde.rs/). This
//! allows serializing and deserializing the header types with an appropriate
//! `serde` provider like [`postcard`](https://github.com/jamesmunns/postcard).
//!
//! Default features:
//!
//!  - [`std`](https://doc.rust-lang.org/std/): Enables functionality relying on the standard library.
//!  - [`alloc`](https://doc.rust-lang.org/alloc/): Enables features which operate on containers
//!     like [`alloc::vec::Vec`](https://doc.rust-lang.org/beta/alloc/vec/struct.Vec.html).
//!     Enabled by the `std` feature.
//!
//! ## Example
//!
//! ```rust
//! use cmdpackets::{checksum, tc};
//!
//! let mut buf = [0_u8; 32];
//! let total_len = tc::build_telecommand(&mut buf, 0x1A5, 0, 0x0A, Some(b"PING"))
//!     .expect("building telecommand failed");
//! assert_eq!(total_len, 12);
//! assert!(checksum::is_valid(&buf[0..total_len]));
//! ```
#![no_std]
#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(any(feature = "std", test))]
extern crate std;

use core::fmt::{Display, Formatter};
use delegate::delegate;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "std")]
use std::error::Error;

pub mod checksum;
pub mod seq_count;
pub mod tc;
pub mod tm;

/// Length of the Space Packet Primary Header in bytes.
pub const CCSDS_HEADER_LEN: usize = core::mem::size_of::<zc::SpHeader>();
/// Maximum value of the 11 bit APID field.
pub const MAX_APID: u16 = 2u16.pow(11) - 1;
/// Maximum value of the 14 bit sequence count field.
pub const MAX_SEQ_COUNT: u16 = 2u16.pow(14) - 1;
/// The length field is 16 bits wide, which caps the total packet size.
pub const MAX_TOTAL_LEN: usize = u16::MAX as usize;

const SSC_MASK: u16 = 0x3FFF;
const VERSION_MASK: u16 = 0xE000;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ByteConversionError {
    /// The target slice is too small. Returns the passed slice length and the expected
    /// minimum size.
    ToSliceTooSmall { found: usize, expected: usize },
    /// The source slice is too small. Returns the passed slice length and the expected
    /// minimum size.
    FromSliceTooSmall { found: usize, expected: usize },
    /// The [zerocopy] library failed to write to bytes.
    ZeroCopyToError,
    /// The [zerocopy] library failed to read from bytes.
    ZeroCopyFromError,
}

impl Display for ByteConversionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ToSliceTooSmall { found, expected } => {
                write!(
                    f,
                    "target slice with size {found} too small, expected size of at least {expected}"
                )
            }
            Self::FromSliceTooSmall { found, expected } => {
                write!(
                    f,
                    "source slice with size {found} too small, expected size of at least {expected}"
                )
            }
            Self::ZeroCopyToError => {
                write!(f, "zerocopy serialization error")
            }
            Self::ZeroCopyFromError => {
                write!(f, "zerocopy deserialization error")
            }
        }
    }
}

#[cfg(feature = "std")]
impl Error for ByteConversionError {}

/// Packet type field occupying 1 bit of the first header byte.
#[derive(
    Debug, PartialEq, Eq, Copy, Clone, num_enum::TryFromPrimitive, num_enum::IntoPrimitive,
)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PacketType {
    Tm = 0,
    Tc = 1,
}

/// Segmentation flags occupying 2 bits of the sequence control word.
#[derive(
    Debug, PartialEq, Eq, Copy, Clone, num_enum::TryFromPrimitive, num_enum::IntoPrimitive,
)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SequenceFlags {
    ContinuationSegment = 0b00,
    FirstSegment = 0b01,
    LastSegment = 0b10,
    Unsegmented = 0b11,
}

/// Packet identification: the last 13 bits of the first two header bytes.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketId {
    pub ptype: PacketType,
    pub sec_header_flag: bool,
    apid: u16,
}

impl PacketId {
    /// Create a new packet ID. The APID is truncated to its 11 bit field width, any
    /// higher bits are discarded silently.
    pub fn new(ptype: PacketType, sec_header_flag: bool, apid: u16) -> PacketId {
        PacketId {
            ptype,
            sec_header_flag,
            apid: apid & MAX_APID,
        }
    }

    /// Set a new Application Process ID (APID), truncated to the 11 bit field width.
    pub fn set_apid(&mut self, apid: u16) {
        self.apid = apid & MAX_APID;
    }

    pub fn apid(&self) -> u16 {
        self.apid
    }

    /// Raw 16 bit representation with the version bits cleared.
    pub fn raw(&self) -> u16 {
        ((self.ptype as u16) << 12) | ((self.sec_header_flag as u16) << 11) | self.apid
    }
}

impl From<u16> for PacketId {
    fn from(raw_id: u16) -> Self {
        PacketId {
            // Masked to a single bit, so this never fails
            ptype: PacketType::try_from(((raw_id >> 12) & 0b1) as u8).unwrap(),
            sec_header_flag: ((raw_id >> 11) & 0b1) != 0,
            apid: raw_id & MAX_APID,
        }
    }
}

/// Packet sequence control: the third and fourth byte of the primary header.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketSequenceCtrl {
    pub seq_flags: SequenceFlags,
    seq_count: u16,
}

impl PacketSequenceCtrl {
    /// Create a new packet sequence control word. The sequence count is truncated to its
    /// 14 bit field width, any higher bits are discarded silently.
    pub fn new(seq_flags: SequenceFlags, seq_count: u16) -> PacketSequenceCtrl {
        PacketSequenceCtrl {
            seq_flags,
            seq_count: seq_count & SSC_MASK,
        }
    }

    /// Set a new sequence count, truncated to the 14 bit field width.
    pub fn set_seq_count(&mut self, ssc: u16) {
        self.seq_count = ssc & SSC_MASK;
    }

    pub fn seq_count(&self) -> u16 {
        self.seq_count
    }

    pub fn raw(&self) -> u16 {
        ((self.seq_flags as u16) << 14) | self.seq_count
    }
}

impl From<u16> for PacketSequenceCtrl {
    fn from(raw_id: u16) -> Self {
        PacketSequenceCtrl {
            // Masked to two bits which cover all four variants, so this never fails
            seq_flags: SequenceFlags::try_from(((raw_id >> 14) & 0b11) as u8).unwrap(),
            seq_count: raw_id & SSC_MASK,
        }
    }
}

macro_rules! sph_from_other {
    ($Self: path, $other: path) => {
        impl From<$other> for $Self {
            fn from(other: $other) -> Self {
                Self::from_composite_fields(
                    other.packet_id(),
                    other.psc(),
                    other.data_len(),
                    Some(other.ccsds_version()),
                )
            }
        }
    };
}

/// Generic trait to access fields of a CCSDS space packet header according to CCSDS 133.0-B-2
pub trait CcsdsPacket {
    fn ccsds_version(&self) -> u8;
    fn packet_id(&self) -> PacketId;
    fn psc(&self) -> PacketSequenceCtrl;

    /// Retrieve the raw data length field, which stores the total packet length minus 7
    fn data_len(&self) -> u16;

    /// Retrieve the total packet size based on the data length field
    fn total_len(&self) -> usize {
        usize::from(self.data_len()) + CCSDS_HEADER_LEN + 1
    }

    /// Retrieve 13 bit Packet Identification field. Can usually be retrieved with a bitwise AND
    /// of the first 2 bytes with 0x1FFF
    #[inline]
    fn packet_id_raw(&self) -> u16 {
        self.packet_id().raw()
    }

    /// Retrieve Packet Sequence Control
    #[inline]
    fn psc_raw(&self) -> u16 {
        self.psc().raw()
    }

    #[inline]
    /// Retrieve Packet Type (TM: 0, TC: 1)
    fn ptype(&self) -> PacketType {
        self.packet_id().ptype
    }

    #[inline]
    fn is_tm(&self) -> bool {
        self.ptype() == PacketType::Tm
    }

    #[inline]
    fn is_tc(&self) -> bool {
        self.ptype() == PacketType::Tc
    }

    /// Retrieve the secondary header flag. Returns true if a secondary header is present
    /// and false if it is not
    #[inline]
    fn sec_header_flag(&self) -> bool {
        self.packet_id().sec_header_flag
    }

    /// Retrieve Application Process ID
    #[inline]
    fn apid(&self) -> u16 {
        self.packet_id().apid
    }

    #[inline]
    fn seq_count(&self) -> u16 {
        self.psc().seq_count
    }

    #[inline]
    fn sequence_flags(&self) -> SequenceFlags {
        self.psc().seq_flags
    }
}

pub trait CcsdsPrimaryHeader {
    fn from_composite_fields(
        packet_id: PacketId,
        psc: PacketSequenceCtrl,
        data_len: u16,
        version: Option<u8>,
    ) -> Self;
}

/// Space Packet Primary Header according to CCSDS 133.0-B-2
///
/// # Arguments
///
/// * `version` - CCSDS version field, occupies the first 3 bits of the raw header
/// * `packet_id` - Packet Identifier, which can also be used as a start marker. Occupies the last
///    13 bits of the first two bytes of the raw header
/// * `psc` - Packet Sequence Control, occupies the third and fourth byte of the raw header
/// * `data_len` - Data length field occupies the fifth and the sixth byte of the raw header.
///    Stores the total packet length minus 7.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpHeader {
    pub version: u8,
    pub packet_id: PacketId,
    pub psc: PacketSequenceCtrl,
    pub data_len: u16,
}

impl Default for SpHeader {
    /// The default header is the canonical cleared state: all fields zero except the
    /// sequence flags, which are initialized to [SequenceFlags::Unsegmented].
    fn default() -> Self {
        SpHeader {
            version: 0,
            packet_id: PacketId {
                ptype: PacketType::Tm,
                apid: 0,
                sec_header_flag: false,
            },
            psc: PacketSequenceCtrl {
                seq_flags: SequenceFlags::Unsegmented,
                seq_count: 0,
            },
            data_len: 0,
        }
    }
}

impl SpHeader {
    /// Create a new Space Packet Header instance which can be used to create generic
    /// Space Packets. The APID and the sequence count are truncated to their field widths
    /// of 11 and 14 bits respectively.
    pub fn new(
        ptype: PacketType,
        sec_header: bool,
        apid: u16,
        seq_count: u16,
        data_len: u16,
    ) -> Self {
        let mut header = SpHeader::default();
        header.packet_id.sec_header_flag = sec_header;
        header.packet_id.apid = apid & MAX_APID;
        header.packet_id.ptype = ptype;
        header.psc.seq_count = seq_count & SSC_MASK;
        header.data_len = data_len;
        header
    }

    /// Helper function for telemetry space packet headers. The packet type field will be
    /// set accordingly.
    pub fn tm(apid: u16, seq_count: u16, data_len: u16) -> Self {
        Self::new(PacketType::Tm, false, apid, seq_count, data_len)
    }

    /// Helper function for telecommand space packet headers. The packet type field will be
    /// set accordingly.
    pub fn tc(apid: u16, seq_count: u16, data_len: u16) -> Self {
        Self::new(PacketType::Tc, false, apid, seq_count, data_len)
    }

    delegate!(to self.packet_id {
        /// Set a new APID, truncated to the 11 bit field width.
        pub fn set_apid(&mut self, apid: u16);
    });

    delegate!(to self.psc {
        /// Set a new sequence count, truncated to the 14 bit field width.
        pub fn set_seq_count(&mut self, seq_count: u16);
    });

    pub fn set_seq_flags(&mut self, seq_flags: SequenceFlags) {
        self.psc.seq_flags = seq_flags;
    }

    pub fn set_sec_header_flag(&mut self) {
        self.packet_id.sec_header_flag = true;
    }

    pub fn clear_sec_header_flag(&mut self) {
        self.packet_id.sec_header_flag = false;
    }

    pub fn set_packet_type(&mut self, packet_type: PacketType) {
        self.packet_id.ptype = packet_type;
    }

    /// Set the data length field from the total packet length, applying the off-by-7
    /// convention of the standard.
    pub fn set_total_len(&mut self, total_len: u16) {
        self.data_len = total_len.wrapping_sub((CCSDS_HEADER_LEN + 1) as u16);
    }

    pub fn from_raw_slice(buf: &[u8]) -> Result<Self, ByteConversionError> {
        if buf.len() < CCSDS_HEADER_LEN {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: CCSDS_HEADER_LEN,
            });
        }
        let zc_header = zc::SpHeader::from_bytes(&buf[0..CCSDS_HEADER_LEN])
            .ok_or(ByteConversionError::ZeroCopyFromError)?;
        Ok(Self::from(zc_header))
    }

    pub fn write_to_bytes(&self, buf: &mut [u8]) -> Result<usize, ByteConversionError> {
        if buf.len() < CCSDS_HEADER_LEN {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: CCSDS_HEADER_LEN,
            });
        }
        zc::SpHeader::from(*self)
            .to_bytes(&mut buf[0..CCSDS_HEADER_LEN])
            .ok_or(ByteConversionError::ZeroCopyToError)?;
        Ok(CCSDS_HEADER_LEN)
    }
}

impl CcsdsPacket for SpHeader {
    #[inline]
    fn ccsds_version(&self) -> u8 {
        self.version
    }

    #[inline]
    fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    #[inline]
    fn psc(&self) -> PacketSequenceCtrl {
        self.psc
    }

    #[inline]
    fn data_len(&self) -> u16 {
        self.data_len
    }
}

impl CcsdsPrimaryHeader for SpHeader {
    fn from_composite_fields(
        packet_id: PacketId,
        psc: PacketSequenceCtrl,
        data_len: u16,
        version: Option<u8>,
    ) -> Self {
        SpHeader {
            version: version.unwrap_or(0b000),
            packet_id,
            psc,
            data_len,
        }
    }
}

sph_from_other!(SpHeader, crate::zc::SpHeader);

pub mod zc {
    use crate::{CcsdsPacket, CcsdsPrimaryHeader, PacketId, PacketSequenceCtrl, VERSION_MASK};
    use zerocopy::byteorder::NetworkEndian;
    use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned, U16};

    /// Raw big-endian rendition of the 6 byte primary header. The byte layout of this
    /// struct is the wire layout, independent of the host byte order.
    #[derive(FromZeroes, FromBytes, AsBytes, Unaligned, Debug)]
    #[repr(C)]
    pub struct SpHeader {
        version_packet_id: U16<NetworkEndian>,
        psc: U16<NetworkEndian>,
        data_len: U16<NetworkEndian>,
    }

    impl SpHeader {
        pub fn new(
            packet_id: PacketId,
            psc: PacketSequenceCtrl,
            data_len: u16,
            version: Option<u8>,
        ) -> Self {
            let mut version_packet_id = packet_id.raw();
            if let Some(version) = version {
                version_packet_id = (((version & 0b111) as u16) << 13) | packet_id.raw()
            }
            SpHeader {
                version_packet_id: U16::from(version_packet_id),
                psc: U16::from(psc.raw()),
                data_len: U16::from(data_len),
            }
        }

        pub fn from_bytes(slice: &[u8]) -> Option<Self> {
            SpHeader::read_from(slice)
        }

        pub fn to_bytes(&self, slice: &mut [u8]) -> Option<()> {
            self.write_to(slice)
        }
    }

    impl CcsdsPacket for SpHeader {
        #[inline]
        fn ccsds_version(&self) -> u8 {
            ((self.version_packet_id.get() >> 13) as u8) & 0b111
        }

        fn packet_id(&self) -> PacketId {
            PacketId::from(self.packet_id_raw())
        }

        fn psc(&self) -> PacketSequenceCtrl {
            PacketSequenceCtrl::from(self.psc_raw())
        }

        #[inline]
        fn data_len(&self) -> u16 {
            self.data_len.get()
        }

        fn packet_id_raw(&self) -> u16 {
            self.version_packet_id.get() & (!VERSION_MASK)
        }

        fn psc_raw(&self) -> u16 {
            self.psc.get()
        }
    }

    impl CcsdsPrimaryHeader for SpHeader {
        fn from_composite_fields(
            packet_id: PacketId,
            psc: PacketSequenceCtrl,
            data_len: u16,
            version: Option<u8>,
        ) -> Self {
            SpHeader::new(packet_id, psc, data_len, version)
        }
    }

    sph_from_other!(SpHeader, crate::SpHeader);
}
