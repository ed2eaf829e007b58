//! Telemetry secondary header layout.
//!
//! Telemetry packets carry a fixed-size time field instead of the command secondary
//! header. Only the layout is provided here, the time code itself is treated as
//! opaque bytes.
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// Size of the time field in bytes.
pub const TLM_TIME_LEN: usize = 6;
/// Length of the telemetry secondary header in bytes.
pub const TLM_SEC_HEADER_LEN: usize = core::mem::size_of::<TlmSecHeader>();

/// Raw rendition of the telemetry secondary header: an opaque time field.
#[derive(FromZeroes, FromBytes, AsBytes, Unaligned, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct TlmSecHeader {
    time: [u8; TLM_TIME_LEN],
}

impl TlmSecHeader {
    pub fn new(time: [u8; TLM_TIME_LEN]) -> Self {
        TlmSecHeader { time }
    }

    pub fn time(&self) -> &[u8; TLM_TIME_LEN] {
        &self.time
    }

    pub fn set_time(&mut self, time: [u8; TLM_TIME_LEN]) {
        self.time = time;
    }

    pub fn from_bytes(slice: &[u8]) -> Option<Self> {
        TlmSecHeader::read_from(slice)
    }

    pub fn to_bytes(&self, slice: &mut [u8]) -> Option<()> {
        self.write_to(slice)
    }
}
