//! The 16-bit record format stored at every virtual address.
//!
//! ```text
//!  15            8 7             0
//! +---------------+---------------+
//! |   !payload    |    payload    |
//! +---------------+---------------+
//! ```
//!
//! Every record carries its own check, so a write interrupted by a power loss corrupts at most
//! the one variable it was writing.

use crate::error::Error;
use core::fmt::{Debug, Formatter};

const PAYLOAD_MASK: u16 = 0x00FF;
const CHECKSUM_SHIFT: u32 = 8;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct PhysicalRecord(u16);

impl PhysicalRecord {
    /// Pattern of a never written or wiped record. Never valid.
    pub const ERASED: PhysicalRecord = PhysicalRecord(u16::MAX);

    pub const fn encode(payload: u8) -> Self {
        let checksum = !payload;
        Self(((checksum as u16) << CHECKSUM_SHIFT) | payload as u16)
    }

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn payload(self) -> u8 {
        (self.0 & PAYLOAD_MASK) as u8
    }

    pub const fn checksum(self) -> u8 {
        (self.0 >> CHECKSUM_SHIFT) as u8
    }

    pub const fn is_valid(self) -> bool {
        self.checksum() == !self.payload()
    }

    pub fn decode(self) -> Result<u8, Error> {
        if self.is_valid() {
            Ok(self.payload())
        } else {
            Err(Error::InvalidRecord)
        }
    }
}

const _: () = assert!(
    !PhysicalRecord::ERASED.is_valid() && !PhysicalRecord::from_raw(0).is_valid(),
    "erased and zeroed records must never decode"
);

impl Debug for PhysicalRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("PhysicalRecord(0x{:0>4x})", self.0))
    }
}

impl From<u16> for PhysicalRecord {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<PhysicalRecord> for u16 {
    fn from(record: PhysicalRecord) -> Self {
        record.0
    }
}
