use crate::common::cursor::ReadCursor;
use crate::error::AduParseError;
use crate::exception::ExceptionCode;

/// Modbus unit identifier, just a type-safe wrapper around `u8`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId {
    /// underlying raw value
    pub value: u8,
}

impl UnitId {
    /// Create a new [UnitId]
    pub fn new(value: u8) -> Self {
        Self { value }
    }

    /// Broadcast address: a write to it is applied to every device
    pub fn broadcast() -> Self {
        Self { value: 0x00 }
    }

    /// Returns true if this is the broadcast address
    pub fn is_broadcast(&self) -> bool {
        self.value == 0x00
    }

    /// Returns true if the id may denote a stored device
    pub fn is_valid_device(&self) -> bool {
        (crate::constants::device::MIN_ID..=crate::constants::device::MAX_ID)
            .contains(&self.value)
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04X}", self.value)
    }
}

/// MBAP transaction identifier, echoed from request to response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxId {
    value: u16,
}

impl TxId {
    /// Create a new [TxId]
    pub fn new(value: u16) -> Self {
        Self { value }
    }

    /// Underlying raw value
    pub fn to_u16(self) -> u16 {
        self.value
    }
}

impl Default for TxId {
    fn default() -> Self {
        TxId::new(0)
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}", self.value)
    }
}

/// Start and count tuple found at the head of every read/write-multiple request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressRange {
    /// Starting address of the range
    pub start: u16,
    /// Count of elements in the range
    pub count: u16,
}

impl AddressRange {
    /// Create a new address range
    pub fn new(start: u16, count: u16) -> Self {
        Self { start, count }
    }

    /// Read a range from the first four payload bytes (big-endian)
    pub(crate) fn parse(cursor: &mut ReadCursor) -> Result<Self, AduParseError> {
        let start = cursor.read_u16_be()?;
        let count = cursor.read_u16_be()?;
        Ok(Self { start, count })
    }

    /// One-past-the-end address, free from overflow
    pub fn end(&self) -> u32 {
        self.start as u32 + self.count as u32
    }

    /// Convert to a bank index range, or fail without touching any memory
    pub(crate) fn to_bank_range(self) -> Result<std::ops::Range<usize>, ExceptionCode> {
        if self.end() as usize > crate::constants::registers::BANK_SIZE {
            return Err(ExceptionCode::IllegalDataAddress);
        }
        let start = self.start as usize;
        Ok(start..start + self.count as usize)
    }
}

impl std::fmt::Display for AddressRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "start: {:#06X} qty: {}", self.start, self.count)
    }
}
