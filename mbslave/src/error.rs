/// Errors that occur while turning raw packets into frames (TCP or RTU)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameParseError {
    /// Packet is too short to hold a complete frame
    ShortFrame(usize),
    /// Trailing CRC does not match the checksum of the preceding bytes
    CrcMismatch(u16, u16), // received, computed
    /// MBAP header carries a non-Modbus protocol id
    UnknownProtocolId(u16),
    /// MBAP length field is outside the representable body range
    BadLengthField(usize),
}

impl std::error::Error for FrameParseError {}

impl std::fmt::Display for FrameParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameParseError::ShortFrame(len) => {
                write!(f, "received a packet of {len} bytes, too short for a frame")
            }
            FrameParseError::CrcMismatch(received, computed) => write!(
                f,
                "CRC mismatch: received {received:#06X}, computed {computed:#06X}"
            ),
            FrameParseError::UnknownProtocolId(id) => {
                write!(f, "received frame with non-Modbus protocol id: {id:#06X}")
            }
            FrameParseError::BadLengthField(len) => write!(
                f,
                "received frame with length field {len}, valid range is [2, {}]",
                crate::tcp::frame::constants::MAX_LENGTH_FIELD
            ),
        }
    }
}

/// Errors that occur while reading fields out of a frame payload
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AduParseError {
    /// Payload is too short to hold the expected field
    InsufficientBytes,
    /// Payload contains extra trailing bytes
    TrailingBytes(usize),
}

impl std::error::Error for AduParseError {}

impl std::fmt::Display for AduParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AduParseError::InsufficientBytes => {
                f.write_str("payload is too short to hold the expected field")
            }
            AduParseError::TrailingBytes(count) => {
                write!(f, "payload contains {count} extra trailing bytes")
            }
        }
    }
}

/// Indicates that the server task has stopped and can no longer be reached
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Shutdown;

impl std::error::Error for Shutdown {}

impl std::fmt::Display for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("the server task has been shut down")
    }
}
