//! Modbus RTU framing: `[unit id][function][payload][crc16, little-endian]`.
//!
//! The CRC covers every byte except itself. Minimum total frame length is
//! 5 bytes (unit id, function, one payload byte, two CRC bytes).

use crate::error::FrameParseError;
use crate::frame::Frame;
use crate::types::UnitId;

pub(crate) mod constants {
    pub(crate) const MIN_FRAME_LENGTH: usize = 5;
    pub(crate) const CRC_LENGTH: usize = 2;
    /// unit id + function + 253-byte ADU + CRC
    pub(crate) const MAX_FRAME_LENGTH: usize = 256;
}

/// precomputes the CRC table as a constant!
const CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_MODBUS);

/// Modbus CRC-16 over an arbitrary byte sequence
pub fn crc16(bytes: &[u8]) -> u16 {
    CRC.checksum(bytes)
}

/// Decode one RTU packet into a [Frame]
///
/// Fails without producing a frame if the packet is shorter than 5 bytes or
/// the trailing CRC does not match the checksum of the preceding bytes.
pub fn decode(packet: &[u8]) -> Result<Frame, FrameParseError> {
    if packet.len() < constants::MIN_FRAME_LENGTH {
        return Err(FrameParseError::ShortFrame(packet.len()));
    }

    let (body, trailer) = packet.split_at(packet.len() - constants::CRC_LENGTH);
    let received = u16::from_le_bytes([trailer[0], trailer[1]]);
    let computed = crc16(body);
    if received != computed {
        return Err(FrameParseError::CrcMismatch(received, computed));
    }

    Ok(Frame::rtu(
        UnitId::new(body[0]),
        body[1],
        body[2..].to_vec(),
    ))
}

/// Encode a [Frame] into RTU wire bytes, stamping a fresh CRC
pub(crate) fn encode(frame: &Frame) -> Vec<u8> {
    let mut bytes =
        Vec::with_capacity(2 + frame.payload().len() + constants::CRC_LENGTH);
    bytes.push(frame.unit_id().value);
    bytes.push(frame.function());
    bytes.extend_from_slice(frame.payload());

    let crc = crc16(&bytes);
    bytes.extend_from_slice(&crc.to_le_bytes());
    bytes
}
