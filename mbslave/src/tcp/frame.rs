//! Modbus TCP (MBAP) framing.
//!
//! Header layout: `[tx id: u16 BE][protocol id: u16 BE, always 0]`
//! `[length: u16 BE][unit id: u8]`, followed by the function code and
//! payload. The length field counts the unit id plus the PDU, so it
//! delimits the frame in place of a checksum trailer.

use crate::error::FrameParseError;
use crate::frame::{Frame, FrameKind};
use crate::types::{TxId, UnitId};

pub(crate) mod constants {
    pub(crate) const HEADER_LENGTH: usize = 7;
    pub(crate) const MAX_ADU_LENGTH: usize = 253;
    /// includes the 1-byte unit id
    pub(crate) const MAX_LENGTH_FIELD: usize = MAX_ADU_LENGTH + 1;
    /// unit id + function code
    pub(crate) const MIN_LENGTH_FIELD: usize = 2;
}

pub(crate) struct MbapHeader {
    pub(crate) tx_id: TxId,
    pub(crate) length: usize,
    pub(crate) unit_id: UnitId,
}

pub(crate) fn parse_header(
    bytes: &[u8; constants::HEADER_LENGTH],
) -> Result<MbapHeader, FrameParseError> {
    let tx_id = u16::from_be_bytes([bytes[0], bytes[1]]);
    let protocol_id = u16::from_be_bytes([bytes[2], bytes[3]]);
    let length = u16::from_be_bytes([bytes[4], bytes[5]]) as usize;

    if protocol_id != 0 {
        return Err(FrameParseError::UnknownProtocolId(protocol_id));
    }

    if !(constants::MIN_LENGTH_FIELD..=constants::MAX_LENGTH_FIELD).contains(&length) {
        return Err(FrameParseError::BadLengthField(length));
    }

    Ok(MbapHeader {
        tx_id: TxId::new(tx_id),
        length,
        unit_id: UnitId::new(bytes[6]),
    })
}

/// Decode one MBAP packet into a [Frame]
///
/// The frame boundary comes from the explicit length field; trailing bytes
/// beyond it are ignored.
pub fn decode(packet: &[u8]) -> Result<Frame, FrameParseError> {
    if packet.len() < constants::HEADER_LENGTH {
        return Err(FrameParseError::ShortFrame(packet.len()));
    }

    let mut header_bytes = [0u8; constants::HEADER_LENGTH];
    header_bytes.copy_from_slice(&packet[..constants::HEADER_LENGTH]);
    let header = parse_header(&header_bytes)?;

    // the unit id counts towards the length field
    let end = constants::HEADER_LENGTH - 1 + header.length;
    if packet.len() < end {
        return Err(FrameParseError::ShortFrame(packet.len()));
    }

    Ok(Frame::mbap(
        header.tx_id,
        header.unit_id,
        packet[constants::HEADER_LENGTH],
        packet[constants::HEADER_LENGTH + 1..end].to_vec(),
    ))
}

/// Encode a [Frame] into MBAP wire bytes, recomputing the length field
pub(crate) fn encode(frame: &Frame) -> Vec<u8> {
    let tx_id = match frame.kind() {
        FrameKind::Mbap { tx_id } => tx_id,
        FrameKind::Rtu => TxId::default(),
    };

    let length = (2 + frame.payload().len()) as u16;
    let mut bytes = Vec::with_capacity(constants::HEADER_LENGTH + 1 + frame.payload().len());
    bytes.extend_from_slice(&tx_id.to_u16().to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes());
    bytes.extend_from_slice(&length.to_be_bytes());
    bytes.push(frame.unit_id().value);
    bytes.push(frame.function());
    bytes.extend_from_slice(frame.payload());
    bytes
}
