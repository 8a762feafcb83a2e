use crate::exception::ExceptionCode;
use crate::types::{TxId, UnitId};

/// Transport encoding of a [Frame]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Byte-stream encoding with a trailing CRC-16
    Rtu,
    /// Length-delimited encoding with an MBAP header
    Mbap {
        /// transaction id echoed from request to response
        tx_id: TxId,
    },
}

/// A decoded protocol message: device id, function code, and payload
///
/// A response starts life as a structural copy of the request frame, so it
/// inherits the transport encoding (and MBAP transaction id) of the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    unit_id: UnitId,
    function: u8,
    payload: Vec<u8>,
    kind: FrameKind,
}

impl Frame {
    /// Create a frame with the RTU encoding
    pub fn rtu(unit_id: UnitId, function: u8, payload: Vec<u8>) -> Self {
        Self {
            unit_id,
            function,
            payload,
            kind: FrameKind::Rtu,
        }
    }

    /// Create a frame with the MBAP encoding
    pub fn mbap(tx_id: TxId, unit_id: UnitId, function: u8, payload: Vec<u8>) -> Self {
        Self {
            unit_id,
            function,
            payload,
            kind: FrameKind::Mbap { tx_id },
        }
    }

    /// Device the frame is addressed to
    pub fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    /// Readdress the frame, used during broadcast fan-out
    pub fn set_unit_id(&mut self, unit_id: UnitId) {
        self.unit_id = unit_id;
    }

    /// Raw function code
    pub fn function(&self) -> u8 {
        self.function
    }

    /// Payload bytes following the function code
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Replace the payload, leaving the rest of the envelope intact
    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
    }

    /// Turn the frame into an exception response: the function code gets its
    /// high bit set and the payload becomes the single-byte exception code
    pub fn set_exception(&mut self, exception: ExceptionCode) {
        self.function |= 0x80;
        self.payload = vec![exception.into()];
    }

    /// Transport encoding of the frame
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Encode the frame into wire bytes according to its transport encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        match self.kind {
            FrameKind::Rtu => crate::serial::frame::encode(self),
            FrameKind::Mbap { .. } => crate::tcp::frame::encode(self),
        }
    }
}
