use crate::constants::exceptions;

/// Exception codes that a request handler may produce
///
/// A successful handler returns `Ok(payload)` instead of a code, so the
/// success case never appears here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExceptionCode {
    /// The function code received in the query has no bound handler
    IllegalFunction,
    /// The data address received in the query is not an allowable address for the device
    IllegalDataAddress,
    /// An unrecoverable error occurred while the device was attempting to perform the
    /// requested action
    SlaveDeviceFailure,
}

impl From<ExceptionCode> for u8 {
    fn from(ex: ExceptionCode) -> Self {
        match ex {
            ExceptionCode::IllegalFunction => exceptions::ILLEGAL_FUNCTION,
            ExceptionCode::IllegalDataAddress => exceptions::ILLEGAL_DATA_ADDRESS,
            ExceptionCode::SlaveDeviceFailure => exceptions::SLAVE_DEVICE_FAILURE,
        }
    }
}

impl std::error::Error for ExceptionCode {}

impl std::fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExceptionCode::IllegalFunction => {
                f.write_str("function code received in the query has no bound handler")
            }
            ExceptionCode::IllegalDataAddress => f.write_str(
                "data address received in the query is not an allowable address for the device",
            ),
            ExceptionCode::SlaveDeviceFailure => f.write_str(
                "unrecoverable error occurred while the device was attempting to perform the requested action",
            ),
        }
    }
}
