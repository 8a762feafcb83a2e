//! An async implementation of a [Modbus](http://modbus.org/) slave (server)
//! engine using [Tokio](https://docs.rs/tokio) and Rust's `async/await` syntax.
//!
//! The engine exposes a bank of addressable devices, each holding the four
//! standard register tables, and answers read/write requests arriving over
//! any number of TCP connections and serial ports. All requests are funneled
//! through a single server task so that no two mutations of device memory can
//! ever interleave.
//!
//! # Features
//!
//! * Modbus TCP (MBAP) and Modbus RTU (CRC-16) framing
//! * The standard read/write function codes (1, 2, 3, 4, 5, 6, 15, 16)
//! * Broadcast (unit id 0) fan-out to every device
//! * Runtime device creation/removal and per-function-code handler overrides
//! * Panic-free parsing
//!
//! # Example
//!
//! A server that answers Modbus TCP requests for the default device:
//!
//! ```no_run
//! use mbslave::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = spawn_server_task();
//!     server.create_device(UnitId::new(0x02)).await?;
//!
//!     let _listener =
//!         tcp::spawn_tcp_server_task("127.0.0.1:502".parse()?, server.clone()).await?;
//!
//!     // ... run until shutdown ...
//!     Ok(())
//! }
//! ```

/// Numeric limits and protocol constants
pub mod constants;
/// Modbus RTU (serial) framing and the RTU port task
pub mod serial;
/// The server task, its handle, and the request ingress types
pub mod server;
/// Modbus TCP (MBAP) framing and the TCP listener task
pub mod tcp;

mod common {
    pub(crate) mod bits;
    pub(crate) mod cursor;
}
mod device;
mod error;
mod exception;
mod frame;
mod function;
mod handlers;
mod types;

pub use crate::device::{Device, DeviceError, DeviceMap};
pub use crate::error::{AduParseError, FrameParseError, Shutdown};
pub use crate::exception::ExceptionCode;
pub use crate::frame::{Frame, FrameKind};
pub use crate::function::FunctionHandler;
pub use crate::server::{create_server_task, spawn_server_task};
pub use crate::server::{Request, ResponseSender, ServerHandle};
pub use crate::types::{AddressRange, TxId, UnitId};
