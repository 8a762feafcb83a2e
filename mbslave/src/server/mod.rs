pub(crate) mod task;

use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::device::{DeviceError, DeviceMap};
use crate::error::Shutdown;
use crate::frame::Frame;
use crate::function::{FunctionHandler, FunctionTable};
use crate::types::UnitId;

/// Channel on which the server task delivers the encoded response bytes
///
/// The server drops the sender without sending for broadcast requests and
/// for unicast requests addressed to an unknown device.
pub type ResponseSender = oneshot::Sender<Vec<u8>>;

/// A decoded frame paired with the channel that receives its response
#[derive(Debug)]
pub struct Request {
    pub(crate) frame: Frame,
    pub(crate) response: ResponseSender,
}

impl Request {
    /// Pair a decoded frame with a response channel
    pub fn new(frame: Frame, response: ResponseSender) -> Self {
        Self { frame, response }
    }
}

pub(crate) enum Message {
    Request(Request),
    CreateDevice(UnitId, oneshot::Sender<Result<(), DeviceError>>),
    RemoveDevice(UnitId, oneshot::Sender<Result<(), DeviceError>>),
    SetHandler(u8, FunctionHandler, oneshot::Sender<()>),
}

/// A cloneable handle to the server task
///
/// All register memory is owned by the task behind this handle; requests and
/// device lifecycle operations alike travel through its single queue, so no
/// two of them ever run concurrently. The task stops once every handle has
/// been dropped.
#[derive(Clone, Debug)]
pub struct ServerHandle {
    tx: mpsc::Sender<Message>,
}

impl ServerHandle {
    /// Submit a request for processing
    ///
    /// The call does not return until the server task has accepted the
    /// request, which gives a FIFO-by-arrival ordering across every
    /// connection and port submitting concurrently.
    pub async fn submit(&self, request: Request) -> Result<(), Shutdown> {
        self.tx
            .send(Message::Request(request))
            .await
            .map_err(|_| Shutdown)
    }

    /// Allocate a device with four zero-initialized register banks
    pub async fn create_device(&self, id: UnitId) -> Result<(), DeviceError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Message::CreateDevice(id, tx))
            .await
            .map_err(|_| DeviceError::Shutdown)?;
        rx.await.map_err(|_| DeviceError::Shutdown)?
    }

    /// Delete a device and its memory; later unicast requests to this id are
    /// silently dropped
    pub async fn remove_device(&self, id: UnitId) -> Result<(), DeviceError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Message::RemoveDevice(id, tx))
            .await
            .map_err(|_| DeviceError::Shutdown)?;
        rx.await.map_err(|_| DeviceError::Shutdown)?
    }

    /// Bind or replace the handler dispatched for a function code
    ///
    /// The replacement is applied by the server task between requests, so it
    /// cannot race an in-flight handler.
    pub async fn register_handler(
        &self,
        function: u8,
        handler: FunctionHandler,
    ) -> Result<(), Shutdown> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Message::SetHandler(function, handler, tx))
            .await
            .map_err(|_| Shutdown)?;
        rx.await.map_err(|_| Shutdown)
    }
}

/// Create the server task and its handle without spawning it
///
/// Most users will prefer [spawn_server_task] unless they are using the
/// library from outside the Tokio runtime and need to spawn the future using
/// a runtime handle.
pub fn create_server_task() -> (impl std::future::Future<Output = ()>, ServerHandle) {
    // capacity of one makes submission a direct handoff to the server task
    let (tx, rx) = mpsc::channel(1);

    let mut devices = DeviceMap::new();
    let _ = devices.create(UnitId::new(1));

    let task = task::ServerTask::new(rx, devices, FunctionTable::with_defaults());
    (task.run(), ServerHandle { tx })
}

/// Spawn the server task onto the runtime and return its handle
///
/// The task starts with device 1 present and the standard function codes
/// bound. This method can only be called from within the runtime context.
pub fn spawn_server_task() -> ServerHandle {
    let (task, handle) = create_server_task();
    tokio::spawn(task.instrument(tracing::info_span!("Modbus-Server")));
    handle
}
