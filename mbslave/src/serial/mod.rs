pub mod frame;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::server::{Request, ServerHandle};

/// A handle to a running RTU port task. The task stops when the handle is
/// dropped or the port reaches EOF.
#[derive(Debug)]
pub struct PortHandle {
    _tx: mpsc::Sender<()>,
}

/// Spawn a task that serves Modbus RTU requests read from an open port
///
/// The port may be anything that is both [AsyncRead] and [AsyncWrite]; with
/// the `serial` feature, [open] produces a suitable stream from a device
/// path. Each `read` is treated as one packet, matching the silence-delimited
/// framing of RTU links. Malformed packets are logged and discarded; the port
/// keeps being served.
pub fn spawn_rtu_server_task<T>(port: T, server: ServerHandle) -> PortHandle
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(run_port(rx, port, server).instrument(tracing::info_span!("Modbus-Server-RTU")));
    PortHandle { _tx: tx }
}

async fn run_port<T>(mut rx: mpsc::Receiver<()>, mut port: T, server: ServerHandle)
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = [0u8; frame::constants::MAX_FRAME_LENGTH];
    loop {
        tokio::select! {
            _ = rx.recv() => {
                tracing::info!("shutdown");
                return;
            }
            result = port.read(&mut buffer) => {
                match result {
                    Ok(0) => {
                        tracing::info!("port closed");
                        return;
                    }
                    Ok(count) => {
                        if !serve_packet(&buffer[..count], &mut port, &server).await {
                            return;
                        }
                    }
                    Err(err) => {
                        tracing::warn!("port read error: {}", err);
                        return;
                    }
                }
            }
        }
    }
}

// returns false when the task should stop
async fn serve_packet<T>(packet: &[u8], port: &mut T, server: &ServerHandle) -> bool
where
    T: AsyncWrite + Unpin,
{
    let frame = match frame::decode(packet) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!("discarding malformed packet: {}", err);
            return true;
        }
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    if server.submit(Request::new(frame, reply_tx)).await.is_err() {
        tracing::warn!("server task has shut down");
        return false;
    }

    // a dropped sender means the request produced no response (broadcast or
    // unknown device) and nothing is written back
    if let Ok(response) = reply_rx.await {
        if let Err(err) = port.write_all(&response).await {
            tracing::warn!("port write error: {}", err);
            return false;
        }
    }
    true
}

/// Open a serial port configured for Modbus RTU (8 data bits, 1 stop bit)
#[cfg(feature = "serial")]
pub fn open(
    path: &str,
    baud_rate: u32,
) -> Result<tokio_serial::SerialStream, tokio_serial::Error> {
    use tokio_serial::SerialPortBuilderExt;
    tokio_serial::new(path, baud_rate).open_native_async()
}
