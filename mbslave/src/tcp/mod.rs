pub mod frame;

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::server::{Request, ServerHandle};

/// A handle to a running TCP listener task. The task stops accepting
/// connections when the handle is dropped.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    _tx: mpsc::Sender<()>,
}

impl ListenerHandle {
    /// Address the listener is bound to, useful when binding to port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Bind a TCP listener and spawn a task that serves Modbus TCP requests
///
/// Each accepted connection gets its own session task. Sessions survive
/// malformed frames whenever the stream can be resynchronized from the
/// length field, and close when it cannot.
pub async fn spawn_tcp_server_task(
    addr: SocketAddr,
    server: ServerHandle,
) -> Result<ListenerHandle, std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(
        accept_loop(rx, listener, server)
            .instrument(tracing::info_span!("Modbus-Server-TCP", "listen" = ?local_addr)),
    );

    Ok(ListenerHandle {
        local_addr,
        _tx: tx,
    })
}

async fn accept_loop(mut rx: mpsc::Receiver<()>, listener: TcpListener, server: ServerHandle) {
    loop {
        tokio::select! {
            _ = rx.recv() => {
                tracing::info!("shutdown");
                return;
            }
            result = listener.accept() => {
                match result {
                    Ok((socket, addr)) => {
                        tracing::info!("accepted connection from {}", addr);
                        let server = server.clone();
                        tokio::spawn(
                            run_session(socket, server)
                                .instrument(tracing::info_span!("Session", "remote" = ?addr)),
                        );
                    }
                    Err(err) => {
                        tracing::warn!("unable to accept connections: {}", err);
                        return;
                    }
                }
            }
        }
    }
}

async fn run_session(mut socket: TcpStream, server: ServerHandle) {
    loop {
        let frame = match read_frame(&mut socket).await {
            Ok(Some(frame)) => frame,
            // malformed but well delimited, keep the session alive
            Ok(None) => continue,
            // EOF, I/O error, or a stream that cannot be resynchronized
            Err(_) => return,
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if server.submit(Request::new(frame, reply_tx)).await.is_err() {
            tracing::warn!("server task has shut down");
            return;
        }

        // a dropped sender means the request produced no response (broadcast
        // or unknown device) and the session just waits for the next frame
        if let Ok(response) = reply_rx.await {
            if let Err(err) = socket.write_all(&response).await {
                tracing::warn!("write error: {}", err);
                return;
            }
        }
    }
}

/// Read one MBAP frame off the stream
///
/// `Ok(None)` means the bytes were discarded but the next frame boundary is
/// known; `Err` means the session must close.
async fn read_frame(socket: &mut TcpStream) -> Result<Option<crate::Frame>, std::io::Error> {
    let mut header = [0u8; frame::constants::HEADER_LENGTH];
    socket.read_exact(&mut header).await?;

    // the length field delimits the body even when the rest of the header is
    // bad, so validate it first to know whether resynchronization is possible
    let length = u16::from_be_bytes([header[4], header[5]]) as usize;
    if !(frame::constants::MIN_LENGTH_FIELD..=frame::constants::MAX_LENGTH_FIELD)
        .contains(&length)
    {
        tracing::warn!(
            "{}",
            crate::FrameParseError::BadLengthField(length)
        );
        return Err(std::io::ErrorKind::InvalidData.into());
    }

    let mut packet = vec![0u8; frame::constants::HEADER_LENGTH - 1 + length];
    packet[..frame::constants::HEADER_LENGTH].copy_from_slice(&header);
    socket
        .read_exact(&mut packet[frame::constants::HEADER_LENGTH..])
        .await?;

    match frame::decode(&packet) {
        Ok(frame) => Ok(Some(frame)),
        Err(err) => {
            tracing::warn!("discarding malformed frame: {}", err);
            Ok(None)
        }
    }
}
