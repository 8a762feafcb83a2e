use tokio::sync::mpsc;

use crate::device::DeviceMap;
use crate::exception::ExceptionCode;
use crate::frame::Frame;
use crate::function::FunctionTable;
use crate::server::{Message, Request};

/// The single consumer of the request queue
///
/// Exactly one message is processed at a time, so handler invocations are
/// never interleaved and the device map needs no further locking.
pub(crate) struct ServerTask {
    rx: mpsc::Receiver<Message>,
    devices: DeviceMap,
    functions: FunctionTable,
}

impl ServerTask {
    pub(crate) fn new(
        rx: mpsc::Receiver<Message>,
        devices: DeviceMap,
        functions: FunctionTable,
    ) -> Self {
        Self {
            rx,
            devices,
            functions,
        }
    }

    pub(crate) async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            match message {
                Message::Request(request) => self.process(request),
                Message::CreateDevice(id, reply) => {
                    let _ = reply.send(self.devices.create(id));
                }
                Message::RemoveDevice(id, reply) => {
                    let _ = reply.send(self.devices.remove(id));
                }
                Message::SetHandler(function, handler, reply) => {
                    self.functions.set(function, handler);
                    let _ = reply.send(());
                }
            }
        }
        tracing::info!("all handles dropped, stopping");
    }

    fn process(&mut self, request: Request) {
        if request.frame.unit_id().is_broadcast() {
            tracing::debug!("start broadcast");
            let mut frame = request.frame;
            for id in self.devices.ids() {
                frame.set_unit_id(id);
                let _ = self.execute(&frame);
            }
            tracing::debug!("end broadcast");
            // broadcast doesn't send a response: the sender is dropped here
            return;
        }

        if !self.devices.contains(request.frame.unit_id()) {
            // unicast to a ghost address: no device exists to even raise an
            // exception, so the request is dropped without a response
            tracing::debug!("unknown device id: {}", request.frame.unit_id());
            return;
        }

        let response = self.execute(&request.frame);
        let _ = request.response.send(response.to_bytes());
    }

    /// Build the response as a structural copy of the request, then replace
    /// its payload with the handler result or the exception encoding
    fn execute(&mut self, frame: &Frame) -> Frame {
        let mut response = frame.clone();
        match self.functions.get_mut(frame.function()) {
            Some(handler) => match handler(&mut self.devices, frame) {
                Ok(payload) => response.set_payload(payload),
                Err(exception) => {
                    tracing::info!("function {}: {}", frame.function(), exception);
                    response.set_exception(exception);
                }
            },
            None => {
                tracing::info!("illegal function: {}", frame.function());
                response.set_exception(ExceptionCode::IllegalFunction);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use crate::frame::Frame;
    use crate::server::{spawn_server_task, Request, ServerHandle};
    use crate::types::{TxId, UnitId};

    async fn roundtrip(server: &ServerHandle, frame: Frame) -> Option<Frame> {
        let (tx, rx) = oneshot::channel();
        server.submit(Request::new(frame, tx)).await.unwrap();
        match rx.await {
            Ok(bytes) => Some(crate::tcp::frame::decode(&bytes).unwrap()),
            Err(_) => None,
        }
    }

    fn write_single_register(unit: u8, address: u16, value: u16) -> Frame {
        let mut payload = address.to_be_bytes().to_vec();
        payload.extend_from_slice(&value.to_be_bytes());
        Frame::mbap(TxId::new(1), UnitId::new(unit), 6, payload)
    }

    fn read_holding_registers(unit: u8, address: u16, count: u16) -> Frame {
        let mut payload = address.to_be_bytes().to_vec();
        payload.extend_from_slice(&count.to_be_bytes());
        Frame::mbap(TxId::new(1), UnitId::new(unit), 3, payload)
    }

    #[tokio::test]
    async fn unbound_function_code_yields_illegal_function() {
        let server = spawn_server_task();
        let frame = Frame::mbap(TxId::new(1), UnitId::new(1), 0x2B, vec![]);

        let response = roundtrip(&server, frame).await.unwrap();
        assert_eq!(response.function(), 0x2B | 0x80);
        assert_eq!(response.payload(), &[0x01]);
    }

    #[tokio::test]
    async fn unicast_to_unknown_device_produces_no_response() {
        let server = spawn_server_task();
        let response = roundtrip(&server, write_single_register(9, 0, 1)).await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn removed_device_stops_answering() {
        let server = spawn_server_task();
        assert!(roundtrip(&server, read_holding_registers(1, 0, 1))
            .await
            .is_some());

        server.remove_device(UnitId::new(1)).await.unwrap();
        assert!(roundtrip(&server, read_holding_registers(1, 0, 1))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn broadcast_writes_every_device_and_sends_nothing() {
        let server = spawn_server_task();
        for id in 2..=4 {
            server.create_device(UnitId::new(id)).await.unwrap();
        }

        let response = roundtrip(&server, write_single_register(0, 5, 0xBEEF)).await;
        assert!(response.is_none());

        for id in 1..=4 {
            let response = roundtrip(&server, read_holding_registers(id, 5, 1))
                .await
                .unwrap();
            assert_eq!(response.payload(), &[0x02, 0xBE, 0xEF]);
        }
    }

    #[tokio::test]
    async fn broadcast_read_is_discarded() {
        let server = spawn_server_task();
        let response = roundtrip(&server, read_holding_registers(0, 0, 4)).await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn response_echoes_the_mbap_transaction_id() {
        let server = spawn_server_task();
        let frame = Frame::mbap(
            TxId::new(0xCAFE),
            UnitId::new(1),
            3,
            vec![0x00, 0x00, 0x00, 0x01],
        );

        let (tx, rx) = oneshot::channel();
        server.submit(Request::new(frame, tx)).await.unwrap();
        let bytes = rx.await.unwrap();
        assert_eq!(&bytes[..2], &[0xCA, 0xFE]);
    }

    #[tokio::test]
    async fn a_registered_handler_overrides_the_default() {
        let server = spawn_server_task();
        server
            .register_handler(3, Box::new(|_, _| Ok(vec![0x02, 0xAA, 0xBB])))
            .await
            .unwrap();

        let response = roundtrip(&server, read_holding_registers(1, 0, 1))
            .await
            .unwrap();
        assert_eq!(response.payload(), &[0x02, 0xAA, 0xBB]);

        // the neighboring slots still dispatch their defaults
        let response = roundtrip(&server, write_single_register(1, 0, 7))
            .await
            .unwrap();
        assert_eq!(response.function(), 6);
    }
}
