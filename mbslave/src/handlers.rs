//! Default handlers for the standard read/write function codes.
//!
//! Every handler resolves the frame's device first (a missing device is a
//! [ExceptionCode::SlaveDeviceFailure]), then decodes and bounds-checks the
//! address fields before touching any register bank.

use crate::common::bits;
use crate::common::cursor::ReadCursor;
use crate::device::{Device, DeviceMap};
use crate::exception::ExceptionCode;
use crate::frame::Frame;
use crate::types::AddressRange;

fn resolve<'a>(devices: &'a DeviceMap, frame: &Frame) -> Result<&'a Device, ExceptionCode> {
    devices
        .get(frame.unit_id())
        .ok_or(ExceptionCode::SlaveDeviceFailure)
}

fn resolve_mut<'a>(
    devices: &'a mut DeviceMap,
    frame: &Frame,
) -> Result<&'a mut Device, ExceptionCode> {
    devices
        .get_mut(frame.unit_id())
        .ok_or(ExceptionCode::SlaveDeviceFailure)
}

fn parse_range(cursor: &mut ReadCursor) -> Result<AddressRange, ExceptionCode> {
    AddressRange::parse(cursor).map_err(|_| ExceptionCode::IllegalDataAddress)
}

/// writes echo the first four request payload bytes back as the response
fn echo(frame: &Frame) -> Vec<u8> {
    frame.payload()[..4].to_vec()
}

fn bit_response(values: &[bool]) -> Vec<u8> {
    let mut data = Vec::with_capacity(1 + bits::num_bytes_for_bits(values.len()));
    data.push(bits::num_bytes_for_bits(values.len()) as u8);
    data.extend_from_slice(&bits::pack_bits(values));
    data
}

fn register_response(values: &[u16]) -> Vec<u8> {
    let mut data = Vec::with_capacity(1 + values.len() * 2);
    data.push((values.len() * 2) as u8);
    for value in values {
        data.extend_from_slice(&value.to_be_bytes());
    }
    data
}

/// function 1, bit-packs a range of coils
pub(crate) fn read_coils(
    devices: &mut DeviceMap,
    frame: &Frame,
) -> Result<Vec<u8>, ExceptionCode> {
    let device = resolve(devices, frame)?;
    let range = parse_range(&mut ReadCursor::new(frame.payload()))?;
    let span = range.to_bank_range()?;
    tracing::debug!("read coils, device {} {}", frame.unit_id(), range);
    Ok(bit_response(&device.coils[span]))
}

/// function 2, bit-packs a range of discrete inputs
pub(crate) fn read_discrete_inputs(
    devices: &mut DeviceMap,
    frame: &Frame,
) -> Result<Vec<u8>, ExceptionCode> {
    let device = resolve(devices, frame)?;
    let range = parse_range(&mut ReadCursor::new(frame.payload()))?;
    let span = range.to_bank_range()?;
    tracing::debug!("read discrete inputs, device {} {}", frame.unit_id(), range);
    Ok(bit_response(&device.discrete_inputs[span]))
}

/// function 3, word-packs a range of holding registers
pub(crate) fn read_holding_registers(
    devices: &mut DeviceMap,
    frame: &Frame,
) -> Result<Vec<u8>, ExceptionCode> {
    let device = resolve(devices, frame)?;
    let range = parse_range(&mut ReadCursor::new(frame.payload()))?;
    let span = range.to_bank_range()?;
    tracing::debug!(
        "read holding registers, device {} {}",
        frame.unit_id(),
        range
    );
    Ok(register_response(&device.holding_registers[span]))
}

/// function 4, word-packs a range of input registers
pub(crate) fn read_input_registers(
    devices: &mut DeviceMap,
    frame: &Frame,
) -> Result<Vec<u8>, ExceptionCode> {
    let device = resolve(devices, frame)?;
    let range = parse_range(&mut ReadCursor::new(frame.payload()))?;
    let span = range.to_bank_range()?;
    tracing::debug!("read input registers, device {} {}", frame.unit_id(), range);
    Ok(register_response(&device.input_registers[span]))
}

/// function 5, writes a single coil
///
/// Any non-zero value is stored as ON rather than requiring the 0xFF00 wire
/// convention.
pub(crate) fn write_single_coil(
    devices: &mut DeviceMap,
    frame: &Frame,
) -> Result<Vec<u8>, ExceptionCode> {
    let device = resolve_mut(devices, frame)?;
    let mut cursor = ReadCursor::new(frame.payload());
    let address = cursor
        .read_u16_be()
        .map_err(|_| ExceptionCode::IllegalDataAddress)?;
    let value = cursor
        .read_u16_be()
        .map_err(|_| ExceptionCode::IllegalDataAddress)?;
    tracing::debug!(
        "write single coil, device {}, address {} value {}",
        frame.unit_id(),
        address,
        value
    );
    device.coils[address as usize] = value != 0;
    Ok(echo(frame))
}

/// function 6, writes a single holding register
pub(crate) fn write_single_register(
    devices: &mut DeviceMap,
    frame: &Frame,
) -> Result<Vec<u8>, ExceptionCode> {
    let device = resolve_mut(devices, frame)?;
    let mut cursor = ReadCursor::new(frame.payload());
    let address = cursor
        .read_u16_be()
        .map_err(|_| ExceptionCode::IllegalDataAddress)?;
    let value = cursor
        .read_u16_be()
        .map_err(|_| ExceptionCode::IllegalDataAddress)?;
    tracing::debug!(
        "write single register, device {}, address {} value {:#06X}",
        frame.unit_id(),
        address,
        value
    );
    device.holding_registers[address as usize] = value;
    Ok(echo(frame))
}

/// function 15, writes a run of coils from packed bits
///
/// Exactly `count` bits are consumed regardless of byte alignment; surplus
/// bits in the final value byte are ignored.
pub(crate) fn write_multiple_coils(
    devices: &mut DeviceMap,
    frame: &Frame,
) -> Result<Vec<u8>, ExceptionCode> {
    let device = resolve_mut(devices, frame)?;
    let mut cursor = ReadCursor::new(frame.payload());
    let range = parse_range(&mut cursor)?;
    let span = range.to_bank_range()?;
    cursor
        .read_u8()
        .map_err(|_| ExceptionCode::IllegalDataAddress)?; // byte count
    let values = cursor.remainder();
    tracing::debug!("write multiple coils, device {} {}", frame.unit_id(), range);

    for (i, coil) in device.coils[span].iter_mut().enumerate() {
        match values.get(i / 8) {
            Some(byte) => *coil = bits::bit_at(*byte, i % 8),
            None => break,
        }
    }
    Ok(echo(frame))
}

/// function 16, bulk-writes holding registers
///
/// The number of decoded values must equal the declared quantity; a mismatch
/// leaves the bank untouched.
pub(crate) fn write_multiple_registers(
    devices: &mut DeviceMap,
    frame: &Frame,
) -> Result<Vec<u8>, ExceptionCode> {
    let device = resolve_mut(devices, frame)?;
    let mut cursor = ReadCursor::new(frame.payload());
    let range = parse_range(&mut cursor)?;
    let span = range.to_bank_range()?;
    cursor
        .read_u8()
        .map_err(|_| ExceptionCode::IllegalDataAddress)?; // byte count
    let values = cursor.remainder();

    if values.len() / 2 != range.count as usize {
        tracing::warn!(
            "write multiple registers, device {} {}: got {} value bytes",
            frame.unit_id(),
            range,
            values.len()
        );
        return Err(ExceptionCode::IllegalDataAddress);
    }

    tracing::debug!(
        "write multiple registers, device {} {}",
        frame.unit_id(),
        range
    );
    for (i, register) in device.holding_registers[span].iter_mut().enumerate() {
        *register = u16::from_be_bytes([values[2 * i], values[2 * i + 1]]);
    }
    Ok(echo(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UnitId;

    fn single_device() -> DeviceMap {
        let mut devices = DeviceMap::new();
        devices.create(UnitId::new(1)).unwrap();
        devices
    }

    fn request(function: u8, payload: &[u8]) -> Frame {
        Frame::rtu(UnitId::new(1), function, payload.to_vec())
    }

    #[test]
    fn missing_device_fails_before_address_arithmetic() {
        let mut devices = DeviceMap::new();
        // the range would also be invalid, but the device lookup comes first
        let frame = Frame::rtu(UnitId::new(9), 3, vec![0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(
            read_holding_registers(&mut devices, &frame),
            Err(ExceptionCode::SlaveDeviceFailure)
        );
    }

    #[test]
    fn read_beyond_the_address_space_is_rejected() {
        let mut devices = single_device();
        // start 0xFFFF, quantity 2 -> end 65537
        let frame = request(3, &[0xFF, 0xFF, 0x00, 0x02]);
        assert_eq!(
            read_holding_registers(&mut devices, &frame),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }

    #[test]
    fn write_beyond_the_address_space_leaves_the_bank_untouched() {
        let mut devices = single_device();
        let frame = request(16, &[0xFF, 0xFF, 0x00, 0x02, 0x04, 0x11, 0x22, 0x33, 0x44]);
        assert_eq!(
            write_multiple_registers(&mut devices, &frame),
            Err(ExceptionCode::IllegalDataAddress)
        );
        let device = devices.get(UnitId::new(1)).unwrap();
        assert!(device.holding_registers.iter().all(|x| *x == 0));
    }

    #[test]
    fn short_payload_is_an_illegal_data_address() {
        let mut devices = single_device();
        let frame = request(3, &[0x00, 0x01]);
        assert_eq!(
            read_holding_registers(&mut devices, &frame),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }

    #[test]
    fn single_register_write_read_round_trip() {
        let mut devices = single_device();

        // write 0x1122 at address 1000
        let write = request(6, &[0x03, 0xE8, 0x11, 0x22]);
        assert_eq!(
            write_single_register(&mut devices, &write),
            Ok(vec![0x03, 0xE8, 0x11, 0x22])
        );

        // read 1 register at address 1000
        let read = request(3, &[0x03, 0xE8, 0x00, 0x01]);
        assert_eq!(
            read_holding_registers(&mut devices, &read),
            Ok(vec![0x02, 0x11, 0x22])
        );
    }

    #[test]
    fn multi_register_read_packs_big_endian_words() {
        let mut devices = single_device();
        {
            let device = devices.get_mut(UnitId::new(1)).unwrap();
            device.holding_registers[2000..2004]
                .copy_from_slice(&[0x3344, 0x5566, 0x7788, 0x9900]);
        }

        // read 4 registers at address 2000
        let read = request(3, &[0x07, 0xD0, 0x00, 0x04]);
        assert_eq!(
            read_holding_registers(&mut devices, &read),
            Ok(vec![0x08, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0x00])
        );
    }

    #[test]
    fn bulk_write_count_mismatch_leaves_the_bank_untouched() {
        let mut devices = single_device();
        // quantity 3 declared, only 2 values present
        let frame = request(16, &[0x00, 0x01, 0x00, 0x03, 0x04, 0x00, 0x03, 0x00, 0x04]);
        assert_eq!(
            write_multiple_registers(&mut devices, &frame),
            Err(ExceptionCode::IllegalDataAddress)
        );
        let device = devices.get(UnitId::new(1)).unwrap();
        assert!(device.holding_registers.iter().all(|x| *x == 0));
    }

    #[test]
    fn bulk_write_read_round_trip() {
        let mut devices = single_device();
        let write = request(16, &[0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x03, 0x00, 0x04]);
        assert_eq!(
            write_multiple_registers(&mut devices, &write),
            Ok(vec![0x00, 0x01, 0x00, 0x02])
        );

        let read = request(3, &[0x00, 0x01, 0x00, 0x02]);
        assert_eq!(
            read_holding_registers(&mut devices, &read),
            Ok(vec![0x04, 0x00, 0x03, 0x00, 0x04])
        );
    }

    #[test]
    fn coil_write_stops_exactly_at_the_declared_quantity() {
        let mut devices = single_device();

        // 9 coils starting at address 100, value bytes 0xFF 0x01
        let write = request(15, &[0x00, 0x64, 0x00, 0x09, 0x02, 0xFF, 0x01]);
        assert_eq!(
            write_multiple_coils(&mut devices, &write),
            Ok(vec![0x00, 0x64, 0x00, 0x09])
        );

        let device = devices.get(UnitId::new(1)).unwrap();
        assert!(device.coils[100..109].iter().all(|x| *x));
        // bits beyond the declared quantity are not written
        assert!(!device.coils[109]);

        // reading 16 coils at 100 echoes the packed bytes with zero padding
        let read = request(1, &[0x00, 0x64, 0x00, 0x10]);
        assert_eq!(
            read_coils(&mut devices, &read),
            Ok(vec![0x02, 0xFF, 0x01])
        );
    }

    #[test]
    fn read_bit_count_not_a_multiple_of_eight_pads_the_last_byte() {
        let mut devices = single_device();
        {
            let device = devices.get_mut(UnitId::new(1)).unwrap();
            device.discrete_inputs[3] = true;
            device.discrete_inputs[11] = true;
        }

        // 12 inputs starting at address 0 -> 2 data bytes
        let read = request(2, &[0x00, 0x00, 0x00, 0x0C]);
        assert_eq!(
            read_discrete_inputs(&mut devices, &read),
            Ok(vec![0x02, 0x08, 0x08])
        );
    }

    #[test]
    fn single_coil_write_normalizes_nonzero_values() {
        let mut devices = single_device();

        let on = request(5, &[0x00, 0x07, 0xFF, 0x00]);
        assert_eq!(
            write_single_coil(&mut devices, &on),
            Ok(vec![0x00, 0x07, 0xFF, 0x00])
        );
        assert!(devices.get(UnitId::new(1)).unwrap().coils[7]);

        // any non-zero value is ON, not just 0xFF00
        let odd = request(5, &[0x00, 0x08, 0x00, 0x01]);
        write_single_coil(&mut devices, &odd).unwrap();
        assert!(devices.get(UnitId::new(1)).unwrap().coils[8]);

        let off = request(5, &[0x00, 0x07, 0x00, 0x00]);
        write_single_coil(&mut devices, &off).unwrap();
        assert!(!devices.get(UnitId::new(1)).unwrap().coils[7]);
    }

    #[test]
    fn input_registers_read_independently_of_holding_registers() {
        let mut devices = single_device();
        {
            let device = devices.get_mut(UnitId::new(1)).unwrap();
            device.input_registers[65530] = 1;
            device.input_registers[65535] = 65535;
        }

        // read 6 registers at address 65530, right up to the end of the bank
        let read = request(4, &[0xFF, 0xFA, 0x00, 0x06]);
        assert_eq!(
            read_input_registers(&mut devices, &read),
            Ok(vec![0x0C, 0x00, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF])
        );
    }
}
