use crate::constants::functions;
use crate::device::DeviceMap;
use crate::exception::ExceptionCode;
use crate::frame::Frame;

/// A dispatch table entry: reads/writes the device map and returns a response
/// payload or an exception
///
/// The handler receives the whole map rather than a single device so that it
/// can resolve the frame's unit id itself; a missing device yields
/// [ExceptionCode::SlaveDeviceFailure].
pub type FunctionHandler =
    Box<dyn FnMut(&mut DeviceMap, &Frame) -> Result<Vec<u8>, ExceptionCode> + Send>;

/// Function-code dispatch table: one replaceable slot per code `0..=255`
pub(crate) struct FunctionTable {
    handlers: [Option<FunctionHandler>; 256],
}

impl FunctionTable {
    pub(crate) fn empty() -> Self {
        Self {
            handlers: std::array::from_fn(|_| None),
        }
    }

    /// Table with the standard read/write functions bound
    pub(crate) fn with_defaults() -> Self {
        let mut table = Self::empty();
        table.set(functions::READ_COILS, Box::new(crate::handlers::read_coils));
        table.set(
            functions::READ_DISCRETE_INPUTS,
            Box::new(crate::handlers::read_discrete_inputs),
        );
        table.set(
            functions::READ_HOLDING_REGISTERS,
            Box::new(crate::handlers::read_holding_registers),
        );
        table.set(
            functions::READ_INPUT_REGISTERS,
            Box::new(crate::handlers::read_input_registers),
        );
        table.set(
            functions::WRITE_SINGLE_COIL,
            Box::new(crate::handlers::write_single_coil),
        );
        table.set(
            functions::WRITE_SINGLE_REGISTER,
            Box::new(crate::handlers::write_single_register),
        );
        table.set(
            functions::WRITE_MULTIPLE_COILS,
            Box::new(crate::handlers::write_multiple_coils),
        );
        table.set(
            functions::WRITE_MULTIPLE_REGISTERS,
            Box::new(crate::handlers::write_multiple_registers),
        );
        table
    }

    /// Bind or replace the handler for a function code
    pub(crate) fn set(&mut self, function: u8, handler: FunctionHandler) {
        self.handlers[function as usize] = Some(handler);
    }

    /// Resolve the handler for a function code, if one is bound
    pub(crate) fn get_mut(&mut self, function: u8) -> Option<&mut FunctionHandler> {
        self.handlers[function as usize].as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_binds_the_standard_functions() {
        let mut table = FunctionTable::with_defaults();
        for code in [1u8, 2, 3, 4, 5, 6, 15, 16] {
            assert!(table.get_mut(code).is_some(), "code {code} unbound");
        }
        assert!(table.get_mut(0).is_none());
        assert!(table.get_mut(7).is_none());
        assert!(table.get_mut(255).is_none());
    }

    #[test]
    fn a_slot_can_be_replaced_without_affecting_others() {
        let mut table = FunctionTable::with_defaults();
        table.set(65, Box::new(|_, _| Ok(vec![0xAA])));

        assert!(table.get_mut(65).is_some());
        assert!(table.get_mut(66).is_none());
        assert!(table.get_mut(3).is_some());
    }
}
