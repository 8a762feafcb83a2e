/// Limits of the device (unit) id space
pub mod device {
    /// Smallest id that may denote a stored device
    pub const MIN_ID: u8 = 1;
    /// Largest id that may denote a stored device
    pub const MAX_ID: u8 = 247;
}

/// Register bank geometry
pub mod registers {
    /// Number of entries in each of the four register banks
    pub const BANK_SIZE: usize = 65536;
}

/// Function codes with a default handler binding
pub mod functions {
    pub const READ_COILS: u8 = 1;
    pub const READ_DISCRETE_INPUTS: u8 = 2;
    pub const READ_HOLDING_REGISTERS: u8 = 3;
    pub const READ_INPUT_REGISTERS: u8 = 4;
    pub const WRITE_SINGLE_COIL: u8 = 5;
    pub const WRITE_SINGLE_REGISTER: u8 = 6;
    pub const WRITE_MULTIPLE_COILS: u8 = 15;
    pub const WRITE_MULTIPLE_REGISTERS: u8 = 16;
}

/// Wire values of the exception codes
pub mod exceptions {
    pub const ILLEGAL_FUNCTION: u8 = 0x01;
    pub const ILLEGAL_DATA_ADDRESS: u8 = 0x02;
    pub const SLAVE_DEVICE_FAILURE: u8 = 0x04;
}
