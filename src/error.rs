//! Error taxonomy for the polling gateway.
//!
//! Four failure families are kept distinct because callers react differently
//! to each: transport failures (nothing arrived) and frame failures (something
//! arrived but cannot be trusted) are retry candidates for the orchestration
//! layer; decode failures point at a register-map bug; unit failures mean the
//! device configuration is not understood and the session must not start.

/// Connection-level failures: nothing trustworthy was received.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("cannot connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[error("I/O error during exchange: {0}")]
    Io(#[from] std::io::Error),

    #[error("device did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// A response frame was received but failed validation.
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("response of {0} bytes is shorter than the 5 byte minimum")]
    TooShort(usize),

    #[error("response address {received:#04X} does not echo request address {expected:#04X}")]
    AddressMismatch { expected: u8, received: u8 },

    #[error("response function {received:#04X} does not echo request function {expected:#04X}")]
    FunctionMismatch { expected: u8, received: u8 },

    #[error("checksum mismatch: expected {expected:#06X}, received {received:#06X}")]
    ChecksumMismatch { expected: u16, received: u16 },

    #[error("declared byte count {declared} does not match {actual} payload bytes")]
    LengthMismatch { declared: u8, actual: usize },

    #[error("device reported Modbus exception {0:#04X}")]
    DeviceException(u8),
}

/// The response validated but its contents do not fit the register map.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("expected {expected} decoded fields, got {received}")]
    FieldCountMismatch { expected: usize, received: usize },

    #[error("span at register {register:#06X}: expected {expected} payload bytes, got {received}")]
    PayloadLength {
        register: u16,
        expected: usize,
        received: usize,
    },
}

/// A device-reported unit code outside the known enumerations.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum UnitError {
    #[error("unknown energy unit code {0}")]
    UnknownEnergyCode(u16),

    #[error("unknown pressure unit code {0}")]
    UnknownPressureCode(u16),

    #[error("unknown volume/mass unit code {0}")]
    UnknownVolumeCode(u16),
}

/// Any failure a driver operation can surface.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Unit(#[from] UnitError),

    /// The device reported a sub-system count outside the supported range.
    #[error("sub-system count {count} is outside the supported range 1..={max}")]
    SystemCount { count: usize, max: usize },

    /// The session is uninitialized or faulted; call `init` again.
    #[error("driver session is not ready, initialization required")]
    NotReady,

    /// The poll cycle was aborted between register-plan steps.
    #[error("operation cancelled")]
    Cancelled,
}
