use crate::microwire::WriteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("illegal parameter")]
    IllegalParameter,
    #[error("unknown measurement range {0}")]
    UnknownRange(u32),
    #[error("unknown calibration point {0}")]
    UnknownPoint(u32),
    #[error("device not ready")]
    DeviceNotReady,
    #[error("function not supported")]
    IllegalFunction,
    #[error("user buffer too small")]
    UserBufferTooSmall,
    #[error("EEPROM write failed")]
    WriteFailure,
    #[error("EEPROM read failed")]
    ReadFailure,
    #[error("illegal identity: magic {magic:#06x}, id {id}")]
    IllegalIdentity { magic: u16, id: u16 },
}

impl Error {
    /// Rejected argument, whatever the argument was
    pub fn is_illegal_parameter(&self) -> bool {
        matches!(
            self,
            Error::IllegalParameter | Error::UnknownRange(_) | Error::UnknownPoint(_)
        )
    }
}

impl From<WriteError> for Error {
    fn from(_: WriteError) -> Self {
        Error::WriteFailure
    }
}
