//! OPC command definitions.
//!
//! Uses `TryFrom` so unknown command bytes are an error, not a panic.

use crate::error::OpcError;
use std::fmt;

/// Commands defined by the Open Pixel Control protocol.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Command {
    /// Payload is a run of `[R, G, B]` triples.
    #[default]
    SetPixelColors = 0x00,
    /// Vendor-specific payload, first two bytes are a system id.
    SystemExclusive = 0xFF,
}

impl TryFrom<u8> for Command {
    type Error = OpcError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Command::SetPixelColors),
            0xFF => Ok(Command::SystemExclusive),
            other => Err(OpcError::UnknownCommand(other)),
        }
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> Self {
        cmd as u8
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetPixelColors => write!(f, "SetPixelColors"),
            Command::SystemExclusive => write!(f, "SystemExclusive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commands_convert() {
        assert_eq!(Command::try_from(0x00).unwrap(), Command::SetPixelColors);
        assert_eq!(Command::try_from(0xFF).unwrap(), Command::SystemExclusive);
        assert_eq!(u8::from(Command::SystemExclusive), 0xFF);
    }

    #[test]
    fn unknown_command_is_error() {
        let err = Command::try_from(0x42).unwrap_err();
        assert!(matches!(err, OpcError::UnknownCommand(0x42)));
    }
}
