//! Command encoder.
//!
//! # Command layout
//!
//! ```text
//! [0]   : module id
//! [1]   : register id, | 0x80 for a read request
//! [2..] : parameters in call order, no padding
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::CommandError;
use crate::protocol::catalog::RegisterCatalog;
use crate::protocol::wire::{to_hex, PAYLOAD_OFFSET, READ_FLAG};

/// Default payload ceiling of a single ATT write (23-byte MTU minus header).
pub const DEFAULT_MAX_COMMAND_LEN: usize = 20;

/// Raw layout of a command. Performs no validation.
pub fn encode(module: u8, register: u8, read: bool, params: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(PAYLOAD_OFFSET + params.len());
    bytes.push(module);
    bytes.push(if read { register | READ_FLAG } else { register });
    bytes.extend_from_slice(params);
    bytes
}

/// An encoded outbound command.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct Command(Vec<u8>);

impl Command {
    /// Wrap bytes that were encoded elsewhere (e.g. a replayed capture).
    pub fn from_raw(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn module(&self) -> Option<u8> {
        self.0.first().copied()
    }

    /// Register id with the read flag stripped.
    pub fn register(&self) -> Option<u8> {
        self.0.get(1).map(|r| r & !READ_FLAG)
    }

    pub fn is_read(&self) -> bool {
        self.0.get(1).is_some_and(|r| r & READ_FLAG != 0)
    }

    pub fn params(&self) -> &[u8] {
        self.0.get(PAYLOAD_OFFSET..).unwrap_or(&[])
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command[{}]", to_hex(&self.0))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex(&self.0))
    }
}

impl From<Command> for String {
    fn from(cmd: Command) -> Self {
        to_hex(&cmd.0)
    }
}

/// Builds validated commands against a [`RegisterCatalog`].
///
/// Cheap to clone; the catalog is shared.
#[derive(Debug, Clone)]
pub struct CommandEncoder {
    catalog: Arc<RegisterCatalog>,
    max_len: usize,
}

impl CommandEncoder {
    pub fn new(catalog: Arc<RegisterCatalog>, max_len: usize) -> Self {
        Self { catalog, max_len }
    }

    pub fn catalog(&self) -> &Arc<RegisterCatalog> {
        &self.catalog
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// `[module, register, params...]`
    pub fn write(&self, module: u8, register: u8, params: &[u8]) -> Result<Command, CommandError> {
        self.build(module, register, false, params)
    }

    /// `[module, register | 0x80, params...]`
    pub fn read(&self, module: u8, register: u8, params: &[u8]) -> Result<Command, CommandError> {
        self.build(module, register, true, params)
    }

    fn build(
        &self,
        module: u8,
        register: u8,
        read: bool,
        params: &[u8],
    ) -> Result<Command, CommandError> {
        let m = self
            .catalog
            .module(module)
            .ok_or(CommandError::UnknownModule(module))?;
        // A caller passing a pre-flagged id is treated as a different register.
        let spec = if register & READ_FLAG == 0 {
            m.register(register)
        } else {
            None
        }
        .ok_or(CommandError::UnknownRegister { module, register })?;

        let (arity, access) = if read {
            (spec.read, "read")
        } else {
            (spec.write, "write")
        };
        if arity == crate::protocol::catalog::Arity::Unsupported {
            return Err(CommandError::NotSupported {
                module,
                register,
                access,
            });
        }
        if !arity.accepts(params.len()) {
            return Err(CommandError::ParameterCount {
                module,
                register,
                expected: arity.describe(),
                actual: params.len(),
            });
        }

        let len = PAYLOAD_OFFSET + params.len();
        if len > self.max_len {
            return Err(CommandError::TooLong {
                len,
                max: self.max_len,
            });
        }

        Ok(Command(encode(module, register, read, params)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{gpio, module_id, temperature};

    fn encoder() -> CommandEncoder {
        CommandEncoder::new(
            Arc::new(RegisterCatalog::standard().unwrap()),
            DEFAULT_MAX_COMMAND_LEN,
        )
    }

    #[test]
    fn test_write_layout() {
        let cmd = encoder().write(module_id::GPIO, gpio::SET_DO, &[3]).unwrap();
        assert_eq!(cmd.as_bytes(), &[0x05, 0x01, 0x03]);
        assert!(!cmd.is_read());
        assert_eq!(cmd.params(), &[3]);
    }

    #[test]
    fn test_read_sets_flag() {
        let cmd = encoder().read(module_id::GPIO, gpio::READ_DI, &[3]).unwrap();
        assert_eq!(cmd.as_bytes(), &[0x05, 0x88, 0x03]);
        assert!(cmd.is_read());
        assert_eq!(cmd.register(), Some(gpio::READ_DI));
    }

    #[test]
    fn test_temperature_read() {
        let cmd = encoder()
            .read(module_id::TEMPERATURE, temperature::VALUE, &[])
            .unwrap();
        assert_eq!(cmd.as_bytes(), &[0x04, 0x81]);
    }

    #[test]
    fn test_unknown_module_and_register() {
        let enc = encoder();
        assert_eq!(
            enc.write(0xAA, 0x01, &[]).unwrap_err(),
            CommandError::UnknownModule(0xAA)
        );
        assert_eq!(
            enc.write(module_id::GPIO, 0x7e, &[]).unwrap_err(),
            CommandError::UnknownRegister {
                module: 0x05,
                register: 0x7e
            }
        );
    }

    #[test]
    fn test_flagged_register_argument_is_rejected() {
        assert!(matches!(
            encoder().write(module_id::GPIO, gpio::READ_DI | READ_FLAG, &[3]),
            Err(CommandError::UnknownRegister { .. })
        ));
    }

    #[test]
    fn test_wrong_parameter_count() {
        assert!(matches!(
            encoder().read(module_id::GPIO, gpio::READ_DI, &[]),
            Err(CommandError::ParameterCount { actual: 0, .. })
        ));
    }

    #[test]
    fn test_unsupported_direction() {
        assert!(matches!(
            encoder().write(module_id::TEMPERATURE, temperature::VALUE, &[]),
            Err(CommandError::NotSupported { access: "write", .. })
        ));
    }

    #[test]
    fn test_length_limit() {
        let enc = CommandEncoder::new(Arc::new(RegisterCatalog::standard().unwrap()), 4);
        let err = enc
            .write(module_id::SETTINGS, crate::modules::device_settings::DEVICE_NAME, b"abc")
            .unwrap_err();
        assert_eq!(err, CommandError::TooLong { len: 5, max: 4 });
    }

    #[test]
    fn test_unchecked_encode() {
        assert_eq!(encode(0x01, 0x02, true, &[9, 8]), vec![0x01, 0x82, 9, 8]);
        assert_eq!(encode(0x01, 0x02, false, &[]), vec![0x01, 0x02]);
    }
}
