//! Binary encoding of MIR modules.
//!
//! A module file starts with a short header, followed by a sequence of length-prefixed records in
//! a fixed order:
//!
//! ```text
//! file    ::= magic:"8MIR" endian:u8 version:u32 record*
//! record  ::= tag:u8 length:u32 payload[length]
//! records ::= MODULE TYPES CONSTANTS METADATA FLAGS FUNCTION* END
//! ```
//!
//! Every multi-byte integer after the endianness byte uses the byte order of the target layout.
//! Entities refer to each other by table index: types and constants by their slot in the module
//! tables, instructions and blocks by their position inside the function that contains them.
//!
//! Encoding is deterministic. Tables are written in slot order and functions in insertion order,
//! so encoding the same module twice gives the same bytes.

mod reader;
mod writer;

use crate::error::{MirResult, UnverifiedModuleError};
use crate::module::MirModule;

pub const MAGIC: &[u8; 4] = b"8MIR";
pub const FORMAT_VERSION: u32 = 1;

pub(crate) const RECORD_MODULE: u8 = 0x01;
pub(crate) const RECORD_TYPES: u8 = 0x02;
pub(crate) const RECORD_CONSTANTS: u8 = 0x03;
pub(crate) const RECORD_METADATA: u8 = 0x04;
pub(crate) const RECORD_FLAGS: u8 = 0x05;
pub(crate) const RECORD_FUNCTION: u8 = 0x10;
pub(crate) const RECORD_END: u8 = 0xFF;

pub(crate) const TYPE_VOID: u8 = 0;
pub(crate) const TYPE_INTEGER: u8 = 1;
pub(crate) const TYPE_POINTER: u8 = 2;
pub(crate) const TYPE_FUNCTION: u8 = 3;

pub(crate) const OPCODE_ALLOCA: u8 = 1;
pub(crate) const OPCODE_STORE: u8 = 2;
pub(crate) const OPCODE_LOAD: u8 = 3;
pub(crate) const OPCODE_ICMP: u8 = 4;
pub(crate) const OPCODE_BR: u8 = 5;
pub(crate) const OPCODE_RET: u8 = 6;

pub(crate) const OPERAND_ARGUMENT: u8 = 0;
pub(crate) const OPERAND_CONSTANT: u8 = 1;
pub(crate) const OPERAND_INSTRUCTION: u8 = 2;
pub(crate) const OPERAND_BLOCK: u8 = 3;
pub(crate) const OPERAND_TYPE: u8 = 4;

pub(crate) const METADATA_STRING: u8 = 0;
pub(crate) const METADATA_FUNCTION: u8 = 1;

/// Encode a module.
///
/// Only modules that passed verification in their current state can be encoded.
pub fn serialize(module: &MirModule) -> MirResult<Vec<u8>> {
    if !module.is_verified() {
        return Err(UnverifiedModuleError {
            module: module.name().to_owned(),
        }
        .into());
    }
    let bytes = writer::encode_module(module);
    log::debug!("encoded module {} into {} bytes", module.name(), bytes.len());
    Ok(bytes)
}

/// Decode a module.
///
/// The decoded module has not been verified. Any structural corruption of the input fails the
/// whole decode, and no partially decoded module is returned.
pub fn deserialize(bytes: &[u8]) -> MirResult<MirModule> {
    let module = reader::decode_module(bytes)?;
    log::debug!(
        "decoded module {} with {} function(s) from {} bytes",
        module.name(),
        module.function_count(),
        bytes.len()
    );
    Ok(module)
}
