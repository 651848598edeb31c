pub mod constant;
pub mod instruction;
pub mod module;
pub mod opcode;

use nom::number::complete::le_u8;
use nom::IResult;
use thiserror::Error;

use wick_ast::Arena;

pub use instruction::Instruction;
pub use module::{Module, Proto};
pub use opcode::OpCode;

/// Fatal container-decoding failures.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported bytecode version: {0}")]
    UnsupportedVersion(u8),
    /// Version byte 0: the rest of the stream is a compiler error message.
    #[error("bytecode compilation error: {0}")]
    CompilationFailure(String),
    #[error("unknown constant tag: {0}")]
    UnknownConstantTag(u8),
    #[error("unknown opcode byte {0:#04x}")]
    UnknownOpcode(u8),
    #[error("string table index {0} out of range")]
    BadStringIndex(usize),
    #[error("global constant name index {0} is not a string constant")]
    BadGlobalName(usize),
    #[error("malformed global constant")]
    MalformedGlobal,
    #[error("child prototype index {0} out of range")]
    BadChildIndex(usize),
    #[error("main prototype index {0} out of range")]
    BadMainIndex(usize),
    #[error("truncated bytecode")]
    Truncated,
}

/// Map a nom parse failure to the decoder's fatal error.
pub(crate) fn complete<'a, T>(res: IResult<&'a [u8], T>) -> Result<(&'a [u8], T), DecodeError> {
    res.map_err(|_| DecodeError::Truncated)
}

/// Parse a LEB128-encoded unsigned integer.
///
/// The accumulator is 32 bits wide; continuation bytes past that range are
/// consumed and their payload bits discarded.
pub(crate) fn leb128_u32(input: &[u8]) -> IResult<&[u8], u32> {
    let mut result: u32 = 0;
    let mut shift = 0u32;
    let mut i = input;
    loop {
        let (rest, byte) = le_u8(i)?;
        if shift < 32 {
            result |= ((byte & 0x7F) as u32) << shift;
        }
        i = rest;
        if byte & 0x80 == 0 {
            return Ok((i, result));
        }
        shift += 7;
    }
}

/// Parse a length-prefixed string using a LEB128 length.
pub(crate) fn parse_string(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let (input, length) = leb128_u32(input)?;
    let (rest, bytes) = nom::bytes::complete::take(length as usize)(input)?;
    Ok((rest, bytes.to_owned()))
}

/// Parse a length-prefixed list using a LEB128 length.
pub(crate) fn parse_list<'a, T>(
    input: &'a [u8],
    parser: impl Fn(&'a [u8]) -> IResult<&'a [u8], T>,
) -> IResult<&'a [u8], Vec<T>> {
    let (input, length) = leb128_u32(input)?;
    let mut items = Vec::with_capacity(length as usize);
    let mut input = input;
    for _ in 0..length {
        let (rest, item) = parser(input)?;
        items.push(item);
        input = rest;
    }
    Ok((input, items))
}

/// Decode a bytecode container into a prototype forest.
///
/// Constant entries are lifted directly into `arena` as expression nodes.
/// Version 0 carries an embedded compiler error message instead of code;
/// versions above 1 are unsupported.
pub fn decode(bytecode: &[u8], arena: &mut Arena) -> Result<Module, DecodeError> {
    let (input, version) = complete(le_u8(bytecode))?;
    if version == 0 {
        let message = String::from_utf8_lossy(&bytecode[1..]).into_owned();
        return Err(DecodeError::CompilationFailure(message));
    }
    if version > 1 {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    Module::parse(input, arena)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leb128_single_byte() {
        let (rest, value) = leb128_u32(&[0x7F, 0xAA]).unwrap();
        assert_eq!(value, 0x7F);
        assert_eq!(rest, &[0xAA]);
    }

    #[test]
    fn test_leb128_multi_byte() {
        let (rest, value) = leb128_u32(&[0x80, 0x01]).unwrap();
        assert_eq!(value, 128);
        assert!(rest.is_empty());

        let (_, value) = leb128_u32(&[0xE5, 0x8E, 0x26]).unwrap();
        assert_eq!(value, 624485);
    }

    #[test]
    fn test_leb128_overlong_does_not_crash() {
        // Ten continuation bytes exceed the 32-bit accumulator; the excess
        // payload is discarded but the read must succeed.
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let (rest, _) = leb128_u32(&bytes).unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn test_version_zero_is_error_payload() {
        let mut arena = Arena::new();
        let bytes = b"\x00script:1: unexpected symbol";
        let err = decode(bytes, &mut arena).unwrap_err();
        match err {
            DecodeError::CompilationFailure(msg) => {
                assert_eq!(msg, "script:1: unexpected symbol");
            }
            other => panic!("expected CompilationFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_version() {
        let mut arena = Arena::new();
        let err = decode(&[0x02], &mut arena).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedVersion(2)));
    }
}
