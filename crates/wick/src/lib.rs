//! Wick — a decompiler for a lightly obfuscated Lua-family bytecode format.
//!
//! This crate wires the pipeline together: decode the container, lift the
//! main prototype into an AST, and print it back as source text. When any
//! stage saw a shape it could not faithfully reconstruct, the output is
//! prefixed with an advisory comment.

use std::io;

use thiserror::Error;

use wick_ast::Arena;
use wick_bytecode::DecodeError;
use wick_lift::LiftError;

/// Prefix emitted when the decode or lift flagged the module.
const FLAGGED_NOTICE: &str = "--[[\n\
\tinput function was flagged as potentially incompatible.\n\
\tplease private message a developer for support.\n\
]]\n";

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Lift(#[from] LiftError),
    #[error("failed to write output")]
    Io(#[from] io::Error),
}

/// Decompile a bytecode buffer into source text.
///
/// Every AST node lives in an arena scoped to this call; it is released in
/// one piece on every exit path.
pub fn decompile(bytecode: &[u8]) -> Result<String, Error> {
    let mut arena = Arena::new();
    let module = wick_bytecode::decode(bytecode, &mut arena)?;
    let lifted = wick_lift::lift(&module, &mut arena)?;

    let mut out = String::new();
    if module.flagged || lifted.flagged {
        out.push_str(FLAGGED_NOTICE);
    }
    out.push_str(&wick_emit::format_ast(&arena, lifted.root));
    Ok(out)
}

/// Decompile a bytecode buffer, writing the source to `out`.
pub fn decompile_to<W: io::Write>(out: &mut W, bytecode: &[u8]) -> Result<(), Error> {
    let source = decompile(bytecode)?;
    out.write_all(source.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wick_bytecode::OpCode;

    // ---- wire-format builder ----

    fn op(code: OpCode) -> u8 {
        227u8.wrapping_mul(code as u8)
    }

    fn insn(code: OpCode, a: u8, b: u8, c: u8) -> u32 {
        (op(code) as u32) | ((a as u32) << 8) | ((b as u32) << 16) | ((c as u32) << 24)
    }

    fn insn_bx(code: OpCode, a: u8, bx: u16) -> u32 {
        (op(code) as u32) | ((a as u32) << 8) | ((bx as u32) << 16)
    }

    fn insn_sbx(code: OpCode, a: u8, sbx: i16) -> u32 {
        insn_bx(code, a, sbx as u16)
    }

    fn const_number(value: f64) -> Vec<u8> {
        let mut out = vec![2];
        out.extend_from_slice(&value.to_le_bytes());
        out
    }

    fn const_string(index: u8) -> Vec<u8> {
        vec![3, index]
    }

    struct ProtoSpec {
        arg_count: u8,
        is_vararg: bool,
        words: Vec<u32>,
        constants: Vec<Vec<u8>>,
        trailer: u8,
    }

    impl ProtoSpec {
        fn new(words: Vec<u32>) -> Self {
            Self {
                arg_count: 0,
                is_vararg: true,
                words,
                constants: Vec::new(),
                trailer: 0,
            }
        }

        fn constants(mut self, constants: Vec<Vec<u8>>) -> Self {
            self.constants = constants;
            self
        }

        fn trailer(mut self, trailer: u8) -> Self {
            self.trailer = trailer;
            self
        }
    }

    /// All counts stay below 128 so every varint is a single byte.
    fn build_module(strings: &[&[u8]], proto: ProtoSpec) -> Vec<u8> {
        let mut out = vec![0x01];
        out.push(strings.len() as u8);
        for s in strings {
            out.push(s.len() as u8);
            out.extend_from_slice(s);
        }

        out.push(0x01); // prototype count
        out.push(0x00); // max_reg_count
        out.push(proto.arg_count);
        out.push(0x00); // upval_count
        out.push(proto.is_vararg as u8);
        out.push(proto.words.len() as u8);
        for word in &proto.words {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.push(proto.constants.len() as u8);
        for constant in &proto.constants {
            out.extend_from_slice(constant);
        }
        out.push(0x00); // closure count
        out.push(0x00); // name index
        out.push(proto.words.len() as u8); // line info count
        for _ in 0..proto.words.len() {
            out.push(0x00);
        }
        out.push(proto.trailer);
        out.push(0x00); // main index
        out
    }

    // ---- end-to-end scenarios ----

    #[test]
    fn test_empty_main() {
        let bytes = build_module(&[], ProtoSpec::new(vec![insn(OpCode::Return, 0, 1, 0)]));
        let source = decompile(&bytes).unwrap();
        assert!(source.trim().is_empty());
    }

    #[test]
    fn test_constant_echo() {
        let bytes = build_module(
            &[],
            ProtoSpec::new(vec![
                insn_bx(OpCode::LoadConst, 0, 0),
                insn(OpCode::Return, 0, 2, 0),
            ])
            .constants(vec![const_number(42.0)]),
        );
        assert_eq!(decompile(&bytes).unwrap(), "return 42\n");
    }

    #[test]
    fn test_global_print() {
        let bytes = build_module(
            &[b"print".as_slice(), b"hi"],
            ProtoSpec::new(vec![
                insn(OpCode::GetGlobal, 0, 0, 0),
                0x00000000, // aux: constant 0 names the global
                insn_bx(OpCode::LoadConst, 1, 1),
                insn(OpCode::Call, 0, 2, 1),
                insn(OpCode::Return, 0, 1, 0),
            ])
            .constants(vec![const_string(1), const_string(2)]),
        );
        assert_eq!(decompile(&bytes).unwrap(), "print(\"hi\")\n");
    }

    #[test]
    fn test_if_false_skip() {
        let bytes = build_module(
            &[],
            ProtoSpec::new(vec![
                insn(OpCode::LoadBool, 0, 0, 0),
                insn_sbx(OpCode::Test, 0, 2),
                insn_bx(OpCode::LoadConst, 1, 0),
                insn(OpCode::Return, 1, 2, 0),
            ])
            .constants(vec![const_number(1.0)]),
        );
        assert_eq!(
            decompile(&bytes).unwrap(),
            "if not false then\n    return 1\nend\n"
        );
    }

    #[test]
    fn test_while_true_loop() {
        let bytes = build_module(
            &[],
            ProtoSpec::new(vec![
                insn_bx(OpCode::LoadConst, 0, 0),
                insn_sbx(OpCode::LoopJump, 0, -1),
                insn(OpCode::Return, 0, 1, 0),
            ])
            .constants(vec![const_number(1.0)]),
        );
        assert_eq!(
            decompile(&bytes).unwrap(),
            "while true do\n    local var0 = 1\nend\n"
        );
    }

    #[test]
    fn test_self_call() {
        let bytes = build_module(
            &[b"foo".as_slice()],
            ProtoSpec::new(vec![
                insn(OpCode::SelfCall, 0, 1, 0),
                0x00000000, // aux: constant 0 names the method
                insn(OpCode::Call, 0, 1, 1),
                insn(OpCode::Return, 0, 1, 0),
            ])
            .constants(vec![const_string(1)]),
        );
        // The receiver register had no value; a synthetic local stands in.
        assert_eq!(decompile(&bytes).unwrap(), "var1:foo()\n");
    }

    #[test]
    fn test_flagged_module_gets_notice() {
        let bytes = build_module(
            &[],
            ProtoSpec::new(vec![insn(OpCode::Return, 0, 1, 0)]).trailer(0x01),
        );
        let source = decompile(&bytes).unwrap();
        assert!(source.starts_with(
            "--[[\n\tinput function was flagged as potentially incompatible.\n"
        ));
    }

    #[test]
    fn test_decompile_is_deterministic() {
        let bytes = build_module(
            &[b"print".as_slice(), b"hi"],
            ProtoSpec::new(vec![
                insn(OpCode::GetGlobal, 0, 0, 0),
                0x00000000,
                insn_bx(OpCode::LoadConst, 1, 1),
                insn(OpCode::Call, 0, 2, 1),
                insn(OpCode::Return, 0, 1, 0),
            ])
            .constants(vec![const_string(1), const_string(2)]),
        );
        assert_eq!(decompile(&bytes).unwrap(), decompile(&bytes).unwrap());
    }

    #[test]
    fn test_compilation_failure_propagates() {
        let err = decompile(b"\x00oops").unwrap_err();
        assert!(matches!(
            err,
            Error::Decode(DecodeError::CompilationFailure(ref msg)) if msg == "oops"
        ));
    }
}
