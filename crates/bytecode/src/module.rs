use nom::number::complete::{le_u32, le_u8};

use wick_ast::{Arena, ExprId};

use crate::constant::parse_constant;
use crate::instruction::Instruction;
use crate::opcode::{self, OpCode};
use crate::{complete, leb128_u32, parse_list, parse_string, DecodeError};

/// A decoded bytecode module: the shared string table, the prototype forest
/// in dependency order, and the index of the main (entry) prototype.
#[derive(Debug)]
pub struct Module {
    pub strings: Vec<Vec<u8>>,
    pub protos: Vec<Proto>,
    pub main: usize,
    /// Studio-compiled modules carry opcodes in logical order; no
    /// deobfuscation mapping was applied.
    pub studio: bool,
    /// Set once by any suspicious shape seen during decoding: nil/bool
    /// constants, a negative cumulative line, a non-zero trailing byte.
    pub flagged: bool,
}

/// A single compiled function body.
#[derive(Debug)]
pub struct Proto {
    pub max_reg_count: u8,
    pub arg_count: u8,
    pub upval_count: u8,
    pub is_vararg: bool,
    /// Decoded instructions. Auxiliary words of two-word opcodes are folded
    /// into their owner and replaced by placeholders, so indices here match
    /// the raw word offsets that jump operands are relative to.
    pub code: Vec<Instruction>,
    /// Constants lifted to arena expressions. Hash-table constants have no
    /// expression form and decode to `None`.
    pub constants: Vec<Option<ExprId>>,
    /// Child prototype indices; children always precede their parent.
    pub children: Vec<usize>,
    pub name: Option<Vec<u8>>,
    /// Absolute line number per code word, reconstructed from signed deltas.
    pub line_info: Vec<u32>,
}

impl Module {
    pub(crate) fn parse(input: &[u8], arena: &mut Arena) -> Result<Self, DecodeError> {
        let table = opcode::conversion_table();
        let mut flagged = false;
        let mut studio = None;

        let (input, strings) = complete(parse_list(input, parse_string))?;

        let (mut input, proto_count) = complete(leb128_u32(input))?;
        let mut protos: Vec<Proto> = Vec::with_capacity(proto_count as usize);
        for _ in 0..proto_count {
            let (rest, proto) = Proto::parse(
                input,
                arena,
                &strings,
                &table,
                &mut studio,
                protos.len(),
                &mut flagged,
            )?;
            protos.push(proto);
            input = rest;
        }

        let (_, main) = complete(leb128_u32(input))?;
        let main = main as usize;
        if main >= protos.len() {
            return Err(DecodeError::BadMainIndex(main));
        }

        Ok(Module {
            strings,
            protos,
            main,
            studio: studio.unwrap_or(false),
            flagged,
        })
    }

    /// Resolve a 1-based string table index; 0 is the "absent" sentinel.
    pub fn get_string(&self, index: usize) -> Option<&[u8]> {
        index
            .checked_sub(1)
            .and_then(|i| self.strings.get(i))
            .map(|s| s.as_slice())
    }

    pub fn main_proto(&self) -> &Proto {
        &self.protos[self.main]
    }
}

impl Proto {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn parse<'a>(
        input: &'a [u8],
        arena: &mut Arena,
        strings: &[Vec<u8>],
        table: &[Option<OpCode>; 256],
        studio: &mut Option<bool>,
        decoded_protos: usize,
        flagged: &mut bool,
    ) -> Result<(&'a [u8], Self), DecodeError> {
        let (input, max_reg_count) = complete(le_u8(input))?;
        let (input, arg_count) = complete(le_u8(input))?;
        let (input, upval_count) = complete(le_u8(input))?;
        let (input, is_vararg) = complete(le_u8(input))?;

        // Instructions. The first word of the module decides the studio
        // exemption: a raw ClearStackFull byte means opcodes were never
        // scrambled and the conversion table must not be applied.
        let (mut input, instr_count) = complete(leb128_u32(input))?;
        let instr_count = instr_count as usize;
        let mut code = Vec::with_capacity(instr_count);
        let mut read = 0usize;
        while read < instr_count {
            let (rest, word) = complete(le_u32(input))?;
            input = rest;
            read += 1;

            let raw_op = (word & 0xFF) as u8;
            if studio.is_none() {
                *studio = Some(raw_op == OpCode::ClearStackFull as u8);
            }
            let op = if studio.unwrap_or(false) {
                OpCode::from_byte(raw_op)
            } else {
                table[raw_op as usize]
            }
            .ok_or(DecodeError::UnknownOpcode(raw_op))?;

            let mut insn = Instruction::decode(word, op);
            if op.has_aux() {
                let (rest, aux) = complete(le_u32(input))?;
                input = rest;
                read += 1;
                insn.aux = aux;
                code.push(insn);
                code.push(Instruction::placeholder());
            } else {
                code.push(insn);
            }
        }

        // Constants, lifted straight into the arena.
        let (rest, const_count) = complete(leb128_u32(input))?;
        input = rest;
        let mut constants: Vec<Option<ExprId>> = Vec::with_capacity(const_count as usize);
        for _ in 0..const_count {
            let (rest, lifted) = parse_constant(input, arena, strings, &constants, flagged)?;
            constants.push(lifted);
            input = rest;
        }

        // Child prototypes: indices into the already-decoded prefix.
        let (rest, closure_count) = complete(leb128_u32(input))?;
        input = rest;
        let mut children = Vec::with_capacity(closure_count as usize);
        for _ in 0..closure_count {
            let (rest, index) = complete(leb128_u32(input))?;
            input = rest;
            let index = index as usize;
            if index >= decoded_protos {
                return Err(DecodeError::BadChildIndex(index));
            }
            children.push(index);
        }

        let (rest, name_index) = complete(leb128_u32(input))?;
        input = rest;
        let name_index = name_index as usize;
        let name = if name_index != 0 {
            let bytes = name_index
                .checked_sub(1)
                .and_then(|i| strings.get(i))
                .ok_or(DecodeError::BadStringIndex(name_index))?;
            Some(bytes.clone())
        } else {
            None
        };

        // Line info: cumulative sum of signed deltas. A negative final line
        // marks the module as flagged; intermediate negatives clamp to 0.
        let (rest, line_info_count) = complete(leb128_u32(input))?;
        input = rest;
        let mut line_info = Vec::with_capacity(line_info_count as usize);
        let mut last: i32 = 0;
        for _ in 0..line_info_count {
            let (rest, delta) = complete(leb128_u32(input))?;
            input = rest;
            last = last.wrapping_add(delta as i32);
            line_info.push(last.max(0) as u32);
        }
        if last < 0 {
            *flagged = true;
        }

        let (input, trailer) = complete(le_u8(input))?;
        if trailer != 0 {
            *flagged = true;
        }

        Ok((
            input,
            Proto {
                max_reg_count,
                arg_count,
                upval_count,
                is_vararg: is_vararg != 0,
                code,
                constants,
                children,
                name,
                line_info,
            },
        ))
    }
}
