/// Opcodes of the obfuscated dialect's register machine.
///
/// The wire encoding stores each opcode byte multiplied by 227 in wrapping
/// 8-bit arithmetic; [`conversion_table`] inverts that permutation.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Nop = 0,
    SaveCode = 1,
    /// A = nil
    LoadNil = 2,
    /// A = (bool)B
    LoadBool = 3,
    /// A = sBX (signed 16-bit number)
    LoadShort = 4,
    /// A = constants[BX]
    LoadConst = 5,
    /// A = B
    Move = 6,
    /// A = globals[constants[AUX]]
    GetGlobal = 7,
    /// globals[constants[AUX]] = A
    SetGlobal = 8,
    /// A = upvalues[B]
    GetUpvalue = 9,
    /// upvalues[B] = A
    SetUpvalue = 10,
    SaveRegisters = 11,
    /// A = constants[BX]; AUX is a hash verifier
    GetGlobalConst = 12,
    /// A = B[C]
    GetTableIndex = 13,
    /// B[C] = A
    SetTableIndex = 14,
    /// A = B[constants[AUX]]
    GetTableIndexConstant = 15,
    /// B[constants[AUX]] = A
    SetTableIndexConstant = 16,
    /// A = B[C + 1]
    GetTableIndexByte = 17,
    /// B[C + 1] = A
    SetTableIndexByte = 18,
    /// A = closure(children[BX]); followed by upvalue pseudo-instructions
    Closure = 19,
    /// A = B[constants[AUX]]; A + 1 = B (method call prep)
    SelfCall = 20,
    /// A, ..A+C-2 = A(A+1, ..A+B-1)
    Call = 21,
    /// return A, ..A+B-2
    Return = 22,
    Jump = 23,
    /// pc += sBX (always backward; closes a loop body)
    LoopJump = 24,
    /// if A then pc += sBX
    Test = 25,
    /// if not A then pc += sBX
    NotTest = 26,
    Equal = 27,
    LesserOrEqual = 28,
    LesserThan = 29,
    NotEqual = 30,
    GreaterThan = 31,
    GreaterOrEqual = 32,
    /// A = B + C
    Add = 33,
    Sub = 34,
    Mul = 35,
    Div = 36,
    Mod = 37,
    Pow = 38,
    /// A = B + constants[C]
    AddByte = 39,
    SubByte = 40,
    MulByte = 41,
    DivByte = 42,
    ModByte = 43,
    PowByte = 44,
    Or = 45,
    And = 46,
    OrByte = 47,
    AndByte = 48,
    /// A = B .. B+1 .. ... .. C
    Concat = 49,
    /// A = not B
    Not = 50,
    /// A = -B
    UnaryMinus = 51,
    /// A = #B
    Len = 52,
    /// A = {} (AUX carries sizing, unused here)
    NewTable = 53,
    /// A = {}
    NewTableConst = 54,
    SetList = 55,
    ForPrep = 56,
    ForLoop = 57,
    TForLoop = 58,
    LoopJumpIPairs = 59,
    TForLoopIPairs = 60,
    LoopJumpNext = 61,
    TForLoopNext = 62,
    /// A, ..A+B-2 = ... (B = 0 produces a tail expression)
    LoadVarargs = 63,
    ClearStack = 64,
    /// First-instruction marker of studio-compiled modules
    ClearStackFull = 65,
    LoadConstLarge = 66,
    FarJump = 67,
    BuiltinCall = 68,
}

/// Multiplier used by the compiler to scramble opcode bytes.
pub const ENCODE_MULTIPLIER: u8 = 227;

impl OpCode {
    /// Number of encodable opcodes.
    pub const COUNT: u8 = 69;

    /// Try to convert a raw opcode byte to an OpCode.
    pub fn from_byte(byte: u8) -> Option<Self> {
        if byte < Self::COUNT {
            // SAFETY: all values 0..COUNT are valid OpCode discriminants
            Some(unsafe { std::mem::transmute(byte) })
        } else {
            None
        }
    }

    /// Whether this opcode is followed by an auxiliary word.
    pub fn has_aux(self) -> bool {
        matches!(
            self,
            OpCode::GetGlobal
                | OpCode::SetGlobal
                | OpCode::GetGlobalConst
                | OpCode::GetTableIndexConstant
                | OpCode::SetTableIndexConstant
                | OpCode::SelfCall
                | OpCode::Equal
                | OpCode::LesserOrEqual
                | OpCode::LesserThan
                | OpCode::NotEqual
                | OpCode::GreaterThan
                | OpCode::GreaterOrEqual
                | OpCode::NewTable
                | OpCode::SetList
                | OpCode::TForLoop
                | OpCode::LoadConstLarge
        )
    }
}

/// Build the byte → opcode deobfuscation table:
/// `table[(227 * op) mod 256] = op` for every encodable opcode.
pub fn conversion_table() -> [Option<OpCode>; 256] {
    let mut table = [None; 256];
    for i in 0..OpCode::COUNT {
        table[ENCODE_MULTIPLIER.wrapping_mul(i) as usize] = OpCode::from_byte(i);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_table_round_trip() {
        let table = conversion_table();
        for i in 0..OpCode::COUNT {
            let encoded = ENCODE_MULTIPLIER.wrapping_mul(i);
            assert_eq!(table[encoded as usize], OpCode::from_byte(i));
        }
    }

    #[test]
    fn test_unencodable_bytes_are_unmapped() {
        let table = conversion_table();
        let mapped = table.iter().filter(|op| op.is_some()).count();
        assert_eq!(mapped, OpCode::COUNT as usize);
    }

    #[test]
    fn test_from_byte_bounds() {
        assert_eq!(OpCode::from_byte(0), Some(OpCode::Nop));
        assert_eq!(OpCode::from_byte(68), Some(OpCode::BuiltinCall));
        assert_eq!(OpCode::from_byte(69), None);
    }
}
