use nom::number::complete::{le_f64, le_u32, le_u8};

use wick_ast::{Arena, ExprId, ExprKind, Location};

use crate::{complete, leb128_u32, DecodeError};

const TAG_NIL: u8 = 0;
const TAG_BOOLEAN: u8 = 1;
const TAG_NUMBER: u8 = 2;
const TAG_STRING: u8 = 3;
const TAG_GLOBAL: u8 = 4;
const TAG_HASH_TABLE: u8 = 5;

/// Parse one constant record and lift it to an arena expression.
///
/// Hash-table constants have no expression form; they decode to `None` and
/// any instruction that tries to use one fails in the lifter. Nil and
/// boolean constants are legal but mark the module as flagged — the compiler
/// under reconstruction never emits them for well-formed input.
pub(crate) fn parse_constant<'a>(
    input: &'a [u8],
    arena: &mut Arena,
    strings: &[Vec<u8>],
    constants: &[Option<ExprId>],
    flagged: &mut bool,
) -> Result<(&'a [u8], Option<ExprId>), DecodeError> {
    let location = Location::default();
    let (input, tag) = complete(le_u8(input))?;

    match tag {
        TAG_NIL => {
            *flagged = true;
            let id = arena.alloc_expr(location, ExprKind::Nil);
            Ok((input, Some(id)))
        }
        TAG_BOOLEAN => {
            *flagged = true;
            let (input, value) = complete(le_u8(input))?;
            let id = arena.alloc_expr(location, ExprKind::Bool(value != 0));
            Ok((input, Some(id)))
        }
        TAG_NUMBER => {
            let (input, value) = complete(le_f64(input))?;
            let id = arena.alloc_expr(location, ExprKind::Number(value));
            Ok((input, Some(id)))
        }
        TAG_STRING => {
            let (input, index) = complete(leb128_u32(input))?;
            let index = index as usize;
            let bytes = index
                .checked_sub(1)
                .and_then(|i| strings.get(i))
                .ok_or(DecodeError::BadStringIndex(index))?;
            let id = arena.alloc_expr(location, ExprKind::String(bytes.clone()));
            Ok((input, Some(id)))
        }
        TAG_GLOBAL => {
            let (input, encoded) = complete(le_u32(input))?;
            let id = lift_global(arena, constants, encoded)?;
            Ok((input, Some(id)))
        }
        TAG_HASH_TABLE => {
            let (mut input, count) = complete(leb128_u32(input))?;
            for _ in 0..count {
                let (rest, _) = complete(leb128_u32(input))?;
                input = rest;
            }
            Ok((input, None))
        }
        other => Err(DecodeError::UnknownConstantTag(other)),
    }
}

/// Lift a packed global path: the top 2 bits give the depth (1..=3), then
/// three 10-bit indices into this prototype's string constants. The first
/// name becomes a global read; the rest chain as name indexes.
fn lift_global(
    arena: &mut Arena,
    constants: &[Option<ExprId>],
    encoded: u32,
) -> Result<ExprId, DecodeError> {
    let location = Location::default();
    let depth = encoded >> 30;
    if depth == 0 || depth > 3 {
        return Err(DecodeError::MalformedGlobal);
    }

    let name1 = string_value(arena, constants, ((encoded >> 20) & 0x3FF) as usize)?;
    let mut expr = arena.alloc_expr(location, ExprKind::Global(name1));

    if depth >= 2 {
        let name2 = string_value(arena, constants, ((encoded >> 10) & 0x3FF) as usize)?;
        expr = arena.alloc_expr(
            location,
            ExprKind::IndexName {
                expr,
                index: name2,
            },
        );
    }
    if depth == 3 {
        let name3 = string_value(arena, constants, (encoded & 0x3FF) as usize)?;
        expr = arena.alloc_expr(
            location,
            ExprKind::IndexName {
                expr,
                index: name3,
            },
        );
    }

    Ok(expr)
}

/// Read the payload of a string constant already decoded in this prototype.
fn string_value(
    arena: &Arena,
    constants: &[Option<ExprId>],
    index: usize,
) -> Result<String, DecodeError> {
    let id = constants
        .get(index)
        .copied()
        .flatten()
        .ok_or(DecodeError::BadGlobalName(index))?;
    match &arena.expr(id).kind {
        ExprKind::String(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        _ => Err(DecodeError::BadGlobalName(index)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_constant() {
        let mut arena = Arena::new();
        let mut flagged = false;
        let mut bytes = vec![TAG_NUMBER];
        bytes.extend_from_slice(&42.0f64.to_le_bytes());

        let (rest, id) = parse_constant(&bytes, &mut arena, &[], &[], &mut flagged).unwrap();
        assert!(rest.is_empty());
        assert!(!flagged);
        assert!(matches!(arena.expr(id.unwrap()).kind, ExprKind::Number(n) if n == 42.0));
    }

    #[test]
    fn test_nil_constant_flags() {
        let mut arena = Arena::new();
        let mut flagged = false;
        let (_, id) = parse_constant(&[TAG_NIL], &mut arena, &[], &[], &mut flagged).unwrap();
        assert!(flagged);
        assert!(matches!(arena.expr(id.unwrap()).kind, ExprKind::Nil));
    }

    #[test]
    fn test_string_constant_is_one_based() {
        let mut arena = Arena::new();
        let mut flagged = false;
        let strings = vec![b"print".to_vec()];

        let (_, id) = parse_constant(&[TAG_STRING, 1], &mut arena, &strings, &[], &mut flagged)
            .unwrap();
        assert!(
            matches!(&arena.expr(id.unwrap()).kind, ExprKind::String(s) if s == b"print")
        );

        // Index 0 is the "absent" sentinel and never resolves.
        let err =
            parse_constant(&[TAG_STRING, 0], &mut arena, &strings, &[], &mut flagged).unwrap_err();
        assert!(matches!(err, DecodeError::BadStringIndex(0)));
    }

    #[test]
    fn test_global_chain() {
        let mut arena = Arena::new();
        let mut flagged = false;
        let strings = vec![b"game".to_vec(), b"Workspace".to_vec()];

        // Decode two string constants first; the global references them.
        let mut constants = Vec::new();
        for tag in [[TAG_STRING, 1], [TAG_STRING, 2]] {
            let (_, id) =
                parse_constant(&tag, &mut arena, &strings, &constants, &mut flagged).unwrap();
            constants.push(id);
        }

        // depth 2, name1 = constant 0, name2 = constant 1
        let encoded: u32 = (2 << 30) | (0 << 20) | (1 << 10);
        let mut bytes = vec![TAG_GLOBAL];
        bytes.extend_from_slice(&encoded.to_le_bytes());

        let (_, id) =
            parse_constant(&bytes, &mut arena, &strings, &constants, &mut flagged).unwrap();
        match &arena.expr(id.unwrap()).kind {
            ExprKind::IndexName { expr, index } => {
                assert_eq!(index, "Workspace");
                assert!(matches!(&arena.expr(*expr).kind, ExprKind::Global(g) if g == "game"));
            }
            other => panic!("expected IndexName, got {:?}", other),
        }
    }

    #[test]
    fn test_hash_table_is_placeholder() {
        let mut arena = Arena::new();
        let mut flagged = false;
        // Two discarded key indices.
        let (rest, id) =
            parse_constant(&[TAG_HASH_TABLE, 2, 7, 9], &mut arena, &[], &[], &mut flagged)
                .unwrap();
        assert!(rest.is_empty());
        assert!(id.is_none());
    }

    #[test]
    fn test_unknown_tag_is_fatal() {
        let mut arena = Arena::new();
        let mut flagged = false;
        let err = parse_constant(&[9], &mut arena, &[], &[], &mut flagged).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownConstantTag(9)));
    }
}
