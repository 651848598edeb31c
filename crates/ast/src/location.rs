/// A line/column pair. Columns are always 0 for lifted code — the bytecode
/// only carries line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A source span attached to every AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub start: Position,
    pub end: Position,
}

impl Location {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A zero-width span at the given line.
    pub fn at_line(line: u32) -> Self {
        let pos = Position::new(line, 0);
        Self::new(pos, pos)
    }
}
