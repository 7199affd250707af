//! Source location tracking

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A byte position inside a [`FileSet`].
///
/// Positions of all files registered in one file set share a single address
/// space: each file occupies the range `[base, base + size]`. The zero
/// position is reserved and means "no position".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Pos(pub u32);

impl Pos {
    pub const NONE: Pos = Pos(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Returns the position `n` bytes after this one.
    pub fn offset(self, n: u32) -> Pos {
        Pos(self.0 + n)
    }
}

/// A span representing a range in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Position of the first byte
    pub start: Pos,
    /// Position just past the last byte
    pub end: Pos,
}

impl Span {
    pub fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self {
            start: Pos::NONE,
            end: Pos::NONE,
        }
    }

    /// A zero-width span at `pos`.
    pub fn at(pos: Pos) -> Self {
        Self { start: pos, end: pos }
    }

    /// Merge two spans into one that covers both
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start.is_valid()
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::dummy()
    }
}

/// A resolved source position
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub filename: String,
    /// Byte offset inside the file, starting at 0
    pub offset: usize,
    /// Line number, starting at 1
    pub line: usize,
    /// Column number in bytes, starting at 1
    pub column: usize,
}

impl Position {
    pub fn is_valid(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.filename.is_empty(), self.is_valid()) {
            (_, false) if self.filename.is_empty() => f.write_str("-"),
            (false, false) => f.write_str(&self.filename),
            (true, true) => write!(f, "{}:{}", self.line, self.column),
            _ => write!(f, "{}:{}:{}", self.filename, self.line, self.column),
        }
    }
}

/// One file registered in a [`FileSet`].
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    base: u32,
    size: u32,
    /// Byte offsets of the first character of each line
    lines: Vec<u32>,
    source: Arc<str>,
}

impl SourceFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Pos {
        Pos(self.base)
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Position of the byte at `offset` in this file.
    pub fn pos(&self, offset: u32) -> Pos {
        Pos(self.base + offset.min(self.size))
    }

    fn contains(&self, pos: Pos) -> bool {
        self.base <= pos.0 && pos.0 <= self.base + self.size
    }

    fn position(&self, pos: Pos) -> Position {
        let offset = pos.0 - self.base;
        let line = match self.lines.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Position {
            filename: self.name.clone(),
            offset: offset as usize,
            line: line + 1,
            column: (offset - self.lines[line]) as usize + 1,
        }
    }
}

/// Registry of source files sharing one position space
#[derive(Debug, Clone)]
pub struct FileSet {
    files: Vec<SourceFile>,
    next_base: u32,
}

impl Default for FileSet {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSet {
    pub fn new() -> Self {
        // base 1 keeps Pos(0) free for "no position"
        Self {
            files: Vec::new(),
            next_base: 1,
        }
    }

    /// Register a file and return it. Positions of the file start at its base.
    pub fn add_file(&mut self, name: impl Into<String>, source: &str) -> &SourceFile {
        let size = source.len() as u32;
        let mut lines = vec![0];
        lines.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i as u32 + 1),
        );
        let file = SourceFile {
            name: name.into(),
            base: self.next_base,
            size,
            lines,
            source: Arc::from(source),
        };
        // +1 so that the end-of-file position of one file is not the base of the next
        self.next_base += size + 1;
        self.files.push(file);
        &self.files[self.files.len() - 1]
    }

    /// The file containing `pos`, if any
    pub fn file(&self, pos: Pos) -> Option<&SourceFile> {
        if !pos.is_valid() {
            return None;
        }
        self.files.iter().find(|f| f.contains(pos))
    }

    /// Resolve `pos` to file, line and column. Unknown positions resolve to
    /// the default (invalid) position.
    pub fn position(&self, pos: Pos) -> Position {
        self.file(pos).map(|f| f.position(pos)).unwrap_or_default()
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_lookup() {
        let mut fset = FileSet::new();
        let base = fset.add_file("a.gop", "package a\n\ntype T int\n").base();
        let pos = fset.position(base.offset(11));
        assert_eq!(pos.line, 3);
        assert_eq!(pos.column, 1);
        assert_eq!(pos.to_string(), "a.gop:3:1");
    }

    #[test]
    fn test_positions_of_distinct_files_do_not_overlap() {
        let mut fset = FileSet::new();
        let a = fset.add_file("a.gop", "package a\n").base();
        let b = fset.add_file("b.gop", "package a\n").base();
        assert!(b > a.offset(10));
        assert_eq!(fset.position(b).filename, "b.gop");
        assert_eq!(fset.position(a.offset(10)).filename, "a.gop");
    }

    #[test]
    fn test_no_pos_is_invalid() {
        let fset = FileSet::new();
        assert!(!fset.position(Pos::NONE).is_valid());
        assert_eq!(fset.position(Pos::NONE).to_string(), "-");
    }

    #[test]
    fn test_span_merge() {
        let a = Span::new(Pos(3), Pos(5));
        let b = Span::new(Pos(4), Pos(9));
        assert_eq!(a.merge(b), Span::new(Pos(3), Pos(9)));
    }
}
