//! A1-style cell and range references.
//!
//! References are 1-based in both axes: `A1` is `(col 1, row 1)`. Parsing
//! accepts absolute markers (`$A$1`); formatting always emits the relative
//! form, so `format(parse(t)) == t` holds for every canonical reference.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest addressable column (`XFD`).
pub const MAX_COLUMNS: u32 = 16_384;
/// Highest addressable row.
pub const MAX_ROWS: u32 = 1_048_576;

/// A single cell position, 1-based in both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub col: u32,
    pub row: u32,
}

impl CellRef {
    /// Builds a reference from numeric components, rejecting zero and
    /// anything beyond the sheet bounds.
    pub fn new(col: u32, row: u32) -> Result<Self, RefError> {
        if col == 0 || row == 0 || col > MAX_COLUMNS || row > MAX_ROWS {
            return Err(RefError::OutOfBounds { col, row });
        }
        Ok(CellRef { col, row })
    }

    /// Parses `"K16"` / `"$K$16"` into a reference.
    pub fn from_a1(text: &str) -> Result<Self, RefError> {
        if text.is_empty() {
            return Err(RefError::Empty);
        }
        let rest = text.strip_prefix('$').unwrap_or(text);
        let letters_end = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let (letters, after) = rest.split_at(letters_end);
        if letters.is_empty() {
            return Err(RefError::MissingColumn(text.to_string()));
        }
        let digits = after.strip_prefix('$').unwrap_or(after);
        if digits.is_empty() {
            return Err(RefError::MissingRow(text.to_string()));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RefError::InvalidRow(text.to_string()));
        }
        let row: u32 = digits
            .parse()
            .map_err(|_| RefError::InvalidRow(text.to_string()))?;
        let col = column_name_to_number(letters)?;
        CellRef::new(col, row)
    }

    /// Formats the reference as `"K16"`.
    pub fn to_a1(self) -> String {
        let mut out = String::new();
        push_column_name(self.col, &mut out);
        out.push_str(&self.row.to_string());
        out
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// Converts column letters to a 1-based number: `"A"` is 1, `"XFD"` is 16384.
///
/// Only overflow is rejected here; range checking against [`MAX_COLUMNS`]
/// happens in [`CellRef::new`] so that callers converting bare columns can
/// decide their own bound.
pub fn column_name_to_number(name: &str) -> Result<u32, RefError> {
    if name.is_empty() {
        return Err(RefError::Empty);
    }
    let mut col: u32 = 0;
    for ch in name.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(RefError::InvalidColumn(name.to_string()));
        }
        let digit = (ch.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(digit))
            .ok_or_else(|| RefError::InvalidColumn(name.to_string()))?;
    }
    Ok(col)
}

/// Converts a 1-based column number to letters: 1 is `"A"`, 16384 is `"XFD"`.
pub fn column_number_to_name(col: u32) -> Result<String, RefError> {
    if col == 0 || col > MAX_COLUMNS {
        return Err(RefError::OutOfBounds { col, row: 0 });
    }
    let mut out = String::new();
    push_column_name(col, &mut out);
    Ok(out)
}

fn push_column_name(mut col: u32, out: &mut String) {
    let mut letters = [0u8; 7];
    let mut used = 0;
    while col > 0 {
        letters[used] = b'A' + ((col - 1) % 26) as u8;
        used += 1;
        col = (col - 1) / 26;
    }
    for &b in letters[..used].iter().rev() {
        out.push(b as char);
    }
}

/// An inclusive rectangular range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: CellRef,
    pub end: CellRef,
}

impl Range {
    /// Parses `"A1:D5"`; a bare `"A1"` produces a single-cell range.
    pub fn from_a1(text: &str) -> Result<Self, RefError> {
        match text.split_once(':') {
            Some((a, b)) => Ok(Range {
                start: CellRef::from_a1(a)?,
                end: CellRef::from_a1(b)?,
            }),
            None => {
                let cell = CellRef::from_a1(text)?;
                Ok(Range {
                    start: cell,
                    end: cell,
                })
            }
        }
    }

    pub fn to_a1(self) -> String {
        if self.start == self.end {
            self.start.to_a1()
        } else {
            format!("{}:{}", self.start.to_a1(), self.end.to_a1())
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// Failure modes of the reference grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefError {
    /// The input text was empty.
    Empty,
    /// No column letters before the digits; carries the full input.
    MissingColumn(String),
    /// No row digits after the letters; carries the full input.
    MissingRow(String),
    /// Column letters contained a non-letter or overflowed.
    InvalidColumn(String),
    /// Row digits were malformed or overflowed.
    InvalidRow(String),
    /// Components parsed but fall outside the sheet bounds. `row` is 0 when
    /// only a column was being converted.
    OutOfBounds { col: u32, row: u32 },
}

impl fmt::Display for RefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefError::Empty => write!(f, "cell reference is empty"),
            RefError::MissingColumn(text) => {
                write!(f, "cell reference {text:?} is missing its column letters")
            }
            RefError::MissingRow(text) => {
                write!(f, "cell reference {text:?} is missing its row number")
            }
            RefError::InvalidColumn(text) => write!(f, "invalid column name {text:?}"),
            RefError::InvalidRow(text) => {
                write!(f, "invalid row number in cell reference {text:?}")
            }
            RefError::OutOfBounds { col, row } => {
                write!(f, "invalid cell reference [{col}, {row}]")
            }
        }
    }
}

impl std::error::Error for RefError {}
