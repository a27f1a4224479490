//! Sheet-name validation rules.

use std::fmt;

/// Longest permitted sheet name, counted in characters.
pub const MAX_SHEET_NAME_LEN: usize = 31;

const FORBIDDEN_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];

/// Checks a proposed sheet name against the format's naming rules.
///
/// Uniqueness against other sheets is a workbook-level concern and is
/// checked by the engine, not here. Lengths are counted in characters so
/// multi-byte names are measured the way a user sees them.
pub fn validate_sheet_name(name: &str) -> Result<(), SheetNameError> {
    if name.is_empty() {
        return Err(SheetNameError::Empty);
    }
    if name.chars().count() > MAX_SHEET_NAME_LEN {
        return Err(SheetNameError::TooLong(name.to_string()));
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(SheetNameError::ForbiddenChar(ch));
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(SheetNameError::ApostropheEdge(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetNameError {
    Empty,
    TooLong(String),
    ForbiddenChar(char),
    ApostropheEdge(String),
}

impl fmt::Display for SheetNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetNameError::Empty => write!(f, "sheet name cannot be blank"),
            SheetNameError::TooLong(name) => write!(
                f,
                "sheet name {name:?} exceeds {MAX_SHEET_NAME_LEN} characters"
            ),
            SheetNameError::ForbiddenChar(ch) => {
                write!(f, "sheet name cannot contain {ch:?}")
            }
            SheetNameError::ApostropheEdge(name) => {
                write!(f, "sheet name {name:?} cannot start or end with an apostrophe")
            }
        }
    }
}

impl std::error::Error for SheetNameError {}
