//! Defined names and their scoping rules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::addr::CellRef;

/// Builtin name registered by auto-filter, scoped to the filtered sheet.
pub const FILTER_DATABASE: &str = "_xlnm._FilterDatabase";
/// Builtin name holding a sheet's print area.
pub const PRINT_AREA: &str = "_xlnm.Print_Area";
/// Builtin name holding a sheet's repeated print titles.
pub const PRINT_TITLES: &str = "_xlnm.Print_Titles";

/// Longest permitted defined name, counted in characters.
pub const MAX_DEFINED_NAME_LEN: usize = 255;

/// A named formula, workbook-global or bound to one sheet.
///
/// `refers_to` is the formula text (usually a sheet-qualified range such as
/// `Sheet1!$A$2:$D$5`). Scope is carried by sheet *name* here; the package
/// layer maps it to a positional index when reading and writing the
/// workbook part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinedName {
    pub name: String,
    pub refers_to: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default)]
    pub scope: DefinedNameScope,
}

/// Where a defined name is visible.
///
/// Two entries may share a name as long as their scopes differ; a global
/// `Amount` and a sheet-scoped `Amount` coexist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefinedNameScope {
    #[default]
    Workbook,
    Sheet(String),
}

impl DefinedNameScope {
    pub fn sheet_name(&self) -> Option<&str> {
        match self {
            DefinedNameScope::Workbook => None,
            DefinedNameScope::Sheet(name) => Some(name),
        }
    }
}

/// Checks a user-supplied defined name against the format's rules.
///
/// Builtin `_xlnm.` names pass: the leading underscore and embedded dots
/// are legal. What is rejected is anything that could be confused with a
/// cell reference or that the format cannot store.
pub fn validate_defined_name(name: &str) -> Result<(), DefinedNameError> {
    if name.is_empty() {
        return Err(DefinedNameError::Empty);
    }
    if name.chars().count() > MAX_DEFINED_NAME_LEN {
        return Err(DefinedNameError::TooLong(name.to_string()));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(DefinedNameError::ContainsWhitespace(name.to_string()));
    }
    let first = name.chars().next().unwrap_or_default();
    if !(first.is_alphabetic() || first == '_' || first == '\\') {
        return Err(DefinedNameError::BadFirstChar(name.to_string()));
    }
    if CellRef::from_a1(name).is_ok() {
        return Err(DefinedNameError::LooksLikeCellRef(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinedNameError {
    #[error("defined name cannot be empty")]
    Empty,
    #[error("defined name {0:?} exceeds {MAX_DEFINED_NAME_LEN} characters")]
    TooLong(String),
    #[error("defined name {0:?} cannot contain whitespace")]
    ContainsWhitespace(String),
    #[error("defined name {0:?} must start with a letter, underscore or backslash")]
    BadFirstChar(String),
    #[error("defined name {0:?} collides with a cell reference")]
    LooksLikeCellRef(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_builtin_and_ordinary_names() {
        for name in [FILTER_DATABASE, PRINT_AREA, PRINT_TITLES, "Amount", "_tmp", "总额"] {
            validate_defined_name(name).unwrap_or_else(|err| panic!("{name:?}: {err}"));
        }
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(validate_defined_name(""), Err(DefinedNameError::Empty));
        assert!(matches!(
            validate_defined_name("has space"),
            Err(DefinedNameError::ContainsWhitespace(_))
        ));
        assert!(matches!(
            validate_defined_name("1starts_with_digit"),
            Err(DefinedNameError::BadFirstChar(_))
        ));
        assert!(matches!(
            validate_defined_name("XFD1048576"),
            Err(DefinedNameError::LooksLikeCellRef(_))
        ));
        let long = "n".repeat(MAX_DEFINED_NAME_LEN + 1);
        assert!(matches!(
            validate_defined_name(&long),
            Err(DefinedNameError::TooLong(_))
        ));
    }

    #[test]
    fn scope_accessor() {
        assert_eq!(DefinedNameScope::Workbook.sheet_name(), None);
        assert_eq!(
            DefinedNameScope::Sheet("Sheet1".to_string()).sheet_name(),
            Some("Sheet1")
        );
    }
}
