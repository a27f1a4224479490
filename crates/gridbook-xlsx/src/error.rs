use gridbook_model::{DefinedNameError, RefError, SheetNameError, MAX_FIELD_LENGTH};
use thiserror::Error;

pub type Result<T, E = DocError> = std::result::Result<T, E>;

/// Errors produced while reading or editing a workbook document.
#[derive(Debug, Error)]
pub enum DocError {
    #[error("sheet {0} does not exist")]
    SheetNotFound(String),

    #[error(transparent)]
    SheetName(#[from] SheetNameError),

    #[error(transparent)]
    Ref(#[from] RefError),

    #[error(transparent)]
    DefinedName(#[from] DefinedNameError),

    /// A stored part failed to parse. The raw bytes stay in the store so a
    /// later save still round-trips them.
    #[error("malformed part {path}: {source}")]
    MalformedPart {
        path: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("field {0} must be less than or equal to {MAX_FIELD_LENGTH} characters")]
    FieldTooLong(&'static str),

    #[error("defined name {0} already exists in this scope")]
    DuplicateDefinedName(String),

    #[error("no defined name matched the given name and scope")]
    DefinedNameScopeNotFound,

    #[error("sheet group must contain the active sheet")]
    NoActiveSheetInGroup,

    #[error("cannot delete the only worksheet")]
    DeleteLastSheet,

    #[error("sheet {0} already exists")]
    DuplicateSheetName(String),

    #[error("invalid pane configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("missing package part {0}")]
    MissingPart(String),

    #[error("zip container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("part is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}
