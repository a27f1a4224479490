//! Workbook document engine over zipped SpreadsheetML packages.
//!
//! The crate opens a package into a [`Document`]: a concurrency-safe part
//! store plus eagerly parsed structural parts (the workbook, its
//! relationships, the content types). Worksheet parts stay raw bytes until
//! an operation first touches them, and anything the engine does not model
//! is carried as opaque byte spans that serialize back verbatim, so
//! untouched markup round-trips byte-identical through open and save.
//!
//! Operations are grouped by concern:
//!
//! - sheet lifecycle: create, delete, rename, move, grouping, active sheet;
//! - defined names with workbook or per-sheet scope, kept consistent across
//!   sheet deletion, renaming, and reordering;
//! - page layout, header/footer, and page breaks;
//! - pane configuration from a JSON payload;
//! - literal and regular-expression search over cell values.

mod content_types;
mod document;
mod error;
mod layout;
mod names;
mod openxml;
mod package;
mod part_store;
mod search;
mod shared_strings;
mod sheets;
mod view;
mod workbook;
mod worksheet;
mod xml;

pub use document::Document;
pub use error::{DocError, Result};
pub use worksheet::CellScalar;

pub use gridbook_model::{
    column_name_to_number, column_number_to_name, CellRef, DefinedName, DefinedNameScope,
    HeaderFooterOptions, Orientation, PageLayoutOptions, PaneOptions, PaneSelection, Range,
    RefError, MAX_COLUMNS, MAX_FIELD_LENGTH, MAX_ROWS, MAX_SHEET_NAME_LEN,
};
