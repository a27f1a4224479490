//! Pure data model for gridbook workbooks.
//!
//! This crate holds the format-independent pieces of the engine: the A1
//! coordinate algebra, sheet-name and defined-name validation rules, the
//! option structs accepted by the layout/view setters, and the small formula
//! text scanner used to keep sheet-qualified references consistent across
//! renames and deletions. It performs no I/O and knows nothing about XML;
//! the `gridbook-xlsx` crate maps these types onto the package format.

pub mod addr;
pub mod formula_rewrite;
pub mod header_footer;
pub mod names;
pub mod page;
pub mod sheet_name;
pub mod view;

pub use addr::{
    column_name_to_number, column_number_to_name, CellRef, Range, RefError, MAX_COLUMNS, MAX_ROWS,
};
pub use formula_rewrite::{formula_mentions_sheet, quote_sheet_name, rewrite_sheet_name_in_formula};
pub use header_footer::{HeaderFooterOptions, MAX_FIELD_LENGTH};
pub use names::{
    validate_defined_name, DefinedName, DefinedNameError, DefinedNameScope, FILTER_DATABASE,
    MAX_DEFINED_NAME_LEN, PRINT_AREA, PRINT_TITLES,
};
pub use page::{Orientation, PageLayoutOptions};
pub use sheet_name::{validate_sheet_name, SheetNameError, MAX_SHEET_NAME_LEN};
pub use view::{PaneOptions, PaneSelection};
