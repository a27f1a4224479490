//! Page layout, header/footer, and page breaks, keyed by sheet name.

use gridbook_model::{CellRef, HeaderFooterOptions, PageLayoutOptions};

use crate::document::Document;
use crate::error::{DocError, Result};

impl Document {
    /// Current page setup. Attributes the sheet does not carry read as
    /// `None`.
    pub fn page_layout(&self, sheet: &str) -> Result<PageLayoutOptions> {
        self.with_sheet(sheet, |ws| Ok(ws.page_layout()))
    }

    /// Merge the given options into the sheet's page setup; `None` fields
    /// keep their current values and unrecognized attributes survive.
    pub fn set_page_layout(&mut self, sheet: &str, options: &PageLayoutOptions) -> Result<()> {
        self.with_sheet(sheet, |ws| {
            ws.set_page_layout(options);
            Ok(())
        })
    }

    /// The sheet's header/footer, or `None` when it has none.
    pub fn header_footer(&self, sheet: &str) -> Result<Option<HeaderFooterOptions>> {
        self.with_sheet(sheet, |ws| Ok(ws.header_footer()))
    }

    /// Replace the sheet's header/footer; `None` removes it. Each of the six
    /// text slots is capped at [`gridbook_model::MAX_FIELD_LENGTH`]
    /// characters, counted in characters rather than bytes.
    pub fn set_header_footer(
        &mut self,
        sheet: &str,
        options: Option<&HeaderFooterOptions>,
    ) -> Result<()> {
        if self.sheet_index(sheet).is_none() {
            return Err(DocError::SheetNotFound(sheet.to_string()));
        }
        if let Some(options) = options {
            if let Some(field) = options.over_long_field() {
                return Err(DocError::FieldTooLong(field));
            }
        }
        self.with_sheet(sheet, |ws| {
            ws.set_header_footer(options);
            Ok(())
        })
    }

    /// Insert a page break at a cell: the break goes above the cell's row
    /// and left of its column, so `A1` inserts nothing. Duplicates are
    /// no-ops.
    pub fn insert_page_break(&mut self, sheet: &str, cell: &str) -> Result<()> {
        self.with_sheet(sheet, |ws| {
            ws.insert_page_break(CellRef::from_a1(cell)?);
            Ok(())
        })
    }

    /// Remove the page break at a cell. Removing an absent break is a no-op.
    pub fn remove_page_break(&mut self, sheet: &str, cell: &str) -> Result<()> {
        self.with_sheet(sheet, |ws| {
            ws.remove_page_break(CellRef::from_a1(cell)?);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridbook_model::{Orientation, MAX_FIELD_LENGTH};
    use pretty_assertions::assert_eq;

    #[test]
    fn layout_round_trips_through_the_document() {
        let mut doc = Document::new();
        let mut options = PageLayoutOptions::default();
        options.orientation = Some(Orientation::Landscape);
        options.size = Some(9);
        doc.set_page_layout("Sheet1", &options).unwrap();
        let read = doc.page_layout("Sheet1").unwrap();
        assert_eq!(read.orientation, Some(Orientation::Landscape));
        assert_eq!(read.size, Some(9));
        assert_eq!(read.fit_to_width, None);
    }

    #[test]
    fn header_footer_respects_the_field_cap_in_characters() {
        let mut doc = Document::new();
        let mut options = HeaderFooterOptions::default();
        // Multi-byte characters count once each.
        options.odd_header = "搭".repeat(MAX_FIELD_LENGTH);
        doc.set_header_footer("Sheet1", Some(&options)).unwrap();

        options.odd_header.push('搭');
        let err = doc.set_header_footer("Sheet1", Some(&options)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "field odd_header must be less than or equal to 255 characters"
        );
    }

    #[test]
    fn missing_sheets_fail_before_validation() {
        let mut doc = Document::new();
        let mut options = HeaderFooterOptions::default();
        options.first_footer = "f".repeat(MAX_FIELD_LENGTH + 1);
        assert!(matches!(
            doc.set_header_footer("Ghost", Some(&options)),
            Err(DocError::SheetNotFound(_))
        ));
        assert!(matches!(
            doc.insert_page_break("Ghost", "C3"),
            Err(DocError::SheetNotFound(_))
        ));
    }

    #[test]
    fn page_break_inserts_are_idempotent_and_removals_tolerant() {
        let mut doc = Document::new();
        doc.insert_page_break("Sheet1", "C3").unwrap();
        doc.insert_page_break("Sheet1", "C3").unwrap();
        let xml =
            String::from_utf8(doc.part_bytes("xl/worksheets/sheet1.xml").unwrap()).unwrap();
        assert_eq!(xml.matches("<brk ").count(), 2);
        doc.remove_page_break("Sheet1", "Z99").unwrap();
        let unchanged =
            String::from_utf8(doc.part_bytes("xl/worksheets/sheet1.xml").unwrap()).unwrap();
        assert_eq!(unchanged, xml);
    }
}
