//! Pane and sheet-view configuration.

use gridbook_model::PaneOptions;

use crate::document::Document;
use crate::error::{DocError, Result};

impl Document {
    /// Apply a pane configuration given as JSON. The sheet must exist; that
    /// is checked before the payload is parsed, so a bad payload against a
    /// missing sheet reports the missing sheet.
    pub fn set_panes(&mut self, sheet: &str, config: &str) -> Result<()> {
        if self.sheet_index(sheet).is_none() {
            return Err(DocError::SheetNotFound(sheet.to_string()));
        }
        let options: PaneOptions = serde_json::from_str(config)?;
        self.set_pane_options(sheet, &options)
    }

    /// Typed variant of [`Document::set_panes`].
    pub fn set_pane_options(&mut self, sheet: &str, options: &PaneOptions) -> Result<()> {
        self.with_sheet(sheet, |ws| {
            ws.set_panes(options);
            Ok(())
        })
    }
}
