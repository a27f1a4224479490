//! Whole-sheet value search.

use regex::Regex;

use crate::document::Document;
use crate::error::{DocError, Result};
use crate::worksheet::SearchMatcher;

impl Document {
    /// References of cells whose textual value equals `value` exactly, in
    /// sheet order.
    pub fn search_sheet(&self, sheet: &str, value: &str) -> Result<Vec<String>> {
        self.search_with(sheet, &SearchMatcher::Literal(value.to_string()))
    }

    /// References of cells whose textual value contains a match of
    /// `pattern`.
    pub fn search_sheet_regex(&self, sheet: &str, pattern: &str) -> Result<Vec<String>> {
        if self.sheet_index(sheet).is_none() {
            return Err(DocError::SheetNotFound(sheet.to_string()));
        }
        let re = Regex::new(pattern)?;
        self.search_with(sheet, &SearchMatcher::Pattern(re))
    }

    fn search_with(&self, sheet: &str, matcher: &SearchMatcher) -> Result<Vec<String>> {
        if self.sheet_index(sheet).is_none() {
            return Err(DocError::SheetNotFound(sheet.to_string()));
        }
        let shared = self.shared_strings()?;
        self.with_sheet(sheet, |ws| ws.search(matcher, Some(&shared)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worksheet::CellScalar;
    use pretty_assertions::assert_eq;

    fn doc_with_a1(value: CellScalar) -> Document {
        let mut doc = Document::new();
        doc.set_cell_value("Sheet1", "A1", &value).unwrap();
        doc
    }

    #[test]
    fn literal_search_is_whole_value_equality() {
        let doc = doc_with_a1(CellScalar::Text("A".to_string()));
        assert_eq!(doc.search_sheet("Sheet1", "A").unwrap(), vec!["A1"]);
        assert!(doc.search_sheet("Sheet1", "X").unwrap().is_empty());
        // A literal is not a substring match.
        assert!(doc.search_sheet("Sheet1", "").unwrap().is_empty());
    }

    #[test]
    fn regex_search_matches_partially() {
        let doc = doc_with_a1(CellScalar::Number(100.0));
        assert_eq!(
            doc.search_sheet_regex("Sheet1", "[0-9]").unwrap(),
            vec!["A1"]
        );
        let text = doc_with_a1(CellScalar::Text("abc".to_string()));
        assert!(text.search_sheet_regex("Sheet1", "[0-9]").unwrap().is_empty());
    }

    #[test]
    fn errors_are_typed() {
        let doc = Document::new();
        assert!(matches!(
            doc.search_sheet("Ghost", "A"),
            Err(DocError::SheetNotFound(_))
        ));
        assert!(matches!(
            doc.search_sheet_regex("Sheet1", "["),
            Err(DocError::Pattern(_))
        ));
    }
}
