//! Sheet-qualified references inside formula text.
//!
//! Defined-name formulas carry sheet prefixes (`Sheet1!$A$1`,
//! `'P&L 2024'!$B$2`). When a sheet is renamed those prefixes must follow
//! it, and when a sheet is deleted any name still mentioning it has to be
//! found. The scanner below walks the formula once, skipping string
//! literals, and reports every sheet token (quoted or bare) that is
//! immediately followed by `!`.

/// Quotes a sheet name for use in a formula, only when required.
///
/// Excel quotes with single quotes and doubles embedded quotes.
pub fn quote_sheet_name(name: &str) -> String {
    if !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        && !name.starts_with(|c: char| c.is_ascii_digit())
    {
        return name.to_string();
    }
    let escaped = name.replace('\'', "''");
    format!("'{escaped}'")
}

/// True when `formula` references `sheet` through a sheet-qualified prefix.
///
/// Sheet names compare case-insensitively, matching how the format resolves
/// references.
pub fn formula_mentions_sheet(formula: &str, sheet: &str) -> bool {
    let mut found = false;
    scan_sheet_tokens(formula, |token| {
        if names_equal(&token.name, sheet) {
            found = true;
        }
    });
    found
}

/// Rewrites every reference to `old` into `new`, requoting as needed.
///
/// Returns `None` when the formula does not mention `old`.
pub fn rewrite_sheet_name_in_formula(formula: &str, old: &str, new: &str) -> Option<String> {
    let mut tokens = Vec::new();
    scan_sheet_tokens(formula, |token| {
        if names_equal(&token.name, old) {
            tokens.push((token.start, token.end));
        }
    });
    if tokens.is_empty() {
        return None;
    }
    let replacement = quote_sheet_name(new);
    let mut out = String::with_capacity(formula.len());
    let mut cursor = 0;
    for (start, end) in tokens {
        out.push_str(&formula[cursor..start]);
        out.push_str(&replacement);
        cursor = end;
    }
    out.push_str(&formula[cursor..]);
    Some(out)
}

fn names_equal(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

struct SheetToken {
    /// Byte offset of the token (opening quote for quoted names).
    start: usize,
    /// Byte offset just past the token, excluding the `!`.
    end: usize,
    /// The unescaped sheet name.
    name: String,
}

fn scan_sheet_tokens(formula: &str, mut visit: impl FnMut(SheetToken)) {
    let bytes = formula.as_bytes();
    let mut chars = formula.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            // String literal: skip to the closing quote, honoring "" escapes.
            '"' => {
                while let Some((_, c)) = chars.next() {
                    if c == '"' {
                        if matches!(chars.peek(), Some((_, '"'))) {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
            }
            // Quoted sheet name: '...' with '' escapes, then `!`.
            '\'' => {
                let mut name = String::new();
                let mut close = None;
                while let Some((i, c)) = chars.next() {
                    if c == '\'' {
                        if matches!(chars.peek(), Some((_, '\''))) {
                            chars.next();
                            name.push('\'');
                        } else {
                            close = Some(i + 1);
                            break;
                        }
                    } else {
                        name.push(c);
                    }
                }
                if let Some(end) = close {
                    if bytes.get(end) == Some(&b'!') {
                        visit(SheetToken {
                            start: idx,
                            end,
                            name,
                        });
                    }
                }
            }
            c if is_bare_name_char(c) => {
                let start = idx;
                let mut end = idx + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if is_bare_name_char(next) {
                        end = i + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                if bytes.get(end) == Some(&b'!') {
                    visit(SheetToken {
                        start,
                        end,
                        name: formula[start..end].to_string(),
                    });
                }
            }
            _ => {}
        }
    }
}

fn is_bare_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_rules() {
        assert_eq!(quote_sheet_name("Sheet1"), "Sheet1");
        assert_eq!(quote_sheet_name("P&L"), "'P&L'");
        assert_eq!(quote_sheet_name("My Sheet"), "'My Sheet'");
        assert_eq!(quote_sheet_name("it's"), "'it''s'");
        assert_eq!(quote_sheet_name("1st"), "'1st'");
    }

    #[test]
    fn detects_bare_and_quoted_mentions() {
        assert!(formula_mentions_sheet("Sheet1!$A$1", "Sheet1"));
        assert!(formula_mentions_sheet("SUM(Sheet1!A1:B2)", "Sheet1"));
        assert!(formula_mentions_sheet("'My Sheet'!$A$1", "My Sheet"));
        assert!(formula_mentions_sheet("'it''s'!B2", "it's"));
        assert!(formula_mentions_sheet("sheet1!A1", "Sheet1"));
        assert!(!formula_mentions_sheet("Sheet11!A1", "Sheet1"));
        assert!(!formula_mentions_sheet("Sheet1", "Sheet1"));
    }

    #[test]
    fn ignores_string_literals() {
        assert!(!formula_mentions_sheet("\"Sheet1!A1\"", "Sheet1"));
        assert!(formula_mentions_sheet(
            "CONCAT(\"Sheet2!\",Sheet1!A1)",
            "Sheet1"
        ));
        assert!(!formula_mentions_sheet("\"a\"\"Sheet1!\"", "Sheet1"));
    }

    #[test]
    fn rewrites_references() {
        assert_eq!(
            rewrite_sheet_name_in_formula("Sheet1!$A$2:$D$5", "Sheet1", "Data"),
            Some("Data!$A$2:$D$5".to_string())
        );
        assert_eq!(
            rewrite_sheet_name_in_formula("SUM(Sheet1!A1,'Sheet1'!B2)", "Sheet1", "My Sheet"),
            Some("SUM('My Sheet'!A1,'My Sheet'!B2)".to_string())
        );
        assert_eq!(
            rewrite_sheet_name_in_formula("Other!A1", "Sheet1", "Data"),
            None
        );
        // 3-D span: only the token touching the `!` is rewritten.
        assert_eq!(
            rewrite_sheet_name_in_formula("SUM(Sheet1:Sheet3!A1)", "Sheet3", "End"),
            Some("SUM(Sheet1:End!A1)".to_string())
        );
    }
}
