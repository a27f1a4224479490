use gridbook_xlsx::{DocError, Document, HeaderFooterOptions, MAX_FIELD_LENGTH};

#[test]
fn header_footer_settings_round_trip_through_a_save() {
    let mut doc = Document::new();
    let opts = HeaderFooterOptions {
        align_with_margins: Some(false),
        different_first: true,
        odd_header: "&CPage &P of &N".to_string(),
        odd_footer: "&LConfidential".to_string(),
        first_header: "&CCover".to_string(),
        ..HeaderFooterOptions::default()
    };
    doc.set_header_footer("Sheet1", Some(&opts)).expect("set");

    let saved = doc.save_to_vec().expect("save");
    let reopened = Document::from_bytes(&saved).expect("reopen");
    assert_eq!(reopened.header_footer("Sheet1").expect("get"), Some(opts));
}

#[test]
fn absent_configuration_reads_back_as_none() {
    let doc = Document::new();
    assert_eq!(doc.header_footer("Sheet1").expect("get"), None);
}

#[test]
fn clearing_removes_the_node() {
    let mut doc = Document::new();
    doc.set_header_footer(
        "Sheet1",
        Some(&HeaderFooterOptions {
            odd_header: "&CDraft".to_string(),
            ..HeaderFooterOptions::default()
        }),
    )
    .expect("set");
    doc.set_header_footer("Sheet1", None).expect("clear");

    assert_eq!(doc.header_footer("Sheet1").expect("get"), None);
    let sheet = String::from_utf8(doc.part_bytes("xl/worksheets/sheet1.xml").unwrap()).unwrap();
    assert!(!sheet.contains("headerFooter"), "node survived a clear in {sheet}");
}

#[test]
fn field_length_is_measured_in_characters() {
    let mut doc = Document::new();

    // 255 multi-byte characters are fine even though they exceed 255 bytes.
    let at_limit = "搭".repeat(MAX_FIELD_LENGTH);
    doc.set_header_footer(
        "Sheet1",
        Some(&HeaderFooterOptions {
            odd_header: at_limit,
            ..HeaderFooterOptions::default()
        }),
    )
    .expect("set at the limit");

    let over = "搭".repeat(MAX_FIELD_LENGTH + 1);
    let err = doc
        .set_header_footer(
            "Sheet1",
            Some(&HeaderFooterOptions {
                odd_header: over,
                ..HeaderFooterOptions::default()
            }),
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "field odd_header must be less than or equal to 255 characters"
    );
}

#[test]
fn missing_sheet_wins_over_field_validation() {
    let mut doc = Document::new();
    let err = doc
        .set_header_footer(
            "Ghost",
            Some(&HeaderFooterOptions {
                odd_footer: "x".repeat(MAX_FIELD_LENGTH + 1),
                ..HeaderFooterOptions::default()
            }),
        )
        .unwrap_err();
    assert!(matches!(err, DocError::SheetNotFound(_)), "got {err:?}");
}
