use gridbook_xlsx::{DocError, Document, Orientation, PageLayoutOptions};

#[test]
fn layout_settings_round_trip_through_a_save() {
    let mut doc = Document::new();
    let opts = PageLayoutOptions {
        size: Some(9),
        orientation: Some(Orientation::Landscape),
        first_page_number: Some(4),
        adjust_to: Some(120),
        fit_to_height: Some(2),
        fit_to_width: Some(1),
        black_and_white: Some(true),
    };
    doc.set_page_layout("Sheet1", &opts).expect("set layout");

    let saved = doc.save_to_vec().expect("save");
    let reopened = Document::from_bytes(&saved).expect("reopen");
    assert_eq!(reopened.page_layout("Sheet1").expect("get layout"), opts);
}

#[test]
fn partial_updates_merge_instead_of_replacing() {
    let mut doc = Document::new();
    doc.set_page_layout(
        "Sheet1",
        &PageLayoutOptions {
            size: Some(9),
            ..PageLayoutOptions::default()
        },
    )
    .expect("set size");
    doc.set_page_layout(
        "Sheet1",
        &PageLayoutOptions {
            orientation: Some(Orientation::Portrait),
            ..PageLayoutOptions::default()
        },
    )
    .expect("set orientation");

    let read = doc.page_layout("Sheet1").expect("get layout");
    assert_eq!(read.size, Some(9), "earlier setting was clobbered");
    assert_eq!(read.orientation, Some(Orientation::Portrait));
    assert_eq!(read.adjust_to, None);
}

#[test]
fn sheets_without_a_setup_report_empty_options() {
    let doc = Document::new();
    assert_eq!(
        doc.page_layout("Sheet1").expect("get layout"),
        PageLayoutOptions::default()
    );
}

#[test]
fn layout_operations_require_an_existing_sheet() {
    let mut doc = Document::new();
    let err = doc.page_layout("Ghost").unwrap_err();
    assert!(matches!(err, DocError::SheetNotFound(_)), "got {err:?}");
    let err = doc
        .set_page_layout("Ghost", &PageLayoutOptions::default())
        .unwrap_err();
    assert!(matches!(err, DocError::SheetNotFound(_)), "got {err:?}");
}
