use std::io::{Cursor, Read};

use gridbook_xlsx::{DefinedName, DefinedNameScope, DocError, Document};
use zip::ZipArchive;

fn name(name: &str, refers_to: &str, scope: DefinedNameScope) -> DefinedName {
    DefinedName {
        name: name.to_string(),
        refers_to: refers_to.to_string(),
        scope,
        ..DefinedName::default()
    }
}

fn seeded_document() -> Document {
    let mut doc = Document::new();
    doc.add_sheet("Bravo").expect("add Bravo");
    doc.add_sheet("Charlie").expect("add Charlie");
    doc.set_defined_name(&name("Prices", "Bravo!$A$1:$B$4", DefinedNameScope::Workbook))
        .expect("Prices");
    doc.set_defined_name(&name(
        "Local",
        "Bravo!$A$1",
        DefinedNameScope::Sheet("Bravo".to_string()),
    ))
    .expect("Local");
    doc.set_defined_name(&name(
        "Tail",
        "Charlie!$B$2",
        DefinedNameScope::Sheet("Charlie".to_string()),
    ))
    .expect("Tail");
    doc.set_defined_name(&name("Other", "Sheet1!$C$3", DefinedNameScope::Workbook))
        .expect("Other");
    doc
}

fn scope_of<'a>(doc: &'a [DefinedName], name: &str) -> Option<&'a DefinedNameScope> {
    doc.iter().find(|d| d.name == name).map(|d| &d.scope)
}

#[test]
fn deleting_a_sheet_purges_and_reindexes_names() {
    let mut doc = seeded_document();
    doc.delete_sheet("Bravo").expect("delete Bravo");

    let names = doc.defined_names();
    // Scoped to the deleted sheet: gone. Mentions the deleted sheet: gone.
    assert!(scope_of(&names, "Local").is_none());
    assert!(scope_of(&names, "Prices").is_none());
    // Scoped one index later: still bound to Charlie.
    assert_eq!(
        scope_of(&names, "Tail"),
        Some(&DefinedNameScope::Sheet("Charlie".to_string()))
    );
    assert_eq!(scope_of(&names, "Other"), Some(&DefinedNameScope::Workbook));
    assert_eq!(names.len(), 2);
}

#[test]
fn purged_and_reindexed_names_persist_across_a_save() {
    let mut doc = seeded_document();
    doc.delete_sheet("Bravo").expect("delete Bravo");

    let saved = doc.save_to_vec().expect("save");
    let reopened = Document::from_bytes(&saved).expect("reopen");
    let names = reopened.defined_names();
    assert_eq!(names.len(), 2);
    assert_eq!(
        scope_of(&names, "Tail"),
        Some(&DefinedNameScope::Sheet("Charlie".to_string()))
    );
    assert_eq!(
        names.iter().find(|d| d.name == "Tail").map(|d| d.refers_to.as_str()),
        Some("Charlie!$B$2")
    );
}

#[test]
fn failed_deletes_leave_names_untouched() {
    let mut doc = Document::new();
    doc.set_defined_name(&name("Keep", "Sheet1!$A$1", DefinedNameScope::Workbook))
        .expect("Keep");

    let err = doc.delete_sheet("Sheet1").unwrap_err();
    assert!(matches!(err, DocError::DeleteLastSheet), "got {err:?}");
    assert_eq!(doc.defined_names().len(), 1);
}

#[test]
fn renaming_a_sheet_rewrites_name_formulas() {
    let mut doc = seeded_document();
    doc.rename_sheet("Bravo", "Bundles").expect("rename");

    let names = doc.defined_names();
    let prices = names.iter().find(|d| d.name == "Prices").expect("Prices survives");
    assert_eq!(prices.refers_to, "Bundles!$A$1:$B$4");
    // The scope follows the sheet through its new name.
    assert_eq!(
        scope_of(&names, "Local"),
        Some(&DefinedNameScope::Sheet("Bundles".to_string()))
    );
    // References to other sheets are untouched.
    assert_eq!(
        names.iter().find(|d| d.name == "Tail").map(|d| d.refers_to.as_str()),
        Some("Charlie!$B$2")
    );
}

#[test]
fn same_name_may_live_in_different_scopes() {
    let mut doc = Document::new();
    doc.add_sheet("Bravo").expect("add Bravo");
    doc.set_defined_name(&name("Amount", "Sheet1!$A$1", DefinedNameScope::Workbook))
        .expect("workbook scope");
    doc.set_defined_name(&name(
        "Amount",
        "Bravo!$B$2",
        DefinedNameScope::Sheet("Bravo".to_string()),
    ))
    .expect("sheet scope");

    let err = doc
        .set_defined_name(&name("Amount", "Sheet1!$Z$9", DefinedNameScope::Workbook))
        .unwrap_err();
    assert!(matches!(err, DocError::DuplicateDefinedName(_)), "got {err:?}");
    assert_eq!(doc.defined_names().len(), 2);
}

#[test]
fn scope_must_exist_before_anything_is_written() {
    let mut doc = Document::new();
    let err = doc
        .set_defined_name(&name(
            "Orphan",
            "Ghost!$A$1",
            DefinedNameScope::Sheet("Ghost".to_string()),
        ))
        .unwrap_err();
    assert!(matches!(err, DocError::SheetNotFound(_)), "got {err:?}");
    assert!(doc.defined_names().is_empty());
}

#[test]
fn deleting_names_requires_a_scope_match() {
    let mut doc = Document::new();
    doc.add_sheet("Bravo").expect("add Bravo");
    doc.set_defined_name(&name("Amount", "Sheet1!$A$1", DefinedNameScope::Workbook))
        .expect("set");

    // Right name, wrong scope.
    let err = doc
        .delete_defined_name("Amount", &DefinedNameScope::Sheet("Bravo".to_string()))
        .unwrap_err();
    assert!(matches!(err, DocError::DefinedNameScopeNotFound), "got {err:?}");

    // Unknown scope sheet.
    let err = doc
        .delete_defined_name("Amount", &DefinedNameScope::Sheet("Ghost".to_string()))
        .unwrap_err();
    assert!(matches!(err, DocError::DefinedNameScopeNotFound), "got {err:?}");

    doc.delete_defined_name("Amount", &DefinedNameScope::Workbook)
        .expect("matching scope deletes");
    assert!(doc.defined_names().is_empty());
}

#[test]
fn saved_workbooks_carry_scopes_as_local_sheet_ids() {
    let doc = seeded_document();
    let saved = doc.save_to_vec().expect("save");

    let mut archive = ZipArchive::new(Cursor::new(saved.as_slice())).expect("open zip");
    let mut workbook_xml = String::new();
    archive
        .by_name("xl/workbook.xml")
        .expect("workbook part")
        .read_to_string(&mut workbook_xml)
        .expect("read workbook");

    let parsed = roxmltree::Document::parse(&workbook_xml).expect("well-formed workbook");
    let entries: Vec<_> = parsed
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "definedName")
        .collect();
    assert_eq!(entries.len(), 4, "in {workbook_xml}");

    let by_name = |wanted: &str| {
        entries
            .iter()
            .find(|n| n.attribute("name") == Some(wanted))
            .unwrap_or_else(|| panic!("definedName {wanted} missing from {workbook_xml}"))
    };
    assert_eq!(by_name("Prices").attribute("localSheetId"), None);
    assert_eq!(by_name("Local").attribute("localSheetId"), Some("1"));
    assert_eq!(by_name("Tail").attribute("localSheetId"), Some("2"));
    assert_eq!(by_name("Prices").text(), Some("Bravo!$A$1:$B$4"));
}
