use std::io::{Cursor, Write};

use gridbook_xlsx::{CellScalar, DocError, Document};
use zip::write::FileOptions;
use zip::ZipWriter;

#[test]
fn literal_search_matches_whole_values_only() {
    let mut doc = Document::new();
    doc.set_cell_value("Sheet1", "A1", &CellScalar::Number(100.0))
        .expect("A1");
    doc.set_cell_value("Sheet1", "B2", &CellScalar::Text("100".to_string()))
        .expect("B2");
    doc.set_cell_value("Sheet1", "C3", &CellScalar::Text("1001".to_string()))
        .expect("C3");

    let hits = doc.search_sheet("Sheet1", "100").expect("search");
    assert_eq!(hits, vec!["A1".to_string(), "B2".to_string()]);

    // No partial matching, and the empty needle only matches empty values.
    assert!(doc.search_sheet("Sheet1", "10").expect("search").is_empty());
    assert!(doc.search_sheet("Sheet1", "").expect("search").is_empty());
}

#[test]
fn regex_search_matches_anywhere_in_the_value() {
    let mut doc = Document::new();
    doc.set_cell_value("Sheet1", "A1", &CellScalar::Number(100.0))
        .expect("A1");
    doc.set_cell_value("Sheet1", "B1", &CellScalar::Text("abc".to_string()))
        .expect("B1");
    doc.set_cell_value("Sheet1", "C1", &CellScalar::Text("x9y".to_string()))
        .expect("C1");

    let hits = doc.search_sheet_regex("Sheet1", "[0-9]").expect("search");
    assert_eq!(hits, vec!["A1".to_string(), "C1".to_string()]);

    let hits = doc.search_sheet_regex("Sheet1", "^abc$").expect("search");
    assert_eq!(hits, vec!["B1".to_string()]);
}

#[test]
fn search_reports_typed_failures() {
    let doc = Document::new();
    let err = doc.search_sheet("Ghost", "x").unwrap_err();
    assert!(matches!(err, DocError::SheetNotFound(_)), "got {err:?}");

    let err = doc.search_sheet_regex("Sheet1", "[unclosed").unwrap_err();
    assert!(matches!(err, DocError::Pattern(_)), "got {err:?}");
}

#[test]
fn shared_strings_resolve_during_search() {
    let content_types = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
  <Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
</Types>"#;

    let package_rels = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

    let workbook = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets><sheet name="Data" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

    let workbook_rels = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#;

    let worksheet = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row></sheetData>
</worksheet>"#;

    let shared_strings = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="2" uniqueCount="2">
  <si><t>aluminum</t></si>
  <si><r><t>alu</t></r><r><t>minium</t></r></si>
</sst>"#;

    let cursor = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(cursor);
    let options = FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in [
        ("[Content_Types].xml", content_types.as_slice()),
        ("_rels/.rels", package_rels.as_slice()),
        ("xl/workbook.xml", workbook.as_slice()),
        ("xl/_rels/workbook.xml.rels", workbook_rels.as_slice()),
        ("xl/worksheets/sheet1.xml", worksheet.as_slice()),
        ("xl/sharedStrings.xml", shared_strings.as_slice()),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    let bytes = zip.finish().unwrap().into_inner();

    let doc = Document::from_bytes(&bytes).expect("open");
    // Rich-text runs concatenate before matching.
    let hits = doc.search_sheet("Data", "aluminium").expect("search");
    assert_eq!(hits, vec!["B1".to_string()]);
    let hits = doc.search_sheet_regex("Data", "^alumin").expect("search");
    assert_eq!(hits, vec!["A1".to_string(), "B1".to_string()]);

    assert_eq!(doc.cell_value("Data", "A1").expect("read"), "aluminum");
    assert_eq!(doc.cell_value("Data", "Z99").expect("read"), "");
}
