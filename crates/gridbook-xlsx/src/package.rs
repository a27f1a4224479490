//! ZIP container I/O and the blank-workbook scaffolding.

use std::io::{Cursor, Read, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::Result;
use crate::part_store::PartStore;

pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub(crate) const PACKAGE_RELS_PART: &str = "_rels/.rels";
pub(crate) const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

/// Canonical part names use `/` separators and no leading slash.
pub(crate) fn canonical_part_name(name: &str) -> String {
    let replaced = name.replace('\\', "/");
    replaced.trim_start_matches('/').to_string()
}

/// Inflate every file entry of a package into a part store.
pub(crate) fn read_package(bytes: &[u8]) -> Result<PartStore> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let store = PartStore::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = canonical_part_name(file.name());
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)?;
        store.store_raw(&name, buf);
    }
    Ok(store)
}

/// Serialize parts into a fresh archive, in the order given.
pub(crate) fn write_package(parts: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buffer);
        let options =
            FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in parts {
            zip.start_file(name.clone(), options)?;
            zip.write_all(data)?;
        }
        zip.finish()?;
    }
    Ok(buffer.into_inner())
}

pub(crate) const BLANK_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  <Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
  <Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
</Types>
"#;

pub(crate) const BLANK_PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>
"#;

pub(crate) const BLANK_WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Sheet1" sheetId="1" r:id="rId1"/>
  </sheets>
</workbook>
"#;

pub(crate) const BLANK_WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>
"#;

pub(crate) const BLANK_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
  <fills count="1"><fill><patternFill patternType="none"/></fill></fills>
  <borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>
  <cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>
"#;

/// Markup for a freshly created worksheet part. The first sheet of a blank
/// document carries `tabSelected`; sheets added later do not.
pub(crate) fn blank_worksheet_xml(selected: bool) -> String {
    let view = if selected {
        r#"<sheetView tabSelected="1" workbookViewId="0"/>"#
    } else {
        r#"<sheetView workbookViewId="0"/>"#
    };
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
            "<dimension ref=\"A1\"/>",
            "<sheetViews>{}</sheetViews>",
            r#"<sheetFormatPr defaultRowHeight="15"/>"#,
            "<sheetData/>",
            "</worksheet>"
        ),
        view
    )
}
