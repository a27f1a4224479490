//! Materialized workbook part.
//!
//! The workbook is parsed the same way worksheets are: verbatim spans, with
//! the three element families the engine edits (`sheets`, `bookViews`,
//! `definedNames`) modeled and everything else opaque. Untouched families
//! re-emit their original bytes.

use crate::xml::{
    attr_get, attr_local_get, attr_remove, attr_set, escape_value, inner_bytes, local_of,
    open_root_tag, parse_start_attrs, prefixed, push_empty, push_end, push_start, split_part,
    unescape_lenient, AttrList,
};

/// Schema order of `workbook` children, for inserting absent families.
const CHILD_ORDER: &[&str] = &[
    "fileVersion",
    "fileSharing",
    "workbookPr",
    "workbookProtection",
    "bookViews",
    "sheets",
    "functionGroups",
    "externalReferences",
    "definedNames",
    "calcPr",
    "oleSize",
    "customWorkbookViews",
    "pivotCaches",
    "smartTagPr",
    "smartTagTypes",
    "webPublishing",
    "fileRecoveryPr",
    "webPublishObjects",
    "extLst",
];

fn known_rank(local: &str) -> Option<usize> {
    CHILD_ORDER.iter().position(|&n| n == local)
}

#[derive(Debug)]
pub(crate) struct WorkbookPart {
    prolog: Vec<u8>,
    root_start: Vec<u8>,
    root_qname: String,
    children: Vec<BookNode>,
    tail: Vec<u8>,
    root_end: Vec<u8>,
    epilog: Vec<u8>,
    dirty: bool,
}

#[derive(Debug)]
struct BookNode {
    lead: Vec<u8>,
    kind: BookKind,
}

#[derive(Debug)]
enum BookKind {
    Sheets {
        qname: String,
        attrs: AttrList,
        entries: Vec<SheetEntry>,
        raw: Option<Vec<u8>>,
    },
    BookViews {
        qname: String,
        attrs: AttrList,
        views: Vec<AttrList>,
        raw: Option<Vec<u8>>,
    },
    DefinedNames {
        qname: String,
        attrs: AttrList,
        entries: Vec<DefinedNameEntry>,
        raw: Option<Vec<u8>>,
    },
    Opaque {
        qname: String,
        raw: Vec<u8>,
    },
}

impl BookKind {
    fn local(&self) -> &str {
        match self {
            BookKind::Sheets { .. } => "sheets",
            BookKind::BookViews { .. } => "bookViews",
            BookKind::DefinedNames { .. } => "definedNames",
            BookKind::Opaque { qname, .. } => local_of(qname),
        }
    }
}

/// One `<sheet>` entry. Attributes keep their on-disk order, so an entry
/// carried through a rewrite keeps unknown attributes like `state`.
#[derive(Debug, Clone)]
pub(crate) struct SheetEntry {
    attrs: AttrList,
}

impl SheetEntry {
    pub fn new(name: &str, sheet_id: u32, rel_id: &str) -> Self {
        let mut attrs = AttrList::new();
        attr_set(&mut attrs, "name", name);
        attr_set(&mut attrs, "sheetId", &sheet_id.to_string());
        attrs.push(("r:id".to_string(), escape_value(rel_id)));
        SheetEntry { attrs }
    }

    pub fn name(&self) -> String {
        attr_get(&self.attrs, "name").unwrap_or_default()
    }

    pub fn set_name(&mut self, name: &str) {
        attr_set(&mut self.attrs, "name", name);
    }

    pub fn sheet_id(&self) -> Option<u32> {
        attr_get(&self.attrs, "sheetId").and_then(|v| v.parse().ok())
    }

    /// The relationship id, matched on local name so any prefix bound to the
    /// relationships namespace works.
    pub fn rel_id(&self) -> Option<String> {
        attr_local_get(&self.attrs, "id")
    }
}

/// One `<definedName>` entry: attributes plus the escaped formula text.
#[derive(Debug, Clone)]
pub(crate) struct DefinedNameEntry {
    attrs: AttrList,
    text: String,
}

impl DefinedNameEntry {
    pub fn name(&self) -> String {
        attr_get(&self.attrs, "name").unwrap_or_default()
    }

    pub fn local_sheet_id(&self) -> Option<usize> {
        attr_get(&self.attrs, "localSheetId").and_then(|v| v.parse().ok())
    }

    pub fn set_local_sheet_id(&mut self, index: Option<usize>) {
        match index {
            Some(i) => attr_set(&mut self.attrs, "localSheetId", &i.to_string()),
            None => attr_remove(&mut self.attrs, "localSheetId"),
        }
    }

    pub fn refers_to(&self) -> String {
        unescape_lenient(&self.text)
    }

    pub fn set_refers_to(&mut self, formula: &str) {
        self.text = escape_value(formula);
    }

    pub fn comment(&self) -> Option<String> {
        attr_get(&self.attrs, "comment")
    }
}

pub(crate) fn parse_workbook(bytes: &[u8]) -> Result<WorkbookPart, quick_xml::Error> {
    let skel = split_part(bytes)?;
    let mut children = Vec::with_capacity(skel.children.len());
    for child in skel.children {
        let crate::xml::RawChild {
            lead,
            qname,
            local,
            raw,
        } = child;
        let kind = match local.as_str() {
            "sheets" => {
                let sub = split_part(&raw)?;
                let attrs = parse_start_attrs(&sub.root_start)?;
                let mut entries = Vec::new();
                for c in sub.children {
                    if c.local == "sheet" {
                        entries.push(SheetEntry {
                            attrs: parse_start_attrs(&c.raw)?,
                        });
                    }
                }
                BookKind::Sheets {
                    qname,
                    attrs,
                    entries,
                    raw: Some(raw),
                }
            }
            "bookViews" => {
                let sub = split_part(&raw)?;
                let attrs = parse_start_attrs(&sub.root_start)?;
                let mut views = Vec::new();
                for c in sub.children {
                    if c.local == "workbookView" {
                        views.push(parse_start_attrs(&c.raw)?);
                    }
                }
                BookKind::BookViews {
                    qname,
                    attrs,
                    views,
                    raw: Some(raw),
                }
            }
            "definedNames" => {
                let sub = split_part(&raw)?;
                let attrs = parse_start_attrs(&sub.root_start)?;
                let mut entries = Vec::new();
                for c in sub.children {
                    if c.local == "definedName" {
                        let cskel = split_part(&c.raw)?;
                        entries.push(DefinedNameEntry {
                            attrs: parse_start_attrs(&cskel.root_start)?,
                            text: String::from_utf8_lossy(inner_bytes(&c.raw, &cskel))
                                .into_owned(),
                        });
                    }
                }
                BookKind::DefinedNames {
                    qname,
                    attrs,
                    entries,
                    raw: Some(raw),
                }
            }
            _ => BookKind::Opaque { qname, raw },
        };
        children.push(BookNode { lead, kind });
    }
    Ok(WorkbookPart {
        prolog: skel.prolog,
        root_start: skel.root_start,
        root_qname: skel.root_qname,
        children,
        tail: skel.tail,
        root_end: skel.root_end,
        epilog: skel.epilog,
        dirty: false,
    })
}

impl WorkbookPart {
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn to_xml(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.prolog);
        out.extend_from_slice(&self.root_start);
        for node in &self.children {
            match &node.kind {
                BookKind::Sheets {
                    qname,
                    attrs,
                    entries,
                    raw,
                } => {
                    out.extend_from_slice(&node.lead);
                    match raw {
                        Some(raw) => out.extend_from_slice(raw),
                        None => {
                            let entry_qname = prefixed(qname, "sheet");
                            push_start(&mut out, qname, attrs);
                            for entry in entries {
                                push_empty(&mut out, &entry_qname, &entry.attrs);
                            }
                            push_end(&mut out, qname);
                        }
                    }
                }
                BookKind::BookViews {
                    qname,
                    attrs,
                    views,
                    raw,
                } => {
                    out.extend_from_slice(&node.lead);
                    match raw {
                        Some(raw) => out.extend_from_slice(raw),
                        None => {
                            if views.is_empty() {
                                push_empty(&mut out, qname, attrs);
                            } else {
                                let view_qname = prefixed(qname, "workbookView");
                                push_start(&mut out, qname, attrs);
                                for view in views {
                                    push_empty(&mut out, &view_qname, view);
                                }
                                push_end(&mut out, qname);
                            }
                        }
                    }
                }
                BookKind::DefinedNames {
                    qname,
                    attrs,
                    entries,
                    raw,
                } => match raw {
                    Some(raw) => {
                        out.extend_from_slice(&node.lead);
                        out.extend_from_slice(raw);
                    }
                    // A rewritten family with no entries left disappears.
                    None if entries.is_empty() => {}
                    None => {
                        out.extend_from_slice(&node.lead);
                        let entry_qname = prefixed(qname, "definedName");
                        push_start(&mut out, qname, attrs);
                        for entry in entries {
                            push_start(&mut out, &entry_qname, &entry.attrs);
                            out.extend_from_slice(entry.text.as_bytes());
                            push_end(&mut out, &entry_qname);
                        }
                        push_end(&mut out, qname);
                    }
                },
                BookKind::Opaque { raw, .. } => {
                    out.extend_from_slice(&node.lead);
                    out.extend_from_slice(raw);
                }
            }
        }
        out.extend_from_slice(&self.tail);
        out.extend_from_slice(&self.root_end);
        out.extend_from_slice(&self.epilog);
        out
    }

    fn find_node(&self, local: &str) -> Option<usize> {
        self.children.iter().position(|n| n.kind.local() == local)
    }

    fn ensure_node(&mut self, local: &str, make: impl FnOnce() -> BookKind) -> usize {
        if let Some(i) = self.find_node(local) {
            return i;
        }
        let qname = self.root_qname.clone();
        open_root_tag(&mut self.root_start, &mut self.root_end, &qname);
        let rank = known_rank(local).unwrap_or(CHILD_ORDER.len());
        let mut insert_at = self.children.len();
        let mut prev_rank = 0;
        for (i, child) in self.children.iter().enumerate() {
            let r = known_rank(child.kind.local()).unwrap_or(prev_rank);
            if r > rank {
                insert_at = i;
                break;
            }
            prev_rank = r;
        }
        self.children.insert(
            insert_at,
            BookNode {
                lead: Vec::new(),
                kind: make(),
            },
        );
        self.dirty = true;
        insert_at
    }

    pub fn sheet_entries(&self) -> &[SheetEntry] {
        self.children
            .iter()
            .find_map(|n| match &n.kind {
                BookKind::Sheets { entries, .. } => Some(entries.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn sheet_entries_mut(&mut self) -> &mut Vec<SheetEntry> {
        let qname = prefixed(&self.root_qname, "sheets");
        let i = self.ensure_node("sheets", move || BookKind::Sheets {
            qname,
            attrs: AttrList::new(),
            entries: Vec::new(),
            raw: None,
        });
        self.dirty = true;
        match &mut self.children[i].kind {
            BookKind::Sheets { entries, raw, .. } => {
                *raw = None;
                entries
            }
            _ => unreachable!(),
        }
    }

    fn book_views(&self) -> Option<&Vec<AttrList>> {
        self.children.iter().find_map(|n| match &n.kind {
            BookKind::BookViews { views, .. } => Some(views),
            _ => None,
        })
    }

    fn book_views_mut(&mut self) -> &mut Vec<AttrList> {
        let qname = prefixed(&self.root_qname, "bookViews");
        let i = self.ensure_node("bookViews", move || BookKind::BookViews {
            qname,
            attrs: AttrList::new(),
            views: Vec::new(),
            raw: None,
        });
        self.dirty = true;
        match &mut self.children[i].kind {
            BookKind::BookViews { views, raw, .. } => {
                *raw = None;
                views
            }
            _ => unreachable!(),
        }
    }

    /// Creates empty book-view state if the workbook has none. Used by the
    /// active-sheet path, which initializes views lazily even when the
    /// requested index turns out to be unusable.
    pub fn ensure_book_views(&mut self) {
        if self.find_node("bookViews").is_none() {
            self.book_views_mut();
        }
    }

    /// The `activeTab` of the first workbook view, or 0.
    pub fn active_tab(&self) -> usize {
        self.book_views()
            .and_then(|views| views.first())
            .and_then(|view| attr_get(view, "activeTab"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn set_active_tab(&mut self, index: usize) {
        if self.find_node("bookViews").is_some() && self.active_tab() == index {
            return;
        }
        let views = self.book_views_mut();
        if views.is_empty() {
            views.push(AttrList::new());
        }
        // activeTab="0" is the default and stays implicit.
        if index == 0 {
            attr_remove(&mut views[0], "activeTab");
        } else {
            attr_set(&mut views[0], "activeTab", &index.to_string());
        }
    }

    pub fn defined_name_entries(&self) -> &[DefinedNameEntry] {
        self.children
            .iter()
            .find_map(|n| match &n.kind {
                BookKind::DefinedNames { entries, .. } => Some(entries.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn defined_name_entries_mut(&mut self) -> &mut Vec<DefinedNameEntry> {
        let qname = prefixed(&self.root_qname, "definedNames");
        let i = self.ensure_node("definedNames", move || BookKind::DefinedNames {
            qname,
            attrs: AttrList::new(),
            entries: Vec::new(),
            raw: None,
        });
        self.dirty = true;
        match &mut self.children[i].kind {
            BookKind::DefinedNames { entries, raw, .. } => {
                *raw = None;
                entries
            }
            _ => unreachable!(),
        }
    }

    pub fn push_defined_name(
        &mut self,
        name: &str,
        refers_to: &str,
        comment: &str,
        local_sheet_id: Option<usize>,
    ) {
        let mut attrs = AttrList::new();
        attr_set(&mut attrs, "name", name);
        if let Some(index) = local_sheet_id {
            attr_set(&mut attrs, "localSheetId", &index.to_string());
        }
        if !comment.is_empty() {
            attr_set(&mut attrs, "comment", comment);
        }
        let text = escape_value(refers_to);
        self.defined_name_entries_mut()
            .push(DefinedNameEntry { attrs, text });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
        "<workbook xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" ",
        "xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">",
        "<fileVersion appName=\"xl\" lastEdited=\"7\"/>",
        "<bookViews><workbookView xWindow=\"240\" activeTab=\"1\"/></bookViews>",
        "<sheets><sheet name=\"Sheet1\" sheetId=\"1\" r:id=\"rId1\"/>",
        "<sheet name=\"P&amp;L\" sheetId=\"2\" r:id=\"rId2\" state=\"hidden\"/></sheets>",
        "<definedNames><definedName name=\"Amount\" localSheetId=\"1\">Sheet2!$A$1</definedName></definedNames>",
        "<calcPr calcId=\"181029\"/>",
        "</workbook>"
    );

    #[test]
    fn untouched_workbook_round_trips_byte_identical() {
        let wb = parse_workbook(SAMPLE.as_bytes()).unwrap();
        assert!(!wb.is_dirty());
        assert_eq!(wb.to_xml(), SAMPLE.as_bytes());
    }

    #[test]
    fn entries_expose_unescaped_names_and_rel_ids() {
        let wb = parse_workbook(SAMPLE.as_bytes()).unwrap();
        let entries = wb.sheet_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name(), "P&L");
        assert_eq!(entries[1].sheet_id(), Some(2));
        assert_eq!(entries[1].rel_id().as_deref(), Some("rId2"));
        assert_eq!(wb.active_tab(), 1);

        let names = wb.defined_name_entries();
        assert_eq!(names[0].name(), "Amount");
        assert_eq!(names[0].local_sheet_id(), Some(1));
        assert_eq!(names[0].refers_to(), "Sheet2!$A$1");
    }

    #[test]
    fn renaming_a_sheet_keeps_other_families_verbatim() {
        let mut wb = parse_workbook(SAMPLE.as_bytes()).unwrap();
        wb.sheet_entries_mut()[0].set_name("Data <1>");
        assert!(wb.is_dirty());
        let xml = String::from_utf8(wb.to_xml()).unwrap();
        assert!(xml.contains("<sheet name=\"Data &lt;1&gt;\" sheetId=\"1\" r:id=\"rId1\"/>"));
        // Hidden-state attribute on the untouched entry survives the rewrite.
        assert!(xml.contains("state=\"hidden\""));
        // Families that were not edited keep their original bytes.
        assert!(xml.contains("<bookViews><workbookView xWindow=\"240\" activeTab=\"1\"/></bookViews>"));
        assert!(xml.contains("<definedNames><definedName name=\"Amount\" localSheetId=\"1\">Sheet2!$A$1</definedName></definedNames>"));
    }

    #[test]
    fn active_tab_setting_is_lazy_and_minimal() {
        let bare = "<workbook><sheets><sheet name=\"Sheet1\" sheetId=\"1\" r:id=\"rId1\"/></sheets></workbook>";
        let mut wb = parse_workbook(bare.as_bytes()).unwrap();
        assert_eq!(wb.active_tab(), 0);

        // Setting the already-effective index creates view state but keeps
        // the default implicit on a later set to 0.
        wb.ensure_book_views();
        let xml = String::from_utf8(wb.to_xml()).unwrap();
        assert!(xml.contains("<bookViews/>"));

        wb.set_active_tab(2);
        assert_eq!(wb.active_tab(), 2);
        let xml = String::from_utf8(wb.to_xml()).unwrap();
        assert!(xml.contains("<bookViews><workbookView activeTab=\"2\"/></bookViews>"));

        wb.set_active_tab(0);
        let xml = String::from_utf8(wb.to_xml()).unwrap();
        assert!(xml.contains("<bookViews><workbookView/></bookViews>"));
    }

    #[test]
    fn defined_names_node_appears_and_disappears_with_entries() {
        let bare = "<workbook><sheets><sheet name=\"Sheet1\" sheetId=\"1\" r:id=\"rId1\"/></sheets><calcPr calcId=\"1\"/></workbook>";
        let mut wb = parse_workbook(bare.as_bytes()).unwrap();
        wb.push_defined_name("Total", "Sheet1!$B$2", "", None);
        let xml = String::from_utf8(wb.to_xml()).unwrap();
        // Inserted between sheets and calcPr, per schema order.
        assert!(xml.contains(
            "</sheets><definedNames><definedName name=\"Total\">Sheet1!$B$2</definedName></definedNames><calcPr"
        ));

        wb.defined_name_entries_mut().clear();
        let xml = String::from_utf8(wb.to_xml()).unwrap();
        assert!(!xml.contains("definedNames"));
    }

    #[test]
    fn prefixed_workbooks_keep_their_prefix() {
        let prefixed_doc = concat!(
            "<x:workbook xmlns:x=\"urn:main\" xmlns:r=\"urn:rel\">",
            "<x:sheets><x:sheet name=\"Sheet1\" sheetId=\"1\" r:id=\"rId1\"/></x:sheets>",
            "</x:workbook>"
        );
        let mut wb = parse_workbook(prefixed_doc.as_bytes()).unwrap();
        assert_eq!(wb.sheet_entries()[0].rel_id().as_deref(), Some("rId1"));
        wb.sheet_entries_mut()
            .push(SheetEntry::new("Sheet2", 2, "rId2"));
        let xml = String::from_utf8(wb.to_xml()).unwrap();
        assert!(xml.contains("<x:sheets><x:sheet name=\"Sheet1\" sheetId=\"1\" r:id=\"rId1\"/><x:sheet name=\"Sheet2\" sheetId=\"2\" r:id=\"rId2\"/></x:sheets>"));
    }
}
