//! Materialized worksheet parts.
//!
//! A worksheet is split into verbatim spans at materialization time. The
//! handful of element families the engine edits (`sheetViews`, `sheetData`,
//! `pageSetup`, `headerFooter`, `rowBreaks`, `colBreaks`) are parsed into
//! structures that keep their original bytes alongside; everything else stays
//! an opaque span. Serialization re-emits original bytes for every subtree
//! that was never touched, so an untouched sheet round-trips byte-identical
//! and an edited one only changes where the edit landed.

use std::collections::BTreeSet;

use gridbook_model::{
    CellRef, HeaderFooterOptions, Orientation, PageLayoutOptions, PaneOptions, RefError,
    MAX_COLUMNS, MAX_ROWS,
};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use crate::error::{DocError, Result};
use crate::shared_strings::SharedStrings;
use crate::xml::{
    attr_flag, attr_get, attr_remove, attr_set, escape_value, inner_bytes, local_of,
    open_root_tag, parse_start_attrs, prefixed, push_empty, push_end, push_start, split_part,
    unescape_lenient, AttrList,
};

/// A value written into a cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellScalar {
    Number(f64),
    Bool(bool),
    Text(String),
}

/// Formats a float the way cell values and pane splits are written: whole
/// numbers lose the trailing `.0`.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_finite() && value == value.trunc() && value.abs() < 9_007_199_254_740_992.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Schema order of `worksheet` children, used when an edit has to insert an
/// element the part does not have yet.
const CHILD_ORDER: &[&str] = &[
    "sheetPr",
    "dimension",
    "sheetViews",
    "sheetFormatPr",
    "cols",
    "sheetData",
    "sheetCalcPr",
    "sheetProtection",
    "protectedRanges",
    "scenarios",
    "autoFilter",
    "sortState",
    "dataConsolidate",
    "customSheetViews",
    "mergeCells",
    "phoneticPr",
    "conditionalFormatting",
    "dataValidations",
    "hyperlinks",
    "printOptions",
    "pageMargins",
    "pageSetup",
    "headerFooter",
    "rowBreaks",
    "colBreaks",
    "customProperties",
    "cellWatches",
    "ignoredErrors",
    "smartTags",
    "drawing",
    "drawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

fn known_rank(local: &str) -> Option<usize> {
    CHILD_ORDER.iter().position(|&n| n == local)
}

/// Header/footer slot elements in schema order, paired with the option field
/// they populate.
const HF_SLOTS: &[(&str, &str)] = &[
    ("odd_header", "oddHeader"),
    ("odd_footer", "oddFooter"),
    ("even_header", "evenHeader"),
    ("even_footer", "evenFooter"),
    ("first_header", "firstHeader"),
    ("first_footer", "firstFooter"),
];

fn hf_elem_name(field: &str) -> Option<&'static str> {
    HF_SLOTS.iter().find(|(f, _)| *f == field).map(|(_, e)| *e)
}

#[derive(Debug)]
pub struct WorksheetPart {
    prolog: Vec<u8>,
    root_start: Vec<u8>,
    root_qname: String,
    children: Vec<SheetNode>,
    tail: Vec<u8>,
    root_end: Vec<u8>,
    epilog: Vec<u8>,
}

#[derive(Debug)]
struct SheetNode {
    lead: Vec<u8>,
    kind: NodeKind,
}

#[derive(Debug)]
enum NodeKind {
    Views {
        qname: String,
        views: SheetViews,
        raw: Option<Vec<u8>>,
    },
    Data {
        qname: String,
        data: SheetData,
        raw: Option<Vec<u8>>,
    },
    PageSetup {
        qname: String,
        attrs: AttrList,
        raw: Option<Vec<u8>>,
    },
    HeaderFooter {
        qname: String,
        hf: HeaderFooterXml,
        raw: Option<Vec<u8>>,
    },
    RowBreaks {
        qname: String,
        breaks: PageBreaks,
        raw: Option<Vec<u8>>,
    },
    ColBreaks {
        qname: String,
        breaks: PageBreaks,
        raw: Option<Vec<u8>>,
    },
    Opaque {
        qname: String,
        raw: Vec<u8>,
    },
}

impl NodeKind {
    fn local(&self) -> &str {
        match self {
            NodeKind::Views { .. } => "sheetViews",
            NodeKind::Data { .. } => "sheetData",
            NodeKind::PageSetup { .. } => "pageSetup",
            NodeKind::HeaderFooter { .. } => "headerFooter",
            NodeKind::RowBreaks { .. } => "rowBreaks",
            NodeKind::ColBreaks { .. } => "colBreaks",
            NodeKind::Opaque { qname, .. } => local_of(qname),
        }
    }
}

#[derive(Debug, Default)]
struct SheetViews {
    attrs: AttrList,
    views: Vec<SheetView>,
    /// Children of `sheetViews` that are not `sheetView`, kept verbatim.
    extra: Vec<(Vec<u8>, Vec<u8>)>,
}

#[derive(Debug)]
struct SheetView {
    attrs: AttrList,
    children: Vec<ViewChild>,
}

#[derive(Debug)]
struct ViewChild {
    lead: Vec<u8>,
    local: String,
    raw: Vec<u8>,
}

#[derive(Debug, Default)]
struct SheetData {
    attrs: AttrList,
    items: Vec<DataItem>,
    tail: Vec<u8>,
}

#[derive(Debug)]
enum DataItem {
    Row(Row),
    Opaque { lead: Vec<u8>, raw: Vec<u8> },
}

#[derive(Debug)]
struct Row {
    lead: Vec<u8>,
    attrs: AttrList,
    items: Vec<RowItem>,
    tail: Vec<u8>,
}

#[derive(Debug)]
struct RowItem {
    lead: Vec<u8>,
    kind: RowItemKind,
}

#[derive(Debug)]
enum RowItemKind {
    Cell(Cell),
    Opaque { raw: Vec<u8> },
}

#[derive(Debug)]
struct Cell {
    attrs: AttrList,
    inner: CellInner,
}

#[derive(Debug)]
enum CellInner {
    /// Original bytes between `<c>` and `</c>`.
    Raw(Vec<u8>),
    /// Replaced by an edit; regenerated on write.
    Value(CellScalar),
}

#[derive(Debug, Default)]
struct HeaderFooterXml {
    attrs: AttrList,
    /// Child elements as (local name, escaped text), in document order.
    slots: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct PageBreaks {
    set: BTreeSet<u32>,
}

/// The row a value lands in: the numeric `r` attribute when present, the
/// position-implied number otherwise.
fn row_number(row: &Row, implied: u32) -> std::result::Result<u32, RefError> {
    match attr_get(&row.attrs, "r") {
        Some(text) => text
            .trim()
            .parse::<u32>()
            .map_err(|_| RefError::InvalidRow(text)),
        None => Ok(implied),
    }
}

fn cell_col(cell: &Cell, implied: u32) -> std::result::Result<u32, RefError> {
    match attr_get(&cell.attrs, "r") {
        Some(name) => Ok(CellRef::from_a1(&name)?.col),
        None => Ok(implied),
    }
}

pub(crate) fn parse_worksheet(bytes: &[u8]) -> std::result::Result<WorksheetPart, quick_xml::Error> {
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
            "sheetViews" => NodeKind::Views {
                views: parse_sheet_views(&raw)?,
                qname,
                raw: Some(raw),
            },
            "sheetData" => NodeKind::Data {
                data: parse_sheet_data(&raw)?,
                qname,
                raw: Some(raw),
            },
            "pageSetup" => NodeKind::PageSetup {
                attrs: parse_start_attrs(&raw_start_tag(&raw)?)?,
                qname,
                raw: Some(raw),
            },
            "headerFooter" => NodeKind::HeaderFooter {
                hf: parse_header_footer(&raw)?,
                qname,
                raw: Some(raw),
            },
            "rowBreaks" => NodeKind::RowBreaks {
                breaks: parse_breaks(&raw)?,
                qname,
                raw: Some(raw),
            },
            "colBreaks" => NodeKind::ColBreaks {
                breaks: parse_breaks(&raw)?,
                qname,
                raw: Some(raw),
            },
            _ => NodeKind::Opaque { qname, raw },
        };
        children.push(SheetNode { lead, kind });
    }
    Ok(WorksheetPart {
        prolog: skel.prolog,
        root_start: skel.root_start,
        root_qname: skel.root_qname,
        children,
        tail: skel.tail,
        root_end: skel.root_end,
        epilog: skel.epilog,
    })
}

/// The start-tag span of one element's raw bytes.
fn raw_start_tag(raw: &[u8]) -> std::result::Result<Vec<u8>, quick_xml::Error> {
    let skel = split_part(raw)?;
    Ok(skel.root_start)
}

fn parse_sheet_views(raw: &[u8]) -> std::result::Result<SheetViews, quick_xml::Error> {
    let skel = split_part(raw)?;
    let attrs = parse_start_attrs(&skel.root_start)?;
    let mut views = Vec::new();
    let mut extra = Vec::new();
    for child in skel.children {
        if child.local == "sheetView" {
            let vskel = split_part(&child.raw)?;
            let vattrs = parse_start_attrs(&vskel.root_start)?;
            let children = vskel
                .children
                .into_iter()
                .map(|c| ViewChild {
                    lead: c.lead,
                    local: c.local,
                    raw: c.raw,
                })
                .collect();
            views.push(SheetView {
                attrs: vattrs,
                children,
            });
        } else {
            extra.push((child.lead, child.raw));
        }
    }
    Ok(SheetViews {
        attrs,
        views,
        extra,
    })
}

fn parse_sheet_data(raw: &[u8]) -> std::result::Result<SheetData, quick_xml::Error> {
    let skel = split_part(raw)?;
    let attrs = parse_start_attrs(&skel.root_start)?;
    let mut items = Vec::new();
    for child in skel.children {
        if child.local == "row" {
            items.push(DataItem::Row(parse_row(child.lead, &child.raw)?));
        } else {
            items.push(DataItem::Opaque {
                lead: child.lead,
                raw: child.raw,
            });
        }
    }
    Ok(SheetData {
        attrs,
        items,
        tail: skel.tail,
    })
}

fn parse_row(lead: Vec<u8>, raw: &[u8]) -> std::result::Result<Row, quick_xml::Error> {
    let skel = split_part(raw)?;
    let attrs = parse_start_attrs(&skel.root_start)?;
    let mut items = Vec::new();
    for child in skel.children {
        let kind = if child.local == "c" {
            let cskel = split_part(&child.raw)?;
            let cattrs = parse_start_attrs(&cskel.root_start)?;
            let inner = inner_bytes(&child.raw, &cskel).to_vec();
            RowItemKind::Cell(Cell {
                attrs: cattrs,
                inner: CellInner::Raw(inner),
            })
        } else {
            RowItemKind::Opaque { raw: child.raw }
        };
        items.push(RowItem {
            lead: child.lead,
            kind,
        });
    }
    Ok(Row {
        lead,
        attrs,
        items,
        tail: skel.tail,
    })
}

fn parse_header_footer(raw: &[u8]) -> std::result::Result<HeaderFooterXml, quick_xml::Error> {
    let skel = split_part(raw)?;
    let attrs = parse_start_attrs(&skel.root_start)?;
    let mut slots = Vec::new();
    for child in skel.children {
        let cskel = split_part(&child.raw)?;
        let text = String::from_utf8_lossy(inner_bytes(&child.raw, &cskel)).into_owned();
        slots.push((child.local, text));
    }
    Ok(HeaderFooterXml { attrs, slots })
}

fn parse_breaks(raw: &[u8]) -> std::result::Result<PageBreaks, quick_xml::Error> {
    let skel = split_part(raw)?;
    let mut set = BTreeSet::new();
    for child in skel.children {
        if child.local != "brk" {
            continue;
        }
        let attrs = parse_start_attrs(&child.raw)?;
        if let Some(id) = attr_get(&attrs, "id").and_then(|v| v.parse::<u32>().ok()) {
            set.insert(id);
        }
    }
    Ok(PageBreaks { set })
}

impl WorksheetPart {
    pub(crate) fn to_xml(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.prolog);
        out.extend_from_slice(&self.root_start);
        for node in &self.children {
            out.extend_from_slice(&node.lead);
            match &node.kind {
                NodeKind::Views {
                    qname,
                    views,
                    raw,
                } => match raw {
                    Some(raw) => out.extend_from_slice(raw),
                    None => write_sheet_views(&mut out, qname, views),
                },
                NodeKind::Data { qname, data, raw } => match raw {
                    Some(raw) => out.extend_from_slice(raw),
                    None => write_sheet_data(&mut out, qname, data),
                },
                NodeKind::PageSetup { qname, attrs, raw } => match raw {
                    Some(raw) => out.extend_from_slice(raw),
                    None => push_empty(&mut out, qname, attrs),
                },
                NodeKind::HeaderFooter { qname, hf, raw } => match raw {
                    Some(raw) => out.extend_from_slice(raw),
                    None => write_header_footer(&mut out, qname, hf),
                },
                NodeKind::RowBreaks {
                    qname,
                    breaks,
                    raw,
                } => match raw {
                    Some(raw) => out.extend_from_slice(raw),
                    None => write_breaks(&mut out, qname, breaks, MAX_COLUMNS - 1),
                },
                NodeKind::ColBreaks {
                    qname,
                    breaks,
                    raw,
                } => match raw {
                    Some(raw) => out.extend_from_slice(raw),
                    None => write_breaks(&mut out, qname, breaks, MAX_ROWS - 1),
                },
                NodeKind::Opaque { raw, .. } => out.extend_from_slice(raw),
            }
        }
        out.extend_from_slice(&self.tail);
        out.extend_from_slice(&self.root_end);
        out.extend_from_slice(&self.epilog);
        out
    }

    fn open_root(&mut self) {
        let qname = self.root_qname.clone();
        open_root_tag(&mut self.root_start, &mut self.root_end, &qname);
    }

    fn find_node(&self, local: &str) -> Option<usize> {
        self.children.iter().position(|n| n.kind.local() == local)
    }

    fn remove_node(&mut self, local: &str) {
        self.children.retain(|n| n.kind.local() != local);
    }

    /// Finds `local`, or inserts a fresh node at its schema position.
    /// Unknown elements inherit the rank of the child before them, so
    /// extension blocks stay glued to whatever they follow.
    fn ensure_node(&mut self, local: &str, make: impl FnOnce() -> NodeKind) -> usize {
        if let Some(i) = self.find_node(local) {
            return i;
        }
        self.open_root();
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
            SheetNode {
                lead: Vec::new(),
                kind: make(),
            },
        );
        insert_at
    }

    fn views(&self) -> Option<&SheetViews> {
        self.children.iter().find_map(|n| match &n.kind {
            NodeKind::Views { views, .. } => Some(views),
            _ => None,
        })
    }

    fn views_mut(&mut self) -> &mut SheetViews {
        let qname = prefixed(&self.root_qname, "sheetViews");
        let i = self.ensure_node("sheetViews", move || NodeKind::Views {
            qname,
            views: SheetViews::default(),
            raw: None,
        });
        match &mut self.children[i].kind {
            NodeKind::Views { views, raw, .. } => {
                *raw = None;
                views
            }
            _ => unreachable!(),
        }
    }

    fn data(&self) -> Option<&SheetData> {
        self.children.iter().find_map(|n| match &n.kind {
            NodeKind::Data { data, .. } => Some(data),
            _ => None,
        })
    }

    fn data_mut(&mut self) -> &mut SheetData {
        let qname = prefixed(&self.root_qname, "sheetData");
        let i = self.ensure_node("sheetData", move || NodeKind::Data {
            qname,
            data: SheetData::default(),
            raw: None,
        });
        match &mut self.children[i].kind {
            NodeKind::Data { data, raw, .. } => {
                *raw = None;
                data
            }
            _ => unreachable!(),
        }
    }

    fn page_setup(&self) -> Option<&AttrList> {
        self.children.iter().find_map(|n| match &n.kind {
            NodeKind::PageSetup { attrs, .. } => Some(attrs),
            _ => None,
        })
    }

    fn page_setup_mut(&mut self) -> &mut AttrList {
        let qname = prefixed(&self.root_qname, "pageSetup");
        let i = self.ensure_node("pageSetup", move || NodeKind::PageSetup {
            qname,
            attrs: AttrList::new(),
            raw: None,
        });
        match &mut self.children[i].kind {
            NodeKind::PageSetup { attrs, raw, .. } => {
                *raw = None;
                attrs
            }
            _ => unreachable!(),
        }
    }

    fn header_footer_node(&self) -> Option<&HeaderFooterXml> {
        self.children.iter().find_map(|n| match &n.kind {
            NodeKind::HeaderFooter { hf, .. } => Some(hf),
            _ => None,
        })
    }

    fn header_footer_mut(&mut self) -> &mut HeaderFooterXml {
        let qname = prefixed(&self.root_qname, "headerFooter");
        let i = self.ensure_node("headerFooter", move || NodeKind::HeaderFooter {
            qname,
            hf: HeaderFooterXml::default(),
            raw: None,
        });
        match &mut self.children[i].kind {
            NodeKind::HeaderFooter { hf, raw, .. } => {
                *raw = None;
                hf
            }
            _ => unreachable!(),
        }
    }

    fn breaks(&self, local: &str) -> Option<&PageBreaks> {
        self.children.iter().find_map(|n| match &n.kind {
            NodeKind::RowBreaks { breaks, .. } if local == "rowBreaks" => Some(breaks),
            NodeKind::ColBreaks { breaks, .. } if local == "colBreaks" => Some(breaks),
            _ => None,
        })
    }

    fn breaks_mut(&mut self, local: &'static str) -> &mut PageBreaks {
        let qname = prefixed(&self.root_qname, local);
        let i = self.ensure_node(local, move || {
            if local == "rowBreaks" {
                NodeKind::RowBreaks {
                    qname,
                    breaks: PageBreaks::default(),
                    raw: None,
                }
            } else {
                NodeKind::ColBreaks {
                    qname,
                    breaks: PageBreaks::default(),
                    raw: None,
                }
            }
        });
        match &mut self.children[i].kind {
            NodeKind::RowBreaks { breaks, raw, .. } | NodeKind::ColBreaks { breaks, raw, .. } => {
                *raw = None;
                breaks
            }
            _ => unreachable!(),
        }
    }

    /// Whether any view of this sheet carries the selected-tab flag.
    pub(crate) fn tab_selected(&self) -> bool {
        self.views().is_some_and(|v| {
            v.views
                .iter()
                .any(|view| attr_flag(&view.attrs, "tabSelected") == Some(true))
        })
    }

    /// Sets or clears the selected-tab flag on every view. Sheets without
    /// view state are left alone, and a flag already in the right state does
    /// not dirty the part.
    pub(crate) fn set_tab_selected(&mut self, selected: bool) {
        let has_views = self.views().is_some_and(|v| !v.views.is_empty());
        if !has_views || self.tab_selected() == selected {
            return;
        }
        let views = self.views_mut();
        for view in &mut views.views {
            if selected {
                attr_set(&mut view.attrs, "tabSelected", "1");
            } else {
                attr_remove(&mut view.attrs, "tabSelected");
            }
        }
    }

    /// Replaces the pane and selection configuration of the last sheet view,
    /// creating view state when the sheet has none.
    pub(crate) fn set_panes(&mut self, opts: &PaneOptions) {
        let prefix_src = self.root_qname.clone();
        let views = self.views_mut();
        if views.views.is_empty() {
            views.views.push(SheetView {
                attrs: vec![("workbookViewId".to_string(), "0".to_string())],
                children: Vec::new(),
            });
        }
        let Some(view) = views.views.last_mut() else {
            return;
        };
        view.children
            .retain(|c| c.local != "pane" && c.local != "selection");

        let mut fresh = Vec::new();
        if opts.freeze || opts.split {
            let mut attrs = AttrList::new();
            if opts.x_split != 0.0 {
                attr_set(&mut attrs, "xSplit", &format_float(opts.x_split));
            }
            if opts.y_split != 0.0 {
                attr_set(&mut attrs, "ySplit", &format_float(opts.y_split));
            }
            if !opts.top_left_cell.is_empty() {
                attr_set(&mut attrs, "topLeftCell", &opts.top_left_cell);
            }
            if !opts.active_pane.is_empty() {
                attr_set(&mut attrs, "activePane", &opts.active_pane);
            }
            attr_set(&mut attrs, "state", if opts.freeze { "frozen" } else { "split" });
            let mut raw = Vec::new();
            push_empty(&mut raw, &prefixed(&prefix_src, "pane"), &attrs);
            fresh.push(ViewChild {
                lead: Vec::new(),
                local: "pane".to_string(),
                raw,
            });
        }
        for sel in &opts.panes {
            let mut attrs = AttrList::new();
            if !sel.pane.is_empty() {
                attr_set(&mut attrs, "pane", &sel.pane);
            }
            if !sel.active_cell.is_empty() {
                attr_set(&mut attrs, "activeCell", &sel.active_cell);
            }
            if !sel.sqref.is_empty() {
                attr_set(&mut attrs, "sqref", &sel.sqref);
            }
            let mut raw = Vec::new();
            push_empty(&mut raw, &prefixed(&prefix_src, "selection"), &attrs);
            fresh.push(ViewChild {
                lead: Vec::new(),
                local: "selection".to_string(),
                raw,
            });
        }
        // Pane and selections lead the view; anything else keeps its place
        // after them.
        let existing: Vec<ViewChild> = view.children.drain(..).collect();
        view.children = fresh;
        view.children.extend(existing);
    }

    pub(crate) fn page_layout(&self) -> PageLayoutOptions {
        let mut opts = PageLayoutOptions::default();
        if let Some(attrs) = self.page_setup() {
            opts.size = attr_get(attrs, "paperSize").and_then(|v| v.parse().ok());
            opts.orientation =
                attr_get(attrs, "orientation").and_then(|v| Orientation::from_token(&v));
            opts.first_page_number =
                attr_get(attrs, "firstPageNumber").and_then(|v| v.parse().ok());
            opts.adjust_to = attr_get(attrs, "scale").and_then(|v| v.parse().ok());
            opts.fit_to_height = attr_get(attrs, "fitToHeight").and_then(|v| v.parse().ok());
            opts.fit_to_width = attr_get(attrs, "fitToWidth").and_then(|v| v.parse().ok());
            opts.black_and_white = attr_flag(attrs, "blackAndWhite");
        }
        opts
    }

    /// Merges the given options into `pageSetup`. Attributes the options do
    /// not mention are preserved as they were.
    pub(crate) fn set_page_layout(&mut self, opts: &PageLayoutOptions) {
        let attrs = self.page_setup_mut();
        if let Some(size) = opts.size {
            attr_set(attrs, "paperSize", &size.to_string());
        }
        if let Some(orientation) = opts.orientation {
            attr_set(attrs, "orientation", orientation.as_str());
        }
        if let Some(first) = opts.first_page_number {
            attr_set(attrs, "firstPageNumber", &first.to_string());
            attr_set(attrs, "useFirstPageNumber", "1");
        }
        if let Some(scale) = opts.adjust_to {
            attr_set(attrs, "scale", &scale.to_string());
        }
        if let Some(h) = opts.fit_to_height {
            attr_set(attrs, "fitToHeight", &h.to_string());
        }
        if let Some(w) = opts.fit_to_width {
            attr_set(attrs, "fitToWidth", &w.to_string());
        }
        if let Some(bw) = opts.black_and_white {
            attr_set(attrs, "blackAndWhite", if bw { "1" } else { "0" });
        }
    }

    pub(crate) fn header_footer(&self) -> Option<HeaderFooterOptions> {
        let node = self.header_footer_node()?;
        let mut opts = HeaderFooterOptions {
            align_with_margins: attr_flag(&node.attrs, "alignWithMargins"),
            scale_with_doc: attr_flag(&node.attrs, "scaleWithDoc"),
            different_first: attr_flag(&node.attrs, "differentFirst").unwrap_or(false),
            different_odd_even: attr_flag(&node.attrs, "differentOddEven").unwrap_or(false),
            ..HeaderFooterOptions::default()
        };
        for (local, text) in &node.slots {
            let value = unescape_lenient(text);
            match local.as_str() {
                "oddHeader" => opts.odd_header = value,
                "oddFooter" => opts.odd_footer = value,
                "evenHeader" => opts.even_header = value,
                "evenFooter" => opts.even_footer = value,
                "firstHeader" => opts.first_header = value,
                "firstFooter" => opts.first_footer = value,
                _ => {}
            }
        }
        Some(opts)
    }

    /// Replaces the header/footer configuration; `None` removes it.
    pub(crate) fn set_header_footer(&mut self, opts: Option<&HeaderFooterOptions>) {
        let Some(opts) = opts else {
            self.remove_node("headerFooter");
            return;
        };
        let node = self.header_footer_mut();
        node.attrs.clear();
        if opts.different_odd_even {
            attr_set(&mut node.attrs, "differentOddEven", "1");
        }
        if opts.different_first {
            attr_set(&mut node.attrs, "differentFirst", "1");
        }
        if let Some(scale) = opts.scale_with_doc {
            attr_set(&mut node.attrs, "scaleWithDoc", if scale { "1" } else { "0" });
        }
        if let Some(align) = opts.align_with_margins {
            attr_set(&mut node.attrs, "alignWithMargins", if align { "1" } else { "0" });
        }
        node.slots.clear();
        for (field, value) in opts.fields() {
            if value.is_empty() {
                continue;
            }
            if let Some(elem) = hf_elem_name(field) {
                node.slots.push((elem.to_string(), escape_value(value)));
            }
        }
    }

    /// Adds the breaks implied by `cell`: a row break above it and a column
    /// break to its left. A1 implies neither. Present breaks stay put, so
    /// re-inserting is a no-op that does not dirty the part.
    pub(crate) fn insert_page_break(&mut self, cell: CellRef) {
        if cell.row > 1 {
            let id = cell.row - 1;
            if !self.breaks("rowBreaks").is_some_and(|b| b.set.contains(&id)) {
                self.breaks_mut("rowBreaks").set.insert(id);
            }
        }
        if cell.col > 1 {
            let id = cell.col - 1;
            if !self.breaks("colBreaks").is_some_and(|b| b.set.contains(&id)) {
                self.breaks_mut("colBreaks").set.insert(id);
            }
        }
    }

    /// Removes the breaks implied by `cell`, symmetric to
    /// [`insert_page_break`]. A break collection left empty is dropped.
    pub(crate) fn remove_page_break(&mut self, cell: CellRef) {
        if cell.row > 1 {
            self.remove_break("rowBreaks", cell.row - 1);
        }
        if cell.col > 1 {
            self.remove_break("colBreaks", cell.col - 1);
        }
    }

    fn remove_break(&mut self, local: &'static str, id: u32) {
        if !self.breaks(local).is_some_and(|b| b.set.contains(&id)) {
            return;
        }
        let now_empty = {
            let breaks = self.breaks_mut(local);
            breaks.set.remove(&id);
            breaks.set.is_empty()
        };
        if now_empty {
            self.remove_node(local);
        }
    }

    pub(crate) fn row_break_ids(&self) -> Vec<u32> {
        self.breaks("rowBreaks")
            .map(|b| b.set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn col_break_ids(&self) -> Vec<u32> {
        self.breaks("colBreaks")
            .map(|b| b.set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Writes `value` into the cell at `at`, creating the row and cell if
    /// they are missing. Row and cell placement attributes are validated
    /// before anything mutates.
    pub(crate) fn set_cell_value(&mut self, at: CellRef, value: &CellScalar) -> Result<()> {
        let (row_slot, cell_slot) = self.place_cell(at)?;
        let data = self.data_mut();
        let row = match row_slot {
            RowSlot::At(i) => match &mut data.items[i] {
                DataItem::Row(row) => row,
                _ => unreachable!(),
            },
            RowSlot::New(i) => {
                data.items.insert(
                    i,
                    DataItem::Row(Row {
                        lead: Vec::new(),
                        attrs: vec![("r".to_string(), at.row.to_string())],
                        items: Vec::new(),
                        tail: Vec::new(),
                    }),
                );
                match &mut data.items[i] {
                    DataItem::Row(row) => row,
                    _ => unreachable!(),
                }
            }
        };
        match cell_slot {
            CellSlot::Existing(j) => match &mut row.items[j].kind {
                RowItemKind::Cell(cell) => {
                    apply_cell_value(cell, value);
                }
                _ => unreachable!(),
            },
            CellSlot::Insert(j) => {
                let mut cell = Cell {
                    attrs: vec![("r".to_string(), at.to_a1())],
                    inner: CellInner::Raw(Vec::new()),
                };
                apply_cell_value(&mut cell, value);
                row.items.insert(
                    j,
                    RowItem {
                        lead: Vec::new(),
                        kind: RowItemKind::Cell(cell),
                    },
                );
            }
        }
        Ok(())
    }

    /// Current textual value of the cell at `at`; empty for absent cells.
    pub(crate) fn cell_value(
        &self,
        at: CellRef,
        shared: Option<&SharedStrings>,
    ) -> Result<String> {
        let Some(data) = self.data() else {
            return Ok(String::new());
        };
        let mut implied_row = 0u32;
        for item in &data.items {
            let DataItem::Row(row) = item else { continue };
            let num = row_number(row, implied_row + 1)?;
            implied_row = num;
            if num != at.row {
                continue;
            }
            let mut implied_col = 0u32;
            for ri in &row.items {
                let RowItemKind::Cell(cell) = &ri.kind else {
                    continue;
                };
                let col = cell_col(cell, implied_col + 1)?;
                implied_col = col;
                if col == at.col {
                    return cell_text(cell, shared);
                }
            }
            return Ok(String::new());
        }
        Ok(String::new())
    }

    /// Scans every cell, recomposing each cell's reference from its row and
    /// column placement, and returns the references whose value matches.
    pub(crate) fn search(
        &self,
        matcher: &SearchMatcher,
        shared: Option<&SharedStrings>,
    ) -> Result<Vec<String>> {
        let Some(data) = self.data() else {
            return Ok(Vec::new());
        };
        let mut results = Vec::new();
        let mut implied_row = 0u32;
        for item in &data.items {
            let DataItem::Row(row) = item else { continue };
            let num = row_number(row, implied_row + 1)?;
            implied_row = num;
            let mut implied_col = 0u32;
            for ri in &row.items {
                let RowItemKind::Cell(cell) = &ri.kind else {
                    continue;
                };
                let col = cell_col(cell, implied_col + 1)?;
                implied_col = col;
                let name = CellRef::new(col, num)?.to_a1();
                let text = cell_text(cell, shared)?;
                if matcher.matches(&text) {
                    results.push(name);
                }
            }
        }
        Ok(results)
    }

    fn place_cell(&self, at: CellRef) -> Result<(RowSlot, CellSlot)> {
        let Some(data) = self.data() else {
            return Ok((RowSlot::New(0), CellSlot::Insert(0)));
        };
        let mut implied_row = 0u32;
        let mut last_below: Option<usize> = None;
        for (i, item) in data.items.iter().enumerate() {
            let DataItem::Row(row) = item else { continue };
            let num = row_number(row, implied_row + 1)?;
            implied_row = num;
            if num == at.row {
                let mut implied_col = 0u32;
                let mut cell_below: Option<usize> = None;
                for (j, ri) in row.items.iter().enumerate() {
                    let RowItemKind::Cell(cell) = &ri.kind else {
                        continue;
                    };
                    let col = cell_col(cell, implied_col + 1)?;
                    implied_col = col;
                    if col == at.col {
                        return Ok((RowSlot::At(i), CellSlot::Existing(j)));
                    }
                    if col < at.col {
                        cell_below = Some(j);
                    }
                }
                let insert = cell_below.map_or(0, |j| j + 1);
                return Ok((RowSlot::At(i), CellSlot::Insert(insert)));
            }
            if num < at.row {
                last_below = Some(i);
            }
        }
        let insert = last_below.map_or(0, |i| i + 1);
        Ok((RowSlot::New(insert), CellSlot::Insert(0)))
    }
}

enum RowSlot {
    At(usize),
    New(usize),
}

enum CellSlot {
    Existing(usize),
    Insert(usize),
}

fn apply_cell_value(cell: &mut Cell, value: &CellScalar) {
    match value {
        CellScalar::Number(_) => attr_remove(&mut cell.attrs, "t"),
        CellScalar::Bool(_) => attr_set(&mut cell.attrs, "t", "b"),
        CellScalar::Text(_) => attr_set(&mut cell.attrs, "t", "inlineStr"),
    }
    cell.inner = CellInner::Value(value.clone());
}

pub(crate) enum SearchMatcher {
    /// Whole-value equality.
    Literal(String),
    /// Substring regular-expression match.
    Pattern(Regex),
}

impl SearchMatcher {
    fn matches(&self, value: &str) -> bool {
        match self {
            SearchMatcher::Literal(s) => s == value,
            SearchMatcher::Pattern(re) => re.is_match(value),
        }
    }
}

fn cell_text(cell: &Cell, shared: Option<&SharedStrings>) -> Result<String> {
    let ty = attr_get(&cell.attrs, "t").unwrap_or_default();
    match &cell.inner {
        CellInner::Value(scalar) => Ok(match scalar {
            CellScalar::Number(n) => format_float(*n),
            CellScalar::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            CellScalar::Text(s) => s.clone(),
        }),
        CellInner::Raw(inner) => match ty.as_str() {
            "inlineStr" => collect_tag_text(inner, b"t"),
            "s" => {
                let index = first_tag_text(inner, b"v")?;
                let Ok(index) = index.trim().parse::<usize>() else {
                    return Ok(String::new());
                };
                Ok(shared
                    .and_then(|sst| sst.get(index))
                    .unwrap_or_default()
                    .to_string())
            }
            _ => first_tag_text(inner, b"v"),
        },
    }
}

/// Concatenated text of every `<tag>` element in the fragment.
fn collect_tag_text(fragment: &[u8], tag: &[u8]) -> Result<String> {
    let mut reader = Reader::from_reader(fragment);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut text = String::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                if e.local_name().as_ref() == tag {
                    depth += 1;
                }
            }
            Event::End(ref e) => {
                if e.local_name().as_ref() == tag {
                    depth = depth.saturating_sub(1);
                }
            }
            Event::Text(ref t) => {
                if depth > 0 {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(ref t) => {
                if depth > 0 {
                    text.push_str(&String::from_utf8_lossy(t));
                }
            }
            Event::Eof => return Ok(text),
            _ => {}
        }
    }
}

/// Text of the first `<tag>` element in the fragment, or empty.
fn first_tag_text(fragment: &[u8], tag: &[u8]) -> Result<String> {
    let mut reader = Reader::from_reader(fragment);
    let mut buf = Vec::new();
    let mut inside = false;
    let mut text = String::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) if e.local_name().as_ref() == tag => inside = true,
            Event::End(ref e) if e.local_name().as_ref() == tag => return Ok(text),
            Event::Text(ref t) => {
                if inside {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(ref t) => {
                if inside {
                    text.push_str(&String::from_utf8_lossy(t));
                }
            }
            Event::Eof => return Ok(text),
            _ => {}
        }
    }
}

fn write_sheet_views(out: &mut Vec<u8>, qname: &str, views: &SheetViews) {
    let view_qname = prefixed(qname, "sheetView");
    push_start(out, qname, &views.attrs);
    for view in &views.views {
        if view.children.is_empty() {
            push_empty(out, &view_qname, &view.attrs);
        } else {
            push_start(out, &view_qname, &view.attrs);
            for child in &view.children {
                out.extend_from_slice(&child.lead);
                out.extend_from_slice(&child.raw);
            }
            push_end(out, &view_qname);
        }
    }
    for (lead, raw) in &views.extra {
        out.extend_from_slice(lead);
        out.extend_from_slice(raw);
    }
    push_end(out, qname);
}

fn write_sheet_data(out: &mut Vec<u8>, qname: &str, data: &SheetData) {
    if data.items.is_empty() && data.tail.is_empty() {
        push_empty(out, qname, &data.attrs);
        return;
    }
    let row_qname = prefixed(qname, "row");
    let cell_qname = prefixed(qname, "c");
    push_start(out, qname, &data.attrs);
    for item in &data.items {
        match item {
            DataItem::Opaque { lead, raw } => {
                out.extend_from_slice(lead);
                out.extend_from_slice(raw);
            }
            DataItem::Row(row) => {
                out.extend_from_slice(&row.lead);
                if row.items.is_empty() {
                    push_empty(out, &row_qname, &row.attrs);
                } else {
                    push_start(out, &row_qname, &row.attrs);
                    for ri in &row.items {
                        out.extend_from_slice(&ri.lead);
                        match &ri.kind {
                            RowItemKind::Opaque { raw } => out.extend_from_slice(raw),
                            RowItemKind::Cell(cell) => write_cell(out, &cell_qname, qname, cell),
                        }
                    }
                    out.extend_from_slice(&row.tail);
                    push_end(out, &row_qname);
                }
            }
        }
    }
    out.extend_from_slice(&data.tail);
    push_end(out, qname);
}

fn write_cell(out: &mut Vec<u8>, cell_qname: &str, prefix_src: &str, cell: &Cell) {
    match &cell.inner {
        CellInner::Raw(inner) if inner.is_empty() => push_empty(out, cell_qname, &cell.attrs),
        CellInner::Raw(inner) => {
            push_start(out, cell_qname, &cell.attrs);
            out.extend_from_slice(inner);
            push_end(out, cell_qname);
        }
        CellInner::Value(scalar) => {
            push_start(out, cell_qname, &cell.attrs);
            let v_qname = prefixed(prefix_src, "v");
            match scalar {
                CellScalar::Number(n) => {
                    push_start(out, &v_qname, &AttrList::new());
                    out.extend_from_slice(format_float(*n).as_bytes());
                    push_end(out, &v_qname);
                }
                CellScalar::Bool(b) => {
                    push_start(out, &v_qname, &AttrList::new());
                    out.extend_from_slice(if *b { b"1" } else { b"0" });
                    push_end(out, &v_qname);
                }
                CellScalar::Text(s) => {
                    let is_qname = prefixed(prefix_src, "is");
                    let t_qname = prefixed(prefix_src, "t");
                    push_start(out, &is_qname, &AttrList::new());
                    let mut t_attrs = AttrList::new();
                    if s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) {
                        t_attrs.push(("xml:space".to_string(), "preserve".to_string()));
                    }
                    push_start(out, &t_qname, &t_attrs);
                    out.extend_from_slice(escape_value(s).as_bytes());
                    push_end(out, &t_qname);
                    push_end(out, &is_qname);
                }
            }
            push_end(out, cell_qname);
        }
    }
}

fn write_header_footer(out: &mut Vec<u8>, qname: &str, hf: &HeaderFooterXml) {
    if hf.slots.is_empty() {
        push_empty(out, qname, &hf.attrs);
        return;
    }
    push_start(out, qname, &hf.attrs);
    for (local, text) in &hf.slots {
        let slot_qname = prefixed(qname, local);
        push_start(out, &slot_qname, &AttrList::new());
        out.extend_from_slice(text.as_bytes());
        push_end(out, &slot_qname);
    }
    push_end(out, qname);
}

fn write_breaks(out: &mut Vec<u8>, qname: &str, breaks: &PageBreaks, axis_max: u32) {
    let count = breaks.set.len().to_string();
    let attrs: AttrList = vec![
        ("count".to_string(), count.clone()),
        ("manualBreakCount".to_string(), count),
    ];
    if breaks.set.is_empty() {
        push_empty(out, qname, &attrs);
        return;
    }
    let brk_qname = prefixed(qname, "brk");
    push_start(out, qname, &attrs);
    for id in &breaks.set {
        let brk_attrs: AttrList = vec![
            ("id".to_string(), id.to_string()),
            ("max".to_string(), axis_max.to_string()),
            ("man".to_string(), "1".to_string()),
        ];
        push_empty(out, &brk_qname, &brk_attrs);
    }
    push_end(out, qname);
}
