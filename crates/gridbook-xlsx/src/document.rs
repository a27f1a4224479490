//! The document facade.
//!
//! A [`Document`] is a part store plus eagerly parsed structural parts (the
//! workbook, its relationships, content types). Worksheet parts stay raw
//! bytes until an operation touches them; on save, anything never mutated is
//! written back from its original bytes.

use std::fs;
use std::path::Path;

use gridbook_model::CellRef;

use crate::content_types::ContentTypes;
use crate::error::{DocError, Result};
use crate::openxml::{
    rels_part_name, resolve_target, Relationships, REL_TYPE_OFFICE_DOCUMENT,
    REL_TYPE_SHARED_STRINGS,
};
use crate::package::{
    blank_worksheet_xml, canonical_part_name, read_package, write_package, BLANK_CONTENT_TYPES,
    BLANK_PACKAGE_RELS, BLANK_STYLES, BLANK_WORKBOOK, BLANK_WORKBOOK_RELS, CONTENT_TYPES_PART,
    DEFAULT_WORKBOOK_PART, PACKAGE_RELS_PART,
};
use crate::part_store::{PartEntry, PartStore};
use crate::shared_strings::SharedStrings;
use crate::workbook::{parse_workbook, WorkbookPart};
use crate::worksheet::{parse_worksheet, CellScalar, WorksheetPart};

#[derive(Debug)]
pub struct Document {
    pub(crate) store: PartStore,
    pub(crate) workbook_path: String,
    pub(crate) workbook: WorkbookPart,
    pub(crate) rels_path: String,
    pub(crate) rels: Relationships,
    pub(crate) content_types: ContentTypes,
    /// Monotonic allocator; sheet ids are never reused, even after deletion.
    pub(crate) next_sheet_id: u32,
}

fn entry_bytes(entry: &PartEntry) -> Vec<u8> {
    match entry {
        PartEntry::Raw(bytes) => bytes.clone(),
        PartEntry::Sheet(part) => part.to_xml(),
    }
}

fn read_store_bytes(store: &PartStore, path: &str) -> Option<Vec<u8>> {
    let entry = store.load(path)?;
    let entry = entry.lock().expect("part entry mutex poisoned");
    Some(entry_bytes(&entry))
}

impl Document {
    /// A blank single-sheet document.
    pub fn new() -> Document {
        let store = PartStore::new();
        store.store_raw(CONTENT_TYPES_PART, BLANK_CONTENT_TYPES.as_bytes().to_vec());
        store.store_raw(PACKAGE_RELS_PART, BLANK_PACKAGE_RELS.as_bytes().to_vec());
        store.store_raw(DEFAULT_WORKBOOK_PART, BLANK_WORKBOOK.as_bytes().to_vec());
        store.store_raw(
            "xl/_rels/workbook.xml.rels",
            BLANK_WORKBOOK_RELS.as_bytes().to_vec(),
        );
        store.store_raw("xl/styles.xml", BLANK_STYLES.as_bytes().to_vec());
        store.store_raw(
            "xl/worksheets/sheet1.xml",
            blank_worksheet_xml(true).into_bytes(),
        );
        let workbook =
            parse_workbook(BLANK_WORKBOOK.as_bytes()).expect("builtin workbook template parses");
        let rels = Relationships::parse(BLANK_WORKBOOK_RELS.as_bytes())
            .expect("builtin relationships template parses");
        let content_types = ContentTypes::parse(BLANK_CONTENT_TYPES.as_bytes())
            .expect("builtin content types template parses");
        Document {
            store,
            workbook_path: DEFAULT_WORKBOOK_PART.to_string(),
            workbook,
            rels_path: rels_part_name(DEFAULT_WORKBOOK_PART),
            rels,
            content_types,
            next_sheet_id: 2,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Document> {
        Self::from_store(read_package(bytes)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Document> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    fn from_store(store: PartStore) -> Result<Document> {
        // The workbook part is named by the package-level officeDocument
        // relationship; packages without one get the conventional path.
        let workbook_path = match read_store_bytes(&store, PACKAGE_RELS_PART) {
            Some(bytes) => {
                let pkg_rels =
                    Relationships::parse(&bytes).map_err(|source| DocError::MalformedPart {
                        path: PACKAGE_RELS_PART.to_string(),
                        source,
                    })?;
                match pkg_rels.find_type(REL_TYPE_OFFICE_DOCUMENT) {
                    Some(rel) => canonical_part_name(&rel.target),
                    None => DEFAULT_WORKBOOK_PART.to_string(),
                }
            }
            None => DEFAULT_WORKBOOK_PART.to_string(),
        };

        let workbook_bytes = read_store_bytes(&store, &workbook_path)
            .ok_or_else(|| DocError::MissingPart(workbook_path.clone()))?;
        let workbook =
            parse_workbook(&workbook_bytes).map_err(|source| DocError::MalformedPart {
                path: workbook_path.clone(),
                source,
            })?;

        let rels_path = rels_part_name(&workbook_path);
        let rels = match read_store_bytes(&store, &rels_path) {
            Some(bytes) => {
                Relationships::parse(&bytes).map_err(|source| DocError::MalformedPart {
                    path: rels_path.clone(),
                    source,
                })?
            }
            None => Relationships::default(),
        };

        let ct_bytes = read_store_bytes(&store, CONTENT_TYPES_PART)
            .ok_or_else(|| DocError::MissingPart(CONTENT_TYPES_PART.to_string()))?;
        let content_types =
            ContentTypes::parse(&ct_bytes).map_err(|source| DocError::MalformedPart {
                path: CONTENT_TYPES_PART.to_string(),
                source,
            })?;

        let next_sheet_id = workbook
            .sheet_entries()
            .iter()
            .filter_map(|e| e.sheet_id())
            .max()
            .unwrap_or(0)
            + 1;

        Ok(Document {
            store,
            workbook_path,
            workbook,
            rels_path,
            rels,
            content_types,
            next_sheet_id,
        })
    }

    /// Serialize the document to a package. Untouched parts are emitted from
    /// their stored bytes; parsed parts are re-serialized only when dirty.
    pub fn save_to_vec(&self) -> Result<Vec<u8>> {
        let mut paths = self.store.paths();
        for extra in [
            self.workbook_path.as_str(),
            self.rels_path.as_str(),
            CONTENT_TYPES_PART,
        ] {
            if !paths.iter().any(|p| p == extra) {
                paths.push(extra.to_string());
            }
        }
        paths.sort();

        let mut parts: Vec<(String, Vec<u8>)> = Vec::with_capacity(paths.len());
        for path in paths {
            let data = if path == self.workbook_path && self.workbook.is_dirty() {
                self.workbook.to_xml()
            } else if path == self.rels_path && self.rels.is_dirty() {
                self.rels.to_xml()?
            } else if path == CONTENT_TYPES_PART && self.content_types.is_dirty() {
                self.content_types.to_xml()
            } else {
                match self.store.load(&path) {
                    Some(entry) => {
                        let entry = entry.lock().expect("part entry mutex poisoned");
                        entry_bytes(&entry)
                    }
                    None => continue,
                }
            };
            parts.push((path, data));
        }
        write_package(&parts)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.save_to_vec()?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Resolve the worksheet part path for an exact sheet name.
    pub fn sheet_part_path(&self, name: &str) -> Result<String> {
        let rel_id = self
            .workbook
            .sheet_entries()
            .iter()
            .find(|e| e.name() == name)
            .and_then(|e| e.rel_id())
            .ok_or_else(|| DocError::SheetNotFound(name.to_string()))?;
        let rel = self
            .rels
            .by_id(&rel_id)
            .ok_or_else(|| DocError::SheetNotFound(name.to_string()))?;
        Ok(resolve_target(&self.workbook_path, &rel.target))
    }

    /// Run `f` against the materialized worksheet part for `name`.
    ///
    /// The part is parsed on first access; a parse failure surfaces the part
    /// path and leaves the raw bytes in place, so replacing them resets the
    /// parse.
    pub(crate) fn with_sheet<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut WorksheetPart) -> Result<T>,
    ) -> Result<T> {
        let path = self.sheet_part_path(name)?;
        self.with_sheet_at(&path, f)
    }

    pub(crate) fn with_sheet_at<T>(
        &self,
        path: &str,
        f: impl FnOnce(&mut WorksheetPart) -> Result<T>,
    ) -> Result<T> {
        let entry = self
            .store
            .load(path)
            .ok_or_else(|| DocError::MissingPart(path.to_string()))?;
        let mut entry = entry.lock().expect("part entry mutex poisoned");
        if let PartEntry::Raw(bytes) = &*entry {
            let part = parse_worksheet(bytes).map_err(|source| DocError::MalformedPart {
                path: path.to_string(),
                source,
            })?;
            *entry = PartEntry::Sheet(part);
        }
        match &mut *entry {
            PartEntry::Sheet(part) => f(part),
            PartEntry::Raw(_) => unreachable!("entry was materialized above"),
        }
    }

    /// Write a scalar into a cell, keyed by sheet name and A1 reference.
    pub fn set_cell_value(&mut self, sheet: &str, cell: &str, value: &CellScalar) -> Result<()> {
        self.with_sheet(sheet, |ws| {
            ws.set_cell_value(CellRef::from_a1(cell)?, value)
        })
    }

    /// Textual value of a cell; the empty string for absent cells. Shared
    /// strings resolve through the workbook's string table.
    pub fn cell_value(&self, sheet: &str, cell: &str) -> Result<String> {
        let shared = self.shared_strings()?;
        self.with_sheet(sheet, |ws| {
            ws.cell_value(CellRef::from_a1(cell)?, Some(&shared))
        })
    }

    /// Shared strings are read-only for this engine and parsed on demand.
    pub(crate) fn shared_strings(&self) -> Result<SharedStrings> {
        let path = match self.rels.find_type(REL_TYPE_SHARED_STRINGS) {
            Some(rel) => resolve_target(&self.workbook_path, &rel.target),
            None => resolve_target(&self.workbook_path, "sharedStrings.xml"),
        };
        match read_store_bytes(&self.store, &path) {
            Some(bytes) => SharedStrings::parse(&bytes)
                .map_err(|source| DocError::MalformedPart { path, source }),
            None => Ok(SharedStrings::default()),
        }
    }

    /// Raw bytes of a part in its current state, or `None` if absent.
    pub fn part_bytes(&self, name: &str) -> Option<Vec<u8>> {
        let path = canonical_part_name(name);
        if path == self.workbook_path && self.workbook.is_dirty() {
            return Some(self.workbook.to_xml());
        }
        if path == self.rels_path && self.rels.is_dirty() {
            return self.rels.to_xml().ok();
        }
        if path == CONTENT_TYPES_PART && self.content_types.is_dirty() {
            return Some(self.content_types.to_xml());
        }
        read_store_bytes(&self.store, &path)
    }

    /// Replace or add a part wholesale. Writing one of the structural parts
    /// re-parses it, so later operations see the new state.
    pub fn store_part(&mut self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let path = canonical_part_name(name);
        if path == self.workbook_path {
            self.workbook = parse_workbook(&bytes).map_err(|source| DocError::MalformedPart {
                path: path.clone(),
                source,
            })?;
        } else if path == self.rels_path {
            self.rels = Relationships::parse(&bytes).map_err(|source| DocError::MalformedPart {
                path: path.clone(),
                source,
            })?;
        } else if path == CONTENT_TYPES_PART {
            self.content_types =
                ContentTypes::parse(&bytes).map_err(|source| DocError::MalformedPart {
                    path: path.clone(),
                    source,
                })?;
        }
        self.store.store_raw(&path, bytes);
        Ok(())
    }

    /// Remove a part. Removing an absent part is a no-op.
    pub fn remove_part(&mut self, name: &str) {
        self.store.delete(&canonical_part_name(name));
    }

    /// Sorted part paths currently in the package.
    pub fn part_paths(&self) -> Vec<String> {
        self.store.paths()
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}
