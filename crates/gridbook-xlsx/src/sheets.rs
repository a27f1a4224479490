//! Sheet lifecycle: create, delete, rename, reorder, grouping, active sheet.

use std::collections::BTreeMap;

use gridbook_model::{formula_mentions_sheet, rewrite_sheet_name_in_formula, validate_sheet_name};

use crate::content_types::CT_WORKSHEET;
use crate::document::Document;
use crate::error::{DocError, Result};
use crate::openxml::{rels_part_name, resolve_target, Relationship, REL_TYPE_WORKSHEET};
use crate::package::blank_worksheet_xml;
use crate::workbook::SheetEntry;

impl Document {
    /// Ordered sheet names.
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook
            .sheet_entries()
            .iter()
            .map(|e| e.name())
            .collect()
    }

    pub fn sheet_count(&self) -> usize {
        self.workbook.sheet_entries().len()
    }

    /// Name at a zero-based display index.
    pub fn sheet_name(&self, index: usize) -> Option<String> {
        self.workbook.sheet_entries().get(index).map(|e| e.name())
    }

    /// Zero-based index of an exact sheet name. Names are case-sensitive.
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.workbook
            .sheet_entries()
            .iter()
            .position(|e| e.name() == name)
    }

    /// Numeric sheet id for a name, matched case-insensitively.
    pub fn sheet_id(&self, name: &str) -> Option<u32> {
        self.workbook
            .sheet_entries()
            .iter()
            .find(|e| e.name().eq_ignore_ascii_case(name))
            .and_then(|e| e.sheet_id())
    }

    /// Sheet id to name, ordered by id.
    pub fn sheet_map(&self) -> BTreeMap<u32, String> {
        self.workbook
            .sheet_entries()
            .iter()
            .filter_map(|e| e.sheet_id().map(|id| (id, e.name())))
            .collect()
    }

    /// Zero-based index of the active sheet, clamped to the sheet list.
    pub fn active_sheet_index(&self) -> usize {
        let count = self.sheet_count();
        if count == 0 {
            return 0;
        }
        self.workbook.active_tab().min(count - 1)
    }

    /// Create a worksheet and return its zero-based index. Creating a name
    /// that already exists returns the existing sheet's index unchanged.
    pub fn add_sheet(&mut self, name: &str) -> Result<usize> {
        validate_sheet_name(name)?;
        if let Some(index) = self.sheet_index(name) {
            return Ok(index);
        }

        let sheet_id = self.next_sheet_id;
        self.next_sheet_id += 1;

        // Part paths are allocated from the lowest free sheet number.
        let dir = resolve_target(&self.workbook_path, "worksheets");
        let mut n = 1u32;
        let (path, target) = loop {
            let candidate = format!("{dir}/sheet{n}.xml");
            if !self.store.contains(&candidate) {
                break (candidate, format!("worksheets/sheet{n}.xml"));
            }
            n += 1;
        };

        let rel_id = self.rels.next_id();
        self.rels.add(Relationship {
            id: rel_id.clone(),
            ty: REL_TYPE_WORKSHEET.to_string(),
            target,
            target_mode: None,
        });
        self.content_types
            .add_override(&format!("/{path}"), CT_WORKSHEET);
        self.store
            .store_raw(&path, blank_worksheet_xml(false).into_bytes());

        let entries = self.workbook.sheet_entries_mut();
        entries.push(SheetEntry::new(name, sheet_id, &rel_id));
        Ok(entries.len() - 1)
    }

    /// Delete a worksheet. The last remaining sheet cannot be deleted.
    ///
    /// Defined names scoped to the deleted sheet are removed, scopes behind
    /// it shift down one index, and names whose formula still mentions the
    /// deleted sheet are purged. The active sheet is clamped to the nearest
    /// remaining one.
    pub fn delete_sheet(&mut self, name: &str) -> Result<()> {
        let index = self
            .sheet_index(name)
            .ok_or_else(|| DocError::SheetNotFound(name.to_string()))?;
        if self.sheet_count() == 1 {
            return Err(DocError::DeleteLastSheet);
        }

        let rel_id = self.workbook.sheet_entries()[index].rel_id();
        let part_path = rel_id
            .as_deref()
            .and_then(|id| self.rels.by_id(id))
            .map(|rel| resolve_target(&self.workbook_path, &rel.target));
        let active = self.active_sheet_index();

        self.workbook.sheet_entries_mut().remove(index);
        self.workbook.defined_name_entries_mut().retain_mut(|entry| {
            match entry.local_sheet_id() {
                Some(i) if i == index => return false,
                Some(i) if i > index => entry.set_local_sheet_id(Some(i - 1)),
                _ => {}
            }
            !formula_mentions_sheet(&entry.refers_to(), name)
        });

        if let Some(id) = rel_id.as_deref() {
            self.rels.remove_id(id);
        }
        if let Some(path) = part_path {
            self.content_types.remove_override(&format!("/{path}"));
            self.store.delete(&path);
            self.store.delete(&rels_part_name(&path));
        }

        let count = self.sheet_count();
        let mut new_active = if index < active { active - 1 } else { active };
        if new_active >= count {
            new_active = count - 1;
        }
        if self.workbook.active_tab() != new_active {
            self.workbook.set_active_tab(new_active);
        }
        Ok(())
    }

    /// Rename a worksheet. Renaming to the current name is a no-op; renaming
    /// onto another existing sheet is rejected. Defined-name formulas that
    /// reference the sheet are rewritten to the new name.
    pub fn rename_sheet(&mut self, old: &str, new: &str) -> Result<()> {
        validate_sheet_name(old)?;
        validate_sheet_name(new)?;
        let index = self
            .sheet_index(old)
            .ok_or_else(|| DocError::SheetNotFound(old.to_string()))?;
        if old == new {
            return Ok(());
        }
        if self.sheet_index(new).is_some() {
            return Err(DocError::DuplicateSheetName(new.to_string()));
        }
        self.workbook.sheet_entries_mut()[index].set_name(new);

        let rewrites: Vec<(usize, String)> = self
            .workbook
            .defined_name_entries()
            .iter()
            .enumerate()
            .filter_map(|(i, e)| {
                rewrite_sheet_name_in_formula(&e.refers_to(), old, new).map(|f| (i, f))
            })
            .collect();
        if !rewrites.is_empty() {
            let entries = self.workbook.defined_name_entries_mut();
            for (i, formula) in rewrites {
                entries[i].set_refers_to(&formula);
            }
        }
        Ok(())
    }

    /// Move a sheet to a zero-based position, shifting the others. Positions
    /// past the end clamp to the last slot.
    pub fn move_sheet(&mut self, name: &str, to: usize) -> Result<()> {
        let from = self
            .sheet_index(name)
            .ok_or_else(|| DocError::SheetNotFound(name.to_string()))?;
        let to = to.min(self.sheet_count() - 1);
        if from == to {
            return Ok(());
        }

        // Scoped names and the active tab follow their sheet, not its slot.
        let active_name = self.sheet_name(self.active_sheet_index());
        let scoped: Vec<Option<String>> = self
            .workbook
            .defined_name_entries()
            .iter()
            .map(|e| e.local_sheet_id().and_then(|i| self.sheet_name(i)))
            .collect();

        let entries = self.workbook.sheet_entries_mut();
        let entry = entries.remove(from);
        entries.insert(to, entry);

        let resolved: Vec<Option<usize>> = scoped
            .iter()
            .map(|n| n.as_deref().and_then(|n| self.sheet_index(n)))
            .collect();
        let names = self.workbook.defined_name_entries_mut();
        for (entry, index) in names.iter_mut().zip(resolved) {
            if let Some(i) = index {
                entry.set_local_sheet_id(Some(i));
            }
        }

        if let Some(active) = active_name {
            if let Some(index) = self.sheet_index(&active) {
                if self.workbook.active_tab() != index {
                    self.workbook.set_active_tab(index);
                }
            }
        }
        Ok(())
    }

    /// Set the active sheet by zero-based index. An out-of-range index
    /// leaves the active sheet unchanged, though empty book-view state is
    /// still initialized on first use.
    pub fn set_active_sheet(&mut self, index: usize) {
        self.workbook.ensure_book_views();
        if index >= self.sheet_count() {
            return;
        }
        self.workbook.set_active_tab(index);
        for (i, name) in self.sheet_names().iter().enumerate() {
            let selected = i == index;
            // Sheets whose parts cannot be read keep their current flags.
            let _ = self.with_sheet(name, |sheet| {
                sheet.set_tab_selected(selected);
                Ok(())
            });
        }
    }

    /// Mark the named sheets as a selected group. Every name must exist, and
    /// the active sheet must be among them.
    pub fn group_sheets<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let mut indexes = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            match self.sheet_index(name) {
                Some(i) => indexes.push(i),
                None => return Err(DocError::SheetNotFound(name.to_string())),
            }
        }
        if !indexes.contains(&self.active_sheet_index()) {
            return Err(DocError::NoActiveSheetInGroup);
        }

        // Materialize every grouped sheet before flipping any flag, so a
        // malformed part cannot leave the group half-marked.
        let sheet_names = self.sheet_names();
        for &i in &indexes {
            self.with_sheet(&sheet_names[i], |_| Ok(()))?;
        }
        for &i in &indexes {
            self.with_sheet(&sheet_names[i], |sheet| {
                sheet.set_tab_selected(true);
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Clear grouped/selected state on every sheet except the active one.
    pub fn ungroup_sheets(&mut self) {
        let active = self.active_sheet_index();
        for (i, name) in self.sheet_names().iter().enumerate() {
            if i == active {
                continue;
            }
            let _ = self.with_sheet(name, |sheet| {
                sheet.set_tab_selected(false);
                Ok(())
            });
        }
    }
}
