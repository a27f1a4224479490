//! Defined-name create, delete, and listing against the workbook part.

use gridbook_model::{validate_defined_name, DefinedName, DefinedNameScope};

use crate::document::Document;
use crate::error::{DocError, Result};

impl Document {
    /// Register a defined name. The `(name, scope)` pair must be unique;
    /// the same name may exist globally and per sheet at the same time.
    pub fn set_defined_name(&mut self, def: &DefinedName) -> Result<()> {
        validate_defined_name(&def.name)?;
        let scope_index = match def.scope.sheet_name() {
            Some(sheet) => Some(
                self.sheet_index(sheet)
                    .ok_or_else(|| DocError::SheetNotFound(sheet.to_string()))?,
            ),
            None => None,
        };
        let duplicate = self
            .workbook
            .defined_name_entries()
            .iter()
            .any(|e| e.name() == def.name && e.local_sheet_id() == scope_index);
        if duplicate {
            return Err(DocError::DuplicateDefinedName(def.name.clone()));
        }
        self.workbook
            .push_defined_name(&def.name, &def.refers_to, &def.comment, scope_index);
        Ok(())
    }

    /// Remove the entry matching `(name, scope)` exactly. A workbook scope
    /// only matches global entries, never sheet-scoped ones.
    pub fn delete_defined_name(&mut self, name: &str, scope: &DefinedNameScope) -> Result<()> {
        let scope_index = match scope.sheet_name() {
            Some(sheet) => Some(
                self.sheet_index(sheet)
                    .ok_or(DocError::DefinedNameScopeNotFound)?,
            ),
            None => None,
        };
        let position = self
            .workbook
            .defined_name_entries()
            .iter()
            .position(|e| e.name() == name && e.local_sheet_id() == scope_index)
            .ok_or(DocError::DefinedNameScopeNotFound)?;
        self.workbook.defined_name_entries_mut().remove(position);
        Ok(())
    }

    /// All defined names, with scope indexes resolved back to sheet names.
    /// Entries whose scope index no longer matches a sheet read as global.
    pub fn defined_names(&self) -> Vec<DefinedName> {
        self.workbook
            .defined_name_entries()
            .iter()
            .map(|e| DefinedName {
                name: e.name(),
                refers_to: e.refers_to(),
                comment: e.comment().unwrap_or_default(),
                scope: match e.local_sheet_id().and_then(|i| self.sheet_name(i)) {
                    Some(sheet) => DefinedNameScope::Sheet(sheet),
                    None => DefinedNameScope::Workbook,
                },
            })
            .collect()
    }
}
