//! Pane and selection configuration.

use serde::{Deserialize, Serialize};

/// Pane configuration accepted by the pane setter, deserialized from the
/// caller's JSON payload.
///
/// `freeze` pins the rows/columns above and left of the split; `split`
/// draws a movable divider instead (split offsets are then measured in
/// twentieths of a point rather than cells). With neither flag the sheet's
/// pane is removed and only the selections are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneOptions {
    pub freeze: bool,
    pub split: bool,
    pub x_split: f64,
    pub y_split: f64,
    pub top_left_cell: String,
    pub active_pane: String,
    pub panes: Vec<PaneSelection>,
}

/// One per-region selection entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneSelection {
    pub sqref: String,
    pub active_cell: String,
    pub pane: String,
}
