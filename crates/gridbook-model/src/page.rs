//! Page setup options.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "portrait" => Some(Orientation::Portrait),
            "landscape" => Some(Orientation::Landscape),
            _ => None,
        }
    }
}

/// Page layout settings. `None` fields are left untouched by setters and
/// reported as absent by getters.
///
/// `size` is the format's numeric paper-size code (1 = US Letter, 9 = A4).
/// `adjust_to` is the print scale in percent; `fit_to_width` /
/// `fit_to_height` are page counts for fit-to-page scaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLayoutOptions {
    pub size: Option<u32>,
    pub orientation: Option<Orientation>,
    pub first_page_number: Option<u32>,
    pub adjust_to: Option<u32>,
    pub fit_to_height: Option<u32>,
    pub fit_to_width: Option<u32>,
    pub black_and_white: Option<bool>,
}
