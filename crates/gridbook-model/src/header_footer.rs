//! Header and footer text settings.

use serde::{Deserialize, Serialize};

/// Cap on each header/footer text slot, counted in characters.
///
/// Characters, not bytes: a slot full of multi-byte text is legal as long
/// as the user-visible length fits.
pub const MAX_FIELD_LENGTH: usize = 255;

/// The six-slot header/footer model plus its layout flags.
///
/// Empty strings mean "slot not set". `scale_with_doc` and
/// `align_with_margins` are tri-state: `None` leaves the attribute off the
/// element entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderFooterOptions {
    pub align_with_margins: Option<bool>,
    pub scale_with_doc: Option<bool>,
    pub different_first: bool,
    pub different_odd_even: bool,
    pub odd_header: String,
    pub odd_footer: String,
    pub even_header: String,
    pub even_footer: String,
    pub first_header: String,
    pub first_footer: String,
}

impl HeaderFooterOptions {
    /// The text slots with their stable field names, in schema order.
    pub fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("odd_header", self.odd_header.as_str()),
            ("odd_footer", self.odd_footer.as_str()),
            ("even_header", self.even_header.as_str()),
            ("even_footer", self.even_footer.as_str()),
            ("first_header", self.first_header.as_str()),
            ("first_footer", self.first_footer.as_str()),
        ]
    }

    /// Name of the first slot longer than [`MAX_FIELD_LENGTH`] characters.
    pub fn over_long_field(&self) -> Option<&'static str> {
        self.fields()
            .into_iter()
            .find(|(_, text)| text.chars().count() > MAX_FIELD_LENGTH)
            .map(|(name, _)| name)
    }
}
