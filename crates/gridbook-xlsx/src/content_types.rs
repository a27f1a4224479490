//! The `[Content_Types].xml` part.
//!
//! Existing `Default` and `Override` entries pass through verbatim; adding
//! and removing worksheet overrides only rewrites the entries involved.

use crate::xml::{
    attr_get, escape_value, open_root_tag, split_part, AttrList, PartSkeleton,
};

pub(crate) const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

#[derive(Debug)]
pub(crate) struct ContentTypes {
    prolog: Vec<u8>,
    root_start: Vec<u8>,
    root_qname: String,
    children: Vec<CtChild>,
    tail: Vec<u8>,
    root_end: Vec<u8>,
    epilog: Vec<u8>,
    dirty: bool,
}

#[derive(Debug)]
struct CtChild {
    lead: Vec<u8>,
    kind: CtKind,
    raw: Vec<u8>,
}

#[derive(Debug)]
enum CtKind {
    Default { extension: String },
    Override { part_name: String },
    Opaque,
}

impl ContentTypes {
    pub fn parse(bytes: &[u8]) -> Result<Self, quick_xml::Error> {
        let skel = split_part(bytes)?;
        let PartSkeleton {
            prolog,
            root_start,
            root_qname,
            children,
            tail,
            root_end,
            epilog,
            ..
        } = skel;
        let children = children
            .into_iter()
            .map(|child| {
                let attrs = crate::xml::parse_start_attrs(&child.raw);
                let kind = match (child.local.as_str(), attrs) {
                    ("Default", Ok(attrs)) => CtKind::Default {
                        extension: attr_get(&attrs, "Extension").unwrap_or_default(),
                    },
                    ("Override", Ok(attrs)) => CtKind::Override {
                        part_name: attr_get(&attrs, "PartName").unwrap_or_default(),
                    },
                    _ => CtKind::Opaque,
                };
                CtChild {
                    lead: child.lead,
                    kind,
                    raw: child.raw,
                }
            })
            .collect();
        Ok(ContentTypes {
            prolog,
            root_start,
            root_qname,
            children,
            tail,
            root_end,
            epilog,
            dirty: false,
        })
    }

    pub fn has_override(&self, part_name: &str) -> bool {
        self.children.iter().any(|c| matches!(&c.kind, CtKind::Override { part_name: p } if p == part_name))
    }

    pub fn has_default(&self, extension: &str) -> bool {
        self.children.iter().any(|c| matches!(&c.kind, CtKind::Default { extension: e } if e.eq_ignore_ascii_case(extension)))
    }

    /// Registers `content_type` for `part_name` (a package-absolute name
    /// starting with `/`). Replaces any existing override for the part.
    pub fn add_override(&mut self, part_name: &str, content_type: &str) {
        let mut raw = Vec::new();
        let attrs: AttrList = vec![
            ("PartName".to_string(), escape_value(part_name)),
            ("ContentType".to_string(), escape_value(content_type)),
        ];
        crate::xml::push_empty(&mut raw, "Override", &attrs);

        if let Some(existing) = self.children.iter_mut().find(
            |c| matches!(&c.kind, CtKind::Override { part_name: p } if p == part_name),
        ) {
            existing.raw = raw;
        } else {
            let qname = self.root_qname.clone();
            open_root_tag(&mut self.root_start, &mut self.root_end, &qname);
            self.children.push(CtChild {
                lead: Vec::new(),
                kind: CtKind::Override {
                    part_name: part_name.to_string(),
                },
                raw,
            });
        }
        self.dirty = true;
    }

    /// Drops the override for `part_name`. Absent overrides are a no-op.
    pub fn remove_override(&mut self, part_name: &str) {
        let before = self.children.len();
        self.children.retain(
            |c| !matches!(&c.kind, CtKind::Override { part_name: p } if p == part_name),
        );
        if self.children.len() != before {
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn to_xml(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.prolog);
        out.extend_from_slice(&self.root_start);
        for child in &self.children {
            out.extend_from_slice(&child.lead);
            out.extend_from_slice(&child.raw);
        }
        out.extend_from_slice(&self.tail);
        out.extend_from_slice(&self.root_end);
        out.extend_from_slice(&self.epilog);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
        "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\n",
        "  <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\n",
        "  <Default Extension=\"xml\" ContentType=\"application/xml\"/>\n",
        "  <Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\n",
        "  <Override PartName=\"/xl/worksheets/sheet1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\n",
        "</Types>\n",
    );

    #[test]
    fn untouched_part_round_trips_byte_identical() {
        let ct = ContentTypes::parse(SAMPLE.as_bytes()).unwrap();
        assert!(!ct.is_dirty());
        assert_eq!(ct.to_xml(), SAMPLE.as_bytes());
    }

    #[test]
    fn add_and_remove_override() {
        let mut ct = ContentTypes::parse(SAMPLE.as_bytes()).unwrap();
        assert!(ct.has_override("/xl/worksheets/sheet1.xml"));
        assert!(!ct.has_override("/xl/worksheets/sheet2.xml"));
        assert!(ct.has_default("rels"));

        ct.add_override("/xl/worksheets/sheet2.xml", CT_WORKSHEET);
        assert!(ct.is_dirty());
        assert!(ct.has_override("/xl/worksheets/sheet2.xml"));
        let xml = String::from_utf8(ct.to_xml()).unwrap();
        assert!(xml.contains("PartName=\"/xl/worksheets/sheet2.xml\""));

        ct.remove_override("/xl/worksheets/sheet2.xml");
        ct.remove_override("/xl/worksheets/sheet2.xml");
        assert!(!ct.has_override("/xl/worksheets/sheet2.xml"));
    }

    #[test]
    fn existing_entries_survive_edits_verbatim() {
        let mut ct = ContentTypes::parse(SAMPLE.as_bytes()).unwrap();
        ct.add_override("/xl/worksheets/sheet2.xml", CT_WORKSHEET);
        let xml = String::from_utf8(ct.to_xml()).unwrap();
        assert!(xml.contains(
            "<Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>"
        ));
    }
}
