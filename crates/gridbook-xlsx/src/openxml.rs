//! OPC relationship plumbing: parsing and writing `.rels` parts, part-name
//! arithmetic, and relationship-type matching.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::Result;

pub(crate) const REL_TYPE_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub(crate) const REL_TYPE_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub(crate) const REL_TYPE_SHARED_STRINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";

const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub ty: String,
    pub target: String,
    pub target_mode: Option<String>,
}

/// Relationship types appear under both the transitional schema host and the
/// strict `purl.oclc.org` one, so matching goes by the trailing segment.
pub(crate) fn rel_type_is(ty: &str, reference: &str) -> bool {
    match (ty.rsplit('/').next(), reference.rsplit('/').next()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// A parsed `.rels` part plus a dirty flag; untouched relationship parts are
/// saved from their original bytes rather than re-serialized.
#[derive(Debug, Default)]
pub(crate) struct Relationships {
    rels: Vec<Relationship>,
    dirty: bool,
}

impl Relationships {
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, quick_xml::Error> {
        Ok(Relationships {
            rels: parse_relationships(bytes)?,
            dirty: false,
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Relationship> {
        self.rels.iter()
    }

    pub fn by_id(&self, id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|r| r.id == id)
    }

    pub fn find_type(&self, ty: &str) -> Option<&Relationship> {
        self.rels.iter().find(|r| rel_type_is(&r.ty, ty))
    }

    pub fn add(&mut self, rel: Relationship) {
        self.rels.push(rel);
        self.dirty = true;
    }

    pub fn remove_id(&mut self, id: &str) {
        let before = self.rels.len();
        self.rels.retain(|r| r.id != id);
        if self.rels.len() != before {
            self.dirty = true;
        }
    }

    /// Smallest unused `rId` above every id currently present.
    pub fn next_id(&self) -> String {
        let max = self
            .rels
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", max + 1)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn to_xml(&self) -> Result<Vec<u8>> {
        write_relationships(&self.rels)
    }
}

pub(crate) fn parse_relationships(
    bytes: &[u8],
) -> std::result::Result<Vec<Relationship>, quick_xml::Error> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut rels = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut rel = Relationship {
                    id: String::new(),
                    ty: String::new(),
                    target: String::new(),
                    target_mode: None,
                };
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::InvalidAttr)?;
                    let value = attr.unescape_value()?.into_owned();
                    match attr.key.as_ref() {
                        b"Id" => rel.id = value,
                        b"Type" => rel.ty = value,
                        b"Target" => rel.target = value,
                        b"TargetMode" => rel.target_mode = Some(value),
                        _ => {}
                    }
                }
                rels.push(rel);
            }
            Event::Eof => return Ok(rels),
            _ => {}
        }
    }
}

pub(crate) fn write_relationships(rels: &[Relationship]) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    let mut root = BytesStart::new("Relationships");
    root.push_attribute(("xmlns", RELS_NS));
    writer.write_event(Event::Start(root))?;
    for rel in rels {
        let mut elem = BytesStart::new("Relationship");
        elem.push_attribute(("Id", rel.id.as_str()));
        elem.push_attribute(("Type", rel.ty.as_str()));
        elem.push_attribute(("Target", rel.target.as_str()));
        if let Some(mode) = &rel.target_mode {
            elem.push_attribute(("TargetMode", mode.as_str()));
        }
        writer.write_event(Event::Empty(elem))?;
    }
    writer.write_event(Event::End(BytesEnd::new("Relationships")))?;
    Ok(writer.into_inner())
}

/// Package path of the `.rels` part describing `part`.
pub(crate) fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolves a relationship target against the part that declared it.
/// Targets starting with `/` are package-absolute.
pub(crate) fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(rest) = target.strip_prefix('/') {
        return rest.to_string();
    }
    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}
