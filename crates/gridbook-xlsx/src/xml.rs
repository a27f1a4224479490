//! Span-preserving XML splitting and small attribute utilities.
//!
//! Parts are kept byte-faithful by partitioning a part's bytes into verbatim
//! spans: prolog, root start tag, one span per top-level child element (plus
//! the text and comment bytes leading it), trailing text, root end tag,
//! epilog. Concatenating untouched spans reproduces the input exactly, so a
//! materialized part only diverges from its source bytes where an edit
//! actually happened.

use std::io;
use std::sync::Arc;

use quick_xml::events::Event;
use quick_xml::Reader;

/// Attribute list in document order. Values hold the escaped on-disk form;
/// [`attr_get`] unescapes and [`attr_set`] escapes at the boundary.
pub(crate) type AttrList = Vec<(String, String)>;

/// A part split into verbatim spans around its root element.
#[derive(Debug, Clone)]
pub(crate) struct PartSkeleton {
    pub prolog: Vec<u8>,
    pub root_start: Vec<u8>,
    pub root_qname: String,
    pub self_closing: bool,
    pub children: Vec<RawChild>,
    pub tail: Vec<u8>,
    pub root_end: Vec<u8>,
    pub epilog: Vec<u8>,
}

/// One top-level child element, verbatim, with the bytes that led up to it.
#[derive(Debug, Clone)]
pub(crate) struct RawChild {
    pub lead: Vec<u8>,
    pub qname: String,
    pub local: String,
    pub raw: Vec<u8>,
}

fn unexpected_eof(context: &str) -> quick_xml::Error {
    quick_xml::Error::Io(Arc::new(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("unexpected end of part: {context}"),
    )))
}

/// Splits `bytes` into the spans described on [`PartSkeleton`].
pub(crate) fn split_part(bytes: &[u8]) -> Result<PartSkeleton, quick_xml::Error> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    // Everything before the root start tag is the prolog: declaration,
    // comments, processing instructions, whitespace.
    let mut cursor = 0usize;
    let (root_span, root_qname, self_closing) = loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf)?;
        let event_end = reader.buffer_position() as usize;
        match event {
            Event::Start(ref e) => {
                break ((cursor, event_end), qname_string(e.name().as_ref()), false)
            }
            Event::Empty(ref e) => {
                break ((cursor, event_end), qname_string(e.name().as_ref()), true)
            }
            Event::Eof => return Err(unexpected_eof("no root element")),
            _ => cursor = event_end,
        }
    };
    let prolog = bytes[..root_span.0].to_vec();
    let root_start = bytes[root_span.0..root_span.1].to_vec();

    if self_closing {
        return Ok(PartSkeleton {
            prolog,
            root_start,
            root_qname,
            self_closing: true,
            children: Vec::new(),
            tail: Vec::new(),
            root_end: Vec::new(),
            epilog: bytes[root_span.1..].to_vec(),
        });
    }

    let mut children = Vec::new();
    let mut lead_start = root_span.1;
    cursor = root_span.1;
    loop {
        buf.clear();
        let event_start = cursor;
        let event = reader.read_event_into(&mut buf)?;
        let event_end = reader.buffer_position() as usize;
        match event {
            Event::Start(ref e) => {
                let qname = qname_string(e.name().as_ref());
                let local = local_of(&qname).to_string();
                let end_tag = e.to_end().into_owned();
                let mut skip_buf = Vec::new();
                reader.read_to_end_into(end_tag.name(), &mut skip_buf)?;
                let elem_end = reader.buffer_position() as usize;
                children.push(RawChild {
                    lead: bytes[lead_start..event_start].to_vec(),
                    qname,
                    local,
                    raw: bytes[event_start..elem_end].to_vec(),
                });
                lead_start = elem_end;
                cursor = elem_end;
            }
            Event::Empty(ref e) => {
                let qname = qname_string(e.name().as_ref());
                let local = local_of(&qname).to_string();
                children.push(RawChild {
                    lead: bytes[lead_start..event_start].to_vec(),
                    qname,
                    local,
                    raw: bytes[event_start..event_end].to_vec(),
                });
                lead_start = event_end;
                cursor = event_end;
            }
            Event::End(_) => {
                return Ok(PartSkeleton {
                    prolog,
                    root_start,
                    root_qname,
                    self_closing: false,
                    children,
                    tail: bytes[lead_start..event_start].to_vec(),
                    root_end: bytes[event_start..event_end].to_vec(),
                    epilog: bytes[event_end..].to_vec(),
                });
            }
            Event::Eof => return Err(unexpected_eof(&root_qname)),
            _ => cursor = event_end,
        }
    }
}

/// The bytes between an element's start and end tags. Empty for a
/// self-closing element.
pub(crate) fn inner_bytes<'a>(raw: &'a [u8], skel: &PartSkeleton) -> &'a [u8] {
    let start = skel.prolog.len() + skel.root_start.len();
    let end = raw.len() - skel.root_end.len() - skel.epilog.len();
    &raw[start..end]
}

/// Parses the attributes out of one start (or empty) tag span.
pub(crate) fn parse_start_attrs(tag: &[u8]) -> Result<AttrList, quick_xml::Error> {
    let mut reader = Reader::from_reader(tag);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let mut attrs = AttrList::new();
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::InvalidAttr)?;
                    attrs.push((
                        qname_string(attr.key.as_ref()),
                        String::from_utf8_lossy(&attr.value).into_owned(),
                    ));
                }
                return Ok(attrs);
            }
            Event::Eof => return Err(unexpected_eof("expected a start tag")),
            _ => {}
        }
    }
}

pub(crate) fn qname_string(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

pub(crate) fn local_of(qname: &str) -> &str {
    match qname.split_once(':') {
        Some((_, local)) => local,
        None => qname,
    }
}

/// Applies the namespace prefix of `root_qname` (if any) to `local`.
pub(crate) fn prefixed(root_qname: &str, local: &str) -> String {
    match root_qname.split_once(':') {
        Some((prefix, _)) => format!("{prefix}:{local}"),
        None => local.to_string(),
    }
}

/// Unescaped attribute value, or `None` if the attribute is absent.
pub(crate) fn attr_get(attrs: &AttrList, name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| unescape_lenient(v))
}

/// Like [`attr_get`] but matching on the local name, so `r:id` is found
/// whatever prefix the relationships namespace was bound to.
pub(crate) fn attr_local_get(attrs: &AttrList, local: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(k, _)| local_of(k) == local)
        .map(|(_, v)| unescape_lenient(v))
}

/// Replaces `name` in place, or appends it, escaping `value`.
pub(crate) fn attr_set(attrs: &mut AttrList, name: &str, value: &str) {
    let escaped = escape_value(value);
    match attrs.iter_mut().find(|(k, _)| k == name) {
        Some(slot) => slot.1 = escaped,
        None => attrs.push((name.to_string(), escaped)),
    }
}

pub(crate) fn attr_remove(attrs: &mut AttrList, name: &str) {
    attrs.retain(|(k, _)| k != name);
}

/// Reads a boolean attribute written as `1`/`0` or `true`/`false`.
pub(crate) fn attr_flag(attrs: &AttrList, name: &str) -> Option<bool> {
    attr_get(attrs, name).map(|v| v == "1" || v == "true")
}

pub(crate) fn escape_value(value: &str) -> String {
    quick_xml::escape::escape(value).into_owned()
}

/// Unescapes entity references, falling back to the literal text when a
/// reference is malformed.
pub(crate) fn unescape_lenient(value: &str) -> String {
    match quick_xml::escape::unescape(value) {
        Ok(v) => v.into_owned(),
        Err(_) => value.to_string(),
    }
}

/// Rewrites a self-closing root tag (`<worksheet/>`) into an open/close pair
/// so children can be appended. No-op when the root is already open.
pub(crate) fn open_root_tag(root_start: &mut Vec<u8>, root_end: &mut Vec<u8>, root_qname: &str) {
    if !root_end.is_empty() {
        return;
    }
    if root_start.ends_with(b"/>") {
        let len = root_start.len();
        root_start.truncate(len - 2);
        root_start.push(b'>');
    }
    let mut end = Vec::new();
    push_end(&mut end, root_qname);
    *root_end = end;
}

pub(crate) fn push_start(out: &mut Vec<u8>, qname: &str, attrs: &AttrList) {
    push_tag_open(out, qname, attrs);
    out.push(b'>');
}

pub(crate) fn push_empty(out: &mut Vec<u8>, qname: &str, attrs: &AttrList) {
    push_tag_open(out, qname, attrs);
    out.extend_from_slice(b"/>");
}

pub(crate) fn push_end(out: &mut Vec<u8>, qname: &str) {
    out.extend_from_slice(b"</");
    out.extend_from_slice(qname.as_bytes());
    out.push(b'>');
}

fn push_tag_open(out: &mut Vec<u8>, qname: &str, attrs: &AttrList) {
    out.push(b'<');
    out.extend_from_slice(qname.as_bytes());
    for (key, value) in attrs {
        out.push(b' ');
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(b"=\"");
        out.extend_from_slice(value.as_bytes());
        out.push(b'"');
    }
}
