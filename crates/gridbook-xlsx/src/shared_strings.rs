//! Read-only view of the shared string table.
//!
//! Cells with `t="s"` index into this table. Rich-text runs collapse to
//! their concatenated text; phonetic runs are skipped.

use quick_xml::events::Event;
use quick_xml::Reader;

#[derive(Debug, Default)]
pub(crate) struct SharedStrings {
    strings: Vec<String>,
}

impl SharedStrings {
    pub fn parse(bytes: &[u8]) -> Result<Self, quick_xml::Error> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut strings = Vec::new();
        let mut current: Option<String> = None;
        let mut in_text = false;
        loop {
            buf.clear();
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => match e.local_name().as_ref() {
                    b"si" => current = Some(String::new()),
                    b"t" if current.is_some() => in_text = true,
                    b"rPh" => {
                        // Phonetic guides are not part of the cell text.
                        let end = e.to_end().into_owned();
                        let mut skip_buf = Vec::new();
                        reader.read_to_end_into(end.name(), &mut skip_buf)?;
                    }
                    _ => {}
                },
                Event::Empty(ref e) => {
                    if e.local_name().as_ref() == b"si" {
                        strings.push(String::new());
                    }
                }
                Event::Text(ref t) => {
                    if in_text {
                        if let Some(s) = current.as_mut() {
                            s.push_str(&t.unescape()?);
                        }
                    }
                }
                Event::CData(ref t) => {
                    if in_text {
                        if let Some(s) = current.as_mut() {
                            s.push_str(&String::from_utf8_lossy(t));
                        }
                    }
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"si" => {
                        if let Some(s) = current.take() {
                            strings.push(s);
                        }
                    }
                    b"t" => in_text = false,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(SharedStrings { strings })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }
}
