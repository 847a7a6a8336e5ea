//! Record extraction for CLEF-style corpus files.
//!
//! A corpus file is a bare run of sibling blocks:
//!
//! ```text
//! <DOC>
//! <DOCNO>PUBLICO-19940101-001</DOCNO>
//! <TEXT>...</TEXT>
//! </DOC>
//! <DOC>...</DOC>
//! ```
//!
//! There is no common ancestor, so the bytes are wrapped in a synthetic
//! `<root>` element before being handed to a strict XML reader.

use std::io::{BufRead, Read};

use quick_xml::{events::Event, reader::Reader};

use crate::{document::CorpusRecord, error::MalformedCorpusError};

const ROOT_OPEN: &[u8] = b"<root>";
const ROOT_CLOSE: &[u8] = b"</root>";

const DOC: &[u8] = b"DOC";
const DOCNO: &[u8] = b"DOCNO";
const TEXT: &[u8] = b"TEXT";

/// Surround `input` with the synthetic root element.
pub fn wrap<R: BufRead>(input: R) -> impl BufRead {
    ROOT_OPEN.chain(input).chain(ROOT_CLOSE)
}

/// Parse an in-memory corpus file.
pub fn parse_bytes(
    bytes: &[u8],
) -> Result<Vec<CorpusRecord>, MalformedCorpusError> {
    parse(bytes)
}

/// Parse a corpus file into its records, in `DOC` start-tag order.
///
/// Every `DOC` element, at any depth, must contain a `DOCNO` and a `TEXT`
/// descendant; the first of each is used. A file with no `DOC` elements
/// yields no records.
pub fn parse<R: BufRead>(
    input: R,
) -> Result<Vec<CorpusRecord>, MalformedCorpusError> {
    let mut reader = Reader::from_reader(wrap(input));
    let mut buf = Vec::with_capacity(8192);

    let mut depth = 0usize;
    let mut root_closed = false;
    let mut open: Vec<OpenDoc> = Vec::new();
    let mut slots: Vec<Option<CorpusRecord>> = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if root_closed {
                    return Err(MalformedCorpusError::Structure(
                        "content after the end of the corpus",
                    ));
                }
                depth += 1;
                let name = e.name();
                if name.as_ref() == DOC {
                    open.push(OpenDoc::new(depth, slots.len()));
                    slots.push(None);
                }
                for doc in &mut open {
                    doc.start(name.as_ref(), depth);
                }
            }
            Event::Empty(e) => {
                if root_closed {
                    return Err(MalformedCorpusError::Structure(
                        "content after the end of the corpus",
                    ));
                }
                let name = e.name();
                if name.as_ref() == DOC {
                    // `<DOC/>` can never hold the required children.
                    return Err(MalformedCorpusError::MissingField {
                        field: "DOCNO",
                        record: slots.len() + 1,
                    });
                }
                for doc in &mut open {
                    doc.start(name.as_ref(), depth + 1);
                    doc.end(depth + 1);
                }
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                for doc in &mut open {
                    doc.push_text(&text);
                }
            }
            Event::CData(e) => {
                let text = std::str::from_utf8(&e).map_err(|_| {
                    MalformedCorpusError::Structure("CDATA is not valid UTF-8")
                })?;
                for doc in &mut open {
                    doc.push_text(text);
                }
            }
            Event::End(e) => {
                for doc in &mut open {
                    doc.end(depth);
                }
                if e.name().as_ref() == DOC
                    && open.last().is_some_and(|doc| doc.depth == depth)
                    && let Some(doc) = open.pop()
                {
                    let slot = doc.slot;
                    slots[slot] = Some(doc.finish()?);
                }
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    root_closed = true;
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes
            // carry no record content.
            _ => {}
        }
    }

    if depth != 0 || !open.is_empty() {
        return Err(MalformedCorpusError::Structure("unclosed element"));
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Text being gathered for one `DOC` child.
#[derive(Debug)]
enum Capture {
    Pending,
    Open { depth: usize, text: String },
    Done(String),
}

impl Capture {
    fn start(&mut self, depth: usize) {
        if matches!(self, Self::Pending) {
            *self = Self::Open {
                depth,
                text: String::new(),
            };
        }
    }

    fn push_text(&mut self, chunk: &str) {
        if let Self::Open { text, .. } = self {
            text.push_str(chunk);
        }
    }

    fn end(&mut self, at: usize) {
        if let Self::Open { depth, text } = self
            && *depth == at
        {
            let text = std::mem::take(text);
            *self = Self::Done(text);
        }
    }

    fn into_done(self) -> Option<String> {
        match self {
            Self::Done(text) => Some(text),
            _ => None,
        }
    }
}

/// A `DOC` element whose end tag has not been seen yet.
#[derive(Debug)]
struct OpenDoc {
    depth: usize,
    slot: usize,
    docno: Capture,
    text: Capture,
}

impl OpenDoc {
    fn new(depth: usize, slot: usize) -> Self {
        Self {
            depth,
            slot,
            docno: Capture::Pending,
            text: Capture::Pending,
        }
    }

    fn start(&mut self, name: &[u8], depth: usize) {
        if depth <= self.depth {
            return;
        }
        match name {
            DOCNO => self.docno.start(depth),
            TEXT => self.text.start(depth),
            _ => {}
        }
    }

    fn push_text(&mut self, chunk: &str) {
        self.docno.push_text(chunk);
        self.text.push_text(chunk);
    }

    fn end(&mut self, depth: usize) {
        self.docno.end(depth);
        self.text.end(depth);
    }

    fn finish(self) -> Result<CorpusRecord, MalformedCorpusError> {
        let record = self.slot + 1;
        let id = self.docno.into_done().ok_or(
            MalformedCorpusError::MissingField {
                field: "DOCNO",
                record,
            },
        )?;
        let text = self.text.into_done().ok_or(
            MalformedCorpusError::MissingField {
                field: "TEXT",
                record,
            },
        )?;
        Ok(CorpusRecord {
            id: id.trim().to_string(),
            text,
        })
    }
}
