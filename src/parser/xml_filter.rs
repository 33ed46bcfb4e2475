//! Streaming structural filter for XMLTV guide documents.
//!
//! The document is rewritten event by event: the prolog (declaration, doctype and the
//! whitespace between them) is copied, the root element is reopened with its original
//! attributes, and each immediate child of the root is either copied in full or skipped
//! in full. Only `channel` and `programme` children that reference a whitelisted channel
//! survive. Everything else at the top level is discarded and the layout is regenerated
//! as one kept element per line.

use flate2::read::MultiGzDecoder;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use super::whitelist::ChannelWhitelist;
use super::SourceEncoding;

pub const ROOT_TAG: &str = "tv";
pub const CHANNEL_TAG: &[u8] = b"channel";
pub const PROGRAMME_TAG: &[u8] = b"programme";
pub const CHANNEL_ID_ATTR: &[u8] = b"id";
pub const PROGRAMME_CHANNEL_ATTR: &[u8] = b"channel";

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("malformed XML near byte {position}: {reason}")]
    Malformed { position: u64, reason: String },

    #[error("document has no root element")]
    MissingRoot,

    #[error("document ended before the root element was closed")]
    UnexpectedEof,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for FilterError {
    fn from(err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(io) => {
                FilterError::Io(std::io::Error::new(io.kind(), io.to_string()))
            }
            other => FilterError::Malformed {
                position: 0,
                reason: other.to_string(),
            },
        }
    }
}

/// The two element kinds the filter can retain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Channel,
    Programme,
}

impl ElementKind {
    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        if tag == CHANNEL_TAG {
            Some(ElementKind::Channel)
        } else if tag == PROGRAMME_TAG {
            Some(ElementKind::Programme)
        } else {
            None
        }
    }

    /// Attribute holding the channel id for this kind.
    pub fn key_attribute(&self) -> &'static [u8] {
        match self {
            ElementKind::Channel => CHANNEL_ID_ATTR,
            ElementKind::Programme => PROGRAMME_CHANNEL_ATTR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    KeepChannel,
    KeepProgramme,
    Drop,
}

/// Retention rule for one top-level element.
pub fn decide(tag: &[u8], channel_ref: Option<&str>, whitelist: &ChannelWhitelist) -> FilterDecision {
    match (ElementKind::from_tag(tag), channel_ref) {
        (Some(kind), Some(id)) if whitelist.contains(id) => match kind {
            ElementKind::Channel => FilterDecision::KeepChannel,
            ElementKind::Programme => FilterDecision::KeepProgramme,
        },
        _ => FilterDecision::Drop,
    }
}

/// Counters for one filter pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterStats {
    pub channels_kept: usize,
    pub programmes_kept: usize,
    pub dropped: usize,
    pub anomalies: usize,
}

impl FilterStats {
    pub fn kept(&self) -> usize {
        self.channels_kept + self.programmes_kept
    }

    fn record(&mut self, decision: FilterDecision) {
        match decision {
            FilterDecision::KeepChannel => self.channels_kept += 1,
            FilterDecision::KeepProgramme => self.programmes_kept += 1,
            FilterDecision::Drop => self.dropped += 1,
        }
    }
}

pub struct XmlFilter {
    whitelist: ChannelWhitelist,
}

impl XmlFilter {
    pub fn new(whitelist: ChannelWhitelist) -> Self {
        Self { whitelist }
    }

    pub fn whitelist(&self) -> &ChannelWhitelist {
        &self.whitelist
    }

    /// Filter `source` into `result`, decompressing first when the source is gzip.
    pub fn filter_file(
        &self,
        source: &Path,
        encoding: SourceEncoding,
        result: &Path,
    ) -> Result<FilterStats, FilterError> {
        let input = File::open(source)?;
        let output = File::create(result)?;

        match encoding {
            SourceEncoding::Plain => self.filter(BufReader::new(input), output),
            SourceEncoding::Gzip => self.filter(BufReader::new(MultiGzDecoder::new(input)), output),
        }
    }

    pub fn filter<R: BufRead, W: Write>(&self, input: R, output: W) -> Result<FilterStats, FilterError> {
        let mut reader = Reader::from_reader(input);
        let mut writer = Writer::new(BufWriter::new(output));
        let mut stats = FilterStats::default();
        let mut buf = Vec::new();
        let mut subtree_buf = Vec::new();

        let root = copy_prolog(&mut reader, &mut writer, &mut buf, &mut stats)?;

        if let RootElement::Open(_) = root {
            self.filter_children(&mut reader, &mut writer, &mut buf, &mut subtree_buf, &mut stats)?;
        }

        writer.get_mut().write_all(b"\n")?;
        write_tag(writer.get_mut(), b"</", root.end(), b">")?;

        let mut out = writer.into_inner();
        out.flush()?;

        debug!(
            channels = stats.channels_kept,
            programmes = stats.programmes_kept,
            dropped = stats.dropped,
            anomalies = stats.anomalies,
            "Filter pass finished"
        );
        Ok(stats)
    }

    fn filter_children<R: BufRead, W: Write>(
        &self,
        reader: &mut Reader<R>,
        writer: &mut Writer<W>,
        buf: &mut Vec<u8>,
        subtree_buf: &mut Vec<u8>,
        stats: &mut FilterStats,
    ) -> Result<(), FilterError> {
        loop {
            buf.clear();
            let event = reader
                .read_event_into(buf)
                .map_err(|e| read_error(reader, e))?;

            match event {
                Event::Start(element) => {
                    let decision = self.decide_element(reader, &element)?;
                    stats.record(decision);

                    if decision == FilterDecision::Drop {
                        let end = element.to_end().into_owned();
                        subtree_buf.clear();
                        reader
                            .read_to_end_into(end.name(), subtree_buf)
                            .map_err(|e| read_error(reader, e))?;
                    } else {
                        writer.get_mut().write_all(b"\n")?;
                        write_tag(writer.get_mut(), b"<", &element, b">")?;
                        copy_subtree(reader, writer, subtree_buf)?;
                    }
                }
                Event::Empty(element) => {
                    let decision = self.decide_element(reader, &element)?;
                    stats.record(decision);

                    if decision != FilterDecision::Drop {
                        writer.get_mut().write_all(b"\n")?;
                        write_tag(writer.get_mut(), b"<", &element, b"/>")?;
                    }
                }
                // closing tag of the root; mismatched names are rejected by the reader
                Event::End(_) => return Ok(()),
                // regenerated by the one-element-per-line layout
                Event::Text(_) | Event::Comment(_) => {}
                Event::Eof => return Err(FilterError::UnexpectedEof),
                other => log_anomaly(&other, stats),
            }
        }
    }

    fn decide_element<R>(
        &self,
        reader: &Reader<R>,
        element: &BytesStart<'_>,
    ) -> Result<FilterDecision, FilterError> {
        let name = element.name();
        let Some(kind) = ElementKind::from_tag(name.as_ref()) else {
            return Ok(FilterDecision::Drop);
        };

        let attribute = element
            .try_get_attribute(kind.key_attribute())
            .map_err(|e| malformed(reader, e.to_string()))?;

        let Some(attribute) = attribute else {
            return Ok(FilterDecision::Drop);
        };

        let value = attribute
            .unescape_value()
            .map_err(|e| malformed(reader, e.to_string()))?;

        Ok(decide(name.as_ref(), Some(value.as_ref()), &self.whitelist))
    }
}

enum RootElement {
    Open(BytesEnd<'static>),
    SelfClosed(BytesEnd<'static>),
}

impl RootElement {
    fn end(&self) -> &BytesEnd<'static> {
        match self {
            RootElement::Open(end) | RootElement::SelfClosed(end) => end,
        }
    }
}

/// Copy declaration, doctype and the whitespace between them, then open the root.
fn copy_prolog<R: BufRead, W: Write>(
    reader: &mut Reader<R>,
    writer: &mut Writer<W>,
    buf: &mut Vec<u8>,
    stats: &mut FilterStats,
) -> Result<RootElement, FilterError> {
    loop {
        buf.clear();
        let event = reader
            .read_event_into(buf)
            .map_err(|e| read_error(reader, e))?;

        match event {
            Event::Decl(decl) => writer.write_event(Event::Decl(decl))?,
            Event::DocType(doctype) => {
                let content = std::str::from_utf8(&doctype)
                    .map_err(|e| malformed(reader, e.to_string()))?;
                writer.get_mut().write_all(format_doctype(content).as_bytes())?;
            }
            Event::Text(text) if is_whitespace(&text) => {
                write_normalized(writer.get_mut(), &text)?;
            }
            Event::Comment(_) => {}
            Event::Start(root) => {
                check_root_name(&root);
                write_tag(writer.get_mut(), b"<", &root, b">")?;
                return Ok(RootElement::Open(root.to_end().into_owned()));
            }
            Event::Empty(root) => {
                check_root_name(&root);
                write_tag(writer.get_mut(), b"<", &root, b">")?;
                return Ok(RootElement::SelfClosed(root.to_end().into_owned()));
            }
            Event::Eof => return Err(FilterError::MissingRoot),
            other => log_anomaly(&other, stats),
        }
    }
}

/// Copy everything up to and including the end tag matching an already written start tag.
fn copy_subtree<R: BufRead, W: Write>(
    reader: &mut Reader<R>,
    writer: &mut Writer<W>,
    buf: &mut Vec<u8>,
) -> Result<(), FilterError> {
    let mut depth = 1usize;

    loop {
        buf.clear();
        let event = reader
            .read_event_into(buf)
            .map_err(|e| read_error(reader, e))?;

        match event {
            Event::Start(element) => {
                depth += 1;
                write_tag(writer.get_mut(), b"<", &element, b">")?;
            }
            Event::End(element) => {
                write_tag(writer.get_mut(), b"</", &element, b">")?;
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Empty(element) => write_tag(writer.get_mut(), b"<", &element, b"/>")?,
            Event::Text(text) => write_normalized(writer.get_mut(), &text)?,
            Event::CData(cdata) => {
                let out = writer.get_mut();
                out.write_all(b"<![CDATA[")?;
                write_normalized(out, &cdata)?;
                out.write_all(b"]]>")?;
            }
            Event::Comment(_) => {}
            Event::Eof => return Err(FilterError::UnexpectedEof),
            other => writer.write_event(other)?,
        }
    }
}

/// Render a doctype as `<!DOCTYPE name SYSTEM "uri">`, or verbatim when it has another shape.
pub fn format_doctype(content: &str) -> String {
    let content = content.trim();

    if let Some((name, rest)) = content.split_once(char::is_whitespace) {
        if let Some(uri) = rest
            .trim_start()
            .strip_prefix("SYSTEM")
            .and_then(|literal| quoted_literal(literal.trim()))
        {
            return format!("<!DOCTYPE {name} SYSTEM \"{uri}\">");
        }
    }

    format!("<!DOCTYPE {content}>")
}

fn quoted_literal(text: &str) -> Option<&str> {
    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = &text[1..];
    let close = inner.find(quote)?;

    if inner[close + 1..].trim().is_empty() && !inner[..close].contains('"') {
        Some(&inner[..close])
    } else {
        None
    }
}

/// Write raw markup with CR and CRLF rewritten to LF.
fn write_normalized<W: Write>(out: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    if !bytes.contains(&b'\r') {
        return out.write_all(bytes);
    }

    let mut normalized = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().peekable();
    while let Some(&byte) = iter.next() {
        if byte == b'\r' {
            if iter.peek() == Some(&&b'\n') {
                iter.next();
            }
            normalized.push(b'\n');
        } else {
            normalized.push(byte);
        }
    }
    out.write_all(&normalized)
}

/// Write tag markup from its raw inner bytes, so line breaks between attributes are
/// normalized like text.
fn write_tag<W: Write>(out: &mut W, open: &[u8], inner: &[u8], close: &[u8]) -> std::io::Result<()> {
    out.write_all(open)?;
    write_normalized(out, inner)?;
    out.write_all(close)
}

fn is_whitespace(text: &BytesText<'_>) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

fn check_root_name(root: &BytesStart<'_>) {
    let name = root.name();
    if !name.as_ref().eq_ignore_ascii_case(ROOT_TAG.as_bytes()) {
        warn!(
            root = %String::from_utf8_lossy(name.as_ref()),
            "Root element is not <{}>, filtering its children anyway", ROOT_TAG
        );
    }
}

fn log_anomaly(event: &Event<'_>, stats: &mut FilterStats) {
    stats.anomalies += 1;
    let kind = match event {
        Event::CData(_) => "cdata",
        Event::PI(_) => "processing-instruction",
        Event::Decl(_) => "declaration",
        Event::DocType(_) => "doctype",
        Event::Text(_) => "text",
        _ => "other",
    };
    warn!(kind, node = ?event, "Unexpected node, skipping");
}

fn malformed<R>(reader: &Reader<R>, reason: String) -> FilterError {
    FilterError::Malformed {
        position: reader.buffer_position() as u64,
        reason,
    }
}

fn read_error<R>(reader: &Reader<R>, err: quick_xml::Error) -> FilterError {
    match err {
        quick_xml::Error::Io(io) => FilterError::Io(std::io::Error::new(io.kind(), io.to_string())),
        other => malformed(reader, other.to_string()),
    }
}
