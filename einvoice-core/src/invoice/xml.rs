//! Namespace-aware XML loading for invoice documents.
pub(crate) mod constants;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use serde::Serialize;

use crate::invoice::{ElementPath, ValidationError};

/// Namespace of an element or attribute after prefix resolution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// The name is not in any namespace.
    None,
    Uri(String),
}

impl Namespace {
    pub fn uri(&self) -> Option<&str> {
        match self {
            Namespace::None => None,
            Namespace::Uri(uri) => Some(uri),
        }
    }

    pub fn is(&self, uri: &str) -> bool {
        self.uri() == Some(uri)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::None => f.write_str("(no namespace)"),
            Namespace::Uri(uri) => f.write_str(uri),
        }
    }
}

/// Namespace URI plus local name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct QualifiedName {
    namespace: Namespace,
    local_name: String,
}

impl QualifiedName {
    pub fn new(namespace: Namespace, local_name: impl Into<String>) -> Self {
        Self {
            namespace,
            local_name: local_name.into(),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

/// Clark notation: `{uri}local`, or just `local` outside any namespace.
impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Namespace::None => f.write_str(&self.local_name),
            Namespace::Uri(uri) => write!(f, "{{{uri}}}{}", self.local_name),
        }
    }
}

/// A single element of a loaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: QualifiedName,
    attributes: BTreeMap<QualifiedName, String>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn new(name: QualifiedName, attributes: BTreeMap<QualifiedName, String>) -> Self {
        Self {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        }
    }

    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn attributes(&self) -> &BTreeMap<QualifiedName, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &QualifiedName) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Child elements in document order.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Direct character content with surrounding whitespace removed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }
}

/// Owned element tree produced by [`load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: Element,
}

impl XmlDocument {
    pub fn root(&self) -> &Element {
        &self.root
    }
}

/// Location inside the raw input. Lines and columns are 1-based, columns count bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextPosition {
    pub offset: u64,
    pub line: usize,
    pub column: usize,
}

impl TextPosition {
    pub fn locate(input: &[u8], offset: u64) -> Self {
        let end = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(input.len());
        let prefix = input.get(..end).unwrap_or(input);
        let line = prefix.iter().filter(|b| **b == b'\n').count() + 1;
        let line_start = prefix
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |idx| idx + 1);
        Self {
            offset,
            line,
            column: end - line_start + 1,
        }
    }
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {} (byte {})",
            self.line, self.column, self.offset
        )
    }
}

/// Resource bounds enforced while the tree is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadLimits {
    pub max_document_bytes: usize,
    pub max_element_depth: usize,
}

/// Parse raw bytes into a namespace-aware element tree.
///
/// Every failure is reported as [`ValidationError::MalformedXml`], carrying the
/// position of the first error and the chain of elements open at that point.
///
/// # Examples
/// ```rust
/// use einvoice_core::invoice::xml::{LoadLimits, load};
///
/// let limits = LoadLimits { max_document_bytes: 1024, max_element_depth: 8 };
/// let doc = load(b"<a xmlns=\"urn:x\"><b/></a>", limits)?;
/// assert_eq!(doc.root().name().local_name(), "a");
/// assert_eq!(doc.root().children().len(), 1);
/// # Ok::<(), einvoice_core::ValidationError>(())
/// ```
pub fn load(input: &[u8], limits: LoadLimits) -> Result<XmlDocument, ValidationError> {
    if input.len() > limits.max_document_bytes {
        return Err(ValidationError::malformed(
            format!(
                "document is {} bytes, the limit is {} bytes",
                input.len(),
                limits.max_document_bytes
            ),
            None,
            None,
        ));
    }
    let source = Source::detect(input)?;
    let body = source.text.get(source.skip..).unwrap_or_default();
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationError::malformed("document is empty", None, None));
    }

    let mut loader = TreeLoader {
        input: &source.text,
        base: source.skip as u64,
        limits,
        reader: NsReader::from_reader(body),
        open: Vec::new(),
        open_names: Vec::new(),
        root: None,
    };
    let root = loader.run()?;
    tracing::trace!(
        bytes = input.len(),
        encoding = source.encoding.name(),
        root = %root.name,
        "loaded XML document"
    );
    Ok(XmlDocument { root })
}

/// Document bytes as UTF-8, ready for the parser.
///
/// UTF-8 input is borrowed and invalid sequences are reported by the parser
/// with their position. Other encodings are transcoded up front, so positions
/// in their diagnostics refer to the transcoded text.
struct Source<'a> {
    encoding: &'static Encoding,
    text: Cow<'a, [u8]>,
    /// Length of a UTF-8 byte-order mark at the start of `text`.
    skip: usize,
}

impl<'a> Source<'a> {
    fn detect(input: &'a [u8]) -> Result<Self, ValidationError> {
        let (encoding, bom) = match Encoding::for_bom(input) {
            Some((encoding, bom)) => (encoding, bom),
            None => (declared_encoding(input)?, 0),
        };
        if encoding == UTF_8 {
            return Ok(Source {
                encoding,
                text: Cow::Borrowed(input),
                skip: bom,
            });
        }

        let body = input.get(bom..).unwrap_or_default();
        let text = encoding
            .decode_without_bom_handling_and_without_replacement(body)
            .ok_or_else(|| {
                ValidationError::malformed(
                    format!("document is not valid {}", encoding.name()),
                    None,
                    None,
                )
            })?;
        Ok(Source {
            encoding,
            text: Cow::Owned(text.into_owned().into_bytes()),
            skip: 0,
        })
    }
}

/// Encoding of a document without byte-order mark, from its first bytes and
/// the `encoding` pseudo-attribute of the XML declaration.
fn declared_encoding(input: &[u8]) -> Result<&'static Encoding, ValidationError> {
    match input {
        [b'<', 0, b'?', 0, ..] => return Ok(UTF_16LE),
        [0, b'<', 0, b'?', ..] => return Ok(UTF_16BE),
        _ => {}
    }
    let Some(declaration) = input
        .strip_prefix(b"<?xml")
        .and_then(|rest| rest.split(|b| *b == b'>').next())
    else {
        return Ok(UTF_8);
    };
    let Some(label) = pseudo_attribute(declaration, b"encoding") else {
        return Ok(UTF_8);
    };
    match Encoding::for_label_no_replacement(label) {
        // The declaration was read as single bytes, so a UTF-16 label is wrong.
        Some(encoding) if encoding == UTF_16LE || encoding == UTF_16BE => Ok(UTF_8),
        Some(encoding) => Ok(encoding),
        None => Err(ValidationError::malformed(
            format!(
                "unsupported encoding `{}` in XML declaration",
                String::from_utf8_lossy(label)
            ),
            None,
            None,
        )),
    }
}

fn pseudo_attribute<'a>(declaration: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    let start = declaration
        .windows(name.len())
        .position(|window| window == name)?;
    let rest = declaration
        .get(start + name.len()..)?
        .trim_ascii_start()
        .strip_prefix(b"=")?
        .trim_ascii_start();
    let (&quote, value) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let end = value.iter().position(|b| *b == quote)?;
    value.get(..end)
}

struct TreeLoader<'a> {
    input: &'a [u8],
    base: u64,
    limits: LoadLimits,
    reader: NsReader<&'a [u8]>,
    open: Vec<Element>,
    /// Raw (prefixed) names of the open elements, for diagnostics.
    open_names: Vec<String>,
    root: Option<Element>,
}

impl TreeLoader<'_> {
    fn run(&mut self) -> Result<Element, ValidationError> {
        let mut buf = Vec::new();
        loop {
            let event_offset = self.reader.buffer_position();
            let event = match self.reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(err) => {
                    let at = self.reader.error_position();
                    return Err(self.fail(err.to_string(), at));
                }
            };
            match event {
                Event::Start(start) => {
                    let element = self.open_element(&start, event_offset)?;
                    self.open.push(element);
                    self.open_names.push(raw_name(&start));
                }
                Event::Empty(start) => {
                    let element = self.open_element(&start, event_offset)?;
                    self.close_element(element);
                }
                Event::End(_) => {
                    let element = self.open.pop().ok_or_else(|| {
                        self.fail("closing tag without matching opening tag", event_offset)
                    })?;
                    self.open_names.pop();
                    self.close_element(element);
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|err| self.fail(err.to_string(), event_offset))?;
                    self.append_text(&value, event_offset)?;
                }
                Event::CData(data) => {
                    let value = std::str::from_utf8(&data)
                        .map_err(|err| self.fail(err.to_string(), event_offset))?
                        .to_string();
                    self.append_text(&value, event_offset)?;
                }
                Event::DocType(_) => {
                    return Err(self.fail(
                        "DOCTYPE declarations are not supported in invoice documents",
                        event_offset,
                    ));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some(name) = self.open_names.last() {
            let message = format!("unexpected end of document, <{name}> is not closed");
            return Err(self.fail(message, self.input.len() as u64 - self.base));
        }
        self.root
            .take()
            .ok_or_else(|| self.fail("document has no root element", 0))
    }

    fn open_element(
        &self,
        start: &BytesStart<'_>,
        offset: u64,
    ) -> Result<Element, ValidationError> {
        if self.open.is_empty() && self.root.is_some() {
            return Err(self.fail(
                format!("second root element <{}>", raw_name(start)),
                offset,
            ));
        }
        let depth = self.open.len() + 1;
        if depth > self.limits.max_element_depth {
            return Err(self.fail(
                format!(
                    "element <{}> is nested {depth} levels deep, the limit is {}",
                    raw_name(start),
                    self.limits.max_element_depth
                ),
                offset,
            ));
        }

        let (resolved, local) = self.reader.resolve_element(start.name());
        let namespace = self.namespace(resolved, offset)?;
        let local_name = self.utf8(local.as_ref(), offset)?;

        let mut attributes = BTreeMap::new();
        for attribute in start.attributes() {
            let attribute = attribute
                .map_err(|err| self.fail(format!("invalid attribute: {err}"), offset))?;
            if attribute.key.as_namespace_binding().is_some() {
                continue;
            }
            let (resolved, local) = self.reader.resolve_attribute(attribute.key);
            let name = QualifiedName::new(
                self.namespace(resolved, offset)?,
                self.utf8(local.as_ref(), offset)?,
            );
            let value = attribute
                .unescape_value()
                .map_err(|err| self.fail(err.to_string(), offset))?;
            attributes.insert(name, value.into_owned());
        }

        Ok(Element::new(
            QualifiedName::new(namespace, local_name),
            attributes,
        ))
    }

    fn close_element(&mut self, element: Element) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(element),
            None => self.root = Some(element),
        }
    }

    fn append_text(&mut self, value: &str, offset: u64) -> Result<(), ValidationError> {
        match self.open.last_mut() {
            Some(element) => {
                element.text.push_str(value);
                Ok(())
            }
            None if value.trim().is_empty() => Ok(()),
            None => Err(self.fail("character data outside the root element", offset)),
        }
    }

    fn namespace(
        &self,
        resolved: ResolveResult<'_>,
        offset: u64,
    ) -> Result<Namespace, ValidationError> {
        match resolved {
            ResolveResult::Unbound => Ok(Namespace::None),
            ResolveResult::Bound(ns) => Ok(Namespace::Uri(self.utf8(ns.as_ref(), offset)?)),
            ResolveResult::Unknown(prefix) => Err(self.fail(
                format!(
                    "undeclared namespace prefix `{}`",
                    String::from_utf8_lossy(&prefix)
                ),
                offset,
            )),
        }
    }

    fn utf8(&self, bytes: &[u8], offset: u64) -> Result<String, ValidationError> {
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|err| self.fail(format!("invalid UTF-8 in name: {err}"), offset))
    }

    /// `offset` is relative to the parsed body, i.e. after any byte-order mark.
    fn fail(&self, message: impl Into<String>, offset: u64) -> ValidationError {
        let position = TextPosition::locate(self.input, offset + self.base);
        let path = (!self.open_names.is_empty())
            .then(|| self.open_names.iter().cloned().collect::<ElementPath>());
        ValidationError::malformed(message, Some(position), path)
    }
}

fn raw_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}
