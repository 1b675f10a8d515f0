//! Owned XML tree for the document parts the engine edits.
//!
//! Parts are read with `quick-xml` into [`Element`] trees that keep
//! qualified names, namespace declarations and text verbatim, so that a part
//! written back out differs from its input only where it was edited.
//! Lookups match on the local name (`w:p` and `p` are the same tag).

use std::borrow::Cow;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use clausier_shared::{ClausierError, Result};

/// A node in an element's child list.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(Element),
    Text(String),
}

/// An XML element with its attributes and children, in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Qualified name as written (e.g. `w:p`).
    pub name: String,
    /// Attributes as `(qualified name, unescaped value)`.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

/// Strip the namespace prefix from a qualified name.
pub fn local_name(qname: &str) -> &str {
    qname.rsplit_once(':').map_or(qname, |(_, local)| local)
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Builder-style text append.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Whether this element's local name is `local`.
    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    /// Attribute value by local name.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| local_name(name) == local)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, keeping the existing qualified name when present.
    pub fn set_attr(&mut self, qname: &str, value: impl Into<String>) {
        let value = value.into();
        let local = local_name(qname);
        match self.attrs.iter_mut().find(|(name, _)| local_name(name) == local) {
            Some((_, existing)) => *existing = value,
            None => self.attrs.push((qname.to_string(), value)),
        }
    }

    /// Remove every attribute with the given local name.
    pub fn remove_attr(&mut self, local: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(name, _)| local_name(name) != local);
        before != self.attrs.len()
    }

    /// Child elements, skipping text nodes.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element with the given local name.
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.elements().find(|el| el.is(local))
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut Element> {
        self.elements_mut().find(|el| el.is(local))
    }

    /// Index in `children` of the first element named `local`.
    pub fn position_of(&self, local: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, XmlNode::Element(el) if el.is(local)))
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(XmlNode::Element(child));
    }

    /// Keep only the child nodes for which `keep` returns true.
    /// Text nodes are always kept.
    pub fn retain_elements(&mut self, mut keep: impl FnMut(&Element) -> bool) {
        self.children.retain(|node| match node {
            XmlNode::Element(el) => keep(el),
            XmlNode::Text(_) => true,
        });
    }

    /// Remove all child elements named `local`; returns how many went.
    pub fn remove_children(&mut self, local: &str) -> usize {
        let before = self.children.len();
        self.retain_elements(|el| !el.is(local));
        before - self.children.len()
    }

    /// Insert `child` at its position in a schema sequence.
    ///
    /// `order` lists local names in schema order. The child goes before the
    /// first existing sibling that ranks after it; names absent from `order`
    /// are appended.
    pub fn insert_ordered(&mut self, child: Element, order: &[&str]) -> usize {
        let rank_of = |name: &str| order.iter().position(|candidate| *candidate == name);
        let index = match rank_of(child.local_name()) {
            None => self.children.len(),
            Some(rank) => self
                .children
                .iter()
                .position(|node| match node {
                    XmlNode::Element(el) => rank_of(el.local_name()).is_some_and(|r| r > rank),
                    XmlNode::Text(_) => false,
                })
                .unwrap_or(self.children.len()),
        };
        self.children.insert(index, XmlNode::Element(child));
        index
    }

    /// Get the child named `local`, creating `qname` at its schema position
    /// when missing.
    pub fn ensure_child(&mut self, qname: &str, order: &[&str]) -> &mut Element {
        let index = match self.position_of(local_name(qname)) {
            Some(index) => index,
            None => self.insert_ordered(Element::new(qname), order),
        };
        match &mut self.children[index] {
            XmlNode::Element(el) => el,
            XmlNode::Text(_) => unreachable!("index was resolved to an element"),
        }
    }

    /// Get the child named `local`, creating `qname` as the first child when
    /// missing (property containers such as `w:pPr` and `w:rPr`).
    pub fn ensure_first_child(&mut self, qname: &str) -> &mut Element {
        let index = match self.position_of(local_name(qname)) {
            Some(index) => index,
            None => {
                self.children.insert(0, XmlNode::Element(Element::new(qname)));
                0
            }
        };
        match &mut self.children[index] {
            XmlNode::Element(el) => el,
            XmlNode::Text(_) => unreachable!("index was resolved to an element"),
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.children.clear();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text));
        }
    }

    /// Visit this element and every descendant, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Element)) {
        visit(self);
        for child in self.elements() {
            child.walk(visit);
        }
    }

    /// Mutable pre-order visit of this element and every descendant.
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut Element)) {
        visit(self);
        for child in self.elements_mut() {
            child.walk_mut(visit);
        }
    }

    /// Collect mutable references to the outermost descendants named `local`.
    /// Matches are not searched further, so nested matches are skipped.
    pub fn descendants_named_mut<'a>(&'a mut self, local: &str, out: &mut Vec<&'a mut Element>) {
        for child in self.elements_mut() {
            if child.is(local) {
                out.push(child);
            } else {
                child.descendants_named_mut(local, out);
            }
        }
    }

    /// Collect shared references to the outermost descendants named `local`.
    pub fn descendants_named<'a>(&'a self, local: &str, out: &mut Vec<&'a Element>) {
        for child in self.elements() {
            if child.is(local) {
                out.push(child);
            } else {
                child.descendants_named(local, out);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Namespaces
    // -----------------------------------------------------------------------

    /// Prefixed namespace declarations on this element as `(prefix, uri)`.
    pub fn namespace_declarations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().filter_map(|(name, value)| {
            name.strip_prefix("xmlns:")
                .map(|prefix| (prefix, value.as_str()))
        })
    }

    /// URI bound to `prefix` by a declaration on this element.
    pub fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        self.namespace_declarations()
            .find(|(declared, _)| *declared == prefix)
            .map(|(_, uri)| uri)
    }

    /// Prefix bound to `uri` by a declaration on this element.
    pub fn namespace_prefix(&self, uri: &str) -> Option<&str> {
        self.namespace_declarations()
            .find(|(_, bound)| *bound == uri)
            .map(|(prefix, _)| prefix)
    }

    /// Declare on this root every prefix that `other` declares and this
    /// element does not, then extend `mc:Ignorable` with the ignorable
    /// prefixes of `other` that now resolve to the same URI here.
    ///
    /// A prefix already bound to another URI is left alone; content using it
    /// is removed later by [`Element::prune_undeclared_prefixes`] only when
    /// it is not declared at all. Returns the prefixes added.
    pub fn adopt_namespaces(&mut self, other: &Element) -> Vec<String> {
        let missing: Vec<(String, String)> = other
            .namespace_declarations()
            .filter(|(prefix, _)| self.namespace_uri(prefix).is_none())
            .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
            .collect();
        for (prefix, uri) in &missing {
            self.attrs.push((format!("xmlns:{prefix}"), uri.clone()));
        }

        if let Some(theirs) = ignorable_of(other) {
            if let Some(mc) = self.namespace_prefix(MC_NS).map(str::to_string) {
                let mut tokens: Vec<String> = ignorable_of(self)
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                for token in theirs.split_whitespace() {
                    let same_binding = self.namespace_uri(token).is_some()
                        && self.namespace_uri(token) == other.namespace_uri(token);
                    if same_binding && !tokens.iter().any(|t| t == token) {
                        tokens.push(token.to_string());
                    }
                }
                if !tokens.is_empty() {
                    self.set_attr(&format!("{mc}:Ignorable"), tokens.join(" "));
                }
            }
        }

        missing.into_iter().map(|(prefix, _)| prefix).collect()
    }

    /// Remove descendant elements and attributes whose prefix is not
    /// declared on this element, on the way down, or on the element itself.
    /// Returns how many elements and attributes were removed.
    pub fn prune_undeclared_prefixes(&mut self) -> usize {
        let mut scope: Vec<String> = vec!["xml".into(), "xmlns".into()];
        prune_undeclared(self, &mut scope)
    }
}

/// Markup-compatibility namespace (`mc:Ignorable`, `mc:AlternateContent`).
pub const MC_NS: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";

fn ignorable_of(el: &Element) -> Option<&str> {
    let mc = el.namespace_prefix(MC_NS)?;
    el.attrs
        .iter()
        .find(|(name, _)| name.split_once(':') == Some((mc, "Ignorable")))
        .map(|(_, value)| value.as_str())
}

fn prefix_of(qname: &str) -> Option<&str> {
    qname.split_once(':').map(|(prefix, _)| prefix)
}

fn prune_undeclared(el: &mut Element, scope: &mut Vec<String>) -> usize {
    let depth = scope.len();
    scope.extend(el.namespace_declarations().map(|(prefix, _)| prefix.to_string()));
    let declared = |scope: &[String], qname: &str| {
        prefix_of(qname).is_none_or(|prefix| scope.iter().any(|s| s == prefix))
    };

    let before = el.attrs.len();
    el.attrs.retain(|(name, _)| declared(scope, name));
    let mut removed = before - el.attrs.len();

    let before = el.children.len();
    el.retain_elements(|child| {
        declared(scope, &child.name)
            || prefix_of(&child.name).is_some_and(|prefix| child.namespace_uri(prefix).is_some())
    });
    removed += before - el.children.len();

    for child in el.elements_mut() {
        removed += prune_undeclared(child, scope);
    }
    scope.truncate(depth);
    removed
}

fn collect_text(el: &Element, out: &mut String) {
    for node in &el.children {
        match node {
            XmlNode::Text(text) => out.push_str(text),
            XmlNode::Element(child) => collect_text(child, out),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse an XML part into its root element.
pub fn parse(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml.trim_start_matches('\u{feff}'));
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(element_from_start(&start)?),
            Ok(Event::Empty(start)) => {
                let el = element_from_start(&start)?;
                attach(&mut stack, &mut root, el)?;
            }
            Ok(Event::End(_)) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| ClausierError::xml("closing tag without an open element"))?;
                attach(&mut stack, &mut root, el)?;
            }
            Ok(Event::Text(text)) => {
                if let Some(parent) = stack.last_mut() {
                    let text = text
                        .unescape()
                        .map_err(|e| ClausierError::xml(format!("bad text content: {e}")))?;
                    parent.children.push(XmlNode::Text(text.into_owned()));
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(parent) = stack.last_mut() {
                    let bytes = data.into_inner();
                    parent
                        .children
                        .push(XmlNode::Text(String::from_utf8_lossy(&bytes).into_owned()));
                }
            }
            Ok(Event::Eof) => break,
            // Declarations, comments, processing instructions
            Ok(_) => {}
            Err(e) => {
                return Err(ClausierError::xml(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    if !stack.is_empty() {
        return Err(ClausierError::xml("unexpected end of document"));
    }
    root.ok_or_else(|| ClausierError::xml("document has no root element"))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = utf8(start.name().as_ref())?.to_string();
    let mut el = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| ClausierError::xml(format!("bad attribute: {e}")))?;
        let key = utf8(attr.key.as_ref())?.to_string();
        let value: Cow<'_, str> = attr
            .unescape_value()
            .map_err(|e| ClausierError::xml(format!("bad attribute value: {e}")))?;
        el.attrs.push((key, value.into_owned()));
    }
    Ok(el)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(XmlNode::Element(el));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(el);
            Ok(())
        }
        None => Err(ClausierError::xml("more than one root element")),
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| ClausierError::xml(format!("invalid UTF-8 name: {e}")))
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serialize a root element as a standalone UTF-8 XML part.
pub fn to_bytes(root: &Element) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(|e| ClausierError::xml(e.to_string()))?;
    write_element(&mut writer, root)?;
    Ok(writer.into_inner())
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) -> Result<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if el.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| ClausierError::xml(e.to_string()));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| ClausierError::xml(e.to_string()))?;
    for child in &el.children {
        match child {
            XmlNode::Element(child) => write_element(writer, child)?,
            XmlNode::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| ClausierError::xml(e.to_string()))?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(el.name.as_str())))
        .map_err(|e| ClausierError::xml(e.to_string()))
}
