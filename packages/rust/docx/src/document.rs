//! An opened word-processing document.
//!
//! The body is held as an ordered list of [`Block`]s, each tagged with a
//! [`NodeKey`] that stays stable while blocks are inserted around it.
//! Callers hold [`Anchor`]s (keys of already-placed blocks) to say where the
//! next block goes. The numbering part is parsed into a [`NumberingTable`];
//! all other parts travel through untouched.

use std::fmt;
use std::path::Path;

use tracing::{debug, instrument};

use clausier_shared::{ClausierError, Result};

use crate::blank;
use crate::block::Block;
use crate::compose::plain_paragraph;
use crate::numbering::NumberingTable;
use crate::package::{Package, REL_NUMBERING, REL_STYLES};
use crate::xml::{self, Element, XmlNode};

/// Stable identity of a body block within one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Insertion point: new content goes immediately after this block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor(NodeKey);

impl Anchor {
    pub fn key(&self) -> NodeKey {
        self.0
    }
}

#[derive(Debug, Clone)]
struct BodyNode {
    key: NodeKey,
    block: Block,
}

#[derive(Debug, Clone)]
struct NumberingPart {
    part_name: String,
    table: NumberingTable,
}

/// A document loaded into memory.
#[derive(Debug, Clone)]
pub struct Document {
    package: Package,
    main_part: String,
    /// `w:document` with an empty `w:body`; the body is rebuilt on save.
    root: Element,
    body: Vec<BodyNode>,
    numbering: Option<NumberingPart>,
    styles: Option<Element>,
    next_key: u64,
}

impl Document {
    /// Open a `.docx` file.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        let package = Package::open(path)?;
        Self::from_package(package)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_package(Package::from_bytes(bytes)?)
    }

    /// A new empty document with `Normal`, `List Bullet` and `List Number`
    /// styles backed by one bullet and one decimal list.
    pub fn blank() -> Result<Self> {
        let package = Package::from_parts([
            ("[Content_Types].xml", blank::CONTENT_TYPES.as_bytes().to_vec()),
            ("_rels/.rels", blank::ROOT_RELS.as_bytes().to_vec()),
            ("word/document.xml", blank::DOCUMENT.as_bytes().to_vec()),
            ("word/_rels/document.xml.rels", blank::DOCUMENT_RELS.as_bytes().to_vec()),
            ("word/styles.xml", blank::STYLES.as_bytes().to_vec()),
            ("word/numbering.xml", blank::NUMBERING.as_bytes().to_vec()),
        ]);
        Self::from_package(package)
    }

    /// A blank document holding one plain paragraph per line.
    pub fn from_paragraph_texts<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let mut doc = Self::blank()?;
        for line in lines {
            doc.append(plain_paragraph(line.as_ref()));
        }
        Ok(doc)
    }

    pub fn from_package(package: Package) -> Result<Self> {
        let main_part = package.main_document_part()?;
        let xml_text = package
            .part_str(&main_part)?
            .ok_or_else(|| ClausierError::Package(format!("missing part '{main_part}'")))?;

        let mut root = xml::parse(xml_text)?;
        if !root.is("document") {
            return Err(ClausierError::Package(format!(
                "'{main_part}' is not a word-processing document"
            )));
        }
        let body_el = root
            .child_mut("body")
            .ok_or_else(|| ClausierError::Package("document has no body".into()))?;
        let children = std::mem::take(&mut body_el.children);

        let mut doc = Self {
            numbering: load_numbering(&package, &main_part)?,
            styles: load_styles(&package, &main_part)?,
            package,
            main_part,
            root,
            body: Vec::with_capacity(children.len()),
            next_key: 0,
        };
        for node in children {
            if let XmlNode::Element(el) = node {
                let key = doc.alloc_key();
                doc.body.push(BodyNode {
                    key,
                    block: Block::from_element(el),
                });
            }
        }

        debug!(blocks = doc.body.len(), numbering = doc.numbering.is_some(), "document loaded");
        Ok(doc)
    }

    fn alloc_key(&mut self) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        key
    }

    // -----------------------------------------------------------------------
    // Body access
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Body blocks in document order.
    pub fn blocks(&self) -> impl Iterator<Item = (NodeKey, &Block)> {
        self.body.iter().map(|node| (node.key, &node.block))
    }

    pub fn block(&self, key: NodeKey) -> Option<&Block> {
        self.body.iter().find(|node| node.key == key).map(|node| &node.block)
    }

    pub fn block_mut(&mut self, key: NodeKey) -> Option<&mut Block> {
        self.body
            .iter_mut()
            .find(|node| node.key == key)
            .map(|node| &mut node.block)
    }

    /// Index of a block in the body.
    pub fn position(&self, key: NodeKey) -> Option<usize> {
        self.body.iter().position(|node| node.key == key)
    }

    /// An anchor on an attached block.
    pub fn anchor(&self, key: NodeKey) -> Option<Anchor> {
        self.position(key).map(|_| Anchor(key))
    }

    /// Insert `block` immediately after the anchored block and return an
    /// anchor on it. A terminal section break always stays last.
    pub fn insert_after(&mut self, anchor: Anchor, block: Block) -> Result<Anchor> {
        let index = self.position(anchor.key()).ok_or_else(|| {
            ClausierError::validation(format!("anchor {} is not attached to the body", anchor.key()))
        })?;
        let at = if self.body[index].block.is_section_properties() {
            index
        } else {
            index + 1
        };
        Ok(self.insert_at(at, block))
    }

    /// Insert `block` at `index` (clamped to the body length).
    pub fn insert_at(&mut self, index: usize, block: Block) -> Anchor {
        let key = self.alloc_key();
        let index = index.min(self.body.len());
        self.body.insert(index, BodyNode { key, block });
        Anchor(key)
    }

    /// Append `block` at the end of the body, before the terminal section
    /// properties if there are any.
    pub fn append(&mut self, block: Block) -> Anchor {
        let index = match self.body.last() {
            Some(node) if node.block.is_section_properties() => self.body.len() - 1,
            _ => self.body.len(),
        };
        self.insert_at(index, block)
    }

    pub fn remove(&mut self, key: NodeKey) -> Option<Block> {
        let index = self.position(key)?;
        Some(self.body.remove(index).block)
    }

    /// Number of `w:sectPr` elements that are direct body children.
    pub fn section_properties_count(&self) -> usize {
        self.body
            .iter()
            .filter(|node| node.block.is_section_properties())
            .count()
    }

    /// Text of each body-level paragraph, in order.
    pub fn paragraph_texts(&self) -> Vec<String> {
        self.body
            .iter()
            .filter_map(|node| node.block.as_paragraph())
            .map(|p| p.text())
            .collect()
    }

    /// Text of every paragraph and table in document order, one entry per
    /// block that carries text.
    pub fn block_texts(&self) -> Vec<String> {
        self.body
            .iter()
            .filter(|node| matches!(node.block, Block::Paragraph(_) | Block::Table(_)))
            .map(|node| node.block.text())
            .collect()
    }

    /// Declare on the `w:document` root the namespaces `source` declares on
    /// its own, so that blocks grafted from it keep their prefixed markup
    /// (`w14:paraId` and similar). Returns the prefixes added.
    pub fn adopt_namespaces(&mut self, source: &Document) -> Vec<String> {
        let added = self.root.adopt_namespaces(&source.root);
        if !added.is_empty() {
            debug!(prefixes = ?added, "namespaces adopted");
        }
        added
    }

    // -----------------------------------------------------------------------
    // Numbering and styles
    // -----------------------------------------------------------------------

    pub fn numbering(&self) -> Option<&NumberingTable> {
        self.numbering.as_ref().map(|part| &part.table)
    }

    pub fn numbering_mut(&mut self) -> Option<&mut NumberingTable> {
        self.numbering.as_mut().map(|part| &mut part.table)
    }

    /// Style id of the paragraph style named `name` (case-insensitive).
    /// Falls back to the name with spaces removed, which is how Word derives
    /// ids for built-in styles (`List Bullet` -> `ListBullet`).
    pub fn style_id_for_name(&self, name: &str) -> String {
        self.styles
            .as_ref()
            .and_then(|styles| {
                styles
                    .elements()
                    .filter(|style| style.is("style") && style.attr("type") == Some("paragraph"))
                    .find(|style| {
                        style
                            .child("name")
                            .and_then(|n| n.attr("val"))
                            .is_some_and(|val| val.eq_ignore_ascii_case(name))
                    })
                    .and_then(|style| style.attr("styleId"))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| name.replace(' ', ""))
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    /// Serialize the whole package.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut root = self.root.clone();
        let body = root
            .child_mut("body")
            .ok_or_else(|| ClausierError::Package("document has no body".into()))?;
        body.children = self
            .body
            .iter()
            .map(|node| XmlNode::Element(node.block.element().clone()))
            .collect();
        let pruned = root.prune_undeclared_prefixes();
        if pruned > 0 {
            debug!(pruned, "markup with undeclared prefixes dropped");
        }

        let mut package = self.package.clone();
        package.set_part(&self.main_part, xml::to_bytes(&root)?);
        if let Some(numbering) = &self.numbering {
            package.set_part(&numbering.part_name, numbering.table.to_bytes()?);
        }
        package.to_bytes()
    }

    /// Write the document to `path` (temp file, then rename) and return the
    /// bytes written.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<Vec<u8>> {
        let bytes = self.to_bytes()?;

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| ClausierError::io(dir, e))?;

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.docx".into());
        let temp = dir.join(format!(".{filename}.tmp"));
        std::fs::write(&temp, &bytes).map_err(|e| ClausierError::io(&temp, e))?;
        std::fs::rename(&temp, path).map_err(|e| ClausierError::io(path, e))?;

        debug!(bytes = bytes.len(), "document saved");
        Ok(bytes)
    }
}

fn load_numbering(package: &Package, main_part: &str) -> Result<Option<NumberingPart>> {
    let part_name = package
        .related_part(main_part, REL_NUMBERING)?
        .filter(|name| package.part(name).is_some());
    let Some(part_name) = part_name else {
        return Ok(None);
    };
    let Some(xml_text) = package.part_str(&part_name)? else {
        return Ok(None);
    };
    let table = NumberingTable::parse(xml_text)?;
    Ok(Some(NumberingPart { part_name, table }))
}

fn load_styles(package: &Package, main_part: &str) -> Result<Option<Element>> {
    let Some(part_name) = package.related_part(main_part, REL_STYLES)? else {
        return Ok(None);
    };
    match package.part_str(&part_name)? {
        Some(xml_text) => Ok(Some(xml::parse(xml_text)?)),
        None => Ok(None),
    }
}
