//! Typed view over a numbering part (`w:numbering`).
//!
//! A numbering part holds two id spaces: abstract definitions
//! (`w:abstractNum`, keyed by `w:abstractNumId`) describing a list's shape,
//! and instances (`w:num`, keyed by `w:numId`) that paragraphs reference and
//! that each point at one abstract definition.

use std::collections::HashSet;

use clausier_shared::Result;

use crate::xml::{self, Element, XmlNode};

/// Numeric id of an abstract definition.
pub type AbstractId = u32;

/// Numeric id of a numbering instance.
pub type NumId = u32;

/// The numbering table of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberingTable {
    root: Element,
}

impl NumberingTable {
    pub fn parse(xml_text: &str) -> Result<Self> {
        Ok(Self::from_element(xml::parse(xml_text)?))
    }

    pub fn from_element(root: Element) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Serialize the part. Markup whose prefix the root does not declare is
    /// dropped so the part stays well formed.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut root = self.root.clone();
        root.prune_undeclared_prefixes();
        xml::to_bytes(&root)
    }

    /// Declare on this table's root the namespaces `other` uses, so that
    /// definitions copied from it keep their prefixed markup.
    pub fn adopt_namespaces(&mut self, other: &NumberingTable) -> Vec<String> {
        self.root.adopt_namespaces(&other.root)
    }

    /// Abstract definitions in part order.
    pub fn abstracts(&self) -> impl Iterator<Item = &Element> {
        self.root.elements().filter(|el| el.is("abstractNum"))
    }

    /// Numbering instances in part order.
    pub fn instances(&self) -> impl Iterator<Item = &Element> {
        self.root.elements().filter(|el| el.is("num"))
    }

    pub fn abstract_ids(&self) -> Vec<AbstractId> {
        self.abstracts().filter_map(abstract_id_of).collect()
    }

    pub fn num_ids(&self) -> Vec<NumId> {
        self.instances().filter_map(num_id_of).collect()
    }

    pub fn max_abstract_id(&self) -> Option<AbstractId> {
        self.abstract_ids().into_iter().max()
    }

    pub fn max_num_id(&self) -> Option<NumId> {
        self.num_ids().into_iter().max()
    }

    pub fn contains_num(&self, num_id: NumId) -> bool {
        self.instances().any(|el| num_id_of(el) == Some(num_id))
    }

    /// AbstractId the instance `num_id` points at.
    pub fn resolve(&self, num_id: NumId) -> Option<AbstractId> {
        self.instances()
            .find(|el| num_id_of(el) == Some(num_id))
            .and_then(instance_abstract_ref)
    }

    pub fn abstract_definition(&self, abstract_id: AbstractId) -> Option<&Element> {
        self.abstracts()
            .find(|el| abstract_id_of(el) == Some(abstract_id))
    }

    /// `w:nsid` values of all abstract definitions.
    pub fn nsids(&self) -> HashSet<String> {
        self.abstracts()
            .filter_map(|el| el.child("nsid").and_then(|n| n.attr("val")))
            .map(str::to_uppercase)
            .collect()
    }

    /// Append an abstract definition. Abstract definitions must precede all
    /// instances, so it lands right before the first `w:num`.
    pub fn push_abstract(&mut self, definition: Element) {
        let index = self
            .root
            .position_of("num")
            .or_else(|| self.root.position_of("numIdMacAtCleanup"))
            .unwrap_or(self.root.children.len());
        self.root.children.insert(index, XmlNode::Element(definition));
    }

    /// Append an instance, keeping `w:numIdMacAtCleanup` last.
    pub fn push_instance(&mut self, instance: Element) {
        let index = self
            .root
            .position_of("numIdMacAtCleanup")
            .unwrap_or(self.root.children.len());
        self.root.children.insert(index, XmlNode::Element(instance));
    }
}

/// `w:abstractNumId` attribute of a `w:abstractNum`.
pub fn abstract_id_of(el: &Element) -> Option<AbstractId> {
    el.attr("abstractNumId")?.trim().parse().ok()
}

/// `w:numId` attribute of a `w:num`.
pub fn num_id_of(el: &Element) -> Option<NumId> {
    el.attr("numId")?.trim().parse().ok()
}

/// AbstractId referenced by a `w:num` (its `w:abstractNumId` child).
pub fn instance_abstract_ref(el: &Element) -> Option<AbstractId> {
    el.child("abstractNumId")?.attr("val")?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMBERING: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:abstractNum w:abstractNumId="0"><w:nsid w:val="1a2b3c4d"/><w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/></w:lvl></w:abstractNum>
<w:abstractNum w:abstractNumId="3"><w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl></w:abstractNum>
<w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>
<w:num w:numId="7"><w:abstractNumId w:val="3"/></w:num>
<w:numIdMacAtCleanup w:val="7"/>
</w:numbering>"#;

    #[test]
    fn ids_and_resolution() {
        let table = NumberingTable::parse(NUMBERING).expect("parse");
        assert_eq!(table.abstract_ids(), vec![0, 3]);
        assert_eq!(table.num_ids(), vec![1, 7]);
        assert_eq!(table.max_num_id(), Some(7));
        assert_eq!(table.resolve(7), Some(3));
        assert_eq!(table.resolve(2), None);
        assert!(table.contains_num(1));
        assert!(table.nsids().contains("1A2B3C4D"));
    }

    #[test]
    fn insertion_keeps_schema_sequence() {
        let mut table = NumberingTable::parse(NUMBERING).expect("parse");
        table.push_abstract(Element::new("w:abstractNum").with_attr("w:abstractNumId", "4"));
        table.push_instance(
            Element::new("w:num")
                .with_attr("w:numId", "8")
                .with_child(Element::new("w:abstractNumId").with_attr("w:val", "4")),
        );

        let names: Vec<_> = table
            .root()
            .elements()
            .map(|el| el.local_name().to_string())
            .collect();
        assert_eq!(
            names,
            ["abstractNum", "abstractNum", "abstractNum", "num", "num", "num", "numIdMacAtCleanup"]
        );
        assert_eq!(table.resolve(8), Some(4));
    }

    #[test]
    fn empty_table() {
        let table = NumberingTable::from_element(Element::new("w:numbering"));
        assert_eq!(table.max_abstract_id(), None);
        assert_eq!(table.max_num_id(), None);
    }
}
