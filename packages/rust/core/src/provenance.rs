//! Where each body block of the assembled document came from.
//!
//! Post-grafting passes (bullets, style) must only touch the blocks grafted
//! for the current clause. They look those blocks up here by [`NodeKey`]
//! rather than by inspecting the blocks themselves.

use std::collections::HashMap;

use clausier_docx::{Document, NodeKey};

/// Origin of a body block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Present in the template before assembly started.
    Template,
    /// Added by the assembler (section headers, spacers, summary lines).
    Scaffold,
    /// Grafted from the clause with this merge index.
    Clause(usize),
}

#[derive(Debug, Clone, Default)]
pub struct ProvenanceTable {
    entries: HashMap<NodeKey, Provenance>,
}

impl ProvenanceTable {
    /// Mark every block currently in `doc` as template content.
    pub fn from_template(doc: &Document) -> Self {
        Self {
            entries: doc.blocks().map(|(key, _)| (key, Provenance::Template)).collect(),
        }
    }

    pub fn record(&mut self, key: NodeKey, provenance: Provenance) {
        self.entries.insert(key, provenance);
    }

    pub fn record_all(&mut self, keys: &[NodeKey], provenance: Provenance) {
        for key in keys {
            self.record(*key, provenance);
        }
    }

    pub fn get(&self, key: NodeKey) -> Option<Provenance> {
        self.entries.get(&key).copied()
    }

    /// Keys grafted for clause `index`, in allocation order.
    pub fn clause_keys(&self, index: usize) -> Vec<NodeKey> {
        let mut keys: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, provenance)| **provenance == Provenance::Clause(index))
            .map(|(key, _)| *key)
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
