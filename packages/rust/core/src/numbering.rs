//! Numbering import: copies a clause's list definitions into the target
//! under freshly allocated ids.
//!
//! Every document numbers its lists in its own id space, so a clause's
//! `numId="1"` and the template's `numId="1"` are unrelated lists. Import
//! clones the clause's abstract definitions and instances into the target,
//! renumbered by a per-session [`NumberingAllocator`], and returns the
//! [`RemapTable`] the grafter uses to rewrite paragraph references.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use clausier_docx::numbering::{abstract_id_of, instance_abstract_ref, num_id_of};
use clausier_docx::{AbstractId, Document, NumId, NumberingTable};

/// First `w:nsid` value handed out to imported abstract definitions.
const NSID_SEED: u32 = 0x1C1A_0000;

/// Allocates numbering ids for one assembly session.
///
/// Ids only ever grow: the allocator observes the target table before each
/// import and never hands out an id twice, even if the target loses an entry
/// in between.
#[derive(Debug, Clone)]
pub struct NumberingAllocator {
    next_abstract: AbstractId,
    next_num: NumId,
    next_nsid: u32,
}

impl Default for NumberingAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl NumberingAllocator {
    pub fn new() -> Self {
        Self {
            next_abstract: 0,
            // numId 0 means "no numbering" in a paragraph reference
            next_num: 1,
            next_nsid: NSID_SEED,
        }
    }

    /// An allocator seeded past every id already used by `table`.
    pub fn for_table(table: Option<&NumberingTable>) -> Self {
        let mut allocator = Self::new();
        if let Some(table) = table {
            allocator.observe(table);
        }
        allocator
    }

    /// Move the counters past the ids used by `table`. Never decreases them.
    pub fn observe(&mut self, table: &NumberingTable) {
        if let Some(max) = table.max_abstract_id() {
            self.next_abstract = self.next_abstract.max(max.saturating_add(1));
        }
        if let Some(max) = table.max_num_id() {
            self.next_num = self.next_num.max(max.saturating_add(1));
        }
    }

    pub fn next_abstract_id(&mut self) -> AbstractId {
        let id = self.next_abstract;
        self.next_abstract += 1;
        id
    }

    pub fn next_num_id(&mut self) -> NumId {
        let id = self.next_num;
        self.next_num += 1;
        id
    }

    /// Next `w:nsid` (8 upper-case hex digits) not present in `taken`.
    pub fn next_nsid(&mut self, taken: &HashSet<String>) -> String {
        loop {
            let candidate = format!("{:08X}", self.next_nsid);
            self.next_nsid = self.next_nsid.wrapping_add(1);
            if !taken.contains(&candidate) {
                return candidate;
            }
        }
    }
}

/// Source NumId to target NumId for one imported clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
    nums: HashMap<NumId, NumId>,
}

impl RemapTable {
    pub fn get(&self, source: NumId) -> Option<NumId> {
        self.nums.get(&source).copied()
    }

    pub fn insert(&mut self, source: NumId, target: NumId) {
        self.nums.insert(source, target);
    }

    pub fn len(&self) -> usize {
        self.nums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nums.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NumId, NumId)> + '_ {
        self.nums.iter().map(|(from, to)| (*from, *to))
    }
}

/// Append `source`'s numbering definitions to `target` under fresh ids.
///
/// Returns an empty table when either document has no numbering part; the
/// clause's list paragraphs are then grafted without numbering. `source` is
/// never modified.
#[instrument(skip_all)]
pub fn import_numbering(
    target: &mut Document,
    source: &Document,
    allocator: &mut NumberingAllocator,
) -> RemapTable {
    let mut remap = RemapTable::default();

    let Some(source_table) = source.numbering() else {
        debug!("clause has no numbering part");
        return remap;
    };
    let Some(target_table) = target.numbering_mut() else {
        debug!("target has no numbering part, clause lists graft unnumbered");
        return remap;
    };

    allocator.observe(target_table);
    target_table.adopt_namespaces(source_table);
    let mut taken_nsids = target_table.nsids();

    let mut abstract_map: HashMap<AbstractId, AbstractId> = HashMap::new();
    for definition in source_table.abstracts() {
        let Some(old_id) = abstract_id_of(definition) else {
            continue;
        };
        let new_id = allocator.next_abstract_id();

        let mut copy = definition.clone();
        copy.set_attr("w:abstractNumId", new_id.to_string());
        if let Some(nsid) = copy.child_mut("nsid") {
            let fresh = allocator.next_nsid(&taken_nsids);
            nsid.set_attr("w:val", fresh.as_str());
            taken_nsids.insert(fresh);
        }

        target_table.push_abstract(copy);
        abstract_map.insert(old_id, new_id);
    }

    for instance in source_table.instances() {
        let Some(old_num) = num_id_of(instance) else {
            continue;
        };
        let Some(new_abstract) = instance_abstract_ref(instance).and_then(|id| abstract_map.get(&id))
        else {
            debug!(num_id = old_num, "instance points at no imported definition, skipped");
            continue;
        };
        let new_num = allocator.next_num_id();

        let mut copy = instance.clone();
        copy.set_attr("w:numId", new_num.to_string());
        if let Some(reference) = copy.child_mut("abstractNumId") {
            reference.set_attr("w:val", new_abstract.to_string());
        }

        target_table.push_instance(copy);
        remap.insert(old_num, new_num);
    }

    debug!(
        abstracts = abstract_map.len(),
        instances = remap.len(),
        "numbering imported"
    );
    remap
}
