//! # Control Flow Graph Utilities
//!
//! Block formation, terminator insertion, edge computation and reassembly
//! for the flat instruction stream. Every pass derives this structure from
//! the current stream, transforms it, and flattens it back; nothing here
//! persists across passes.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ir::{Instr, MalformedProgram};

/// Predecessor or successor lists, keyed by block label.
pub type EdgeMap = FxHashMap<String, Vec<String>>;

/// An ordered mapping from label to basic block.
///
/// The label order is the traversal and emission order of the function; maps
/// alone would lose it.
#[derive(Debug, Default, Clone)]
pub struct BlockMap {
    order: Vec<String>,
    blocks: FxHashMap<String, Vec<Instr>>,
}

impl BlockMap {
    /// Key each block by its leading label marker, synthesizing fresh labels
    /// for unlabeled blocks.
    pub fn from_blocks(blocks: Vec<Vec<Instr>>) -> Self {
        let mut taken: FxHashSet<String> = FxHashSet::default();
        for block in &blocks {
            if let Some(Instr::Label { label }) = block.first() {
                taken.insert(label.clone());
            }
        }

        let mut map = BlockMap::default();
        let mut counter = 0usize;
        for mut block in blocks {
            let label = match block.first() {
                Some(Instr::Label { label }) => {
                    let label = label.clone();
                    block.remove(0);
                    label
                }
                Some(Instr::Const { .. })
                | Some(Instr::Value { .. })
                | Some(Instr::Ctrl { .. })
                | None => loop {
                    counter += 1;
                    let candidate = format!("b{counter}");
                    if !taken.contains(&candidate) {
                        taken.insert(candidate.clone());
                        break candidate;
                    }
                },
            };
            map.insert(label, block);
        }
        map
    }

    /// Append a block under `label`, keeping it last in the order.
    pub fn insert(&mut self, label: String, block: Vec<Instr>) {
        if !self.blocks.contains_key(&label) {
            self.order.push(label.clone());
        }
        self.blocks.insert(label, block);
    }

    pub fn contains(&self, label: &str) -> bool { self.blocks.contains_key(label) }

    pub fn get(&self, label: &str) -> Option<&Vec<Instr>> { self.blocks.get(label) }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut Vec<Instr>> {
        self.blocks.get_mut(label)
    }

    /// Block labels in traversal order.
    pub fn labels(&self) -> &[String] { &self.order }

    /// The entry block label.
    pub fn entry(&self) -> &str { &self.order[0] }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Instr>)> {
        self.order.iter().map(|label| (label, &self.blocks[label]))
    }

    /// A label not yet used in this map, derived from `base`.
    pub fn fresh_label(&self, base: &str) -> String {
        if !self.blocks.contains_key(base) {
            return base.to_string();
        }
        let mut counter = 1usize;
        loop {
            counter += 1;
            let candidate = format!("{base}{counter}");
            if !self.blocks.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

/// Split a flat instruction stream into basic blocks: before every label
/// marker and immediately after every control transfer.
pub fn form_blocks(instrs: Vec<Instr>) -> Vec<Vec<Instr>> {
    let mut blocks = Vec::new();
    let mut current: Vec<Instr> = Vec::new();

    for instr in instrs {
        match instr {
            Instr::Label { .. } => {
                if !current.is_empty() {
                    blocks.push(std::mem::take(&mut current));
                }
                current.push(instr);
            }
            Instr::Ctrl { .. } => {
                current.push(instr);
                blocks.push(std::mem::take(&mut current));
            }
            Instr::Const { .. } | Instr::Value { .. } => current.push(instr),
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Ensure a distinguished entry block with no incoming edges precedes all
/// others.
pub fn add_entry(map: &mut BlockMap) {
    if map.labels().is_empty() {
        return;
    }
    let first = map.entry().to_string();

    let referenced = map
        .iter()
        .flat_map(|(_, block)| block.iter())
        .any(|instr| match instr {
            Instr::Ctrl { labels, .. } | Instr::Value { labels, .. } => labels.contains(&first),
            Instr::Label { .. } | Instr::Const { .. } => false,
        });
    if !referenced {
        return;
    }

    let entry = map.fresh_label("entry");
    // terminator insertion will give it a fallthrough jump to `first`
    map.blocks.insert(entry.clone(), Vec::new());
    map.order.insert(0, entry);
}

/// Mutate blocks in place so every block ends with an explicit control
/// transfer: a fallthrough jump to the next block in order, or a return for
/// the last.
pub fn add_terminators(map: &mut BlockMap) {
    let order = map.order.clone();
    for (i, label) in order.iter().enumerate() {
        let needs_terminator = !matches!(
            map.blocks[label].last(),
            Some(Instr::Ctrl { .. })
        );
        if needs_terminator {
            let terminator = match order.get(i + 1) {
                Some(next) => Instr::jmp(next.clone()),
                None => Instr::ret(),
            };
            map.blocks.get_mut(label).unwrap().push(terminator);
        }
    }
}

/// Target labels of a block's trailing control transfer.
pub fn successors(terminator: &Instr) -> &[String] {
    match terminator {
        Instr::Ctrl { labels, .. } => labels,
        Instr::Label { .. } | Instr::Const { .. } | Instr::Value { .. } => &[],
    }
}

/// Derive the predecessor and successor maps from each block's trailing
/// control transfer. A target that names no block is a structural error.
pub fn edges(map: &BlockMap) -> Result<(EdgeMap, EdgeMap), MalformedProgram> {
    let mut preds: EdgeMap = EdgeMap::default();
    let mut succs: EdgeMap = EdgeMap::default();
    for label in map.labels() {
        preds.entry(label.clone()).or_default();
        succs.entry(label.clone()).or_default();
    }

    for (label, block) in map.iter() {
        let targets = block.last().map(successors).unwrap_or(&[]);
        for target in targets {
            if !map.contains(target) {
                return Err(MalformedProgram::DanglingLabel(target.clone()));
            }
            succs.get_mut(label).unwrap().push(target.clone());
            preds.get_mut(target).unwrap().push(label.clone());
        }
    }
    Ok((preds, succs))
}

/// Compute the successor map alone, straight from the terminators.
pub fn successor_map(map: &BlockMap) -> EdgeMap {
    map.iter()
        .map(|(label, block)| {
            let targets = block.last().map(successors).unwrap_or(&[]);
            (label.clone(), targets.to_vec())
        })
        .collect()
}

/// Flatten the block map back into an instruction stream, reinserting label
/// markers and preserving order.
pub fn reassemble(map: &BlockMap) -> Vec<Instr> {
    let mut instrs = Vec::new();
    for (label, block) in map.iter() {
        instrs.push(Instr::Label {
            label: label.clone(),
        });
        instrs.extend(block.iter().cloned());
    }
    instrs
}
