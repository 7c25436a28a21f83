//! The `Text` kernel: a collaborative string, structurally the `List` kernel
//! specialized to Unicode scalar values, with contiguous insertion runs
//! coalesced into single patch entries so patch size stays proportional to
//! net edits rather than per-character.

use crate::error::Result;
use crate::field::list::OpIdSource;
use crate::opid::OpId;
use crate::position::FractionalPosition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Per-field metadata: the same ordered `position -> (valueId, char)` map
/// the `List` kernel uses, specialized to Unicode scalar values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextField {
    entries: BTreeMap<FractionalPosition, (OpId, char)>,
    by_id: HashMap<OpId, FractionalPosition>,
}

/// Locally-supplied mutation inputs.
#[derive(Debug, Clone)]
pub enum TextUpdate {
    Splice { index: usize, remove_count: usize, text: String },
    Insert { index: usize, text: String },
    Append(String),
    Set(String),
    Clear,
}

/// One run of a text patch fragment. An `Insert` run carries every character
/// of one contiguous locally-originated insertion, each with its own
/// position and OpId, so that merge/compare still operates per character.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum TextRun {
    Insert {
        chars: Vec<(OpId, FractionalPosition, char)>,
    },
    Remove {
        op_id: OpId,
        value_id: OpId,
        position: FractionalPosition,
        ch: char,
    },
}

/// The broadcastable fragment: an ordered run sequence.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TextPatch {
    pub runs: Vec<TextRun>,
}

/// The `(previous, current)` snapshot delivered to observers.
#[derive(Debug, Clone)]
pub struct TextChange {
    pub previous: String,
    pub current: String,
}

impl TextField {
    pub fn initial() -> Self {
        Self { entries: BTreeMap::new(), by_id: HashMap::new() }
    }

    pub fn current_string(&self) -> String {
        self.entries.values().map(|(_, c)| c).collect()
    }

    fn position_at(&self, index: usize) -> Option<FractionalPosition> {
        self.entries.keys().nth(index).cloned()
    }

    fn neighbors(&self, index: usize) -> (FractionalPosition, FractionalPosition) {
        let low = if index == 0 {
            FractionalPosition::Min
        } else {
            self.position_at(index - 1).unwrap_or(FractionalPosition::Max)
        };
        let high = self.position_at(index).unwrap_or(FractionalPosition::Max);
        (low, high)
    }

    fn insert_run(
        &mut self,
        index: usize,
        text: &str,
        source: &mut dyn OpIdSource,
    ) -> Result<TextRun> {
        let mut chars = Vec::new();
        let mut cursor = index;
        for ch in text.chars() {
            let op_id = source.next_op_id();
            let (low, high) = self.neighbors(cursor);
            let position = FractionalPosition::between(op_id.store_id(), op_id.clock(), &low, &high)?;
            self.entries.insert(position.clone(), (op_id, ch));
            self.by_id.insert(op_id, position.clone());
            chars.push((op_id, position, ch));
            cursor += 1;
        }
        Ok(TextRun::Insert { chars })
    }

    fn remove_one(&mut self, index: usize, source: &mut dyn OpIdSource) -> Option<TextRun> {
        let position = self.position_at(index)?;
        let (value_id, ch) = self.entries.remove(&position)?;
        self.by_id.remove(&value_id);
        let op_id = source.next_op_id();
        Some(TextRun::Remove { op_id, value_id, position, ch })
    }

    pub fn apply_update(
        &mut self,
        _op_id: OpId,
        update: TextUpdate,
        source: &mut dyn OpIdSource,
    ) -> Result<(TextPatch, TextChange)> {
        let previous = self.current_string();
        let mut runs = Vec::new();

        match update {
            TextUpdate::Splice { index, remove_count, text } => {
                for _ in 0..remove_count {
                    if let Some(r) = self.remove_one(index, source) {
                        runs.push(r);
                    }
                }
                if !text.is_empty() {
                    runs.push(self.insert_run(index, &text, source)?);
                }
            }
            TextUpdate::Insert { index, text } => {
                if !text.is_empty() {
                    runs.push(self.insert_run(index, &text, source)?);
                }
            }
            TextUpdate::Append(text) => {
                let len = self.entries.len();
                if !text.is_empty() {
                    runs.push(self.insert_run(len, &text, source)?);
                }
            }
            TextUpdate::Set(text) => {
                let len = self.entries.len();
                for _ in 0..len {
                    if let Some(r) = self.remove_one(0, source) {
                        runs.push(r);
                    }
                }
                if !text.is_empty() {
                    runs.push(self.insert_run(0, &text, source)?);
                }
            }
            TextUpdate::Clear => {
                let len = self.entries.len();
                for _ in 0..len {
                    if let Some(r) = self.remove_one(0, source) {
                        runs.push(r);
                    }
                }
            }
        }

        let current = self.current_string();
        Ok((TextPatch { runs }, TextChange { previous, current }))
    }

    pub fn apply_patch(&mut self, fragment: &TextPatch) -> Option<TextChange> {
        let previous = self.current_string();
        for run in &fragment.runs {
            match run {
                TextRun::Insert { chars } => {
                    for (op_id, position, ch) in chars {
                        if self.by_id.contains_key(op_id) {
                            continue;
                        }
                        self.entries.insert(position.clone(), (*op_id, *ch));
                        self.by_id.insert(*op_id, position.clone());
                    }
                }
                TextRun::Remove { value_id, .. } => {
                    if let Some(position) = self.by_id.remove(value_id) {
                        self.entries.remove(&position);
                    }
                }
            }
        }
        let current = self.current_string();
        if previous == current {
            None
        } else {
            Some(TextChange { previous, current })
        }
    }
}

pub(crate) fn merge_patch(mut a: TextPatch, b: TextPatch) -> TextPatch {
    a.runs.extend(b.runs);
    a
}

pub(crate) fn merge_change(a: TextChange, b: TextChange) -> TextChange {
    TextChange { previous: a.previous, current: b.current }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        store_id: u32,
        clock: u64,
    }
    impl OpIdSource for Counter {
        fn next_op_id(&mut self) -> OpId {
            self.clock += 1;
            OpId::new(self.clock, self.store_id).unwrap()
        }
    }

    fn op(clock: u64, store: u32) -> OpId {
        OpId::new(clock, store).unwrap()
    }

    #[test]
    fn append_builds_string_in_order() {
        let mut f = TextField::initial();
        let mut src = Counter { store_id: 1, clock: 0 };
        f.apply_update(op(0, 1), TextUpdate::Append("hello".into()), &mut src).unwrap();
        assert_eq!(f.current_string(), "hello");
    }

    /// Spec §8 scenario 3: concurrent insert at the same index preserves both.
    #[test]
    fn concurrent_insert_preserves_both_characters() {
        let mut a = TextField::initial();
        let mut a_src = Counter { store_id: 1, clock: 0 };
        a.apply_update(op(0, 1), TextUpdate::Append("hello".into()), &mut a_src).unwrap();

        let mut b = TextField::initial();
        let mut b_src = Counter { store_id: 2, clock: 0 };
        b.apply_update(op(0, 2), TextUpdate::Append("hello".into()), &mut b_src).unwrap();

        let (patch_a, _) = a.apply_update(op(0, 1), TextUpdate::Insert { index: 2, text: "A".into() }, &mut a_src).unwrap();
        let (patch_b, _) = b.apply_update(op(0, 2), TextUpdate::Insert { index: 2, text: "B".into() }, &mut b_src).unwrap();

        a.apply_patch(&patch_b);
        b.apply_patch(&patch_a);

        assert_eq!(a.current_string(), b.current_string());
        assert_eq!(a.current_string().len(), 7);
        assert!(a.current_string().contains('A'));
        assert!(a.current_string().contains('B'));
    }

    #[test]
    fn idempotent_reapplication() {
        let mut f = TextField::initial();
        let mut src = Counter { store_id: 1, clock: 0 };
        let (p, _) = f.apply_update(op(0, 1), TextUpdate::Append("ab".into()), &mut src).unwrap();
        f.apply_patch(&p);
        assert_eq!(f.current_string(), "ab");
    }
}
