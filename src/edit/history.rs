use crate::edit::asset::ImageAsset;

/// Snapshot of the edited artifact taken before the edit that replaced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub snapshot: ImageAsset,
    /// Instruction that produced the state following this snapshot.
    pub instruction: String,
}

impl HistoryEntry {
    pub fn new(snapshot: ImageAsset, instruction: impl Into<String>) -> Self {
        Self {
            snapshot,
            instruction: instruction.into(),
        }
    }
}

/// LIFO undo stack. Entries are never mutated once pushed and there is no
/// redo: a popped entry is handed back to the caller and forgotten.
#[derive(Debug, Clone, Default)]
pub struct EditHistory {
    entries: Vec<HistoryEntry>,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<HistoryEntry> {
        self.entries.pop()
    }

    pub fn has_entries(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}
