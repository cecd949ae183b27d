//! Attachment slots
//!
//! A slot is one named attachment position of a record. It holds three kinds of
//! state: files the server already stores (`existing`), files the user picked but
//! has not uploaded (`pending`), and the user's removals of existing files.
//!
//! For `Multiple` slots removals act on the live `existing` array, so indices shift
//! down immediately after each removal. Every existing entry remembers its position
//! in the server's storage order (`origin`), which is what keep markers carry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::file::{PendingFile, StoredFile};
use super::schema::SlotDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    Single,
    Multiple,
}

/// An existing file and its index in the server's storage order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingFile {
    pub origin: usize,
    pub file: StoredFile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotState {
    Single {
        existing: Option<StoredFile>,
        existing_removed: bool,
        pending: Option<PendingFile>,
    },
    Multiple {
        /// Live array: removed entries are gone, survivors keep their `origin`.
        existing: Vec<ExistingFile>,
        /// Origins removed since the record was loaded.
        removed: BTreeSet<usize>,
        pending: Vec<PendingFile>,
    },
}

/// Where a slot is in its edit lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPhase {
    Empty,
    HasExisting,
    /// Existing files are still present and new files are waiting to be uploaded.
    PendingReplace,
    PendingOnly,
    /// A successful submit dropped the last stored file.
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("{slot} has no existing file at index {index} ({len} present)")]
    IndexOutOfRange {
        slot: String,
        index: usize,
        len: usize,
    },

    #[error("{slot} holds several files; an index is required")]
    MissingIndex { slot: String },

    #[error("{slot} holds a single file; no index is accepted")]
    UnexpectedIndex { slot: String },

    #[error("{slot} has nothing to remove")]
    NothingToRemove { slot: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentSlot {
    name: String,
    required: bool,
    state: SlotState,
    cleared: bool,
}

impl AttachmentSlot {
    pub fn empty(definition: &SlotDefinition) -> Self {
        Self::from_stored(definition, Vec::new())
    }

    /// Slot populated from the server's files, no pending files or removals.
    /// A `Single` slot keeps the first file if the server sent several.
    pub fn from_stored(definition: &SlotDefinition, files: Vec<StoredFile>) -> Self {
        let state = match definition.cardinality {
            Cardinality::Single => SlotState::Single {
                existing: files.into_iter().next(),
                existing_removed: false,
                pending: None,
            },
            Cardinality::Multiple => SlotState::Multiple {
                existing: files
                    .into_iter()
                    .enumerate()
                    .map(|(origin, file)| ExistingFile { origin, file })
                    .collect(),
                removed: BTreeSet::new(),
                pending: Vec::new(),
            },
        };
        Self {
            name: definition.name.to_string(),
            required: definition.is_required(),
            state,
            cleared: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn cardinality(&self) -> Cardinality {
        match self.state {
            SlotState::Single { .. } => Cardinality::Single,
            SlotState::Multiple { .. } => Cardinality::Multiple,
        }
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    /// Replaces the pending selection. `Single` keeps only the first file; an empty
    /// selection clears whatever was pending.
    pub fn select_pending(&mut self, files: Vec<PendingFile>) {
        match &mut self.state {
            SlotState::Single { pending, .. } => {
                *pending = files.into_iter().next();
            }
            SlotState::Multiple { pending, .. } => {
                *pending = files;
            }
        }
        if self.has_pending() {
            self.cleared = false;
        }
    }

    /// Marks an existing file as removed and returns it.
    ///
    /// For `Multiple` slots `index` addresses the current live array.
    pub fn mark_existing_removed(&mut self, index: Option<usize>) -> Result<StoredFile, SlotError> {
        let slot = self.name.clone();
        match &mut self.state {
            SlotState::Single {
                existing,
                existing_removed,
                ..
            } => {
                if index.is_some() {
                    return Err(SlotError::UnexpectedIndex { slot });
                }
                match existing {
                    Some(file) if !*existing_removed => {
                        *existing_removed = true;
                        Ok(file.clone())
                    }
                    _ => Err(SlotError::NothingToRemove { slot }),
                }
            }
            SlotState::Multiple {
                existing, removed, ..
            } => {
                let index = index.ok_or(SlotError::MissingIndex { slot: slot.clone() })?;
                if index >= existing.len() {
                    return Err(SlotError::IndexOutOfRange {
                        slot,
                        index,
                        len: existing.len(),
                    });
                }
                let entry = existing.remove(index);
                removed.insert(entry.origin);
                Ok(entry.file)
            }
        }
    }

    /// Drops one pending file (for `Multiple`, the one at `index`).
    pub fn remove_pending(&mut self, index: Option<usize>) -> Result<PendingFile, SlotError> {
        let slot = self.name.clone();
        match &mut self.state {
            SlotState::Single { pending, .. } => {
                if index.is_some() {
                    return Err(SlotError::UnexpectedIndex { slot });
                }
                pending.take().ok_or(SlotError::NothingToRemove { slot })
            }
            SlotState::Multiple { pending, .. } => {
                let index = index.ok_or(SlotError::MissingIndex { slot: slot.clone() })?;
                if index >= pending.len() {
                    return Err(SlotError::IndexOutOfRange {
                        slot,
                        index,
                        len: pending.len(),
                    });
                }
                Ok(pending.remove(index))
            }
        }
    }

    /// Existing files that are still kept, with their server-side index for `Multiple`.
    pub fn kept_existing(&self) -> Vec<(Option<usize>, &StoredFile)> {
        match &self.state {
            SlotState::Single {
                existing,
                existing_removed,
                ..
            } => match existing {
                Some(file) if !*existing_removed => vec![(None, file)],
                _ => Vec::new(),
            },
            SlotState::Multiple { existing, .. } => existing
                .iter()
                .map(|entry| (Some(entry.origin), &entry.file))
                .collect(),
        }
    }

    pub fn pending_files(&self) -> Vec<&PendingFile> {
        match &self.state {
            SlotState::Single { pending, .. } => pending.iter().collect(),
            SlotState::Multiple { pending, .. } => pending.iter().collect(),
        }
    }

    /// Every stored file the server knows for this slot, removed or not.
    pub fn stored_count(&self) -> usize {
        match &self.state {
            SlotState::Single { existing, .. } => usize::from(existing.is_some()),
            SlotState::Multiple {
                existing, removed, ..
            } => existing.len() + removed.len(),
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_files().is_empty()
    }

    pub fn has_kept_existing(&self) -> bool {
        !self.kept_existing().is_empty()
    }

    pub fn is_satisfied(&self) -> bool {
        self.has_kept_existing() || self.has_pending()
    }

    /// True when the user has picked files or removed stored ones.
    pub fn has_local_changes(&self) -> bool {
        match &self.state {
            SlotState::Single {
                existing_removed,
                pending,
                ..
            } => *existing_removed || pending.is_some(),
            SlotState::Multiple {
                removed, pending, ..
            } => !removed.is_empty() || !pending.is_empty(),
        }
    }

    pub fn phase(&self) -> SlotPhase {
        match (self.has_kept_existing(), self.has_pending()) {
            (true, true) => SlotPhase::PendingReplace,
            (true, false) => SlotPhase::HasExisting,
            (false, true) => SlotPhase::PendingOnly,
            (false, false) if self.cleared => SlotPhase::Cleared,
            (false, false) => SlotPhase::Empty,
        }
    }

    pub(crate) fn mark_cleared(&mut self) {
        self.cleared = true;
    }
}
