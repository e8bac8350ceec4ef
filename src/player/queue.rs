//! Ordered play queue with stable positions and mode-dependent ordering.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

use super::error::PlayerError;
use crate::item::AudioItem;

const QUEUE_LOG_TARGET: &str = "audiopilot::player::queue";

/// Independent playback flags. `repeat` (repeat the current item) takes
/// precedence over `repeat_all` when an item ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackMode {
    #[serde(default)]
    shuffle: bool,
    #[serde(default)]
    repeat: bool,
    #[serde(default)]
    repeat_all: bool,
}

impl PlaybackMode {
    /// Sequential order, no repeats.
    pub fn normal() -> Self {
        Self::default()
    }

    pub fn shuffle(self) -> bool {
        self.shuffle
    }

    pub fn repeat(self) -> bool {
        self.repeat
    }

    pub fn repeat_all(self) -> bool {
        self.repeat_all
    }

    pub fn with_shuffle(mut self, on: bool) -> Self {
        self.shuffle = on;
        self
    }

    pub fn with_repeat(mut self, on: bool) -> Self {
        self.repeat = on;
        self
    }

    pub fn with_repeat_all(mut self, on: bool) -> Self {
        self.repeat_all = on;
        self
    }
}

/// A queue slot. The position is assigned at enqueue time, never renumbered;
/// it is the sequential sort key and the stable identity used to track the
/// current entry across reordering.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub position: usize,
    pub item: Arc<AudioItem>,
}

/// Outcome of a `previous` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviousStep {
    /// The selection moved to an earlier (or wrapped) entry.
    Moved,
    /// No earlier entry exists; the caller should seek the current item to
    /// its start instead.
    SeekToStart,
}

#[derive(Debug, Default)]
pub struct PlayQueue {
    entries: Vec<QueueEntry>,
    current_index: Option<usize>,
    next_position: usize,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Index of the current entry in the *current* ordering, not its
    /// position.
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current(&self) -> Option<&QueueEntry> {
        self.current_index.and_then(|i| self.entries.get(i))
    }

    /// Discards the queue and enqueues `items` with fresh positions `0..n`,
    /// then applies the mode ordering. Selects the entry whose *position*
    /// equals `start_index`, clamping out-of-range values to position 0.
    pub fn replace(
        &mut self,
        items: Vec<Arc<AudioItem>>,
        start_index: usize,
        mode: PlaybackMode,
    ) -> Result<Arc<AudioItem>, PlayerError> {
        self.entries = items
            .into_iter()
            .enumerate()
            .map(|(position, item)| QueueEntry { position, item })
            .collect();
        self.next_position = self.entries.len();
        self.current_index = None;
        if self.entries.is_empty() {
            return Err(PlayerError::EmptyQueue);
        }

        self.reorder_for_mode(mode);
        let start_position = if start_index < self.entries.len() {
            start_index
        } else {
            0
        };
        self.current_index = self
            .entries
            .iter()
            .position(|e| e.position == start_position);
        match self.current() {
            Some(entry) => Ok(entry.item.clone()),
            // Positions cover exactly 0..n, so the lookup cannot miss.
            None => Err(PlayerError::EmptyQueue),
        }
    }

    /// Appends `items` with continuing positions and re-applies the mode
    /// ordering. When nothing was selected beforehand this behaves as
    /// `replace`: the earliest-position entry becomes current and is
    /// returned.
    pub fn append(&mut self, items: Vec<Arc<AudioItem>>, mode: PlaybackMode) -> Option<Arc<AudioItem>> {
        if items.is_empty() {
            return None;
        }
        let had_selection = self.current_index.is_some();
        for item in items {
            let position = self.next_position;
            self.next_position += 1;
            self.entries.push(QueueEntry { position, item });
        }
        self.reorder_for_mode(mode);

        if had_selection {
            None
        } else {
            let first = self.entries.iter().min_by_key(|e| e.position)?.position;
            self.current_index = self.entries.iter().position(|e| e.position == first);
            self.current().map(|e| e.item.clone())
        }
    }

    /// Removes the entry at `index` in the current ordering. A surviving
    /// selection keeps pointing at the same entry; removing the current
    /// entry leaves the selection on the slot that slid into its place, or
    /// clears it at the tail. Callers decide what that means for playback.
    pub fn remove_at(&mut self, index: usize) -> Result<QueueEntry, PlayerError> {
        if index >= self.entries.len() {
            return Err(PlayerError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        let removed = self.entries.remove(index);
        if let Some(current) = self.current_index {
            if self.entries.is_empty() {
                self.current_index = None;
            } else if index < current {
                self.current_index = Some(current - 1);
            } else if index == current && current >= self.entries.len() {
                self.current_index = None;
            }
        }
        Ok(removed)
    }

    /// Shuffle produces an arbitrary permutation; sequential restores
    /// ascending-by-position order. Either way the selection follows the
    /// entry it pointed at, not its numeric slot.
    pub fn reorder_for_mode(&mut self, mode: PlaybackMode) {
        let current_position = self.current().map(|e| e.position);
        if mode.shuffle() {
            self.entries.shuffle(&mut rand::thread_rng());
        } else {
            self.entries.sort_by_key(|e| e.position);
        }
        if let Some(position) = current_position {
            self.current_index = self.entries.iter().position(|e| e.position == position);
        }
        trace!(target: QUEUE_LOG_TARGET, len = self.entries.len(), current = ?self.current_index, "queue reordered");
    }

    pub fn has_next(&self, mode: PlaybackMode) -> bool {
        match self.current_index {
            Some(i) => i + 1 < self.entries.len() || (mode.repeat_all() && !self.entries.is_empty()),
            None => false,
        }
    }

    /// Advances the selection. Returns true when it moved; at the end of
    /// the queue without `repeat_all` the selection is left untouched.
    pub fn advance_next(&mut self, mode: PlaybackMode) -> bool {
        match self.current_index {
            Some(i) if i + 1 < self.entries.len() => {
                self.current_index = Some(i + 1);
                true
            }
            Some(_) if mode.repeat_all() && !self.entries.is_empty() => {
                self.current_index = Some(0);
                true
            }
            _ => false,
        }
    }

    pub fn step_previous(&mut self, mode: PlaybackMode) -> PreviousStep {
        match self.current_index {
            Some(i) if i > 0 => {
                self.current_index = Some(i - 1);
                PreviousStep::Moved
            }
            Some(_) if mode.repeat_all() && !self.entries.is_empty() => {
                self.current_index = Some(self.entries.len() - 1);
                PreviousStep::Moved
            }
            _ => PreviousStep::SeekToStart,
        }
    }

    /// Moves the selection to a specific slot in the current ordering.
    pub(crate) fn select_slot(&mut self, index: usize) -> bool {
        if index < self.entries.len() {
            self.current_index = Some(index);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_index = None;
    }
}
