//! Document model: the local mirror of a room's draw history.
//!
//! The mirror is seeded from the join snapshot and then follows relay events
//! in arrival order. Items are immutable values; a drag replaces one element
//! by index with a moved copy. Any full replace may renumber every index, so
//! callers holding an index must re-check it after [`Mirror::replace_all`].

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use frames::DrawItem;

/// Ordered copy of the room history as this client last saw it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mirror {
    items: Vec<DrawItem>,
}

impl Mirror {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one item at the end of the history.
    pub fn push(&mut self, item: DrawItem) {
        self.items.push(item);
    }

    /// Replace the whole history (snapshot, replace, undo, clear).
    pub fn replace_all(&mut self, items: Vec<DrawItem>) {
        self.items = items;
    }

    /// Swap the item at `index` for `item`. Returns `false` if out of range.
    pub fn set(&mut self, index: usize, item: DrawItem) -> bool {
        let Some(slot) = self.items.get_mut(index) else {
            return false;
        };
        *slot = item;
        true
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&DrawItem> {
        self.items.get(index)
    }

    #[must_use]
    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Image sources referenced by the history, in order, without duplicates.
    #[must_use]
    pub fn image_sources(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for src in self.items.iter().filter_map(DrawItem::image_src) {
            if !seen.contains(&src) {
                seen.push(src);
            }
        }
        seen
    }
}
