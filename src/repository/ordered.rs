//! Insertion-ordered, identifier-unique collection of content items.

use std::collections::HashSet;

use uuid::Uuid;

use crate::models::ContentEnvelope;

/// Ordered set of content, unique by `uuid`.
///
/// Order is first-seen order. Merging a page keeps the position of
/// identifiers already present and appends new ones.
#[derive(Debug, Clone, Default)]
pub struct OrderedContentSet {
    items: Vec<ContentEnvelope>,
    ids: HashSet<Uuid>,
}

impl OrderedContentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    pub fn get(&self, id: &Uuid) -> Option<&ContentEnvelope> {
        self.position(id).map(|i| &self.items[i])
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut ContentEnvelope> {
        let index = self.position(id)?;
        Some(&mut self.items[index])
    }

    pub fn position(&self, id: &Uuid) -> Option<usize> {
        if !self.ids.contains(id) {
            return None;
        }
        self.items.iter().position(|item| item.uuid == *id)
    }

    pub fn items(&self) -> &[ContentEnvelope] {
        &self.items
    }

    /// Appends the item unless its identifier is already present.
    ///
    /// Returns true if the item was added.
    pub fn push(&mut self, item: ContentEnvelope) -> bool {
        if self.ids.insert(item.uuid) {
            self.items.push(item);
            true
        } else {
            false
        }
    }

    /// Merges items, appending only unseen identifiers.
    ///
    /// Returns the number of items added.
    pub fn extend<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = ContentEnvelope>,
    {
        let mut added = 0;
        for item in items {
            if self.push(item) {
                added += 1;
            }
        }
        added
    }

    /// Removes the item with the given identifier.
    pub fn remove(&mut self, id: &Uuid) -> Option<ContentEnvelope> {
        let index = self.position(id)?;
        self.ids.remove(id);
        Some(self.items.remove(index))
    }

    /// Removes the item at `index`, if in range.
    pub fn remove_at(&mut self, index: usize) -> Option<ContentEnvelope> {
        if index >= self.items.len() {
            return None;
        }
        let item = self.items.remove(index);
        self.ids.remove(&item.uuid);
        Some(item)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.ids.clear();
    }

    pub fn to_vec(&self) -> Vec<ContentEnvelope> {
        self.items.clone()
    }
}

impl FromIterator<ContentEnvelope> for OrderedContentSet {
    fn from_iter<I: IntoIterator<Item = ContentEnvelope>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}
