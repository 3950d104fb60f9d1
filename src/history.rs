use url::Url;

use crate::document::DocumentId;

/// One loaded document's identity within one history list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEntry {
    url: Url,
    document: DocumentId,
    title: String,
}

impl NavigationEntry {
    pub fn new(url: Url, document: DocumentId, title: impl Into<String>) -> Self {
        Self {
            url,
            document,
            title: title.into(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn document(&self) -> DocumentId {
        self.document
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryTraversal {
    pub from: usize,
    pub to: usize,
}

/// Ordered entries plus the current index.
///
/// `index < len()` holds whenever the list is non-empty. Pushing while the
/// index is not on the last entry drops everything after it first.
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    entries: Vec<NavigationEntry>,
    index: usize,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&NavigationEntry> {
        self.entries.get(self.index)
    }

    /// `None` outside `[0, len)`.
    pub fn item(&self, index: usize) -> Option<&NavigationEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[NavigationEntry] {
        &self.entries
    }

    /// Appends `entry` after the current one and returns the forward entries
    /// that were discarded to make room.
    pub fn push(&mut self, entry: NavigationEntry) -> Vec<NavigationEntry> {
        let keep = if self.entries.is_empty() {
            0
        } else {
            self.index.saturating_add(1).min(self.entries.len())
        };
        let discarded = self.entries.split_off(keep);
        self.entries.push(entry);
        self.index = self.entries.len() - 1;
        discarded
    }

    /// Overwrites the current entry, returning the old one. On an empty list
    /// this behaves like `push`.
    pub fn replace(&mut self, entry: NavigationEntry) -> Option<NavigationEntry> {
        if self.entries.is_empty() {
            self.entries.push(entry);
            self.index = 0;
            return None;
        }
        let index = self.index.min(self.entries.len() - 1);
        self.index = index;
        Some(std::mem::replace(&mut self.entries[index], entry))
    }

    /// Moves the index by `delta`. Out-of-range targets leave the list
    /// untouched and return `None`.
    pub fn go(&mut self, delta: i64) -> Option<HistoryTraversal> {
        if self.entries.is_empty() {
            return None;
        }
        let current = i64::try_from(self.index).ok()?;
        let target = current.checked_add(delta)?;
        let length = i64::try_from(self.entries.len()).ok()?;
        if target < 0 || target >= length {
            return None;
        }
        let target = usize::try_from(target).ok()?;
        let from = self.index;
        self.index = target;
        Some(HistoryTraversal { from, to: target })
    }

    pub fn back(&mut self) -> Option<HistoryTraversal> {
        self.go(-1)
    }

    pub fn forward(&mut self) -> Option<HistoryTraversal> {
        self.go(1)
    }

    pub fn references(&self, document: DocumentId) -> bool {
        self.entries.iter().any(|entry| entry.document == document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, document: usize) -> NavigationEntry {
        let url = Url::parse(&format!("http://app.local/{path}")).expect("valid url");
        NavigationEntry::new(url, DocumentId(document), path)
    }

    fn paths(history: &SessionHistory) -> Vec<String> {
        history
            .entries()
            .iter()
            .map(|entry| entry.title().to_string())
            .collect()
    }

    #[test]
    fn push_after_back_truncates_forward_entries() {
        let mut history = SessionHistory::new();
        history.push(entry("a", 0));
        history.push(entry("b", 1));
        history.push(entry("b#x", 1));
        assert_eq!((history.len(), history.index()), (3, 2));

        assert!(history.back().is_some());
        assert!(history.back().is_some());
        assert!(history.forward().is_some());
        assert_eq!(history.index(), 1);

        let discarded = history.push(entry("c", 2));
        assert_eq!(discarded, vec![entry("b#x", 1)]);
        assert_eq!(paths(&history), vec!["a", "b", "c"]);
        assert_eq!(history.index(), 2);
    }

    #[test]
    fn replace_keeps_index_and_length() {
        let mut history = SessionHistory::new();
        assert_eq!(history.replace(entry("a", 0)), None);
        history.push(entry("b", 1));
        history.back();
        let old = history.replace(entry("a2", 2));
        assert_eq!(old, Some(entry("a", 0)));
        assert_eq!(paths(&history), vec!["a2", "b"]);
        assert_eq!(history.index(), 0);
    }

    #[test]
    fn go_out_of_range_is_a_noop() {
        let mut history = SessionHistory::new();
        assert_eq!(history.go(0), None);
        history.push(entry("a", 0));
        history.push(entry("b", 1));
        assert_eq!(history.go(1), None);
        assert_eq!(history.go(-2), None);
        assert_eq!(history.go(i64::MIN), None);
        assert_eq!(history.go(i64::MAX), None);
        assert_eq!(history.index(), 1);
        assert_eq!(history.go(-1), Some(HistoryTraversal { from: 1, to: 0 }));
    }

    #[test]
    fn item_outside_range_is_unavailable() {
        let mut history = SessionHistory::new();
        history.push(entry("a", 0));
        assert!(history.item(0).is_some());
        assert!(history.item(1).is_none());
        assert!(history.references(DocumentId(0)));
        assert!(!history.references(DocumentId(1)));
    }
}
