//! Ordered store of host pattern entries.
//!
//! A doubly-linked list over an index arena. Entries are never removed, so
//! indices stay valid for the lifetime of the store.

use std::path::{Path, PathBuf};

/// Leading marker of a wildcard host pattern.
pub const WILDCARD: char = '*';

/// One host pattern and its document root.
#[derive(Debug, Clone)]
pub struct HostEntry {
    pattern: String,
    root: PathBuf,
    wildcard: bool,
    prev: Option<usize>,
    next: Option<usize>,
}

impl HostEntry {
    pub fn new(pattern: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let pattern = pattern.into();
        Self {
            wildcard: pattern.starts_with(WILDCARD),
            pattern,
            root: root.into(),
            prev: None,
            next: None,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// The bare `*` pattern, which matches every host.
    pub fn is_universal(&self) -> bool {
        self.wildcard && self.pattern.len() == WILDCARD.len_utf8()
    }

    pub(crate) fn set_root(&mut self, root: impl Into<PathBuf>) {
        self.root = root.into();
    }

    /// Check a host name against this entry.
    ///
    /// Literal comparison is ASCII case-insensitive. With `allow_prefix`, a
    /// wildcard entry also matches any host ending in the text after `*`.
    pub fn matches(&self, host: &str, allow_prefix: bool) -> bool {
        if host.eq_ignore_ascii_case(&self.pattern) {
            return true;
        }

        if !allow_prefix || !self.wildcard {
            return false;
        }

        let suffix = &self.pattern.as_bytes()[WILDCARD.len_utf8()..];
        let host = host.as_bytes();
        host.len() >= suffix.len() && host[host.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
    }
}

/// Linked list of host entries.
#[derive(Debug, Clone, Default)]
pub struct HostStore {
    entries: Vec<HostEntry>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl HostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn head(&self) -> Option<usize> {
        self.head
    }

    pub fn tail(&self) -> Option<usize> {
        self.tail
    }

    pub fn get(&self, index: usize) -> Option<&HostEntry> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut HostEntry> {
        self.entries.get_mut(index)
    }

    /// Index of the entry whose pattern equals `pattern`, ignoring ASCII case.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.iter_indexed()
            .find(|(_, entry)| entry.pattern.eq_ignore_ascii_case(pattern))
            .map(|(index, _)| index)
    }

    pub fn push_front(&mut self, mut entry: HostEntry) -> usize {
        let index = self.entries.len();
        entry.prev = None;
        entry.next = self.head;
        self.entries.push(entry);

        match self.head {
            Some(head) => self.entries[head].prev = Some(index),
            None => self.tail = Some(index),
        }
        self.head = Some(index);
        index
    }

    pub fn push_back(&mut self, mut entry: HostEntry) -> usize {
        let index = self.entries.len();
        entry.prev = self.tail;
        entry.next = None;
        self.entries.push(entry);

        match self.tail {
            Some(tail) => self.entries[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        index
    }

    /// Link `entry` directly before the entry at `at`.
    pub fn insert_before(&mut self, at: usize, mut entry: HostEntry) -> usize {
        let index = self.entries.len();
        let prev = self.entries[at].prev;
        entry.prev = prev;
        entry.next = Some(at);
        self.entries.push(entry);

        self.entries[at].prev = Some(index);
        match prev {
            Some(prev) => self.entries[prev].next = Some(index),
            None => self.head = Some(index),
        }
        index
    }

    /// Entries in list order.
    pub fn iter(&self) -> impl Iterator<Item = &HostEntry> + '_ {
        self.iter_indexed().map(|(_, entry)| entry)
    }

    fn iter_indexed(&self) -> Iter<'_> {
        Iter {
            store: self,
            cursor: self.head,
        }
    }
}

struct Iter<'a> {
    store: &'a HostStore,
    cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (usize, &'a HostEntry);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let entry = &self.store.entries[index];
        self.cursor = entry.next;
        Some((index, entry))
    }
}
