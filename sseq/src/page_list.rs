use crate::error::SseqError;
use crate::model::{Page, INFINITY};
use serde::{Deserialize, Serialize};

/// A page breakpoint: either a single page or an inclusive page range.
/// On the wire a range is a two-element array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageEntry {
    Page(Page),
    Range([Page; 2]),
}

impl PageEntry {
    /// Sort key.
    pub fn start(&self) -> Page {
        match *self {
            PageEntry::Page(p) => p,
            PageEntry::Range([s, _]) => s,
        }
    }
    pub fn end(&self) -> Page {
        match *self {
            PageEntry::Page(p) => p,
            PageEntry::Range([_, e]) => e,
        }
    }
    pub fn is_range(&self) -> bool {
        matches!(self, PageEntry::Range(_))
    }
    pub fn contains(&self, page: Page) -> bool {
        self.start() <= page && page <= self.end()
    }
}

/// Sorted list of the pages at which the diagram's visible content changes.
///
/// Always holds `0` and [`INFINITY`]. A scalar page and a range with the same
/// start coexist, the range ordered first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PageList {
    entries: Vec<PageEntry>,
}

impl Default for PageList {
    fn default() -> Self {
        PageList {
            entries: vec![PageEntry::Page(0), PageEntry::Page(INFINITY)],
        }
    }
}

impl PageList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored entries. Entries must already be sorted by start;
    /// missing `0` / infinity breakpoints are restored.
    pub fn from_entries(entries: Vec<PageEntry>) -> Result<Self, SseqError> {
        if entries.windows(2).any(|w| w[0].start() > w[1].start()) {
            return Err(SseqError::InvalidDocument("page_list is not sorted".into()));
        }
        if let Some(PageEntry::Range([s, e])) = entries.iter().find(|p| p.start() > p.end()) {
            return Err(SseqError::InvalidDocument(format!("page range [{s}, {e}] is inverted")));
        }
        if let Some(p) = entries.iter().find(|p| p.end() > INFINITY) {
            return Err(SseqError::InvalidDocument(format!("page {} is past infinity", p.end())));
        }
        let mut list = PageList { entries };
        list.add_page(0);
        if !list.entries.contains(&PageEntry::Page(INFINITY)) {
            list.add_page(INFINITY);
        }
        Ok(list)
    }

    pub fn entries(&self) -> &[PageEntry] {
        &self.entries
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn get(&self, i: usize) -> Option<PageEntry> {
        self.entries.get(i).copied()
    }
    pub fn iter(&self) -> impl Iterator<Item = &PageEntry> {
        self.entries.iter()
    }
    /// Start of the final breakpoint; the E-infinity page.
    pub fn last_page(&self) -> Page {
        self.entries.last().map_or(INFINITY, PageEntry::start)
    }

    /// Insert `page` before the first entry starting after it. An equal
    /// scalar makes this a no-op; a range with the same start does not.
    /// Pages past [`INFINITY`] are ignored.
    pub fn add_page(&mut self, page: Page) -> &mut Self {
        if page > INFINITY {
            tracing::warn!(page, "ignoring page past infinity");
            return self;
        }
        for i in 0..self.entries.len() {
            match self.entries[i] {
                PageEntry::Page(p) if p == page => return self,
                entry if entry.start() > page => {
                    self.entries.insert(i, PageEntry::Page(page));
                    return self;
                }
                _ => {}
            }
        }
        self.entries.push(PageEntry::Page(page));
        self
    }

    /// Insert `[start, end]` by its start. A range already present at the same
    /// start absorbs a new one that is no wider, and is replaced by a wider one.
    /// The end is capped at [`INFINITY`].
    pub fn add_page_range(&mut self, start: Page, end: Page) -> &mut Self {
        if start > end {
            tracing::warn!(start, end, "ignoring inverted page range");
            return self;
        }
        if start > INFINITY {
            tracing::warn!(start, end, "ignoring page range past infinity");
            return self;
        }
        let end = end.min(INFINITY);
        let range = PageEntry::Range([start, end]);
        for i in 0..self.entries.len() {
            let entry = self.entries[i];
            if entry.start() > start {
                self.entries.insert(i, range);
                return self;
            }
            if entry.start() == start {
                match entry {
                    PageEntry::Page(_) => self.entries.insert(i, range),
                    PageEntry::Range([_, existing_end]) => {
                        if end > existing_end {
                            self.entries[i] = range;
                        }
                    }
                }
                return self;
            }
        }
        self.entries.push(range);
        self
    }
}
