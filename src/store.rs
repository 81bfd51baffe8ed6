use std::collections::{HashMap, HashSet};

use crate::models::{JobRecord, ListContext};

/// In-memory feed state: the last-known snapshot, cycle flags, bookmarks,
/// and per-page card expansion. Bookmarks and expansion survive snapshot
/// replacement; the snapshot is only ever swapped wholesale by the fetch
/// cycle.
#[derive(Debug)]
pub struct FeedStore {
    jobs: Vec<JobRecord>,
    is_loading: bool,
    error_message: Option<String>,
    bookmarks: HashSet<String>,
    expanded: HashMap<ListContext, String>,
}

impl FeedStore {
    // Starts in the loading state; the first cycle settles it.
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            is_loading: true,
            error_message: None,
            bookmarks: HashSet::new(),
            expanded: HashMap::new(),
        }
    }

    // --- Cycle hooks (called only by the fetcher) ---

    pub fn begin_cycle(&mut self) {
        self.is_loading = true;
        self.error_message = None;
    }

    pub fn apply_snapshot(&mut self, jobs: Vec<JobRecord>) {
        self.jobs = jobs;
        self.error_message = None;
    }

    // Failed cycles empty the list instead of serving a stale snapshot; the
    // error stays visible until a later cycle succeeds.
    pub fn apply_failure(&mut self, message: impl Into<String>) {
        self.jobs.clear();
        self.error_message = Some(message.into());
    }

    pub fn end_cycle(&mut self) {
        self.is_loading = false;
    }

    // --- Reads ---

    pub fn snapshot(&self) -> &[JobRecord] {
        &self.jobs
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    // Stable sort, so jobs posted the same number of days ago keep their
    // payload order.
    pub fn sorted_jobs(&self) -> Vec<JobRecord> {
        let mut jobs = self.jobs.clone();
        jobs.sort_by_key(|job| job.posted_days_ago);
        jobs
    }

    pub fn bookmarked_jobs(&self) -> Vec<JobRecord> {
        self.sorted_jobs()
            .into_iter()
            .filter(|job| self.bookmarks.contains(&job.id))
            .collect()
    }

    pub fn bookmarks(&self) -> &HashSet<String> {
        &self.bookmarks
    }

    pub fn bookmark_count(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_bookmarked(&self, id: &str) -> bool {
        self.bookmarks.contains(id)
    }

    pub fn expanded(&self, context: ListContext) -> Option<&str> {
        self.expanded.get(&context).map(String::as_str)
    }

    // --- User actions ---

    pub fn toggle_bookmark(&mut self, id: &str) {
        if !self.bookmarks.remove(id) {
            self.bookmarks.insert(id.to_string());
        }
    }

    // Selecting the expanded card again collapses it; selecting another card
    // moves the expansion. Each page keeps at most one expanded card.
    pub fn toggle_expanded(&mut self, context: ListContext, id: &str) {
        match self.expanded.get(&context) {
            Some(current) if current == id => {
                self.expanded.remove(&context);
            }
            _ => {
                self.expanded.insert(context, id.to_string());
            }
        }
    }
}

impl Default for FeedStore {
    fn default() -> Self {
        Self::new()
    }
}
