//! crates/slot_watcher_core/src/domain.rs
//!
//! Defines the pure, core data structures for the watcher.
//! These structs are independent of any browser, database or transport.

use chrono::{DateTime, NaiveDate, Utc};

/// How many days the watcher looks ahead, today included.
pub const WINDOW_DAYS: usize = 8;

/// Date tokens are rendered the way the slot page keys its regions,
/// e.g. `2024-01-02`.
pub const DATE_TOKEN_FORMAT: &str = "%Y-%m-%d";

/// The rolling window of dates inspected each cycle.
///
/// Recomputed fresh at the start of every cycle so the window follows the
/// calendar; never cached across days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow {
    tokens: Vec<String>,
}

impl DateWindow {
    /// Computes the window starting at `today`: [`WINDOW_DAYS`] consecutive
    /// dates, strictly increasing by one calendar day.
    pub fn compute(today: NaiveDate) -> Self {
        let tokens = (0..WINDOW_DAYS as i64)
            .map(|offset| {
                (today + chrono::Duration::days(offset))
                    .format(DATE_TOKEN_FORMAT)
                    .to_string()
            })
            .collect();
        Self { tokens }
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// One element of the rendered page tree: tag name, optional element id,
/// class list and child elements. Text content is irrelevant to slot
/// detection and is not retained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageNode {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub children: Vec<PageNode>,
}

impl PageNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_child(mut self, child: PageNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn has_classes(&self, classes: &[&str]) -> bool {
        classes.iter().all(|class| self.has_class(class))
    }

    /// Depth-first search through this node's subtree, self included.
    pub fn find_by_id(&self, id: &str) -> Option<&PageNode> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_by_id(id))
    }

    /// First node in the subtree (self included) carrying every one of the
    /// given classes.
    pub fn find_with_classes(&self, classes: &[&str]) -> Option<&PageNode> {
        if self.has_classes(classes) {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find_with_classes(classes))
    }
}

/// A queryable snapshot of the rendered slot-selection page.
///
/// Produced fresh each cycle by the page sampler, traversed read-only by the
/// evaluator, then dropped. Nothing outlives the cycle that sampled it.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    roots: Vec<PageNode>,
}

impl PageSnapshot {
    pub fn new(roots: Vec<PageNode>) -> Self {
        Self { roots }
    }

    pub fn find_by_id(&self, id: &str) -> Option<&PageNode> {
        self.roots.iter().find_map(|root| root.find_by_id(id))
    }

    pub fn roots(&self) -> &[PageNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Per-date availability for one cycle, kept in window order.
/// Immutable once the cycle's evaluation is done; discarded after reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilityResult {
    entries: Vec<(String, bool)>,
}

impl AvailabilityResult {
    pub fn record(&mut self, date: impl Into<String>, open: bool) {
        self.entries.push((date.into(), open));
    }

    /// The date tokens that have at least one open slot, in window order.
    pub fn available_dates(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, open)| *open)
            .map(|(date, _)| date.as_str())
            .collect()
    }

    pub fn any_available(&self) -> bool {
        self.entries.iter().any(|(_, open)| *open)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(date, open)| (date.as_str(), *open))
    }
}

/// One notification that was handed to the transport, as persisted in the
/// append-only history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub sent_at: DateTime<Utc>,
    pub message: String,
}
