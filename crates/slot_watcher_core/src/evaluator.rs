//! crates/slot_watcher_core/src/evaluator.rs
//!
//! Decides whether a date in the rolling window has an open unattended
//! delivery slot, given a snapshot of the rendered page.

use std::fmt;

use tracing::debug;

use crate::domain::{PageNode, PageSnapshot};

/// Region id of the unattended sub-group inside a date's slot container.
pub const UNATTENDED_REGION_ID: &str = "slot-container-UNATTENDED";

/// Classes the site puts on its "no availability" informational alert box.
const ALERT_CLASSES: [&str; 3] = ["a-box", "a-alert", "a-alert-info"];

/// Class marking a slot entry the site has made unselectable.
const DISABLED_ENTRY_CLASS: &str = "disabledRadioBox";

/// Id of the region scoped to one calendar date.
pub fn slot_container_id(date: &str) -> String {
    format!("slot-container-{date}")
}

/// Id of the element whose immediate children are the date's slot entries.
pub fn entry_group_id(date: &str) -> String {
    format!("root-{date}-UNATTENDED-box-group")
}

/// Which expected region was absent from a date's slot container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingRegion {
    Unattended,
    EntryGroup,
}

impl fmt::Display for MissingRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unattended => write!(f, "unattended"),
            Self::EntryGroup => write!(f, "entry box group"),
        }
    }
}

/// A date's slot container exists but lacks a region it always carries.
///
/// Historically this means the site changed its page format, so it is
/// surfaced as a fault distinct from a definitive "no slots for this date".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("slot container for {date} is missing its {region} region")]
pub struct StructureMismatch {
    pub date: String,
    pub region: MissingRegion,
}

/// Returns whether `date` has at least one selectable unattended slot.
///
/// - No container for the date on the page: `Ok(false)`; the page knows
///   nothing about that date.
/// - Container present but the unattended region or its entry group is
///   absent: `Err(StructureMismatch)`.
/// - Informational alert present in the unattended region: `Ok(false)`,
///   without counting entries.
/// - Otherwise `Ok(true)` iff the entry count strictly exceeds the disabled
///   count. Equal counts, zero included, mean nothing is bookable.
pub fn has_open_slot(snapshot: &PageSnapshot, date: &str) -> Result<bool, StructureMismatch> {
    debug!(date, "checking for open slots");

    let container = match snapshot.find_by_id(&slot_container_id(date)) {
        Some(node) => node,
        None => {
            debug!(date, "no slot container on the page");
            return Ok(false);
        }
    };

    let unattended =
        container
            .find_by_id(UNATTENDED_REGION_ID)
            .ok_or_else(|| StructureMismatch {
                date: date.to_string(),
                region: MissingRegion::Unattended,
            })?;

    if unattended.find_with_classes(&ALERT_CLASSES).is_some() {
        debug!(date, "alert box present, no availability");
        return Ok(false);
    }

    let group = unattended
        .find_by_id(&entry_group_id(date))
        .ok_or_else(|| StructureMismatch {
            date: date.to_string(),
            region: MissingRegion::EntryGroup,
        })?;

    let entries: Vec<&PageNode> = group
        .children
        .iter()
        .filter(|node| node.tag == "div")
        .collect();
    let disabled = entries
        .iter()
        .filter(|node| node.has_class(DISABLED_ENTRY_CLASS))
        .count();

    debug!(date, total = entries.len(), disabled, "counted slot entries");
    Ok(entries.len() > disabled)
}
