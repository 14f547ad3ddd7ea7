//! Handling of taken-down / inaccessible videos.
//!
//! Whether a record is inaccessible is decided by the fetch side (the
//! gateway reports takedowns in several shapes); the core only consumes the
//! resulting boolean and pins down what an inaccessible row looks like.

use crate::normalization::statistics::Statistics;

/// Title written for videos that are gone. This exact string is also how
/// the sync completeness check recognizes rows it should re-try.
pub const UNAVAILABLE_TITLE: &str = "视频已下架";

/// The values forced onto an inaccessible record: sentinel title, all
/// counters zero. Identity fields (id, author, link) keep mapping normally,
/// since they stay known even for removed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TakedownOverride {
    pub title: &'static str,
    pub statistics: Statistics,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeletionDetector;

impl DeletionDetector {
    /// Map the fetch collaborator's accessibility flag to an override.
    pub fn classify(&self, inaccessible: bool) -> Option<TakedownOverride> {
        inaccessible.then(|| TakedownOverride {
            title: UNAVAILABLE_TITLE,
            statistics: Statistics::default(),
        })
    }
}
