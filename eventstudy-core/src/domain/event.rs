//! Analyst rating-change events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical event type. The set is closed: every surviving recommendation
/// maps to exactly one of these or classification fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Upgrade,
    Downgrade,
}

impl EventType {
    /// Substring tokens that qualify an action label as a rating change.
    pub const UP_TOKEN: &'static str = "up";
    pub const DOWN_TOKEN: &'static str = "down";

    /// True if the action label names a rating change at all.
    ///
    /// Plain substring containment, case-sensitive: a label such as
    /// "backup" qualifies as "up".
    pub fn is_rating_change(action: &str) -> bool {
        action.contains(Self::UP_TOKEN) || action.contains(Self::DOWN_TOKEN)
    }

    /// Classify an action label. `None` if it carries neither token.
    ///
    /// "down" takes precedence when both tokens are present.
    pub fn from_action(action: &str) -> Option<Self> {
        match (action.contains(Self::DOWN_TOKEN), action.contains(Self::UP_TOKEN)) {
            (true, _) => Some(Self::Downgrade),
            (false, true) => Some(Self::Upgrade),
            (false, false) => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upgrade => "upgrade",
            Self::Downgrade => "downgrade",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the events table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Dense 1-based row identifier.
    pub event_id: usize,
    /// `YYYY-MM-DD`
    pub event_date: String,
    /// Uppercased firm name.
    pub firm: String,
    pub event_type: EventType,
}
