//! Condition tree: the boolean query language over user records.
//!
//! A `UserViewCondition` is either a disjunction (`one`), a conjunction
//! (`all`) or a leaf. A leaf names the subject field via `key` and carries
//! one typed sub-condition; which one applies is decided by the resolved
//! field type, not by the caller. Unknown keys and operators evaluate to
//! "matches" for forward compatibility with older stored segments.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserViewCondition {
    pub key: String,
    /// OR of children; wins over `all` when both are set.
    pub one: Vec<UserViewCondition>,
    /// AND of children.
    pub all: Vec<UserViewCondition>,
    pub text: TextCondition,
    pub number: FloatCondition,
    pub boolean: BoolCondition,
    pub datetime: DatetimeCondition,
    /// Tombstone mode: true restricts matches to logically deleted users,
    /// false (default) to live ones. Read from the root only and applied to
    /// every leaf.
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextTransform {
    /// One of `trim`, `lower_case`, `upper_case`.
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextCondition {
    pub op: String,
    pub eq: Vec<String>,
    pub neq: Vec<String>,
    pub contain: Vec<String>,
    pub not_contain: Vec<String>,
    pub start_with: Vec<String>,
    pub not_start_with: Vec<String>,
    pub end_with: Vec<String>,
    pub not_end_with: Vec<String>,
    pub regex: String,
    pub case_sensitive: bool,
    pub accent_sensitive: bool,
    pub transforms: Vec<TextTransform>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloatCondition {
    pub op: String,
    pub eq: Vec<f64>,
    pub neq: Vec<f64>,
    pub gt: f64,
    pub lt: f64,
    pub gte: f64,
    pub lte: f64,
    pub in_range: Vec<f64>,
    pub not_in_range: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoolCondition {
    pub op: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatetimeCondition {
    pub op: String,
    /// Seconds for the `last` window (now-N .. now).
    pub last: i64,
    /// Seconds for `before_ago` (t < now-N).
    pub before_ago: i64,
    /// English weekday names, matched case-insensitively.
    pub days_of_week: Vec<String>,
    /// Millisecond epochs.
    pub after: i64,
    pub before: i64,
    pub between: Vec<i64>,
    pub outside: Vec<i64>,
}

impl UserViewCondition {
    /// Leaf condition on `key` with a text sub-condition. Convenience for
    /// tests and embedding callers.
    pub fn text_leaf<S: Into<String>>(key: S, text: TextCondition) -> Self {
        UserViewCondition { key: key.into(), text, ..Default::default() }
    }

    pub fn any_of(children: Vec<UserViewCondition>) -> Self {
        UserViewCondition { one: children, ..Default::default() }
    }

    pub fn all_of(children: Vec<UserViewCondition>) -> Self {
        UserViewCondition { all: children, ..Default::default() }
    }

    /// First segment id pinned by a `segment` leaf anywhere in the tree.
    /// Used by the `segment_joined` ordering. `eq` literals win over
    /// `contain`.
    pub fn pinned_segment(&self) -> Option<&str> {
        if self.key == "segment" {
            if let Some(id) = self.text.eq.iter().find(|s| !s.is_empty()) {
                return Some(id);
            }
            if let Some(id) = self.text.contain.iter().find(|s| !s.is_empty()) {
                return Some(id);
            }
        }
        self.one.iter().chain(self.all.iter()).find_map(|c| c.pinned_segment())
    }
}
