//! Wire-level data model for the segmentation query core.
//!
//! Every type here round-trips through JSON between the coordinator and the
//! shard executors. All fields default so that partially-populated records
//! degrade to type zeros, which is what the evaluator expects for absent
//! paths.

use serde::{Deserialize, Serialize};

use crate::business_hours::BusinessHours;

/// UTM campaign tags nested under a device record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Utm {
    pub name: String,
    pub source: String,
    pub medium: String,
    pub term: String,
    pub content: String,
}

/// Device snapshot captured on a content view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub ip: String,
    pub language: String,
    pub page_title: String,
    pub page_url: String,
    pub platform: String,
    pub referrer: String,
    pub screen_resolution: String,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub user_agent: String,
    pub utm: Utm,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewBy {
    pub device: Device,
}

/// Event-like nested record (`start_content_view` / `first_content_view`).
/// Presence of the record itself is meaningful to text conditions; inner
/// fields just default to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentView {
    pub by: ViewBy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attribute {
    pub key: String,
    pub text: String,
    pub number: f64,
    /// RFC3339 timestamp; unparsable values are treated as epoch 0.
    pub datetime: String,
    pub boolean: bool,
    pub other_values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Label {
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentMembership {
    pub segment_id: String,
    /// Unix seconds at which the user joined the segment.
    pub created: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub account_id: String,
    pub channel: String,
    pub channel_source: String,
    /// Non-empty means this record is a merge alias and must never appear in
    /// results.
    pub primary_id: String,
    /// 0 = live, >0 = tombstone timestamp.
    pub deleted: i64,
    pub attributes: Vec<Attribute>,
    pub labels: Vec<Label>,
    pub segments: Vec<SegmentMembership>,
    pub lead_owners: Vec<String>,
    pub lead_conversion_bys: Vec<String>,
    pub start_content_view: Option<ContentView>,
    pub first_content_view: Option<ContentView>,
}

/// One page of query results as returned by a shard and by the coordinator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Users {
    pub users: Vec<User>,
    /// Users returned in this page.
    pub hit: i64,
    /// Sum of per-shard match counts.
    pub total: i64,
    /// Opaque continuation token; empty on the last page.
    pub anchor: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Segment {
    pub id: String,
    pub members: Vec<String>,
    pub total: i64,
}

/// Shard response shape shared by the count and list-segment operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Segments {
    pub segments: Vec<Segment>,
}

/// Tenant owning the users under query. Only the fields the evaluator needs
/// travel on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    pub id: String,
    pub timezone: String,
    pub business_hours: BusinessHours,
}

impl Account {
    /// The slice of the account that is forwarded to shard executors.
    pub fn scoped(&self) -> Account {
        Account {
            id: self.id.clone(),
            timezone: self.timezone.clone(),
            business_hours: self.business_hours.clone(),
        }
    }
}

/// Request envelope posted to the shard executors. `condition` is set for
/// single-condition queries, `conditions` for count/batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<crate::condition::UserViewCondition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<crate::condition::UserViewCondition>,
    pub account: Account,
    pub def: crate::schema::SchemaRegistry,
    pub ignore_uids: Vec<String>,
}
