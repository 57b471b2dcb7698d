//! Predicate evaluator: interprets a condition tree against a user record.
//!
//! `matches` walks the OR/AND structure with short-circuit and dispatches
//! leaves by `key`. Well-known keys read fixed fields; `attr:KEY` leaves
//! resolve a schema-defined attribute and pick the typed evaluator from the
//! definition. Unknown keys and operators evaluate to "matches" so segments
//! stored against an older schema keep returning results.

pub mod datetime;
pub mod number;
pub mod text;


use crate::condition::{TextCondition, UserViewCondition};
use crate::model::{Account, Device, User};
use crate::schema::{SchemaRegistry, TYPE_BOOLEAN, TYPE_DATETIME, TYPE_LIST, TYPE_NUMBER, TYPE_TEXT};
use crate::textnorm::{fold_accents, strip_spaces};

use self::datetime::evaluate_datetime;
use self::number::{evaluate_bool, evaluate_float};
use self::text::{evaluate_text, evaluate_text_any};

/// Does `user` satisfy `cond`? The root condition's tombstone flag applies to
/// every leaf, whatever nesting level it sits at.
pub fn matches(acc: &Account, defs: &SchemaRegistry, user: &User, cond: &UserViewCondition) -> bool {
    check(acc, defs, user, cond, cond.deleted)
}

fn check(
    acc: &Account,
    defs: &SchemaRegistry,
    user: &User,
    cond: &UserViewCondition,
    deleted: bool,
) -> bool {
    if !cond.one.is_empty() {
        return cond.one.iter().any(|c| check(acc, defs, user, c, deleted));
    }
    if !cond.all.is_empty() {
        return cond.all.iter().all(|c| check(acc, defs, user, c, deleted));
    }
    evaluate_leaf(acc, defs, user, cond, deleted)
}

/// Attribute value resolved against a user, with a presence flag.
#[derive(Debug, Clone, Default)]
pub struct AttrValue {
    pub text: String,
    pub number: f64,
    pub datetime_ms: i64,
    pub boolean: bool,
    pub list: Vec<String>,
    pub present: bool,
}

/// First attribute with a matching key. Absent keys resolve to type zeros
/// with `present == false`; an unparsable datetime resolves to epoch 0.
pub fn find_attr(user: &User, key: &str) -> AttrValue {
    for a in &user.attributes {
        if a.key != key {
            continue;
        }
        let datetime_ms = chrono::DateTime::parse_from_rfc3339(&a.datetime)
            .map(|t| t.timestamp_millis())
            .unwrap_or(0);
        let mut list = Vec::with_capacity(1 + a.other_values.len());
        list.push(a.text.clone());
        list.extend(a.other_values.iter().cloned());
        return AttrValue {
            text: a.text.clone(),
            number: a.number,
            datetime_ms,
            boolean: a.boolean,
            list,
            present: true,
        };
    }
    AttrValue::default()
}

fn device_field<'a>(d: &'a Device, field: &str) -> Option<&'a str> {
    Some(match field {
        "ip" => &d.ip,
        "language" => &d.language,
        "page_title" => &d.page_title,
        "page_url" => &d.page_url,
        "platform" => &d.platform,
        "referrer" => &d.referrer,
        "screen_resolution" => &d.screen_resolution,
        "source" => &d.source,
        "type" => &d.kind,
        "user_agent" => &d.user_agent,
        "utm:name" => &d.utm.name,
        "utm:source" => &d.utm.source,
        "utm:medium" => &d.utm.medium,
        "utm:term" => &d.utm.term,
        "utm:content" => &d.utm.content,
        _ => return None,
    })
}

/// Resolve one of the `{start|first}_content_view:by:device[:utm]:FIELD`
/// paths. Presence is decided by the containing view record alone; absent
/// inner fields just read empty.
fn content_view_subject(user: &User, key: &str) -> Option<(bool, String)> {
    let (view, field) = if let Some(f) = key.strip_prefix("start_content_view:by:device:") {
        (user.start_content_view.as_ref(), f)
    } else if let Some(f) = key.strip_prefix("first_content_view:by:device:") {
        (user.first_content_view.as_ref(), f)
    } else {
        return None;
    };
    let empty = Device::default();
    let (present, device) = match view {
        Some(v) => (true, &v.by.device),
        None => (false, &empty),
    };
    device_field(device, field).map(|s| (present, s.to_string()))
}

fn evaluate_leaf(
    acc: &Account,
    defs: &SchemaRegistry,
    user: &User,
    cond: &UserViewCondition,
    deleted: bool,
) -> bool {
    // Tombstone pre-filter: runs before any per-key dispatch.
    if deleted && user.deleted == 0 {
        return false;
    }
    if !deleted && user.deleted > 0 {
        return false;
    }

    let key = cond.key.as_str();
    match key {
        "id" => return evaluate_text(true, &user.id, &cond.text),
        "channel" => return evaluate_text(true, &user.channel, &cond.text),
        "channel_source" => return evaluate_text(true, &user.channel_source, &cond.text),
        "lead_owners" => {
            return evaluate_text_any(user.lead_owners.iter().map(String::as_str), &cond.text)
        }
        "lead_conversion_bys" => {
            return evaluate_text_any(user.lead_conversion_bys.iter().map(String::as_str), &cond.text)
        }
        "labels" => {
            return evaluate_text_any(user.labels.iter().map(|l| l.label.as_str()), &cond.text)
        }
        "segment" => {
            return evaluate_text_any(user.segments.iter().map(|s| s.segment_id.as_str()), &cond.text)
        }
        _ => {}
    }

    if key == "keyword" && !cond.text.contain.is_empty() {
        // email, phone or name lookup: space-free, accent-free, lowercased
        let q = fold_accents(&strip_spaces(&cond.text.contain[0].to_lowercase()));
        for attr in &user.attributes {
            if attr.text.is_empty() {
                continue;
            }
            if fold_accents(&strip_spaces(&attr.text.to_lowercase())).contains(&q) {
                return true;
            }
        }
        return user.id.to_lowercase().trim().contains(&q);
    }

    if let Some((present, subject)) = content_view_subject(user, key) {
        return evaluate_text(present, &subject, &cond.text);
    }

    if let Some(attr_key) = key.strip_prefix("attr:").or_else(|| key.strip_prefix("attr.")) {
        let def = match defs.lookup(attr_key) {
            Some(d) => d,
            None => return false,
        };
        let attr = find_attr(user, attr_key);
        return match def.kind.as_str() {
            TYPE_NUMBER => evaluate_float(attr.present, attr.number, &cond.number),
            TYPE_BOOLEAN => evaluate_bool(attr.present, attr.boolean, &cond.boolean),
            TYPE_DATETIME => evaluate_datetime(acc, attr.present, attr.datetime_ms, &cond.datetime),
            TYPE_LIST => evaluate_list_attr(&attr, &cond.text),
            // untyped definitions degrade to text
            TYPE_TEXT | "" => evaluate_text(attr.present, &attr.text, &cond.text),
            _ => true,
        };
    }

    true
}

/// List attributes match when any element satisfies the text condition;
/// emptiness operators look at the whole set.
fn evaluate_list_attr(attr: &AttrValue, cond: &TextCondition) -> bool {
    match cond.op.as_str() {
        "any" => true,
        "is_empty" => !attr.present || attr.list.is_empty(),
        "has_value" => attr.present && !attr.list.is_empty(),
        _ => attr.present && attr.list.iter().any(|item| evaluate_text(true, item, cond)),
    }
}
