//! Tagged sort keys, the total order over them, and the pagination cursor.
//!
//! A sort key is a string whose first byte picks the comparison rule:
//! `s` compares the remainder lexicographically, `f` numerically with the
//! shared tolerance, `l` first by an integer length prefix (up to the first
//! dot) then by the remaining body. Ties always break on ascending user id,
//! which is what makes paging deterministic across shards.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::evaluate::find_attr;
use crate::model::User;
use crate::schema::{SchemaRegistry, TYPE_BOOLEAN, TYPE_DATETIME, TYPE_LIST, TYPE_NUMBER, TYPE_TEXT};
use crate::TOLERANCE;

#[derive(Debug, Clone, Copy)]
pub struct OrderBy<'a> {
    pub field: &'a str,
    pub desc: bool,
}

/// Parse the leading sign of an ordering expression. A missing sign means
/// descending, which reproduces legacy behaviour.
pub fn parse_orderby(orderby: &str) -> OrderBy<'_> {
    match orderby.as_bytes().first() {
        Some(b'-') => OrderBy { field: &orderby[1..], desc: true },
        Some(b'+') => OrderBy { field: &orderby[1..], desc: false },
        _ => OrderBy { field: orderby, desc: true },
    }
}

/// Encode the sort key for `user` under the given ordering field.
///
/// `pinned_segment` feeds the `segment_joined` ordering: the segment id the
/// surrounding condition pinned, if any.
pub fn sort_val(
    orderby: &str,
    user: &User,
    defs: &SchemaRegistry,
    pinned_segment: Option<&str>,
) -> String {
    let mut field = if orderby.is_empty() { "id" } else { orderby };
    if field.starts_with('-') || field.starts_with('+') {
        field = &field[1..];
    }

    match field {
        "id" => format!("s{}", user.id),
        "lead_owners" => {
            format!("l{}.{}", user.lead_owners.len(), user.lead_owners.join(","))
        }
        "labels" => {
            let joined: String = user.labels.iter().map(|l| l.label.as_str()).collect();
            format!("l{}.{}", user.labels.len(), joined)
        }
        "segment_joined" => match pinned_segment {
            Some(seg) => match user.segments.iter().find(|m| m.segment_id == seg) {
                Some(m) => format!("f{}", m.created),
                None => "f0".to_string(),
            },
            None => format!("f{}", user.id),
        },
        _ => {
            if let Some(key) = field.strip_prefix("attr:").or_else(|| field.strip_prefix("attr.")) {
                if let Some(def) = defs.lookup(key) {
                    let attr = find_attr(user, key);
                    return match def.kind.as_str() {
                        TYPE_TEXT | "" => format!("s{}", attr.text),
                        TYPE_NUMBER => format!("f{:E}", attr.number),
                        TYPE_BOOLEAN => {
                            if attr.boolean {
                                "s1.".to_string()
                            } else {
                                "s0.".to_string()
                            }
                        }
                        TYPE_DATETIME => {
                            let dt = DateTime::<Utc>::from_timestamp(attr.datetime_ms / 1000, 0)
                                .unwrap_or_default();
                            format!("s{}", dt.to_rfc3339_opts(SecondsFormat::Secs, true))
                        }
                        TYPE_LIST => format!("l{}.{}", attr.list.len(), attr.list.join(",")),
                        _ => "s".to_string(),
                    };
                }
            }
            "s".to_string()
        }
    }
}

fn split_ltag(v: &str) -> (i64, &str) {
    let body = v.get(1..).unwrap_or("");
    match body.split_once('.') {
        Some((n, rest)) => (n.parse().unwrap_or(0), rest),
        None => (body.parse().unwrap_or(0), ""),
    }
}

/// Strict total order over users given their encoded keys in `val_m`.
/// Returns whether `iid` sorts before `jid` under the requested direction.
pub fn less_val(iid: &str, jid: &str, val_m: &HashMap<String, String>, desc: bool) -> bool {
    let a = val_m.get(iid).map(String::as_str).unwrap_or("");
    let b = val_m.get(jid).map(String::as_str).unwrap_or("");
    let mut less = false;
    match a.as_bytes().first().copied().unwrap_or(b's') {
        b's' => {
            less = if a == b { iid < jid } else { a < b };
        }
        b'f' => {
            let fi: f64 = a.get(1..).unwrap_or("").parse().unwrap_or(0.0);
            let fj: f64 = b.get(1..).unwrap_or("").parse().unwrap_or(0.0);
            less = if (fi - fj).abs() < TOLERANCE { iid < jid } else { fi < fj };
        }
        b'l' => {
            let (leni, vali) = split_ltag(a);
            let (lenj, valj) = split_ltag(b);
            less = if leni < lenj {
                true
            } else if leni == lenj {
                if vali == valj {
                    iid < jid
                } else {
                    vali < valj
                }
            } else {
                false
            };
        }
        _ => {}
    }
    if desc {
        !less
    } else {
        less
    }
}

/// Split an anchor on its last dot into (sort value, user id). Anchors
/// without a dot carry no usable position.
pub fn split_anchor(anchor: &str) -> Option<(&str, &str)> {
    anchor.rsplit_once('.')
}

pub fn join_anchor(val: &str, uid: &str) -> String {
    format!("{}.{}", val, uid)
}
