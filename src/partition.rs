//! Per-shard query execution: filter, count and segment listing over one
//! partition's user records. These are the pure counterparts of what the
//! shard executor service does per request; the coordinator's merge lives
//! here too so both sides share one definition of the ordering.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::condition::UserViewCondition;
use crate::evaluate::matches;
use crate::executor::run_parallel;
use crate::model::{Account, Segment, Segments, User, Users};
use crate::schema::SchemaRegistry;
use crate::sortkey::{join_anchor, less_val, parse_orderby, sort_val, split_anchor};

/// Bounded concurrency for lead evaluation inside one shard.
pub const SHARD_WORKERS: usize = 20;

fn skip(u: &User, ignore_ids: &HashSet<String>) -> bool {
    u.id.is_empty() || !u.primary_id.is_empty() || ignore_ids.contains(&u.id)
}

/// Count users matching `cond`, excluding aliases and ignored ids.
pub fn count_users_pure(
    acc: &Account,
    cond: &UserViewCondition,
    leads: &[User],
    defs: &SchemaRegistry,
    ignore_ids: &HashSet<String>,
) -> i64 {
    let total = Mutex::new(0i64);
    run_parallel(leads.len(), SHARD_WORKERS, |i| {
        let u = &leads[i];
        if skip(u, ignore_ids) {
            return;
        }
        if !matches(acc, defs, u, cond) {
            return;
        }
        *total.lock() += 1;
    });
    total.into_inner()
}

struct FilterAcc {
    out: Vec<usize>,
    total: i64,
    val_m: HashMap<String, String>,
}

/// Filter-sort-limit one partition.
///
/// `anchor` positions the page: users at or before the anchor under the
/// requested ordering are dropped, so consecutive calls walk the result set
/// without overlap. `total` counts every match on the shard regardless of
/// the page window.
pub fn filter_users_pure(
    acc: &Account,
    cond: &UserViewCondition,
    leads: &[User],
    anchor: &str,
    limit: usize,
    orderby: &str,
    defs: &SchemaRegistry,
    ignore_ids: &HashSet<String>,
) -> Users {
    let orderby = if orderby.is_empty() { "-id" } else { orderby };
    let ob = parse_orderby(orderby);
    let pinned = cond.pinned_segment();

    let mut val_m: HashMap<String, String> = HashMap::new();
    let (anchor_val, anchor_uid) = match split_anchor(anchor) {
        Some((v, u)) => (v.to_string(), u.to_string()),
        None => (String::new(), String::new()),
    };
    if !anchor_uid.is_empty() {
        val_m.insert(anchor_uid.clone(), anchor_val);
    }

    let state = Mutex::new(FilterAcc { out: Vec::new(), total: 0, val_m });
    run_parallel(leads.len(), SHARD_WORKERS, |i| {
        let u = &leads[i];
        if skip(u, ignore_ids) {
            return;
        }
        if !matches(acc, defs, u, cond) {
            return;
        }
        let val = sort_val(ob.field, u, defs, pinned);
        let mut g = state.lock();
        g.total += 1;
        g.val_m.insert(u.id.clone(), val);
        if anchor_uid.is_empty() {
            g.out.push(i);
            return;
        }
        // the anchor row itself was delivered with the previous page
        if u.id == anchor_uid {
            return;
        }
        if less_val(&u.id, &anchor_uid, &g.val_m, ob.desc) {
            return;
        }
        g.out.push(i);
    });

    let FilterAcc { mut out, total, val_m } = state.into_inner();
    out.sort_by(|&a, &b| {
        if less_val(&leads[a].id, &leads[b].id, &val_m, ob.desc) {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    });
    out.truncate(limit);

    let users: Vec<User> = out.iter().map(|&i| leads[i].clone()).collect();
    let anchor_out = match users.last() {
        Some(last) => {
            join_anchor(val_m.get(&last.id).map(String::as_str).unwrap_or(""), &last.id)
        }
        None => String::new(),
    };
    Users { hit: users.len() as i64, total, anchor: anchor_out, users }
}

/// Merge two partial pages into one, keeping the global top-`limit`.
///
/// Users are unioned by id with `src` overriding `dst`; merge aliases are
/// dropped on the way in. Sort keys are recomputed from the user records so
/// the result is independent of merge order up to identical (id, key) pairs.
pub fn merge_user_result(
    dst: &Users,
    src: &Users,
    limit: usize,
    orderby: &str,
    defs: &SchemaRegistry,
    cond: Option<&UserViewCondition>,
) -> Users {
    let orderby = if orderby.is_empty() { "-id" } else { orderby };
    let ob = parse_orderby(orderby);
    let pinned = cond.and_then(|c| c.pinned_segment());

    let mut userm: HashMap<&str, &User> = HashMap::new();
    for u in dst.users.iter().chain(src.users.iter()) {
        if !u.primary_id.is_empty() {
            continue;
        }
        userm.insert(u.id.as_str(), u);
    }

    let mut val_m: HashMap<String, String> = HashMap::with_capacity(userm.len());
    let mut out: Vec<&User> = Vec::with_capacity(userm.len());
    for u in userm.into_values() {
        val_m.insert(u.id.clone(), sort_val(ob.field, u, defs, pinned));
        out.push(u);
    }
    out.sort_by(|a, b| {
        if less_val(&a.id, &b.id, &val_m, ob.desc) {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    });
    out.truncate(limit);

    let users: Vec<User> = out.into_iter().cloned().collect();
    let anchor = match users.last() {
        Some(last) => {
            join_anchor(val_m.get(&last.id).map(String::as_str).unwrap_or(""), &last.id)
        }
        None => String::new(),
    };
    Users { hit: users.len() as i64, total: dst.total + src.total, anchor, users }
}

/// Count several conditions in one pass over the shard. The response reuses
/// the segments shape: entry `j` carries the total for condition `j`.
pub fn count_many_pure(
    acc: &Account,
    conds: &[UserViewCondition],
    leads: &[User],
    defs: &SchemaRegistry,
    ignore_ids: &HashSet<String>,
) -> Segments {
    Segments {
        segments: conds
            .iter()
            .enumerate()
            .map(|(j, cond)| Segment {
                id: j.to_string(),
                members: Vec::new(),
                total: count_users_pure(acc, cond, leads, defs, ignore_ids),
            })
            .collect(),
    }
}

/// Live, non-alias members of each requested segment on this shard.
pub fn list_segment_members_pure(leads: &[User], segment_ids: &[String]) -> Segments {
    Segments {
        segments: segment_ids
            .iter()
            .map(|sid| {
                let members: Vec<String> = leads
                    .iter()
                    .filter(|u| !u.id.is_empty() && u.primary_id.is_empty() && u.deleted == 0)
                    .filter(|u| u.segments.iter().any(|m| &m.segment_id == sid))
                    .map(|u| u.id.clone())
                    .collect();
                Segment { id: sid.clone(), total: members.len() as i64, members }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(id: &str) -> User {
        User { id: id.into(), ..Default::default() }
    }

    #[test]
    fn count_skips_blank_alias_and_ignored() {
        let acc = Account::default();
        let defs = SchemaRegistry::default();
        let cond = UserViewCondition::default();
        let mut alias = live("a2");
        alias.primary_id = "a1".into();
        let leads = vec![live(""), alias, live("a1"), live("a3")];
        let ignored: HashSet<String> = ["a3".to_string()].into();
        assert_eq!(count_users_pure(&acc, &cond, &leads, &defs, &ignored), 1);
        assert_eq!(count_users_pure(&acc, &cond, &leads, &defs, &HashSet::new()), 2);
    }

    #[test]
    fn list_segment_members_skips_tombstones() {
        let mut m1 = live("u1");
        m1.segments = vec![crate::model::SegmentMembership { segment_id: "s1".into(), created: 1 }];
        let mut m2 = live("u2");
        m2.segments = vec![crate::model::SegmentMembership { segment_id: "s1".into(), created: 2 }];
        m2.deleted = 99;
        let segs = list_segment_members_pure(&[m1, m2], &["s1".to_string(), "s2".to_string()]);
        assert_eq!(segs.segments.len(), 2);
        assert_eq!(segs.segments[0].members, vec!["u1"]);
        assert_eq!(segs.segments[0].total, 1);
        assert!(segs.segments[1].members.is_empty());
    }
}
