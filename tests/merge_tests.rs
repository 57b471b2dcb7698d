use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use segcore::condition::UserViewCondition;
use segcore::model::{Account, Attribute, User, Users};
use segcore::partition::{filter_users_pure, merge_user_result};
use segcore::schema::{AttributeDefinition, SchemaRegistry};

fn scored(id: &str, score: f64) -> User {
    User {
        id: id.into(),
        account_id: "acc1".into(),
        attributes: vec![Attribute { key: "score".into(), number: score, ..Default::default() }],
        ..Default::default()
    }
}

fn score_defs() -> SchemaRegistry {
    SchemaRegistry::new([AttributeDefinition::new("score", "number")])
}

#[test]
fn merges_two_partitions_into_a_global_page() {
    let defs = score_defs();
    let a = Users {
        users: vec![scored("u1", 5.0), scored("u3", 3.0)],
        hit: 2,
        total: 2,
        anchor: "f3E0.u3".into(),
    };
    let b = Users { users: vec![scored("u2", 4.0)], hit: 1, total: 1, anchor: "f4E0.u2".into() };

    let merged = merge_user_result(&a, &b, 2, "-attr:score", &defs, None);
    let ids: Vec<&str> = merged.users.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2"]);
    assert_eq!(merged.hit, 2);
    assert_eq!(merged.total, 3);
    assert_eq!(merged.anchor, "f4E0.u2");
}

#[test]
fn merge_drops_aliases_and_lets_src_override_dst() {
    let defs = SchemaRegistry::default();
    let mut stale = scored("u1", 1.0);
    stale.channel = "old".into();
    let mut fresh = scored("u1", 1.0);
    fresh.channel = "new".into();
    let mut alias = scored("u9", 9.0);
    alias.primary_id = "u1".into();

    let dst = Users { users: vec![stale, alias], hit: 2, total: 2, anchor: String::new() };
    let src = Users { users: vec![fresh], hit: 1, total: 1, anchor: String::new() };
    let merged = merge_user_result(&dst, &src, 10, "-id", &defs, None);
    assert_eq!(merged.users.len(), 1);
    assert_eq!(merged.users[0].channel, "new");
    assert_eq!(merged.total, 3);
}

#[test]
fn merge_is_associative_and_equals_the_concatenated_top_k() {
    let acc = Account::default();
    let defs = score_defs();
    let cond = UserViewCondition::default();
    let none = HashSet::new();
    let mut rng = StdRng::seed_from_u64(0x5E6C0DE);

    // three partitions of uneven size, with colliding scores
    let mut partitions: Vec<Vec<User>> = vec![Vec::new(), Vec::new(), Vec::new()];
    let mut all: Vec<User> = Vec::new();
    for i in 0..60 {
        let u = scored(&format!("u{:02}", i), rng.gen_range(0..12) as f64);
        partitions[i % 3].push(u.clone());
        all.push(u);
    }

    for orderby in ["-attr:score", "+attr:score", "-id"] {
        let limit = 10;
        let pages: Vec<Users> = partitions
            .iter()
            .map(|p| filter_users_pure(&acc, &cond, p, "", limit, orderby, &defs, &none))
            .collect();

        let left = merge_user_result(
            &merge_user_result(&pages[0], &pages[1], limit, orderby, &defs, None),
            &pages[2],
            limit,
            orderby,
            &defs,
            None,
        );
        let right = merge_user_result(
            &pages[0],
            &merge_user_result(&pages[1], &pages[2], limit, orderby, &defs, None),
            limit,
            orderby,
            &defs,
            None,
        );
        let reversed = merge_user_result(
            &merge_user_result(&pages[2], &pages[1], limit, orderby, &defs, None),
            &pages[0],
            limit,
            orderby,
            &defs,
            None,
        );

        let ids = |us: &Users| us.users.iter().map(|u| u.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&left), ids(&right), "orderby {}", orderby);
        assert_eq!(ids(&left), ids(&reversed), "orderby {}", orderby);
        assert_eq!(left.total, 60);
        assert_eq!(left.anchor, right.anchor);

        // the merged top-K is the top-K of the concatenation
        let whole = filter_users_pure(&acc, &cond, &all, "", limit, orderby, &defs, &none);
        assert_eq!(ids(&left), ids(&whole), "orderby {}", orderby);
        assert_eq!(left.anchor, whole.anchor, "orderby {}", orderby);
    }
}

#[test]
fn merge_with_empty_side_is_identity_on_users() {
    let defs = score_defs();
    let page = Users {
        users: vec![scored("u1", 2.0), scored("u2", 1.0)],
        hit: 2,
        total: 2,
        anchor: "f1E0.u2".into(),
    };
    let empty = Users::default();
    let merged = merge_user_result(&empty, &page, 10, "-attr:score", &defs, None);
    let ids: Vec<&str> = merged.users.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2"]);
    assert_eq!(merged.total, 2);
    assert_eq!(merged.anchor, "f1E0.u2");

    let both_empty = merge_user_result(&empty, &Users::default(), 10, "", &defs, None);
    assert!(both_empty.users.is_empty());
    assert_eq!(both_empty.anchor, "");
}

#[test]
fn segment_joined_merge_uses_the_pinned_segment() {
    let defs = SchemaRegistry::default();
    let cond = UserViewCondition::text_leaf(
        "segment",
        segcore::condition::TextCondition {
            op: "eq".into(),
            eq: vec!["s1".into()],
            ..Default::default()
        },
    );
    let member = |id: &str, created: i64| User {
        id: id.into(),
        segments: vec![segcore::model::SegmentMembership { segment_id: "s1".into(), created }],
        ..Default::default()
    };
    let a = Users { users: vec![member("u1", 100)], hit: 1, total: 1, anchor: String::new() };
    let b = Users { users: vec![member("u2", 200)], hit: 1, total: 1, anchor: String::new() };
    let merged = merge_user_result(&a, &b, 10, "-segment_joined", &defs, Some(&cond));
    let ids: Vec<&str> = merged.users.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["u2", "u1"]);
    assert_eq!(merged.anchor, "f100.u1");
}
