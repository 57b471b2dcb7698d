//! Full-stack tests: coordinator -> HTTP -> shard executor -> storage ->
//! evaluator -> merge, against a single local service holding every
//! partition's snapshot files.

use std::collections::HashSet;

use segcore::condition::{FloatCondition, TextCondition, UserViewCondition};
use segcore::coordinator::QueryClient;
use segcore::model::{Account, Attribute, SegmentMembership, User};
use segcore::partition::filter_users_pure;
use segcore::schema::{AttributeDefinition, SchemaRegistry};
use segcore::storage::{shard_file, ShardStore};

const VERSION: u64 = 1;

fn seed_user(i: usize) -> User {
    let mut u = User {
        id: format!("u{:02}", i),
        account_id: "acc1".into(),
        channel: if i % 2 == 0 { "web".into() } else { "app".into() },
        ..Default::default()
    };
    u.attributes =
        vec![Attribute { key: "score".into(), number: (i % 7) as f64, ..Default::default() }];
    if i % 3 == 0 {
        u.segments =
            vec![SegmentMembership { segment_id: "s1".into(), created: 1_000 + i as i64 }];
    }
    u
}

/// Write 24 users spread over the first six partitions; the remaining 44
/// snapshot files intentionally do not exist.
fn seed_store(store: &ShardStore) -> Vec<User> {
    let mut all = Vec::new();
    let mut shards: Vec<Vec<User>> = vec![Vec::new(); 6];
    for i in 0..24 {
        let u = seed_user(i);
        shards[i % 6].push(u.clone());
        all.push(u);
    }
    for (i, users) in shards.iter().enumerate() {
        store.write(&shard_file("acc1", i, VERSION), users).unwrap();
    }
    all
}

async fn start_service() -> (String, Vec<User>, tempfile::TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let store = ShardStore::new(tmp.path()).unwrap();
    let all = seed_store(&store);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = segcore::server::serve(listener, store).await;
    });
    (format!("http://{}", addr), all, tmp)
}

fn defs() -> SchemaRegistry {
    SchemaRegistry::new([AttributeDefinition::new("score", "number")])
}

fn account() -> Account {
    Account { id: "acc1".into(), ..Default::default() }
}

#[tokio::test]
async fn filter_pages_match_the_single_shard_equivalent() {
    let (base, all, _tmp) = start_service().await;
    let client = QueryClient::new(base).unwrap();
    let acc = account();
    let defs = defs();
    let cond = UserViewCondition::default();

    let mut anchor = String::new();
    let mut seen: Vec<String> = Vec::new();
    loop {
        let page = client
            .filter(VERSION, &acc, &cond, &defs, &anchor, "-attr:score", 7, &[])
            .await
            .unwrap();
        assert_eq!(page.total, 24);
        for u in &page.users {
            seen.push(u.id.clone());
        }
        if page.users.len() < 7 {
            break;
        }
        anchor = page.anchor.clone();
    }

    // the distributed pages concatenate to the same order a single shard
    // holding everything would produce
    let mut expected: Vec<String> = Vec::new();
    let mut anchor = String::new();
    loop {
        let page = filter_users_pure(
            &acc,
            &cond,
            &all,
            &anchor,
            7,
            "-attr:score",
            &defs,
            &HashSet::new(),
        );
        for u in &page.users {
            expected.push(u.id.clone());
        }
        if page.users.len() < 7 {
            break;
        }
        anchor = page.anchor.clone();
    }
    assert_eq!(seen, expected);
    assert_eq!(seen.len(), 24);
}

#[tokio::test]
async fn count_sums_across_partitions() {
    let (base, all, _tmp) = start_service().await;
    let client = QueryClient::new(base).unwrap();
    let acc = account();
    let defs = defs();

    let mut high_score = UserViewCondition { key: "attr:score".into(), ..Default::default() };
    high_score.number = FloatCondition { op: "gte".into(), gte: 4.0, ..Default::default() };
    let web = UserViewCondition::text_leaf(
        "channel",
        TextCondition { op: "eq".into(), eq: vec!["web".into()], ..Default::default() },
    );

    let totals = client
        .count(VERSION, &acc, &[high_score, web, UserViewCondition::default()], &defs, &[])
        .await
        .unwrap();

    let expect_high =
        all.iter().filter(|u| u.attributes[0].number >= 4.0).count() as i64;
    let expect_web = all.iter().filter(|u| u.channel == "web").count() as i64;
    assert_eq!(totals, vec![expect_high, expect_web, 24]);
}

#[tokio::test]
async fn batch_query_returns_one_page_per_condition() {
    let (base, all, _tmp) = start_service().await;
    let client = QueryClient::new(base).unwrap();
    let acc = account();
    let defs = defs();

    let web = UserViewCondition::text_leaf(
        "channel",
        TextCondition { op: "eq".into(), eq: vec!["web".into()], ..Default::default() },
    );
    let conds = vec![UserViewCondition::default(), web.clone()];
    let orderbys = vec!["-attr:score".to_string(), "+id".to_string()];

    let pages = client
        .filter_batch(VERSION, &acc, &conds, &defs, &orderbys, 5, &[])
        .await
        .unwrap();
    assert_eq!(pages.len(), 2);

    let none = HashSet::new();
    let expect0 = filter_users_pure(&acc, &conds[0], &all, "", 5, "-attr:score", &defs, &none);
    let expect1 = filter_users_pure(&acc, &conds[1], &all, "", 5, "+id", &defs, &none);
    let ids = |us: &segcore::model::Users| {
        us.users.iter().map(|u| u.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&pages[0]), ids(&expect0));
    assert_eq!(ids(&pages[1]), ids(&expect1));
    assert_eq!(pages[0].total, 24);
    assert_eq!(pages[1].total, expect1.total);
}

#[tokio::test]
async fn list_segment_users_unions_members() {
    let (base, all, _tmp) = start_service().await;
    let client = QueryClient::new(base).unwrap();

    let members = client
        .list_segment_users(VERSION, "acc1", &["s1".to_string(), "ghost".to_string()])
        .await
        .unwrap();

    let mut got: Vec<String> = members.get("s1").cloned().unwrap_or_default();
    got.sort();
    let mut expected: Vec<String> = all
        .iter()
        .filter(|u| u.segments.iter().any(|m| m.segment_id == "s1"))
        .map(|u| u.id.clone())
        .collect();
    expected.sort();
    assert_eq!(got, expected);
    assert!(members.get("ghost").map(|v| v.is_empty()).unwrap_or(true));
}

#[tokio::test]
async fn ignored_ids_are_excluded_end_to_end() {
    let (base, _all, _tmp) = start_service().await;
    let client = QueryClient::new(base).unwrap();
    let acc = account();
    let defs = defs();
    let cond = UserViewCondition::default();

    let page = client
        .filter(VERSION, &acc, &cond, &defs, "", "-id", 50, &["u00".to_string(), "u01".to_string()])
        .await
        .unwrap();
    assert_eq!(page.total, 22);
    assert!(page.users.iter().all(|u| u.id != "u00" && u.id != "u01"));
}

#[tokio::test]
async fn unreachable_fleet_fails_with_a_partition_tagged_transport_error() {
    // bind-then-drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = QueryClient::new(format!("http://{}", addr)).unwrap();
    let err = client
        .filter(
            VERSION,
            &account(),
            &UserViewCondition::default(),
            &defs(),
            "",
            "-id",
            10,
            &[],
        )
        .await
        .unwrap_err();
    // the first failing partition by index wins
    assert_eq!(err.partition(), Some(0));
}

#[tokio::test]
async fn malformed_path_is_rejected_by_the_service() {
    let (base, _all, _tmp) = start_service().await;
    let http = reqwest::Client::new();
    let envelope = segcore::model::QueryEnvelope::default();
    let resp = http
        .post(format!("{}/query", base))
        .query(&[("path", "../../etc/passwd"), ("limit", "10")])
        .json(&envelope)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}
