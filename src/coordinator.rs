//! Fan-out coordinator.
//!
//! Every operation broadcasts one request per partition, waits for all of
//! them, and folds the partial results under a mutex as they land. Failure
//! is all-or-nothing: after the barrier the first failing partition (lowest
//! index) decides the outcome and no partial page escapes.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::condition::UserViewCondition;
use crate::error::AppError;
use crate::model::{Account, QueryEnvelope, Segments, Users};
use crate::partition::merge_user_result;
use crate::schema::SchemaRegistry;
use crate::storage::shard_file;

/// Fixed number of horizontal partitions per account.
pub const NPARTITION: usize = 50;

pub const DEFAULT_QUERY_URL: &str = "http://127.0.0.1:7878";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client handle over the shard-executor fleet. Cheap to clone; the inner
/// reqwest client is shared.
#[derive(Clone)]
pub struct QueryClient {
    base: String,
    http: reqwest::Client,
}

impl QueryClient {
    pub fn new(base: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(QueryClient { base: base.into(), http })
    }

    /// Base URL from `SEGCORE_QUERY_URL`, falling back to the local default.
    pub fn from_env() -> anyhow::Result<Self> {
        let base =
            std::env::var("SEGCORE_QUERY_URL").unwrap_or_else(|_| DEFAULT_QUERY_URL.to_string());
        QueryClient::new(base)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), endpoint)
    }

    async fn post_json<T, B>(
        &self,
        partition: usize,
        endpoint: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T, AppError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let resp = self
            .http
            .post(self.url(endpoint))
            .query(query)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::transport(partition, e.to_string()))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AppError::transport(partition, e.to_string()))?;
        if !status.is_success() {
            return Err(AppError::shard(partition, String::from_utf8_lossy(&bytes).into_owned()));
        }
        serde_json::from_slice(&bytes).map_err(|e| AppError::decode(partition, e.to_string()))
    }

    async fn get_json<T>(
        &self,
        partition: usize,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AppError>
    where
        T: DeserializeOwned,
    {
        let resp = self
            .http
            .get(self.url(endpoint))
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::transport(partition, e.to_string()))?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AppError::transport(partition, e.to_string()))?;
        if !status.is_success() {
            return Err(AppError::shard(partition, String::from_utf8_lossy(&bytes).into_owned()));
        }
        serde_json::from_slice(&bytes).map_err(|e| AppError::decode(partition, e.to_string()))
    }

    /// Select one page of users matching `cond` across all partitions.
    #[allow(clippy::too_many_arguments)]
    pub async fn filter(
        &self,
        version: u64,
        acc: &Account,
        cond: &UserViewCondition,
        defs: &SchemaRegistry,
        anchor: &str,
        orderby: &str,
        limit: usize,
        ignore_ids: &[String],
    ) -> Result<Users, AppError> {
        let envelope = QueryEnvelope {
            condition: Some(cond.clone()),
            conditions: Vec::new(),
            account: acc.scoped(),
            def: defs.clone(),
            ignore_uids: ignore_ids.to_vec(),
        };
        let limit_s = limit.to_string();
        let res = Mutex::new(Users::default());
        let tasks = (0..NPARTITION).map(|i| {
            let envelope = &envelope;
            let res = &res;
            let limit_s = limit_s.as_str();
            async move {
                let path = shard_file(&acc.id, i, version);
                let users: Users = self
                    .post_json(
                        i,
                        "query",
                        &[
                            ("path", path.as_str()),
                            ("limit", limit_s),
                            ("order_by", orderby),
                            ("anchor", anchor),
                        ],
                        envelope,
                    )
                    .await?;
                let mut g = res.lock();
                let merged = merge_user_result(&g, &users, limit, orderby, defs, Some(cond));
                *g = merged;
                Ok::<(), AppError>(())
            }
        });
        for r in join_all(tasks).await {
            r?;
        }
        let out = res.into_inner();
        debug!(
            target: "segcore::coordinator",
            "filter account={} hit={} total={}", acc.id, out.hit, out.total
        );
        Ok(out)
    }

    /// One page per condition in a single fan-out. Cursors are not used in
    /// batch mode.
    #[allow(clippy::too_many_arguments)]
    pub async fn filter_batch(
        &self,
        version: u64,
        acc: &Account,
        conds: &[UserViewCondition],
        defs: &SchemaRegistry,
        orderbys: &[String],
        limit: usize,
        ignore_ids: &[String],
    ) -> Result<Vec<Users>, AppError> {
        if conds.is_empty() {
            return Ok(Vec::new());
        }
        let envelope = QueryEnvelope {
            condition: None,
            conditions: conds.to_vec(),
            account: acc.scoped(),
            def: defs.clone(),
            ignore_uids: ignore_ids.to_vec(),
        };
        let limit_s = limit.to_string();
        let order_bys = orderbys.join(";");
        let res = Mutex::new(vec![Users::default(); conds.len()]);
        let tasks = (0..NPARTITION).map(|i| {
            let envelope = &envelope;
            let res = &res;
            let limit_s = limit_s.as_str();
            let order_bys = order_bys.as_str();
            async move {
                let path = shard_file(&acc.id, i, version);
                let pages: Vec<Users> = self
                    .post_json(
                        i,
                        "batch-query",
                        &[
                            ("path", path.as_str()),
                            ("limit", limit_s),
                            ("order_bys", order_bys),
                        ],
                        envelope,
                    )
                    .await?;
                let mut g = res.lock();
                for (j, page) in pages.into_iter().enumerate() {
                    if j >= g.len() {
                        break;
                    }
                    let orderby = orderbys.get(j).map(String::as_str).unwrap_or("");
                    let merged =
                        merge_user_result(&g[j], &page, limit, orderby, defs, conds.get(j));
                    g[j] = merged;
                }
                Ok::<(), AppError>(())
            }
        });
        for r in join_all(tasks).await {
            r?;
        }
        Ok(res.into_inner())
    }

    /// Match counts for several conditions, summed across partitions.
    pub async fn count(
        &self,
        version: u64,
        acc: &Account,
        conds: &[UserViewCondition],
        defs: &SchemaRegistry,
        ignore_ids: &[String],
    ) -> Result<Vec<i64>, AppError> {
        if conds.is_empty() {
            return Ok(Vec::new());
        }
        let envelope = QueryEnvelope {
            condition: None,
            conditions: conds.to_vec(),
            account: acc.scoped(),
            def: defs.clone(),
            ignore_uids: ignore_ids.to_vec(),
        };
        let totals = Mutex::new(vec![0i64; conds.len()]);
        let tasks = (0..NPARTITION).map(|i| {
            let envelope = &envelope;
            let totals = &totals;
            async move {
                let path = shard_file(&acc.id, i, version);
                let segments: Segments = self
                    .post_json(i, "count", &[("path", path.as_str())], envelope)
                    .await?;
                let mut g = totals.lock();
                for (j, seg) in segments.segments.iter().enumerate() {
                    if j >= g.len() {
                        break;
                    }
                    g[j] += seg.total;
                }
                Ok::<(), AppError>(())
            }
        });
        for r in join_all(tasks).await {
            r?;
        }
        Ok(totals.into_inner())
    }

    /// Member ids per segment, unioned across partitions.
    pub async fn list_segment_users(
        &self,
        version: u64,
        account_id: &str,
        segment_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>, AppError> {
        let joined = segment_ids.join(",");
        let out = Mutex::new(HashMap::<String, Vec<String>>::new());
        let tasks = (0..NPARTITION).map(|i| {
            let out = &out;
            let joined = joined.as_str();
            async move {
                let path = shard_file(account_id, i, version);
                let segments: Segments = self
                    .get_json(
                        i,
                        "list-segment-user",
                        &[("path", path.as_str()), ("segments", joined)],
                    )
                    .await?;
                let mut g = out.lock();
                for seg in segments.segments {
                    g.entry(seg.id).or_default().extend(seg.members);
                }
                Ok::<(), AppError>(())
            }
        });
        for r in join_all(tasks).await {
            r?;
        }
        Ok(out.into_inner())
    }
}
