//!
//! segcore shard-executor service
//! ------------------------------
//! Axum HTTP binding of the per-partition query operations. One instance
//! serves every snapshot file under its data root; the coordinator addresses
//! a partition purely through the `path` query parameter.
//!
//! Endpoints:
//! - POST /query?path&limit&order_by&anchor  -> one page of users
//! - POST /batch-query?path&limit&order_bys  -> one page per condition
//! - POST /count?path                        -> per-condition match totals
//! - GET  /list-segment-user?path&segments   -> segment members on the shard

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::model::{QueryEnvelope, Segments, User, Users};
use crate::partition::{count_many_pure, filter_users_pure, list_segment_members_pure};
use crate::storage::{validate_name, ShardStore};

/// Page size applied when the caller does not pin one.
const DEFAULT_LIMIT: usize = 20;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ShardStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "segcore ok" }))
        .route("/query", post(query_handler))
        .route("/batch-query", post(batch_query_handler))
        .route("/count", post(count_handler))
        .route("/list-segment-user", get(list_segment_user_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct QueryParams {
    path: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    order_by: String,
    #[serde(default)]
    order_bys: String,
    #[serde(default)]
    anchor: String,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    path: String,
    #[serde(default)]
    segments: String,
}

fn load_leads(state: &AppState, path: &str) -> Result<Vec<User>, AppError> {
    validate_name(path).map_err(|e| AppError::user(e.to_string()))?;
    state.store.load(path).map_err(|e| AppError::io(e.to_string()))
}

async fn query_handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
    Json(body): Json<QueryEnvelope>,
) -> AppResult<Json<Users>> {
    let leads = load_leads(&state, &params.path)?;
    let ignore: HashSet<String> = body.ignore_uids.iter().cloned().collect();
    let cond = body.condition.clone().unwrap_or_default();
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let page = filter_users_pure(
        &body.account,
        &cond,
        &leads,
        &params.anchor,
        limit,
        &params.order_by,
        &body.def,
        &ignore,
    );
    debug!(
        target: "segcore::server",
        "query path={} leads={} hit={} total={}", params.path, leads.len(), page.hit, page.total
    );
    Ok(Json(page))
}

async fn batch_query_handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
    Json(body): Json<QueryEnvelope>,
) -> AppResult<Json<Vec<Users>>> {
    let leads = load_leads(&state, &params.path)?;
    let ignore: HashSet<String> = body.ignore_uids.iter().cloned().collect();
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let orderbys: Vec<&str> = params.order_bys.split(';').collect();
    let pages: Vec<Users> = body
        .conditions
        .iter()
        .enumerate()
        .map(|(j, cond)| {
            let orderby = orderbys.get(j).copied().unwrap_or("");
            filter_users_pure(&body.account, cond, &leads, "", limit, orderby, &body.def, &ignore)
        })
        .collect();
    Ok(Json(pages))
}

async fn count_handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
    Json(body): Json<QueryEnvelope>,
) -> AppResult<Json<Segments>> {
    let leads = load_leads(&state, &params.path)?;
    let ignore: HashSet<String> = body.ignore_uids.iter().cloned().collect();
    let out = count_many_pure(&body.account, &body.conditions, &leads, &body.def, &ignore);
    Ok(Json(out))
}

async fn list_segment_user_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Segments>> {
    let leads = load_leads(&state, &params.path)?;
    let segment_ids: Vec<String> = params
        .segments
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Ok(Json(list_segment_members_pure(&leads, &segment_ids)))
}

/// Serve on an already-bound listener.
pub async fn serve(listener: tokio::net::TcpListener, store: ShardStore) -> anyhow::Result<()> {
    info!(
        target: "startup",
        "segcore shard executor: root={} addr={:?}", store.root().display(), listener.local_addr()
    );
    let state = AppState { store: Arc::new(store) };
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn run_with_port(port: u16, data_root: &str) -> anyhow::Result<()> {
    let store = ShardStore::new(data_root)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, store).await
}
