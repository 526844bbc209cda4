//! API Handlers
//!
//! HTTP request handlers for each sidecar endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Url;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::cache::CompressedCache;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::limiter::{FixedWindowLimiter, RateLimitResult};
use crate::lookup::CachedLookup;
use crate::models::{
    validate_dm_ids, CacheSummary, DeleteResponse, DmSendRequest, GetResponse, HealthResponse,
    ProfileResponse, SetRequest, SetResponse, StatsResponse,
};

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Profile lookups keyed by user id.
pub type ProfileLookup = CachedLookup<String, Value, anyhow::Error>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Compressed cache of serialized API responses
    pub responses: Arc<RwLock<CompressedCache<String, Value>>>,
    /// Layered DM send budget
    pub dm_limits: Arc<Mutex<FixedWindowLimiter>>,
    /// Cache-fronted user profile fetches
    pub profiles: ProfileLookup,
}

impl AppState {
    pub fn new(
        responses: CompressedCache<String, Value>,
        dm_limits: FixedWindowLimiter,
        profiles: ProfileLookup,
    ) -> Self {
        Self {
            responses: Arc::new(RwLock::new(responses)),
            dm_limits: Arc::new(Mutex::new(dm_limits)),
            profiles,
        }
    }

    /// Builds every component from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let responses =
            CompressedCache::new(config.response_cache_options(), config.compression())?;
        let dm_limits = FixedWindowLimiter::new(config.dm_limiter_config())?;
        let profiles = profile_lookup(config)?;

        Ok(Self::new(responses, dm_limits, profiles))
    }
}

/// Profile lookup backed by `GET {upstream}/users/{id}`.
fn profile_lookup(config: &Config) -> Result<ProfileLookup> {
    let client = reqwest::Client::builder()
        .timeout(UPSTREAM_TIMEOUT)
        .build()
        .map_err(|e| CacheError::InvalidConfig(format!("HTTP client: {e}")))?;
    let base = Url::parse(&config.profile_upstream_url)
        .map_err(|e| CacheError::InvalidConfig(format!("PROFILE_UPSTREAM_URL: {e}")))?;
    if base.cannot_be_a_base() {
        return Err(CacheError::InvalidConfig(format!(
            "PROFILE_UPSTREAM_URL '{}' cannot take a path",
            base
        )));
    }

    CachedLookup::new(config.profile_cache_options(), move |id: String| {
        let url = profile_url(&base, &id);
        let client = client.clone();
        async move {
            let profile = client
                .get(url?)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await?;
            Ok::<_, anyhow::Error>(profile)
        }
    })
}

/// `{base}/users/{id}` with `id` encoded as exactly one path segment.
pub fn profile_url(base: &Url, id: &str) -> anyhow::Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("upstream URL {base} cannot take a path"))?
        .pop_if_empty()
        .push("users")
        .push(id);
    Ok(url)
}

// == Response Cache ==

/// Handler for PUT /responses
pub async fn set_response_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let mut responses = state.responses.write().await;
    responses.set(req.key.clone(), req.value)?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /responses/:key
pub async fn get_response_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    // Write lock: a read touches recency and stats
    let mut responses = state.responses.write().await;
    let value = responses
        .get(&key)?
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /responses/:key
pub async fn delete_response_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let mut responses = state.responses.write().await;
    if !responses.delete(&key) {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

// == DM Rate Limits ==

/// Handler for POST /dm/send
///
/// Spends one unit of every DM tier when all of them have budget left.
/// Denials answer 429 with a `Retry-After` header.
pub async fn dm_send_handler(
    State(state): State<AppState>,
    Json(req): Json<DmSendRequest>,
) -> Result<Response> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let result = state
        .dm_limits
        .lock()
        .await
        .try_acquire(&req.user_id, &req.channel_id);

    if !result.allowed {
        debug!(user = %req.user_id, tier = %result.tier, "DM send denied");
    }

    Ok(rate_limit_response(result))
}

/// Handler for GET /dm/limits/:user_id/:channel_id
///
/// Reports the deciding tier without spending any budget.
pub async fn dm_limits_handler(
    State(state): State<AppState>,
    Path((user_id, channel_id)): Path<(String, String)>,
) -> Result<Json<RateLimitResult>> {
    if let Some(error_msg) = validate_dm_ids(&user_id, &channel_id) {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let result = state
        .dm_limits
        .lock()
        .await
        .check_all_limits(&user_id, &channel_id);

    Ok(Json(result))
}

fn rate_limit_response(result: RateLimitResult) -> Response {
    match result.retry_after_secs {
        Some(secs) if !result.allowed => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, secs.to_string())],
            Json(result),
        )
            .into_response(),
        _ => (StatusCode::OK, Json(result)).into_response(),
    }
}

// == Profiles ==

/// Handler for GET /users/:id
///
/// Serves a fresh cached profile, fetches on a miss, and falls back to an
/// expired copy when the upstream fails.
pub async fn get_profile_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProfileResponse>> {
    let profile = state
        .profiles
        .get(id.clone())
        .await
        .map_err(|_| CacheError::LookupFailed(format!("profile '{}' is unavailable", id)))?;

    Ok(Json(ProfileResponse { id, profile }))
}

/// Handler for DELETE /users/:id
pub async fn invalidate_profile_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.profiles.invalidate(&id) {
        return Err(CacheError::NotFound(id));
    }

    Ok(Json(DeleteResponse::new(id)))
}

// == Operational ==

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let response_cache = {
        let responses = state.responses.read().await;
        CacheSummary::new(&responses.stats(), responses.max())
    };
    let rate_counters = {
        let limiter = state.dm_limits.lock().await;
        CacheSummary::new(&limiter.stats(), limiter.max_counters())
    };
    let profile_cache = CacheSummary::new(&state.profiles.cache_stats(), state.profiles.max());

    Json(StatsResponse {
        response_cache,
        rate_counters,
        profile_cache,
        profile_lookups: state.profiles.stats(),
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
