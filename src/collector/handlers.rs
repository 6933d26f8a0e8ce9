//! Collector endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::server::CollectorState;
use crate::context::{Fields, TraceId};
use crate::events::{Level, LogEvent};
use crate::store::{
    EventFilter, InsertOutcome, Page, PageRequest, StoreError, StoreStats, TimeRange, TraceSummary,
};

/// Rejected lines reported back per ingest request, at most.
const MAX_REPORTED_REJECTIONS: usize = 10;

/// Error body: `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Store(e @ (StoreError::InvalidPageToken(_) | StoreError::InvalidTimeRange { .. })) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Store(e) => {
                tracing::error!(error = %e, "Store operation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// `POST /v1/ingest` with one JSON LogEvent per line.
pub async fn ingest(
    State(state): State<CollectorState>,
    body: String,
) -> Result<Json<IngestResponse>, ApiError> {
    let mut response = IngestResponse::default();
    for (line_no, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match LogEvent::from_json(line) {
            Ok(event) => match state.store.insert(event)? {
                InsertOutcome::Inserted => response.accepted += 1,
                InsertOutcome::Duplicate => response.duplicates += 1,
            },
            Err(e) => {
                response.rejected += 1;
                if response.errors.len() < MAX_REPORTED_REJECTIONS {
                    response.errors.push(format!("line {}: {}", line_no + 1, e));
                }
            }
        }
    }

    let level = if response.rejected > 0 { Level::Warn } else { Level::Debug };
    let mut extra = Fields::new();
    extra.insert("accepted".to_string(), response.accepted.to_string());
    extra.insert("duplicates".to_string(), response.duplicates.to_string());
    extra.insert("rejected".to_string(), response.rejected.to_string());
    state.tracer.emitter().emit(level, "batch ingested", extra);
    Ok(Json(response))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub limit: Option<usize>,
    #[serde(alias = "page_token")]
    pub page_token: Option<String>,
}

impl From<PageParams> for PageRequest {
    fn from(params: PageParams) -> Self {
        PageRequest {
            limit: params.limit,
            page_token: params.page_token,
        }
    }
}

fn parse_trace_id(raw: &str) -> Result<TraceId, ApiError> {
    TraceId::parse(raw).ok_or_else(|| ApiError::BadRequest(format!("invalid trace id: {raw:?}")))
}

/// `GET /v1/traces/{trace_id}`
pub async fn get_trace(
    State(state): State<CollectorState>,
    Path(trace_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<LogEvent>>, ApiError> {
    let trace_id = parse_trace_id(&trace_id)?;
    let page = state.store.query_trace(&trace_id, &params.into())?;
    Ok(Json(page))
}

/// `GET /v1/traces/{trace_id}/summary`
pub async fn get_trace_summary(
    State(state): State<CollectorState>,
    Path(trace_id): Path<String>,
) -> Result<Json<TraceSummary>, ApiError> {
    let trace_id = parse_trace_id(&trace_id)?;
    state
        .store
        .trace_summary(&trace_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("trace {trace_id} not found")))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventQuery {
    pub level: Option<String>,
    pub service: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    #[serde(alias = "last_secs")]
    pub last_secs: Option<i64>,
    pub limit: Option<usize>,
    #[serde(alias = "page_token")]
    pub page_token: Option<String>,
}

fn parse_time(name: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    raw.map(|value| {
        DateTime::parse_from_rfc3339(value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| ApiError::BadRequest(format!("invalid {name} {value:?}: {e}")))
    })
    .transpose()
}

impl EventQuery {
    fn filter(&self) -> Result<EventFilter, ApiError> {
        let level = self
            .level
            .as_deref()
            .map(str::parse::<Level>)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let mut since = parse_time("since", self.since.as_deref())?;
        let until = parse_time("until", self.until.as_deref())?;
        if let Some(secs) = self.last_secs {
            if since.is_some() {
                return Err(ApiError::BadRequest("use either since or lastSecs, not both".into()));
            }
            let window = chrono::Duration::try_seconds(secs)
                .filter(|w| *w > chrono::Duration::zero())
                .and_then(|w| Utc::now().checked_sub_signed(w))
                .ok_or_else(|| ApiError::BadRequest(format!("invalid lastSecs: {secs}")))?;
            since = Some(window);
        }

        Ok(EventFilter {
            level,
            service: self.service.clone(),
            range: TimeRange::new(since, until)?,
        })
    }
}

/// `GET /v1/events?level&service&since&until&lastSecs&limit&pageToken`
pub async fn get_events(
    State(state): State<CollectorState>,
    Query(query): Query<EventQuery>,
) -> Result<Json<Page<LogEvent>>, ApiError> {
    let filter = query.filter()?;
    let page = PageRequest {
        limit: query.limit,
        page_token: query.page_token,
    };
    Ok(Json(state.store.query_events(&filter, &page)?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub store: StoreStats,
    pub open_spans: usize,
}

/// `GET /health`
pub async fn health(State(state): State<CollectorState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        store: state.store.stats(),
        open_spans: state.tracer.open_spans(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackpressurePolicy;
    use crate::context::{ContextManager, TraceContext};
    use crate::events::{clock, Emitter};
    use crate::shipper::{EventQueue, ShipperStats};
    use crate::store::CorrelationStore;
    use crate::tracer::Tracer;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn state() -> CollectorState {
        let queue = EventQueue::new(
            100,
            10,
            BackpressurePolicy::Drop,
            Duration::ZERO,
            Arc::new(ShipperStats::default()),
        );
        CollectorState {
            store: CorrelationStore::in_memory(),
            tracer: Tracer::new(Emitter::new("collector", ContextManager::default(), queue)),
            started_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn test_ingest_counts_outcomes() {
        let state = state();
        let ctx = TraceContext::new_root(true);
        let line = LogEvent::new(clock::now(), Level::Info, "booking", "booking", "m", &ctx)
            .to_json()
            .unwrap();
        let body = format!("{line}\n\n{line}\nnot json\n");

        let Json(response) = ingest(State(state.clone()), body).await.unwrap();
        assert_eq!(response.accepted, 1);
        assert_eq!(response.duplicates, 1);
        assert_eq!(response.rejected, 1);
        assert!(response.errors[0].starts_with("line 4"));
        assert_eq!(state.store.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_trace_id_is_400() {
        let result = get_trace(
            State(state()),
            Path("has space".to_string()),
            Query(PageParams::default()),
        )
        .await;
        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_summary_is_404() {
        let result = get_trace_summary(State(state()), Path("abc".to_string())).await;
        assert_eq!(result.unwrap_err().into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_event_query_validation() {
        let query = EventQuery {
            level: Some("loud".into()),
            ..EventQuery::default()
        };
        assert!(query.filter().is_err());

        let query = EventQuery {
            since: Some("2024-03-01T12:00:00Z".into()),
            until: Some("2024-03-01T11:00:00Z".into()),
            ..EventQuery::default()
        };
        let response = query.filter().unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let query = EventQuery {
            level: Some("error".into()),
            last_secs: Some(60),
            ..EventQuery::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.level, Some(Level::Error));
        assert!(filter.range.since.is_some());
    }
}
