use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::contracts::{
    AllocationError, Certificate, CertificateStore, Counter, CounterStore, IssuanceError,
    StorageError,
};
use crate::issuance::{CertificateIssuer, NewCertificate};
use crate::metrics::MetricsRegistry;
use crate::sequence::CounterAllocator;

/// Application state shared across handlers.
pub struct AppState<S: CounterStore + CertificateStore> {
    pub storage: Arc<S>,
    pub issuer: CertificateIssuer<CounterAllocator<S>, S>,
    pub metrics: Arc<MetricsRegistry>,
    pub start_time: Instant,
}

impl<S: CounterStore + CertificateStore> AppState<S> {
    /// Wires the allocator and issuer over `storage`.
    pub fn new(storage: Arc<S>, metrics: Arc<MetricsRegistry>) -> Self {
        let allocator = CounterAllocator::new(Arc::clone(&storage))
            .with_metrics(Arc::clone(&metrics.allocation));
        let issuer = CertificateIssuer::new(allocator, Arc::clone(&storage))
            .with_metrics(Arc::clone(&metrics.issuance));
        Self {
            storage,
            issuer,
            metrics,
            start_time: Instant::now(),
        }
    }
}

/// Response for certificate creation.
#[derive(Debug, Serialize)]
pub struct CreateCertificateResponse {
    pub success: bool,
    pub message: String,
    pub certificate: Certificate,
}

/// Query parameters for listing certificates.
#[derive(Debug, Deserialize)]
pub struct ListCertificatesQuery {
    /// Case-insensitive search over name, title, identifier and number
    pub q: Option<String>,
}

/// Response for listing certificates.
#[derive(Debug, Serialize)]
pub struct ListCertificatesResponse {
    pub success: bool,
    pub count: usize,
    pub certificates: Vec<Certificate>,
}

/// Response for a single certificate lookup.
#[derive(Debug, Serialize)]
pub struct GetCertificateResponse {
    pub success: bool,
    pub certificate: Certificate,
}

/// Response for the counters listing.
#[derive(Debug, Serialize)]
pub struct CountersResponse {
    pub counters: Vec<Counter>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: String,
}

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Issuance(IssuanceError),
    Storage(StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg)
            | ApiError::Issuance(IssuanceError::InvalidRequest(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Issuance(IssuanceError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                "CERTIFICATE_NOT_FOUND",
                format!("Certificate not found: {}", id),
            ),
            ApiError::Issuance(IssuanceError::Allocation(AllocationError::InvalidKey {
                key,
                reason,
            })) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INVALID_COUNTER_KEY",
                format!("Configured counter key {:?} is invalid: {}", key, reason),
            ),
            ApiError::Issuance(IssuanceError::Allocation(e)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ALLOCATION_FAILED",
                format!("Failed to generate certificate: {}", e),
            ),
            ApiError::Issuance(IssuanceError::Storage(e)) | ApiError::Storage(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                e.to_string(),
            ),
        };

        let body = ErrorResponse {
            success: false,
            message,
            code: code.into(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<IssuanceError> for ApiError {
    fn from(e: IssuanceError) -> Self {
        ApiError::Issuance(e)
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Storage(e)
    }
}

/// POST /certificates
/// Issue a certificate numbered from the certificate counter.
pub async fn create_certificate<S: CounterStore + CertificateStore>(
    State(state): State<Arc<AppState<S>>>,
    body: Bytes,
) -> Result<Json<CreateCertificateResponse>, ApiError> {
    let request: NewCertificate = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;

    let certificate = state.issuer.issue(request)?;

    Ok(Json(CreateCertificateResponse {
        success: true,
        message: "Certificate generated successfully".into(),
        certificate,
    }))
}

/// GET /certificates
/// List certificates, newest first.
pub async fn list_certificates<S: CounterStore + CertificateStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListCertificatesQuery>,
) -> Result<Json<ListCertificatesResponse>, ApiError> {
    let certificates = state.issuer.list(query.q.as_deref())?;
    Ok(Json(ListCertificatesResponse {
        success: true,
        count: certificates.len(),
        certificates,
    }))
}

/// GET /certificates/{certificate_id}
pub async fn get_certificate<S: CounterStore + CertificateStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(certificate_id): Path<String>,
) -> Result<Json<GetCertificateResponse>, ApiError> {
    let certificate = state.issuer.get(&certificate_id)?;
    Ok(Json(GetCertificateResponse {
        success: true,
        certificate,
    }))
}

/// GET /counters
/// Current counter values. Diagnostic only: a value read here is stale as
/// soon as anything allocates.
pub async fn list_counters<S: CounterStore + CertificateStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<CountersResponse>, ApiError> {
    let counters = state.storage.list_counters()?;
    Ok(Json(CountersResponse { counters }))
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy"
    }))
}

/// Response for readiness endpoint.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health/ready
/// Ready when the counter store answers a read.
pub async fn health_ready<S: CounterStore + CertificateStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    match state.storage.list_counters() {
        Ok(_) => Ok(Json(ReadinessResponse {
            status: "ready".into(),
            error: None,
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready".into(),
                    error: Some(e.to_string()),
                }),
            ))
        }
    }
}

/// Response for stats endpoint.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_secs: f64,
    pub allocations: AllocationStats,
    pub certificates: CertificateStats,
}

#[derive(Debug, Serialize)]
pub struct AllocationStats {
    pub total: u64,
    pub errors_total: u64,
    pub invalid_keys_total: u64,
    pub avg_latency_us: f64,
}

#[derive(Debug, Serialize)]
pub struct CertificateStats {
    pub issued_total: u64,
    pub rejected_total: u64,
    pub failed_total: u64,
    pub avg_latency_us: f64,
}

/// GET /stats
pub async fn get_stats<S: CounterStore + CertificateStore>(
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    let allocation = &state.metrics.allocation;
    let issuance = &state.metrics.issuance;

    Json(StatsResponse {
        uptime_secs: state.start_time.elapsed().as_secs_f64(),
        allocations: AllocationStats {
            total: allocation.allocations_total.load(Ordering::Relaxed),
            errors_total: allocation.errors_total.load(Ordering::Relaxed),
            invalid_keys_total: allocation.invalid_keys_total.load(Ordering::Relaxed),
            avg_latency_us: allocation.latency_us.mean(),
        },
        certificates: CertificateStats {
            issued_total: issuance.issued_total.load(Ordering::Relaxed),
            rejected_total: issuance.rejected_total.load(Ordering::Relaxed),
            failed_total: issuance.failed_total.load(Ordering::Relaxed),
            avg_latency_us: issuance.latency_us.mean(),
        },
    })
}

/// GET /metrics
/// Prometheus text exposition format.
pub async fn metrics<S: CounterStore + CertificateStore>(
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    let mut output = format!(
        "# HELP tally_uptime_secs Server uptime in seconds\n\
         # TYPE tally_uptime_secs gauge\n\
         tally_uptime_secs {:.3}\n\
         \n",
        state.start_time.elapsed().as_secs_f64()
    );
    output.push_str(&state.metrics.format_prometheus());

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
}
