//! OpenAPI specification endpoints

use actix_web::{HttpResponse, Responder, get};
use utoipa::OpenApi;

use crate::api::error::{ApiError, ErrorResponse};
use crate::api::{health, verify};
use crate::db::models::AnalysisPage;
use crate::model::{
    AnalysisResult, Claim, ClaimType, Evidence, EvidenceSourceType, SourceType,
    VerificationResponse, VerificationStatus, VerifyRequest, Warning,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Verity",
        description = "Extracts factual claims from text and verifies each against retrieved evidence"
    ),
    paths(
        verify::verify_text,
        verify::list_results,
        verify::get_result,
        health::liveness,
        health::readiness,
    ),
    components(schemas(
        VerifyRequest,
        VerificationResponse,
        AnalysisResult,
        AnalysisPage,
        Claim,
        ClaimType,
        VerificationStatus,
        SourceType,
        Evidence,
        EvidenceSourceType,
        Warning,
        ErrorResponse,
        health::HealthStatus,
        health::ReadinessStatus,
        health::DependencyHealth,
    )),
    tags(
        (name = "verification", description = "Claim extraction and verification"),
        (name = "results", description = "Stored analyses"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
#[get("/openapi.json")]
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Serve OpenAPI YAML specification
#[get("/openapi.yaml")]
pub async fn openapi_yaml() -> Result<HttpResponse, ApiError> {
    let yaml = ApiDoc::openapi()
        .to_yaml()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok().content_type("text/yaml").body(yaml))
}

/// Configure OpenAPI routes
pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(openapi_json).service(openapi_yaml);
}
