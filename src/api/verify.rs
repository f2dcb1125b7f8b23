//! REST API endpoints for text verification and stored results

use actix_web::{HttpResponse, get, post, web};
use tokio_util::sync::CancellationToken;

use crate::api::error::ApiError;
use crate::app::AppState;
use crate::db::models::{AnalysisPage, ListAnalysesQuery};
use crate::model::{VerificationResponse, VerifyRequest};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Verify the factual claims in a text
#[utoipa::path(
    post,
    path = "/api/v1/verify/text",
    request_body = VerifyRequest,
    responses(
        (status = 201, description = "Text verified", body = VerificationResponse),
        (status = 400, description = "Missing or empty text", body = crate::api::error::ErrorResponse),
        (status = 500, description = "Claim extraction failed", body = crate::api::error::ErrorResponse)
    ),
    tag = "verification"
)]
#[post("/verify/text")]
pub async fn verify_text(
    state: web::Data<AppState>,
    request: web::Json<VerifyRequest>,
) -> Result<HttpResponse, ApiError> {
    // Dropped with the request future when the client goes away
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let response = state.engine.verify_text(&request.text, &cancel).await?;

    tracing::info!(
        id = %response.id,
        claims = response.claims.len(),
        warnings = response.warnings.len(),
        "Text verified"
    );

    Ok(HttpResponse::Created().json(response))
}

/// List stored analyses, most recent first
#[utoipa::path(
    get,
    path = "/api/v1/results",
    params(ListAnalysesQuery),
    responses(
        (status = 200, description = "Analyses retrieved successfully", body = AnalysisPage),
        (status = 500, description = "Internal server error", body = crate::api::error::ErrorResponse)
    ),
    tag = "results"
)]
#[get("/results")]
pub async fn list_results(
    state: web::Data<AppState>,
    query: web::Query<ListAnalysesQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let results = state.store.list_analyses(limit, offset).await?;

    Ok(HttpResponse::Ok().json(AnalysisPage {
        results,
        limit,
        offset,
    }))
}

/// Get a stored analysis with its claims
#[utoipa::path(
    get,
    path = "/api/v1/results/{id}",
    params(
        ("id" = String, Path, description = "Analysis ID")
    ),
    responses(
        (status = 200, description = "Analysis retrieved successfully", body = VerificationResponse),
        (status = 404, description = "Analysis not found", body = crate::api::error::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::api::error::ErrorResponse)
    ),
    tag = "results"
)]
#[get("/results/{id}")]
pub async fn get_result(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let analysis = state.store.get_analysis(&id).await?;
    let claims = state.store.get_claims_by_analysis(&analysis.id).await?;

    Ok(HttpResponse::Ok().json(VerificationResponse::new(analysis, claims, Vec::new())))
}

/// Configure verification routes, mounted under `/api/v1`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(verify_text)
        .service(list_results)
        .service(get_result);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test};

    use super::*;
    use crate::api::error::json_error_handler;
    use crate::model::Config;
    use crate::service::VerificationEngine;
    use crate::service::test_support::{MemoryStore, ScriptedModel};

    fn responder(system: Option<&str>, _user: &str) -> Result<String, crate::llm::ProviderError> {
        if system.is_some_and(|s| s.contains("verification_status")) {
            Ok(r#"{"verification_status": "verified", "confidence_score": 0.8, "reasoning": "Known fact"}"#
                .to_string())
        } else {
            Ok(r#"{"claims": [{"text": "Lisbon is the capital of Portugal", "type": "geographic", "sentence_index": 0}]}"#
                .to_string())
        }
    }

    fn state(store: Arc<MemoryStore>) -> web::Data<AppState> {
        let llm = Arc::new(ScriptedModel::new(responder));
        let engine = VerificationEngine::from_config(
            &Config::default(),
            llm,
            Vec::new(),
            store.clone(),
            None,
        );
        web::Data::new(AppState {
            store,
            cache: None,
            engine: Arc::new(engine),
        })
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state)
                    .app_data(web::JsonConfig::default().error_handler(json_error_handler))
                    .service(web::scope("/api/v1").configure(configure)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_verify_then_fetch() {
        let store = Arc::new(MemoryStore::default());
        let app = app!(state(store.clone()));

        let req = test::TestRequest::post()
            .uri("/api/v1/verify/text")
            .set_json(serde_json::json!({"text": "Lisbon is the capital of Portugal."}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let created: VerificationResponse = test::read_body_json(resp).await;
        assert_eq!(created.claims.len(), 1);
        assert_eq!(created.analysis.total_claims, 1);

        store.wait_for_analyses(1).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/results/{}", created.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let fetched: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(fetched["id"], created.id.as_str());
        assert!(fetched.get("warnings").is_none());
    }

    #[actix_web::test]
    async fn test_empty_and_malformed_bodies_are_400() {
        let app = app!(state(Arc::new(MemoryStore::default())));

        let req = test::TestRequest::post()
            .uri("/api/v1/verify/text")
            .set_json(serde_json::json!({"text": "   "}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/v1/verify/text")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "bad_request");
        assert!(body["request_id"].is_string());
    }

    #[actix_web::test]
    async fn test_unknown_result_is_404() {
        let app = app!(state(Arc::new(MemoryStore::default())));

        let req = test::TestRequest::get()
            .uri("/api/v1/results/missing")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_list_clamps_page_size() {
        let app = app!(state(Arc::new(MemoryStore::default())));

        let req = test::TestRequest::get()
            .uri("/api/v1/results?limit=500&offset=-3")
            .to_request();
        let page: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(page["limit"], 100);
        assert_eq!(page["offset"], 0);
        assert_eq!(page["results"], serde_json::json!([]));
    }
}
