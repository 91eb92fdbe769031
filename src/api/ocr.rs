//! OCR post-processing endpoint

use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::ocr::{rank_candidates, Candidates, OcrLine};

use super::AuthenticatedUser;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CandidatesRequest {
    pub lines: Vec<OcrLine>,
}

/// Rank detected cover lines into title and author candidates
#[utoipa::path(
    post,
    path = "/ocr/candidates",
    tag = "ocr",
    security(("bearer_auth" = [])),
    request_body = CandidatesRequest,
    responses(
        (status = 200, description = "Ranked candidates", body = Candidates),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn candidates(
    AuthenticatedUser(_claims): AuthenticatedUser,
    Json(request): Json<CandidatesRequest>,
) -> Json<Candidates> {
    Json(rank_candidates(&request.lines))
}
