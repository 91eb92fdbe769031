//! Club endpoints: membership, join requests and invite codes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::club::{
        Club, ClubMember, ClubQuery, CreateClub, JoinClub, JoinClubResponse, UpdateClub, UserClub,
    },
};

use super::{AuthenticatedUser, PaginatedResponse};

/// Create a club; the caller becomes its admin
#[utoipa::path(
    post,
    path = "/clubs",
    tag = "clubs",
    security(("bearer_auth" = [])),
    request_body = CreateClub,
    responses(
        (status = 201, description = "Club created", body = Club),
        (status = 400, description = "Invalid club data")
    )
)]
pub async fn create_club(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(club): Json<CreateClub>,
) -> AppResult<(StatusCode, Json<Club>)> {
    let created = state.services.clubs.create(claims.user_id(), club).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Clubs the caller belongs to, with role and membership status
#[utoipa::path(
    get,
    path = "/clubs",
    tag = "clubs",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's clubs", body = Vec<UserClub>)
    )
)]
pub async fn list_my_clubs(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<UserClub>>> {
    let clubs = state.services.clubs.list_for_user(claims.user_id()).await?;
    Ok(Json(clubs))
}

/// Browse public clubs
#[utoipa::path(
    get,
    path = "/clubs/discover",
    tag = "clubs",
    security(("bearer_auth" = [])),
    params(ClubQuery),
    responses(
        (status = 200, description = "Page of public clubs", body = PaginatedResponse<Club>)
    )
)]
pub async fn discover_clubs(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<ClubQuery>,
) -> AppResult<Json<PaginatedResponse<Club>>> {
    let (clubs, total) = state.services.clubs.discover(&query).await?;
    Ok(Json(PaginatedResponse::new(clubs, total, query.page, query.per_page)))
}

/// Get club details
#[utoipa::path(
    get,
    path = "/clubs/{id}",
    tag = "clubs",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Club ID")
    ),
    responses(
        (status = 200, description = "Club details", body = Club),
        (status = 404, description = "Club not found or private")
    )
)]
pub async fn get_club(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Club>> {
    let club = state.services.clubs.get(claims.user_id(), id).await?;
    Ok(Json(club))
}

/// Update a club (admin only)
#[utoipa::path(
    put,
    path = "/clubs/{id}",
    tag = "clubs",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Club ID")
    ),
    request_body = UpdateClub,
    responses(
        (status = 200, description = "Club updated", body = Club),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn update_club(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(update): Json<UpdateClub>,
) -> AppResult<Json<Club>> {
    let club = state.services.clubs.update(claims.user_id(), id, update).await?;
    Ok(Json(club))
}

/// Delete a club (creator or admin)
#[utoipa::path(
    delete,
    path = "/clubs/{id}",
    tag = "clubs",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Club ID")
    ),
    responses(
        (status = 204, description = "Club deleted"),
        (status = 403, description = "Not allowed")
    )
)]
pub async fn delete_club(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.clubs.delete(claims.user_id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Join a club by invite code, or a public club by id
#[utoipa::path(
    post,
    path = "/clubs/join",
    tag = "clubs",
    security(("bearer_auth" = [])),
    request_body = JoinClub,
    responses(
        (status = 200, description = "Joined, or request pending approval", body = JoinClubResponse),
        (status = 404, description = "Invalid invite code"),
        (status = 409, description = "Already a member")
    )
)]
pub async fn join_club(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<JoinClub>,
) -> AppResult<Json<JoinClubResponse>> {
    let response = state.services.clubs.join(claims.user_id(), request).await?;
    Ok(Json(response))
}

/// Active members of a club (members only)
#[utoipa::path(
    get,
    path = "/clubs/{id}/members",
    tag = "clubs",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Club ID")
    ),
    responses(
        (status = 200, description = "Club members", body = Vec<ClubMember>),
        (status = 403, description = "Not a member")
    )
)]
pub async fn list_members(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<ClubMember>>> {
    let members = state.services.clubs.members(claims.user_id(), id).await?;
    Ok(Json(members))
}

/// Pending join requests (admin only)
#[utoipa::path(
    get,
    path = "/clubs/{id}/requests",
    tag = "clubs",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Club ID")
    ),
    responses(
        (status = 200, description = "Pending requests", body = Vec<ClubMember>),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_requests(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<ClubMember>>> {
    let requests = state.services.clubs.requests(claims.user_id(), id).await?;
    Ok(Json(requests))
}

/// Approve a join request (admin only)
#[utoipa::path(
    post,
    path = "/clubs/{id}/requests/{user_id}/approve",
    tag = "clubs",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Club ID"),
        ("user_id" = Uuid, Path, description = "Requesting user ID")
    ),
    responses(
        (status = 204, description = "Request approved"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "No pending request")
    )
)]
pub async fn approve_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state.services.clubs.approve(claims.user_id(), id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reject a join request (admin only)
#[utoipa::path(
    post,
    path = "/clubs/{id}/requests/{user_id}/reject",
    tag = "clubs",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Club ID"),
        ("user_id" = Uuid, Path, description = "Requesting user ID")
    ),
    responses(
        (status = 204, description = "Request rejected"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "No pending request")
    )
)]
pub async fn reject_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state.services.clubs.reject(claims.user_id(), id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a member (admin) or leave the club (self)
#[utoipa::path(
    delete,
    path = "/clubs/{id}/members/{user_id}",
    tag = "clubs",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Club ID"),
        ("user_id" = Uuid, Path, description = "Member user ID")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Not an admin"),
        (status = 422, description = "Last admin cannot leave")
    )
)]
pub async fn remove_member(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state
        .services
        .clubs
        .remove_member(claims.user_id(), id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Generate a new invite code (admin only)
#[utoipa::path(
    post,
    path = "/clubs/{id}/invite-code",
    tag = "clubs",
    security(("bearer_auth" = [])),
    params(
        ("id" = Uuid, Path, description = "Club ID")
    ),
    responses(
        (status = 200, description = "Club with its new code", body = Club),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn regenerate_invite_code(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Club>> {
    let club = state
        .services
        .clubs
        .regenerate_invite_code(claims.user_id(), id)
        .await?;
    Ok(Json(club))
}
