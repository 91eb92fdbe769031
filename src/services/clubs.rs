//! Clubs, memberships and join requests

use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        club::{
            generate_invite_code, normalize_invite_code, Club, ClubMember, ClubQuery, CreateClub,
            JoinClub, JoinClubResponse, Membership, UpdateClub, UserClub,
        },
        notification::NotificationKind,
        ClubRole, MemberStatus,
    },
    repository::Repository,
    services::notifications::NotificationsService,
};

const INVITE_CODE_ATTEMPTS: usize = 5;

/// What happens when a member leaves or is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Departure {
    Remove,
    /// The leaver was the only active member
    DissolveClub,
}

#[derive(Clone)]
pub struct ClubsService {
    repository: Repository,
    notifications: NotificationsService,
}

impl ClubsService {
    pub fn new(repository: Repository, notifications: NotificationsService) -> Self {
        Self {
            repository,
            notifications,
        }
    }

    /// Create a club with the caller as its first admin
    pub async fn create(&self, user_id: Uuid, club: CreateClub) -> AppResult<Club> {
        club.validate()?;
        for _ in 0..INVITE_CODE_ATTEMPTS {
            let code = generate_invite_code();
            match self.repository.clubs.create(&club, user_id, &code).await {
                Err(e) if e.is_unique_violation() => {
                    tracing::debug!("Invite code collision, retrying")
                }
                result => {
                    let created = result?;
                    tracing::info!("User {} created club {}", user_id, created.id);
                    return Ok(created);
                }
            }
        }
        Err(invite_codes_exhausted())
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<UserClub>> {
        self.repository.clubs.list_for_user(user_id).await
    }

    /// Public clubs, invite codes hidden
    pub async fn discover(&self, query: &ClubQuery) -> AppResult<(Vec<Club>, i64)> {
        let (clubs, total) = self.repository.clubs.discover(query).await?;
        Ok((clubs.into_iter().map(|c| redact(c, None)).collect(), total))
    }

    pub async fn get(&self, user_id: Uuid, club_id: Uuid) -> AppResult<Club> {
        let club = self.repository.clubs.get_by_id(club_id).await?;
        let membership = self.repository.clubs.get_membership(club_id, user_id).await?;
        if club.is_private && !membership.map(|m| m.is_active()).unwrap_or(false) {
            // Private clubs do not exist for outsiders
            return Err(AppError::NotFound(format!("Club with id {} not found", club_id)));
        }
        Ok(redact(club, membership))
    }

    pub async fn update(&self, user_id: Uuid, club_id: Uuid, update: UpdateClub) -> AppResult<Club> {
        update.validate()?;
        self.require_admin(club_id, user_id).await?;
        self.repository.clubs.update(club_id, &update).await
    }

    /// Creator or admin deletes the club; shared books go back to their owners
    pub async fn delete(&self, user_id: Uuid, club_id: Uuid) -> AppResult<()> {
        let club = self.repository.clubs.get_by_id(club_id).await?;
        if club.created_by != user_id {
            self.require_admin(club_id, user_id).await?;
        }
        self.dissolve(club_id).await
    }

    async fn dissolve(&self, club_id: Uuid) -> AppResult<()> {
        let unshared = self.repository.books.unshare_all_from_club(club_id).await?;
        self.repository.clubs.delete(club_id).await?;
        tracing::info!("Club {} deleted, {} books unshared", club_id, unshared);
        Ok(())
    }

    /// Join with an invite code, or by id for public clubs.
    /// Private clubs create a pending request for the admins to review.
    pub async fn join(&self, user_id: Uuid, request: JoinClub) -> AppResult<JoinClubResponse> {
        let club = match (request.invite_code.as_deref(), request.club_id) {
            (Some(code), _) if !code.trim().is_empty() => self
                .repository
                .clubs
                .get_by_invite_code(&normalize_invite_code(code))
                .await?
                .ok_or_else(|| AppError::NotFound("Invalid invite code".to_string()))?,
            (_, Some(club_id)) => {
                let club = self.repository.clubs.get_by_id(club_id).await?;
                if club.is_private {
                    return Err(AppError::Authorization(
                        "An invite code is required to join a private club".to_string(),
                    ));
                }
                club
            }
            _ => {
                return Err(AppError::BadRequest(
                    "Provide an invite code or a club id".to_string(),
                ))
            }
        };

        let status = join_status(&club);
        self.repository
            .clubs
            .add_member(club.id, user_id, ClubRole::Member, status)
            .await?;

        if status == MemberStatus::Pending {
            let requester = self.repository.users.get_by_id(user_id).await?;
            for admin_id in self.repository.clubs.admin_ids(club.id).await? {
                self.notifications
                    .notify_quietly(
                        admin_id,
                        NotificationKind::ClubJoinRequest,
                        "New join request",
                        format!("{} asked to join {}", requester.name, club.name),
                        json!({ "club_id": club.id, "user_id": user_id }),
                    )
                    .await;
            }
        }

        tracing::info!("User {} joined club {} as {}", user_id, club.id, status);
        Ok(JoinClubResponse {
            club_id: club.id,
            status,
        })
    }

    /// Active members, visible to members only
    pub async fn members(&self, user_id: Uuid, club_id: Uuid) -> AppResult<Vec<ClubMember>> {
        self.require_member(club_id, user_id).await?;
        self.repository
            .clubs
            .list_members(club_id, MemberStatus::Active)
            .await
    }

    /// Pending join requests, visible to admins only
    pub async fn requests(&self, user_id: Uuid, club_id: Uuid) -> AppResult<Vec<ClubMember>> {
        self.require_admin(club_id, user_id).await?;
        self.repository
            .clubs
            .list_members(club_id, MemberStatus::Pending)
            .await
    }

    pub async fn approve(&self, admin_id: Uuid, club_id: Uuid, user_id: Uuid) -> AppResult<()> {
        self.require_admin(club_id, admin_id).await?;
        let approved = self
            .repository
            .clubs
            .set_member_status(club_id, user_id, MemberStatus::Pending, MemberStatus::Active)
            .await?;
        if !approved {
            return Err(AppError::NotFound("No pending request for this user".to_string()));
        }

        let club = self.repository.clubs.get_by_id(club_id).await?;
        self.notifications
            .notify_quietly(
                user_id,
                NotificationKind::ClubJoinApproved,
                "Join request approved",
                format!("Welcome to {}!", club.name),
                json!({ "club_id": club_id }),
            )
            .await;
        Ok(())
    }

    pub async fn reject(&self, admin_id: Uuid, club_id: Uuid, user_id: Uuid) -> AppResult<()> {
        self.require_admin(club_id, admin_id).await?;
        match self.repository.clubs.get_membership(club_id, user_id).await? {
            Some(m) if m.status == MemberStatus::Pending => {}
            _ => return Err(AppError::NotFound("No pending request for this user".to_string())),
        }
        self.repository.clubs.remove_member(club_id, user_id).await?;

        let club = self.repository.clubs.get_by_id(club_id).await?;
        self.notifications
            .notify_quietly(
                user_id,
                NotificationKind::ClubJoinRejected,
                "Join request declined",
                format!("Your request to join {} was declined", club.name),
                json!({ "club_id": club_id }),
            )
            .await;
        Ok(())
    }

    /// An admin removes a member, or a member leaves
    pub async fn remove_member(&self, actor_id: Uuid, club_id: Uuid, user_id: Uuid) -> AppResult<()> {
        if actor_id != user_id {
            self.require_admin(club_id, actor_id).await?;
        }

        let membership = self
            .repository
            .clubs
            .get_membership(club_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User is not a member of this club".to_string()))?;

        let admins = self.repository.clubs.admin_ids(club_id).await?;
        let active = self.repository.clubs.count_active_members(club_id).await?;

        match plan_departure(&membership, admins.len(), active)? {
            Departure::DissolveClub => self.dissolve(club_id).await,
            Departure::Remove => {
                self.repository.clubs.remove_member(club_id, user_id).await?;
                self.repository.books.unshare_from_club(club_id, user_id).await?;
                tracing::info!("User {} left club {}", user_id, club_id);
                Ok(())
            }
        }
    }

    pub async fn regenerate_invite_code(&self, user_id: Uuid, club_id: Uuid) -> AppResult<Club> {
        self.require_admin(club_id, user_id).await?;
        for _ in 0..INVITE_CODE_ATTEMPTS {
            let code = generate_invite_code();
            match self.repository.clubs.set_invite_code(club_id, &code).await {
                Err(e) if e.is_unique_violation() => {
                    tracing::debug!("Invite code collision, retrying")
                }
                result => return result,
            }
        }
        Err(invite_codes_exhausted())
    }

    async fn require_member(&self, club_id: Uuid, user_id: Uuid) -> AppResult<Membership> {
        match self.repository.clubs.get_membership(club_id, user_id).await? {
            Some(m) if m.is_active() => Ok(m),
            _ => Err(AppError::Authorization("You are not a member of this club".to_string())),
        }
    }

    async fn require_admin(&self, club_id: Uuid, user_id: Uuid) -> AppResult<Membership> {
        let membership = self.require_member(club_id, user_id).await?;
        if membership.is_admin() {
            Ok(membership)
        } else {
            Err(AppError::Authorization("Club admin rights required".to_string()))
        }
    }
}

fn invite_codes_exhausted() -> AppError {
    AppError::Internal("Could not generate a unique invite code".to_string())
}

fn join_status(club: &Club) -> MemberStatus {
    if club.is_private {
        MemberStatus::Pending
    } else {
        MemberStatus::Active
    }
}

/// Hide the invite code from everyone but admins
fn redact(mut club: Club, membership: Option<Membership>) -> Club {
    if !membership.map(|m| m.is_admin()).unwrap_or(false) {
        club.invite_code = None;
    }
    club
}

/// The last admin may not leave while other members remain
fn plan_departure(membership: &Membership, admin_count: usize, active_members: i64) -> AppResult<Departure> {
    if !membership.is_active() {
        return Ok(Departure::Remove);
    }
    if active_members <= 1 {
        return Ok(Departure::DissolveClub);
    }
    if membership.is_admin() && admin_count <= 1 {
        return Err(AppError::BusinessRule(
            "Promote another admin before the last admin leaves".to_string(),
        ));
    }
    Ok(Departure::Remove)
}
