//! Club and membership models

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::text_enum;

text_enum! {
    pub enum ClubRole {
        Admin => "admin",
        Member => "member",
    }
}

text_enum! {
    pub enum MemberStatus {
        Active => "active",
        Pending => "pending",
    }
}

/// Characters used in invite codes (no 0/O/1/I/L)
const INVITE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const INVITE_CODE_LEN: usize = 8;

pub fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_ALPHABET[rng.gen_range(0..INVITE_ALPHABET.len())] as char)
        .collect()
}

/// Canonical form of a user-typed invite code
pub fn normalize_invite_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Club {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub is_private: bool,
    /// Only returned to club admins
    pub invite_code: Option<String>,
    pub created_by: Uuid,
    pub member_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A club as seen from one of its members
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserClub {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub is_private: bool,
    pub member_count: i64,
    pub role: ClubRole,
    pub membership_status: MemberStatus,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ClubMember {
    pub club_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub profile_picture_url: Option<String>,
    pub role: ClubRole,
    pub status: MemberStatus,
    pub joined_at: DateTime<Utc>,
}

/// Role and status of one user in one club
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct Membership {
    pub role: ClubRole,
    pub status: MemberStatus,
}

impl Membership {
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    pub fn is_admin(&self) -> bool {
        self.is_active() && self.role == ClubRole::Admin
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateClub {
    #[serde(deserialize_with = "crate::models::trimmed")]
    #[validate(length(min = 3, max = 100, message = "Club name must be 3 to 100 characters"))]
    pub name: String,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(length(max = 200, message = "Location must be at most 200 characters"))]
    pub location: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateClub {
    #[serde(default, deserialize_with = "crate::models::trimmed_opt")]
    #[validate(length(min = 3, max = 100, message = "Club name must be 3 to 100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(length(max = 200, message = "Location must be at most 200 characters"))]
    pub location: Option<String>,
    pub is_private: Option<bool>,
}

/// Join by invite code, or by id for public clubs
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinClub {
    pub invite_code: Option<String>,
    pub club_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JoinClubResponse {
    pub club_id: Uuid,
    pub status: MemberStatus,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ClubQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_club_name_is_trimmed_before_validation() {
        let club: CreateClub = serde_json::from_value(serde_json::json!({ "name": "     " })).unwrap();
        assert!(club.validate().unwrap_err().field_errors().contains_key("name"));

        let club: CreateClub = serde_json::from_value(serde_json::json!({ "name": " ab  " })).unwrap();
        assert!(club.validate().is_err());

        let club: CreateClub = serde_json::from_value(serde_json::json!({ "name": "  Sci-fi Circle " })).unwrap();
        assert_eq!(club.name, "Sci-fi Circle");
        assert!(club.validate().is_ok());

        let update: UpdateClub = serde_json::from_value(serde_json::json!({ "name": "   " })).unwrap();
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_invite_code_shape() {
        for _ in 0..50 {
            let code = generate_invite_code();
            assert_eq!(code.len(), INVITE_CODE_LEN);
            assert!(code.bytes().all(|b| INVITE_ALPHABET.contains(&b)));
            assert!(!code.contains('O') && !code.contains('0') && !code.contains('I'));
        }
    }

    #[test]
    fn test_normalize_invite_code() {
        assert_eq!(normalize_invite_code("  abcd2345 "), "ABCD2345");
    }

    #[test]
    fn test_membership_rules() {
        let pending_admin = Membership {
            role: ClubRole::Admin,
            status: MemberStatus::Pending,
        };
        assert!(!pending_admin.is_admin());
        let admin = Membership {
            role: ClubRole::Admin,
            status: MemberStatus::Active,
        };
        assert!(admin.is_admin());
        let member = Membership {
            role: ClubRole::Member,
            status: MemberStatus::Active,
        };
        assert!(member.is_active() && !member.is_admin());
    }
}
