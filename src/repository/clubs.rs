//! Clubs repository for database operations

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::contains_pattern;
use crate::{
    error::{AppError, AppResult},
    models::{
        club::{Club, ClubMember, ClubQuery, CreateClub, Membership, UpdateClub, UserClub},
        page_bounds, ClubRole, MemberStatus,
    },
};

const CLUB_SELECT: &str = r#"
    SELECT c.id, c.name, c.description, c.location, c.is_private, c.invite_code,
           c.created_by, c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM club_members m WHERE m.club_id = c.id AND m.status = 'active') AS member_count
    FROM clubs c
"#;

#[derive(Clone)]
pub struct ClubsRepository {
    pool: Pool<Postgres>,
}

impl ClubsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get club by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Club> {
        sqlx::query_as::<_, Club>(&format!("{} WHERE c.id = $1", CLUB_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Club with id {} not found", id)))
    }

    pub async fn get_by_invite_code(&self, code: &str) -> AppResult<Option<Club>> {
        let club = sqlx::query_as::<_, Club>(&format!("{} WHERE c.invite_code = $1", CLUB_SELECT))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(club)
    }

    /// Create a club and register its creator as active admin
    pub async fn create(&self, club: &CreateClub, created_by: Uuid, invite_code: &str) -> AppResult<Club> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO clubs (id, name, description, location, is_private, invite_code, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(club.name.trim())
        .bind(&club.description)
        .bind(&club.location)
        .bind(club.is_private)
        .bind(invite_code)
        .bind(created_by)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO club_members (club_id, user_id, role, status, joined_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(id)
        .bind(created_by)
        .bind(ClubRole::Admin)
        .bind(MemberStatus::Active)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get_by_id(id).await
    }

    /// Update club fields; `None` leaves a field unchanged
    pub async fn update(&self, id: Uuid, club: &UpdateClub) -> AppResult<Club> {
        let result = sqlx::query(
            r#"
            UPDATE clubs SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                location = COALESCE($4, location),
                is_private = COALESCE($5, is_private),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(club.name.as_deref().map(str::trim))
        .bind(&club.description)
        .bind(&club.location)
        .bind(club.is_private)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Club with id {} not found", id)));
        }
        self.get_by_id(id).await
    }

    pub async fn set_invite_code(&self, id: Uuid, code: &str) -> AppResult<Club> {
        sqlx::query("UPDATE clubs SET invite_code = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(code)
            .execute(&self.pool)
            .await?;
        self.get_by_id(id).await
    }

    /// Delete a club (memberships cascade)
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM clubs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Club with id {} not found", id)));
        }
        Ok(())
    }

    /// Clubs a user belongs to, including pending requests
    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<UserClub>> {
        let clubs = sqlx::query_as::<_, UserClub>(
            r#"
            SELECT c.id, c.name, c.description, c.location, c.is_private,
                   (SELECT COUNT(*) FROM club_members m2 WHERE m2.club_id = c.id AND m2.status = 'active') AS member_count,
                   m.role, m.status AS membership_status, m.joined_at
            FROM club_members m
            JOIN clubs c ON c.id = m.club_id
            WHERE m.user_id = $1
            ORDER BY c.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(clubs)
    }

    /// Search public clubs
    pub async fn discover(&self, query: &ClubQuery) -> AppResult<(Vec<Club>, i64)> {
        let (_, per_page, offset) = page_bounds(query.page, query.per_page);

        let mut conditions = vec!["c.is_private = FALSE".to_string()];
        let mut params: Vec<String> = Vec::new();

        if let Some(ref search) = query.search {
            let search = search.trim();
            if !search.is_empty() {
                params.push(contains_pattern(search));
                let n = params.len();
                conditions.push(format!(
                    "(LOWER(c.name) LIKE ${n} ESCAPE '\\' OR LOWER(COALESCE(c.description, '')) LIKE ${n} ESCAPE '\\' OR LOWER(COALESCE(c.location, '')) LIKE ${n} ESCAPE '\\')"
                ));
            }
        }

        let where_clause = format!("WHERE {}", conditions.join(" AND "));

        let count_query = format!("SELECT COUNT(*) FROM clubs c {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "{} {} ORDER BY c.created_at DESC LIMIT {} OFFSET {}",
            CLUB_SELECT, where_clause, per_page, offset
        );
        let mut select_builder = sqlx::query_as::<_, Club>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let clubs = select_builder.fetch_all(&self.pool).await?;

        Ok((clubs, total))
    }

    pub async fn get_membership(&self, club_id: Uuid, user_id: Uuid) -> AppResult<Option<Membership>> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT role, status FROM club_members WHERE club_id = $1 AND user_id = $2",
        )
        .bind(club_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(membership)
    }

    pub async fn add_member(
        &self,
        club_id: Uuid,
        user_id: Uuid,
        role: ClubRole,
        status: MemberStatus,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO club_members (club_id, user_id, role, status, joined_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (club_id, user_id) DO NOTHING
            "#,
        )
        .bind(club_id)
        .bind(user_id)
        .bind(role)
        .bind(status)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict("Already a member of this club".to_string()));
        }
        Ok(())
    }

    /// Move a membership from `from` to `to`; false if no such membership
    pub async fn set_member_status(
        &self,
        club_id: Uuid,
        user_id: Uuid,
        from: MemberStatus,
        to: MemberStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE club_members SET status = $4, joined_at = NOW()
            WHERE club_id = $1 AND user_id = $2 AND status = $3
            "#,
        )
        .bind(club_id)
        .bind(user_id)
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_member(&self, club_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM club_members WHERE club_id = $1 AND user_id = $2")
            .bind(club_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Members with the given status, admins first
    pub async fn list_members(&self, club_id: Uuid, status: MemberStatus) -> AppResult<Vec<ClubMember>> {
        let members = sqlx::query_as::<_, ClubMember>(
            r#"
            SELECT m.club_id, m.user_id, u.name, u.profile_picture_url, m.role, m.status, m.joined_at
            FROM club_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.club_id = $1 AND m.status = $2
            ORDER BY (m.role = 'admin') DESC, m.joined_at
            "#,
        )
        .bind(club_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    /// IDs of active admins
    pub async fn admin_ids(&self, club_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM club_members WHERE club_id = $1 AND role = 'admin' AND status = 'active'",
        )
        .bind(club_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub async fn count_active_members(&self, club_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM club_members WHERE club_id = $1 AND status = 'active'",
        )
        .bind(club_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
