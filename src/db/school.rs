//! School model and repository.

use uuid::Uuid;

use super::DbPool;
use crate::{Result, SchoolgateError};

/// School entity.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct School {
    /// School ID.
    pub id: String,
    /// School name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: String,
}

/// New school for creation.
#[derive(Debug, Clone)]
pub struct NewSchool {
    /// School name.
    pub name: String,
}

impl NewSchool {
    /// Create a new school with a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Repository for school operations.
pub struct SchoolRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SchoolRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new school.
    pub async fn create(&self, new_school: &NewSchool) -> Result<School> {
        let id = Uuid::new_v4().simple().to_string();

        sqlx::query("INSERT INTO schools (id, name) VALUES (?, ?)")
            .bind(&id)
            .bind(&new_school.name)
            .execute(self.pool)
            .await?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| SchoolgateError::NotFound("school".to_string()))
    }

    /// Get a school by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<School>> {
        let school = sqlx::query_as::<_, School>(
            "SELECT id, name, created_at FROM schools WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(school)
    }

    /// Check whether the school exists and its principal has `username`.
    ///
    /// The comparison is case-insensitive.
    pub async fn principal_owns(&self, school_id: &str, username: &str) -> Result<bool> {
        let owns: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM schools s
                JOIN principals p ON p.school_id = s.id
                WHERE s.id = ? AND p.username = ?
            )",
        )
        .bind(school_id)
        .bind(username)
        .fetch_one(self.pool)
        .await?;

        Ok(owns)
    }
}
