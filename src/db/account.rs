//! Account model and repository.
//!
//! Students, staff and principals live in separate tables with identical
//! security columns. [`AccountRepository`] is bound to one role and therefore
//! one table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DbPool;
use crate::security::SecurityState;
use crate::{Result, SchoolgateError};

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Student.
    Student,
    /// Teaching or administrative staff.
    Staff,
    /// School principal (tenant administrator).
    Principal,
}

impl Role {
    /// All roles.
    pub const ALL: [Role; 3] = [Role::Student, Role::Staff, Role::Principal];

    /// Convert role to its wire and database string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Staff => "staff",
            Role::Principal => "principal",
        }
    }

    /// Table holding accounts of this role.
    fn table(&self) -> &'static str {
        match self {
            Role::Student => "students",
            Role::Staff => "staff",
            Role::Principal => "principals",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "staff" => Ok(Role::Staff),
            "principal" => Ok(Role::Principal),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Account entity.
#[derive(Debug, Clone)]
pub struct Account {
    /// Account ID (32 hex characters).
    pub id: String,
    /// Role, determined by the table the account lives in.
    pub role: Role,
    /// School the account belongs to.
    pub school_id: String,
    /// Login name.
    pub username: String,
    /// Display name.
    pub name: String,
    /// Email address used for OTP delivery.
    pub email: Option<String>,
    /// Argon2id password hash.
    pub password_hash: String,
    /// Lockout and OTP state.
    pub security: SecurityState,
    /// Last successful login.
    pub last_login_at: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
}

/// New account for creation.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// School the account belongs to.
    pub school_id: String,
    /// Login name.
    pub username: String,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: Option<String>,
    /// Pre-computed Argon2id hash.
    pub password_hash: String,
}

impl NewAccount {
    /// Create a new account with the required fields.
    pub fn new(
        school_id: impl Into<String>,
        username: impl Into<String>,
        name: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            school_id: school_id.into(),
            username: username.into(),
            name: name.into(),
            email: None,
            password_hash: password_hash.into(),
        }
    }

    /// Set the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Result of a recorded login failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginFailure {
    /// Counter after the increment.
    pub failed_login_attempts: u32,
    /// Whether the account is now blocked.
    pub is_blocked: bool,
}

const ACCOUNT_COLUMNS: &str = "id, school_id, username, name, email, password_hash,
    failed_login_attempts, is_blocked, otp, otp_expires_at, otp_attempts,
    last_login_at, created_at";

/// Repository for account operations on the table of one role.
///
/// Every security transition is a single conditional `UPDATE` so that
/// concurrent requests cannot push a counter past its limit or consume an
/// OTP twice.
pub struct AccountRepository<'a> {
    pool: &'a DbPool,
    role: Role,
}

impl<'a> AccountRepository<'a> {
    /// Create a new repository for accounts of `role`.
    pub fn new(pool: &'a DbPool, role: Role) -> Self {
        Self { pool, role }
    }

    /// Create a new account with zeroed security state.
    ///
    /// Principal usernames are stored lower-case.
    pub async fn create(&self, new_account: &NewAccount) -> Result<Account> {
        let id = Uuid::new_v4().simple().to_string();
        let username = match self.role {
            Role::Principal => new_account.username.to_lowercase(),
            _ => new_account.username.clone(),
        };

        let sql = format!(
            "INSERT INTO {} (id, school_id, username, name, email, password_hash)
             VALUES (?, ?, ?, ?, ?, ?)",
            self.role.table()
        );
        sqlx::query(&sql)
            .bind(&id)
            .bind(&new_account.school_id)
            .bind(&username)
            .bind(&new_account.name)
            .bind(&new_account.email)
            .bind(&new_account.password_hash)
            .execute(self.pool)
            .await?;

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| SchoolgateError::NotFound("account".to_string()))
    }

    /// Get an account by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM {} WHERE id = ?",
            self.role.table()
        );
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(|r| r.into_account(self.role)))
    }

    /// Get an account by username.
    ///
    /// Principal lookups are case-insensitive through the column collation.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM {} WHERE username = ?",
            self.role.table()
        );
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(username)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(|r| r.into_account(self.role)))
    }

    /// Increment the failed-login counter, blocking the account when it reaches `max`.
    ///
    /// Returns `None` when the account is already blocked (or missing); the
    /// counter is left untouched in that case.
    pub async fn record_failed_login(&self, id: &str, max: u32) -> Result<Option<LoginFailure>> {
        let sql = format!(
            "UPDATE {} SET
                failed_login_attempts = failed_login_attempts + 1,
                is_blocked = CASE WHEN failed_login_attempts + 1 >= ? THEN 1 ELSE is_blocked END
             WHERE id = ? AND is_blocked = 0
             RETURNING failed_login_attempts, is_blocked",
            self.role.table()
        );
        let row: Option<(i64, bool)> = sqlx::query_as(&sql)
            .bind(i64::from(max))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(|(attempts, is_blocked)| LoginFailure {
            failed_login_attempts: to_count(attempts),
            is_blocked,
        }))
    }

    /// Reset the failed-login counter and stamp the login time.
    ///
    /// Returns false when the account was blocked in the meantime.
    pub async fn record_successful_login(&self, id: &str) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET failed_login_attempts = 0, last_login_at = datetime('now')
             WHERE id = ? AND is_blocked = 0",
            self.role.table()
        );
        let result = sqlx::query(&sql).bind(id).execute(self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store a freshly issued OTP.
    pub async fn store_otp(
        &self,
        id: &str,
        code: &str,
        expires_at_ms: i64,
        reset_attempts: bool,
    ) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET
                otp = ?,
                otp_expires_at = ?,
                otp_attempts = CASE WHEN ? THEN 0 ELSE otp_attempts END
             WHERE id = ?",
            self.role.table()
        );
        let result = sqlx::query(&sql)
            .bind(code)
            .bind(expires_at_ms)
            .bind(reset_attempts)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Increment the OTP attempt counter, never past `max`.
    ///
    /// Returns the new counter, or `None` if the cap was already reached.
    pub async fn record_failed_otp(&self, id: &str, max: u32) -> Result<Option<u32>> {
        let sql = format!(
            "UPDATE {} SET otp_attempts = otp_attempts + 1
             WHERE id = ? AND otp_attempts < ?
             RETURNING otp_attempts",
            self.role.table()
        );
        let attempts: Option<i64> = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(i64::from(max))
            .fetch_optional(self.pool)
            .await?;
        Ok(attempts.map(to_count))
    }

    /// Consume a matching, unexpired OTP in one statement.
    ///
    /// Clears the OTP and resets the attempt counter. When `new_password_hash`
    /// is given it is stored by the same statement. Returns false if any guard
    /// failed, including a concurrent consumer having won.
    pub async fn consume_otp(
        &self,
        id: &str,
        code: &str,
        max_attempts: u32,
        now_ms: i64,
        new_password_hash: Option<&str>,
    ) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET
                otp = NULL,
                otp_expires_at = NULL,
                otp_attempts = 0,
                password_hash = COALESCE(?, password_hash)
             WHERE id = ?
               AND is_blocked = 0
               AND otp = ?
               AND otp_attempts < ?
               AND otp_expires_at >= ?",
            self.role.table()
        );
        let result = sqlx::query(&sql)
            .bind(new_password_hash)
            .bind(id)
            .bind(code)
            .bind(i64::from(max_attempts))
            .bind(now_ms)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn to_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Internal struct for mapping database rows to Account.
#[derive(sqlx::FromRow)]
struct AccountRow {
    id: String,
    school_id: String,
    username: String,
    name: String,
    email: Option<String>,
    password_hash: String,
    failed_login_attempts: i64,
    is_blocked: bool,
    otp: Option<String>,
    otp_expires_at: Option<i64>,
    otp_attempts: i64,
    last_login_at: Option<String>,
    created_at: String,
}

impl AccountRow {
    fn into_account(self, role: Role) -> Account {
        Account {
            id: self.id,
            role,
            school_id: self.school_id,
            username: self.username,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            security: SecurityState {
                failed_login_attempts: to_count(self.failed_login_attempts),
                is_blocked: self.is_blocked,
                otp: self.otp,
                otp_expires_at: self.otp_expires_at,
                otp_attempts: to_count(self.otp_attempts),
            },
            last_login_at: self.last_login_at,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewSchool, SchoolRepository};
    use crate::Database;

    async fn setup_db() -> (Database, String) {
        let db = Database::open_in_memory().await.unwrap();
        let school = SchoolRepository::new(db.pool())
            .create(&NewSchool::new("Hillside High"))
            .await
            .unwrap();
        (db, school.id)
    }

    #[test]
    fn test_role_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!("PRINCIPAL".parse::<Role>().unwrap(), Role::Principal);
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Staff).unwrap(), "\"staff\"");
        let role: Role = serde_json::from_str("\"student\"").unwrap();
        assert_eq!(role, Role::Student);
    }

    #[tokio::test]
    async fn test_create_account() {
        let (db, school_id) = setup_db().await;
        let repo = AccountRepository::new(db.pool(), Role::Student);

        let account = repo
            .create(&NewAccount::new(&school_id, "kid1", "Kid One", "hash").with_email("kid@example.com"))
            .await
            .unwrap();

        assert_eq!(account.id.len(), 32);
        assert_eq!(account.role, Role::Student);
        assert_eq!(account.username, "kid1");
        assert_eq!(account.email.as_deref(), Some("kid@example.com"));
        assert_eq!(account.security, SecurityState::default());
        assert!(account.last_login_at.is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_username() {
        let (db, school_id) = setup_db().await;
        let repo = AccountRepository::new(db.pool(), Role::Staff);

        repo.create(&NewAccount::new(&school_id, "mrao", "T", "hash"))
            .await
            .unwrap();
        let result = repo
            .create(&NewAccount::new(&school_id, "mrao", "T2", "hash"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_create_requires_existing_school() {
        let (db, _) = setup_db().await;
        let repo = AccountRepository::new(db.pool(), Role::Student);

        let result = repo
            .create(&NewAccount::new("no-such-school", "kid", "Kid", "hash"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_roles_use_separate_tables() {
        let (db, school_id) = setup_db().await;
        let students = AccountRepository::new(db.pool(), Role::Student);
        let staff = AccountRepository::new(db.pool(), Role::Staff);

        students
            .create(&NewAccount::new(&school_id, "sam", "Sam", "hash"))
            .await
            .unwrap();

        assert!(students.get_by_username("sam").await.unwrap().is_some());
        assert!(staff.get_by_username("sam").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_principal_username_case_insensitive() {
        let (db, school_id) = setup_db().await;
        let repo = AccountRepository::new(db.pool(), Role::Principal);

        let created = repo
            .create(&NewAccount::new(&school_id, "HeadMaster", "Head", "hash"))
            .await
            .unwrap();
        assert_eq!(created.username, "headmaster");

        let found = repo.get_by_username("HEADMASTER").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn test_record_failed_login_blocks_at_max() {
        let (db, school_id) = setup_db().await;
        let repo = AccountRepository::new(db.pool(), Role::Student);
        let account = repo
            .create(&NewAccount::new(&school_id, "kid", "Kid", "hash"))
            .await
            .unwrap();

        let first = repo.record_failed_login(&account.id, 3).await.unwrap().unwrap();
        assert_eq!(first.failed_login_attempts, 1);
        assert!(!first.is_blocked);

        repo.record_failed_login(&account.id, 3).await.unwrap();
        let third = repo.record_failed_login(&account.id, 3).await.unwrap().unwrap();
        assert_eq!(third.failed_login_attempts, 3);
        assert!(third.is_blocked);

        // Blocked accounts are no longer counted
        assert!(repo.record_failed_login(&account.id, 3).await.unwrap().is_none());
        let stored = repo.get_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.security.failed_login_attempts, 3);
        assert!(stored.security.is_blocked);
    }

    #[tokio::test]
    async fn test_successful_login_resets_counter() {
        let (db, school_id) = setup_db().await;
        let repo = AccountRepository::new(db.pool(), Role::Staff);
        let account = repo
            .create(&NewAccount::new(&school_id, "mrao", "T", "hash"))
            .await
            .unwrap();

        repo.record_failed_login(&account.id, 3).await.unwrap();
        assert!(repo.record_successful_login(&account.id).await.unwrap());

        let stored = repo.get_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.security.failed_login_attempts, 0);
        assert!(stored.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_successful_login_refused_when_blocked() {
        let (db, school_id) = setup_db().await;
        let repo = AccountRepository::new(db.pool(), Role::Staff);
        let account = repo
            .create(&NewAccount::new(&school_id, "mrao", "T", "hash"))
            .await
            .unwrap();

        for _ in 0..3 {
            repo.record_failed_login(&account.id, 3).await.unwrap();
        }
        assert!(!repo.record_successful_login(&account.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_otp_single_use() {
        let (db, school_id) = setup_db().await;
        let repo = AccountRepository::new(db.pool(), Role::Student);
        let account = repo
            .create(&NewAccount::new(&school_id, "kid", "Kid", "hash"))
            .await
            .unwrap();

        let now = chrono::Utc::now().timestamp_millis();
        repo.store_otp(&account.id, "123456", now + 60_000, true)
            .await
            .unwrap();

        assert!(repo.consume_otp(&account.id, "123456", 3, now, None).await.unwrap());
        assert!(!repo.consume_otp(&account.id, "123456", 3, now, None).await.unwrap());

        let stored = repo.get_by_id(&account.id).await.unwrap().unwrap();
        assert!(stored.security.otp.is_none());
        assert!(stored.security.otp_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_consume_otp_guards() {
        let (db, school_id) = setup_db().await;
        let repo = AccountRepository::new(db.pool(), Role::Student);
        let account = repo
            .create(&NewAccount::new(&school_id, "kid", "Kid", "hash"))
            .await
            .unwrap();

        let now = chrono::Utc::now().timestamp_millis();
        repo.store_otp(&account.id, "123456", now + 60_000, true)
            .await
            .unwrap();

        // Wrong code
        assert!(!repo.consume_otp(&account.id, "654321", 3, now, None).await.unwrap());
        // Expired
        assert!(!repo
            .consume_otp(&account.id, "123456", 3, now + 120_000, None)
            .await
            .unwrap());
        // Attempt cap reached
        for _ in 0..3 {
            repo.record_failed_otp(&account.id, 3).await.unwrap();
        }
        assert!(!repo.consume_otp(&account.id, "123456", 3, now, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_otp_with_new_password() {
        let (db, school_id) = setup_db().await;
        let repo = AccountRepository::new(db.pool(), Role::Student);
        let account = repo
            .create(&NewAccount::new(&school_id, "kid", "Kid", "old-hash"))
            .await
            .unwrap();

        let now = chrono::Utc::now().timestamp_millis();
        repo.store_otp(&account.id, "111111", now + 60_000, true)
            .await
            .unwrap();
        assert!(repo
            .consume_otp(&account.id, "111111", 3, now, Some("new-hash"))
            .await
            .unwrap());

        let stored = repo.get_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new-hash");
    }

    #[tokio::test]
    async fn test_record_failed_otp_caps() {
        let (db, school_id) = setup_db().await;
        let repo = AccountRepository::new(db.pool(), Role::Student);
        let account = repo
            .create(&NewAccount::new(&school_id, "kid", "Kid", "hash"))
            .await
            .unwrap();

        assert_eq!(repo.record_failed_otp(&account.id, 3).await.unwrap(), Some(1));
        assert_eq!(repo.record_failed_otp(&account.id, 3).await.unwrap(), Some(2));
        assert_eq!(repo.record_failed_otp(&account.id, 3).await.unwrap(), Some(3));
        assert_eq!(repo.record_failed_otp(&account.id, 3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_otp_attempt_reset_policy() {
        let (db, school_id) = setup_db().await;
        let repo = AccountRepository::new(db.pool(), Role::Student);
        let account = repo
            .create(&NewAccount::new(&school_id, "kid", "Kid", "hash"))
            .await
            .unwrap();

        repo.record_failed_otp(&account.id, 3).await.unwrap();
        repo.store_otp(&account.id, "222222", 1, false).await.unwrap();
        let kept = repo.get_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(kept.security.otp_attempts, 1);
        assert_eq!(kept.security.otp.as_deref(), Some("222222"));

        repo.store_otp(&account.id, "333333", 1, true).await.unwrap();
        let reset = repo.get_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(reset.security.otp_attempts, 0);
    }
}
