//! Persisted account security transitions.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::notifier::{LogOtpNotifier, OtpNotifier};
use super::state::{generate_otp, SecurityPolicy};
use super::AccountError;
use crate::auth::{hash_password, verify_password, PasswordError};
use crate::db::{Account, AccountRepository, DbPool, Role};

/// Applies the lockout and OTP rules to stored accounts.
///
/// Each check runs against a freshly loaded account, and each state change is
/// a single guarded `UPDATE`. When a guard fails because a concurrent request
/// got there first, the outcome is the one the pure state machine would give
/// for the state that request left behind.
#[derive(Clone)]
pub struct AccountSecurityService {
    pool: DbPool,
    policy: SecurityPolicy,
    notifier: Arc<dyn OtpNotifier>,
}

impl AccountSecurityService {
    /// Create a service that logs OTP deliveries.
    pub fn new(pool: DbPool, policy: SecurityPolicy) -> Self {
        Self {
            pool,
            policy,
            notifier: Arc::new(LogOtpNotifier),
        }
    }

    /// Replace the OTP notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn OtpNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    fn repo(&self, role: Role) -> AccountRepository<'_> {
        AccountRepository::new(&self.pool, role)
    }

    /// Look up an account by username.
    pub async fn find_by_username(&self, role: Role, username: &str) -> Result<Account, AccountError> {
        self.repo(role)
            .get_by_username(username)
            .await?
            .ok_or(AccountError::NotFound)
    }

    /// Look up an account by ID.
    pub async fn find_by_id(&self, role: Role, id: &str) -> Result<Account, AccountError> {
        self.repo(role)
            .get_by_id(id)
            .await?
            .ok_or(AccountError::NotFound)
    }

    /// Check a password, applying the lockout rules.
    ///
    /// Blocked accounts are refused without a hash check. A mismatch is
    /// persisted before the error is returned.
    pub async fn attempt_login(&self, account: &Account, password: &str) -> Result<Account, AccountError> {
        account.security.check_login().inspect_err(|_| {
            warn!(account_id = %account.id, role = %account.role, "Login refused: account is blocked");
        })?;

        let repo = self.repo(account.role);
        match verify_password(password, &account.password_hash) {
            Ok(()) => {
                if !repo.record_successful_login(&account.id).await? {
                    // Blocked by a concurrent failure between load and update
                    return Err(AccountError::Blocked);
                }
                info!(account_id = %account.id, role = %account.role, "Login succeeded");
                let mut account = account.clone();
                account.security.record_login_success();
                Ok(account)
            }
            Err(PasswordError::VerificationFailed) => {
                match repo
                    .record_failed_login(&account.id, self.policy.max_failed_logins)
                    .await?
                {
                    Some(failure) if failure.is_blocked => {
                        warn!(
                            account_id = %account.id,
                            role = %account.role,
                            attempts = failure.failed_login_attempts,
                            "Account blocked after repeated login failures"
                        );
                        Err(AccountError::InvalidCredentials)
                    }
                    Some(failure) => {
                        info!(
                            account_id = %account.id,
                            role = %account.role,
                            attempts = failure.failed_login_attempts,
                            "Login failed"
                        );
                        Err(AccountError::InvalidCredentials)
                    }
                    None => Err(AccountError::Blocked),
                }
            }
            Err(e) => Err(AccountError::Password(e)),
        }
    }

    /// Issue a new OTP and hand it to the notifier.
    ///
    /// Returns the code.
    pub async fn issue_otp(&self, account: &Account) -> Result<String, AccountError> {
        let code = generate_otp();
        let expires_at = Utc::now().timestamp_millis() + self.policy.otp_ttl.num_milliseconds();

        let stored = self
            .repo(account.role)
            .store_otp(
                &account.id,
                &code,
                expires_at,
                self.policy.reset_otp_attempts_on_issue,
            )
            .await?;
        if !stored {
            return Err(AccountError::NotFound);
        }

        self.notifier.send_otp(account, &code).await?;
        info!(account_id = %account.id, role = %account.role, "OTP issued");
        Ok(code)
    }

    /// Verify and consume an OTP.
    pub async fn verify_otp(&self, account: &Account, code: &str) -> Result<(), AccountError> {
        account.security.check_login()?;
        self.redeem_otp(account, code, None).await
    }

    /// Verify an OTP and set a new password in the same update.
    pub async fn change_password(
        &self,
        account: &Account,
        code: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        account.security.check_login()?;
        let new_hash = hash_password(new_password)?;
        self.redeem_otp(account, code, Some(&new_hash)).await?;

        info!(account_id = %account.id, role = %account.role, "Password changed");
        Ok(())
    }

    async fn redeem_otp(
        &self,
        account: &Account,
        code: &str,
        new_password_hash: Option<&str>,
    ) -> Result<(), AccountError> {
        let repo = self.repo(account.role);
        let max = self.policy.max_otp_attempts;
        let now = Utc::now().timestamp_millis();

        match account.security.check_otp(code, now, &self.policy) {
            Ok(()) => {
                if repo
                    .consume_otp(&account.id, code, max, now, new_password_hash)
                    .await?
                {
                    Ok(())
                } else {
                    // Consumed, blocked or capped by a concurrent request
                    Err(AccountError::InvalidCode)
                }
            }
            Err(AccountError::InvalidCode) => {
                let attempts = repo.record_failed_otp(&account.id, max).await?;
                info!(
                    account_id = %account.id,
                    role = %account.role,
                    attempts = attempts.unwrap_or(max),
                    "OTP rejected"
                );
                Err(AccountError::InvalidCode)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for AccountSecurityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSecurityService")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
