//! Lockout and OTP state machine.
//!
//! Pure transitions over [`SecurityState`]. The persisted service applies the
//! same rules with conditional SQL updates; these functions are the reference
//! for what each transition means.

use chrono::Duration;
use rand::Rng;

use super::AccountError;

/// Lower bound for generated OTP codes.
const OTP_MIN: u32 = 100_000;

/// Upper bound for generated OTP codes.
const OTP_MAX: u32 = 999_999;

/// Limits applied by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    /// Failed logins before the account is blocked.
    pub max_failed_logins: u32,
    /// Failed OTP checks before OTP verification is refused.
    pub max_otp_attempts: u32,
    /// OTP validity window.
    pub otp_ttl: Duration,
    /// Whether issuing a new OTP resets the attempt counter.
    pub reset_otp_attempts_on_issue: bool,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            max_failed_logins: 3,
            max_otp_attempts: 3,
            otp_ttl: Duration::minutes(10),
            reset_otp_attempts_on_issue: true,
        }
    }
}

/// Security fields carried by every account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityState {
    pub failed_login_attempts: u32,
    /// Set once the failed-login counter reaches the limit. Never cleared here.
    pub is_blocked: bool,
    pub otp: Option<String>,
    /// Expiry in epoch milliseconds.
    pub otp_expires_at: Option<i64>,
    pub otp_attempts: u32,
}

impl SecurityState {
    /// Gate for a login attempt: blocked accounts are refused before any
    /// password check.
    pub fn check_login(&self) -> Result<(), AccountError> {
        if self.is_blocked {
            return Err(AccountError::Blocked);
        }
        Ok(())
    }

    /// Password matched.
    pub fn record_login_success(&mut self) {
        if !self.is_blocked {
            self.failed_login_attempts = 0;
        }
    }

    /// Password did not match. Returns true if this failure blocked the account.
    pub fn record_login_failure(&mut self, policy: &SecurityPolicy) -> bool {
        if self.is_blocked {
            return false;
        }
        self.failed_login_attempts = (self.failed_login_attempts + 1).min(policy.max_failed_logins);
        if self.failed_login_attempts >= policy.max_failed_logins {
            self.is_blocked = true;
        }
        self.is_blocked
    }

    /// Store a new OTP valid until `now_ms + ttl`.
    pub fn issue_otp(&mut self, code: impl Into<String>, now_ms: i64, policy: &SecurityPolicy) {
        self.otp = Some(code.into());
        self.otp_expires_at = Some(now_ms + policy.otp_ttl.num_milliseconds());
        if policy.reset_otp_attempts_on_issue {
            self.otp_attempts = 0;
        }
    }

    /// Check a submitted OTP without changing state.
    ///
    /// Order: attempt cap, then expiry, then equality. An account without an
    /// active OTP fails the equality check.
    pub fn check_otp(
        &self,
        code: &str,
        now_ms: i64,
        policy: &SecurityPolicy,
    ) -> Result<(), AccountError> {
        if self.otp_attempts >= policy.max_otp_attempts {
            return Err(AccountError::TooManyAttempts);
        }
        if let Some(expires_at) = self.otp_expires_at {
            if now_ms > expires_at {
                return Err(AccountError::Expired);
            }
        }
        match &self.otp {
            Some(otp) if otp == code && self.otp_expires_at.is_some() => Ok(()),
            _ => Err(AccountError::InvalidCode),
        }
    }

    /// OTP accepted: single use.
    pub fn record_otp_success(&mut self) {
        self.otp = None;
        self.otp_expires_at = None;
        self.otp_attempts = 0;
    }

    /// OTP mismatch.
    pub fn record_otp_failure(&mut self, policy: &SecurityPolicy) {
        if self.otp_attempts < policy.max_otp_attempts {
            self.otp_attempts += 1;
        }
    }

    /// Check and apply an OTP submission.
    ///
    /// Only a code mismatch increments the attempt counter.
    pub fn verify_otp(
        &mut self,
        code: &str,
        now_ms: i64,
        policy: &SecurityPolicy,
    ) -> Result<(), AccountError> {
        match self.check_otp(code, now_ms, policy) {
            Ok(()) => {
                self.record_otp_success();
                Ok(())
            }
            Err(AccountError::InvalidCode) => {
                self.record_otp_failure(policy);
                Err(AccountError::InvalidCode)
            }
            Err(e) => Err(e),
        }
    }
}

/// Generate a 6-digit OTP, uniform over 100000..=999999.
pub fn generate_otp() -> String {
    rand::rng().random_range(OTP_MIN..=OTP_MAX).to_string()
}
