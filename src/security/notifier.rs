//! OTP delivery.

use async_trait::async_trait;
use tracing::info;

use crate::db::Account;
use crate::Result;

/// Delivers a freshly issued OTP to the account holder.
#[async_trait]
pub trait OtpNotifier: Send + Sync {
    /// Send `code` to the owner of `account`.
    async fn send_otp(&self, account: &Account, code: &str) -> Result<()>;
}

/// Notifier that only records the delivery in the log.
///
/// The code itself is logged at debug level only.
#[derive(Debug, Clone, Default)]
pub struct LogOtpNotifier;

#[async_trait]
impl OtpNotifier for LogOtpNotifier {
    async fn send_otp(&self, account: &Account, code: &str) -> Result<()> {
        info!(
            account_id = %account.id,
            role = %account.role,
            email = account.email.as_deref().unwrap_or("-"),
            "OTP issued for delivery"
        );
        tracing::debug!(account_id = %account.id, code, "OTP code");
        Ok(())
    }
}
