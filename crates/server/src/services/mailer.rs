// Outbound account email

use axum::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers a password reset link to `email`.
    async fn send_password_reset(&self, email: &str, link: &str) -> Result<()>;
}

/// Writes messages to the log instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, email: &str, link: &str) -> Result<()> {
        tracing::info!(%email, %link, "password reset link");
        Ok(())
    }
}

pub fn reset_link(public_url: &str, token: &str) -> String {
    format!("{public_url}/reset-password?token={token}")
}
