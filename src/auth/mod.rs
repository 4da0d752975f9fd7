//! Sign-in gate. A single shared credential; not a security boundary.

use crate::config::AuthConfig;
use crate::error::{Result, ViewerError};
use tracing::{debug, info, warn};

/// Seam for swapping the shared credential for real per-user identities.
pub trait Authenticator {
    fn verify(&self, username: &str, password: &str) -> bool;
}

pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl From<&AuthConfig> for StaticCredentials {
    fn from(cfg: &AuthConfig) -> Self {
        Self::new(cfg.username.clone(), cfg.password.clone())
    }
}

impl Authenticator for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }
}

/// Per-user interactive state, passed explicitly to every evaluation.
#[derive(Debug, Default, Clone)]
pub struct Session {
    user: Option<String>,
    remember_me: bool,
}

impl Session {
    /// Check the credentials; on success the session stays signed in until
    /// [`Session::sign_out`].
    pub fn sign_in(
        &mut self,
        auth: &dyn Authenticator,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> bool {
        if auth.verify(username, password) {
            info!("signed in as {}", username);
            self.user = Some(username.to_string());
            self.remember_me = remember_me;
            true
        } else {
            warn!("rejected sign-in for {:?}", username);
            false
        }
    }

    pub fn sign_out(&mut self) {
        if let Some(user) = self.user.take() {
            info!("signed out {}", user);
        }
        if std::mem::take(&mut self.remember_me) {
            debug!("remembered sign-in cleared");
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    #[cfg(test)]
    pub fn remember_me(&self) -> bool {
        self.remember_me
    }

    pub fn require(&self) -> Result<()> {
        if self.is_signed_in() {
            Ok(())
        } else {
            Err(ViewerError::Unauthenticated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_and_out() {
        let creds = StaticCredentials::from(&AuthConfig::default());
        let mut session = Session::default();
        assert!(session.require().is_err());

        assert!(!session.sign_in(&creds, "admin", "wrong", false));
        assert!(!session.is_signed_in());

        assert!(session.sign_in(&creds, "admin", "admin123", true));
        assert!(session.is_signed_in());
        assert!(session.remember_me());
        assert_eq!(session.user(), Some("admin"));
        assert!(session.require().is_ok());

        session.sign_out();
        assert!(!session.is_signed_in());
        assert!(!session.remember_me());
        assert!(matches!(session.require(), Err(ViewerError::Unauthenticated)));
    }

    #[test]
    fn test_credentials_are_exact() {
        let creds = StaticCredentials::new("analyst", "s3cret");
        assert!(creds.verify("analyst", "s3cret"));
        assert!(!creds.verify("Analyst", "s3cret"));
        assert!(!creds.verify("analyst", "s3cret "));
    }
}
