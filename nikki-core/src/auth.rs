use crate::error::DiaryError;

/// Single shared-secret check in front of every mutation.
#[derive(Clone)]
pub struct AuthGate {
    secret: Option<String>,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("configured", &self.secret.is_some())
            .finish()
    }
}

impl AuthGate {
    /// An empty secret counts as unset: nothing authenticates.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    pub fn authenticate(&self, submitted: &str) -> bool {
        matches!(&self.secret, Some(secret) if secret == submitted)
    }

    /// Reject before any store access happens.
    pub fn require(&self, submitted: Option<&str>) -> Result<(), DiaryError> {
        match submitted {
            Some(s) if self.authenticate(s) => Ok(()),
            _ => {
                tracing::warn!("Rejected request with invalid password");
                Err(DiaryError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_secret_passes() {
        let gate = AuthGate::new(Some("hunter2".to_string()));
        assert!(gate.authenticate("hunter2"));
        assert!(gate.require(Some("hunter2")).is_ok());
    }

    #[test]
    fn wrong_or_missing_secret_fails() {
        let gate = AuthGate::new(Some("hunter2".to_string()));
        assert!(!gate.authenticate("hunter3"));
        assert!(!gate.authenticate(""));
        assert!(matches!(gate.require(None), Err(DiaryError::Unauthorized)));
    }

    #[test]
    fn unset_secret_denies_everything() {
        let gate = AuthGate::new(Some(String::new()));
        assert!(!gate.is_configured());
        assert!(!gate.authenticate(""));
        assert!(gate.require(Some("")).is_err());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let gate = AuthGate::new(Some("hunter2".to_string()));
        assert!(!format!("{gate:?}").contains("hunter2"));
    }
}
