//! Current-user identity
//!
//! Where the acting user's id and bearer token come from. A browser reads these
//! from local storage; here they are injected.

pub trait IdentityProvider: Send + Sync {
    /// Id of the user whose records are being edited.
    fn user_id(&self) -> Option<String>;

    /// Token attached to every request, if any.
    fn bearer_token(&self) -> Option<String>;
}

/// Identity fixed at construction time, e.g. from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user_id: Option<String>,
    token: Option<String>,
}

impl StaticIdentity {
    pub fn new(user_id: Option<String>, token: Option<String>) -> Self {
        Self {
            user_id: user_id.filter(|s| !s.trim().is_empty()),
            token: token.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }

    fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_treated_as_absent() {
        let identity = StaticIdentity::new(Some("  ".to_string()), Some("tok".to_string()));
        assert_eq!(identity.user_id(), None);
        assert_eq!(identity.bearer_token().as_deref(), Some("tok"));
        assert_eq!(StaticIdentity::anonymous().bearer_token(), None);
    }
}
