use std::sync::{Arc, PoisonError, RwLock};

use tasklane_core::UserId;

/// Local stand-in for an authentication service.
///
/// Reports a fixed user, or no user when signed out. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    user: Arc<RwLock<Option<UserId>>>,
}

impl StaticSession {
    /// Session signed in as `user`.
    #[must_use]
    pub fn signed_in(user: UserId) -> Self {
        Self {
            user: Arc::new(RwLock::new(Some(user))),
        }
    }

    /// Session without a user.
    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Currently signed-in user.
    #[must_use]
    pub fn user(&self) -> Option<UserId> {
        *self.user.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch the signed-in user (`None` signs out).
    pub fn set_user(&self, user: Option<UserId>) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;
    }
}
