//! Authentication seam.

use std::future::Future;
use std::sync::Arc;

use tasklane_core::UserId;
use tasklane_store::StaticSession;

/// Reports who is signed in.
pub trait SessionProvider: Send + Sync {
    /// Current user, `None` when signed out.
    fn current_user(&self) -> impl Future<Output = Option<UserId>> + Send;
}

impl SessionProvider for StaticSession {
    #[allow(clippy::unused_async)]
    async fn current_user(&self) -> Option<UserId> {
        self.user()
    }
}

impl<P: SessionProvider> SessionProvider for Arc<P> {
    fn current_user(&self) -> impl Future<Output = Option<UserId>> + Send {
        (**self).current_user()
    }
}
