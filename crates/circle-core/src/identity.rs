//! Identity provider seam.

use circle_storage::UserId;

/// Source of the signed-in user's stable id.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<UserId>;
}

/// Identity fixed at construction (e.g. read from client config).
#[derive(Clone, Debug, Default)]
pub struct StaticIdentity(Option<UserId>);

impl StaticIdentity {
    pub fn new(user_id: Option<UserId>) -> Self {
        Self(user_id)
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self(Some(UserId::new(user_id)))
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<UserId> {
        self.0.clone()
    }
}
