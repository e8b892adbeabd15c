// Authenticated user context shared across handlers

use uuid::Uuid;

use crate::models::user::UserRole;

/// User identity extracted from a validated bearer token.
/// Injected into request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: UserRole,
    pub name: String,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
