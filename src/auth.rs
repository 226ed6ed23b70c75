use uuid::Uuid;

use crate::error::AppError;

/// Identity resolved by the (external) transport layer before it calls into
/// the services. Token verification is not this crate's concern.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, "admin")
}

/// Owners may act on their own orders; admins may act on anyone's.
pub fn ensure_owner_or_admin(user: &AuthUser, owner_id: Uuid) -> Result<(), AppError> {
    if user.user_id == owner_id || user.role == "admin" {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
