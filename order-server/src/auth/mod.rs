//! Authentication: JWT validation and the current-user extractor

mod extractor;
pub mod jwt;

use shared::error::{AppError, ErrorCode};
use shared::models::{Role, UserId};

pub use jwt::{Claims, JwtError, JwtService};

/// Caller identity, parsed from JWT claims
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub name: String,
    pub role: Role,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            role: claims.role,
        }
    }
}

impl CurrentUser {
    /// Staff and admins share the admin notification pool
    pub fn is_back_office(&self) -> bool {
        self.role.is_back_office()
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn require_back_office(&self) -> Result<(), AppError> {
        if self.is_back_office() {
            Ok(())
        } else {
            tracing::warn!(target: "security", user_id = %self.id, "Back-office access denied");
            Err(AppError::new(ErrorCode::StaffRequired))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            tracing::warn!(target: "security", user_id = %self.id, "Admin access denied");
            Err(AppError::new(ErrorCode::AdminRequired))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1).unwrap(),
            name: "Ana".into(),
            role,
        }
    }

    #[test]
    fn role_guards() {
        assert!(user(Role::Customer).require_back_office().is_err());
        assert!(user(Role::Staff).require_back_office().is_ok());
        assert_eq!(
            user(Role::Staff).require_admin().unwrap_err().code,
            ErrorCode::AdminRequired
        );
        assert!(user(Role::Admin).require_admin().is_ok());
    }
}
