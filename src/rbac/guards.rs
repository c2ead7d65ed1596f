use crate::rbac::{middleware::AuthorizationMiddleware, Permission};

pub fn require_permission(required_permission: Permission) -> AuthorizationMiddleware {
    AuthorizationMiddleware {
        required_permission,
    }
}

// Editing permissions
pub fn require_edit() -> AuthorizationMiddleware {
    require_permission(Permission::CanEdit)
}
