use stockroom_auth::{JwtClaims, Role};
use stockroom_core::{UserId, WarehouseId};

/// Authenticated caller for a request, derived from the bearer token.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    role: Role,
    warehouse_id: Option<WarehouseId>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, role: Role, warehouse_id: Option<WarehouseId>) -> Self {
        Self {
            user_id,
            role,
            warehouse_id,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Home warehouse from the token, if any. Informational only.
    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }
}

impl From<&JwtClaims> for PrincipalContext {
    fn from(claims: &JwtClaims) -> Self {
        Self::new(claims.user_id, claims.role, claims.warehouse_id)
    }
}
