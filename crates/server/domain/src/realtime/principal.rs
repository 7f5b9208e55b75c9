use serde::{Deserialize, Serialize};

/// Authenticated caller of a realtime connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub is_platform_admin: bool,
    pub is_platform_owner: bool,
}

impl Principal {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            is_platform_admin: true,
            ..Self::user(user_id)
        }
    }

    pub fn owner(user_id: impl Into<String>) -> Self {
        Self {
            is_platform_owner: true,
            ..Self::user(user_id)
        }
    }

    /// Operators see every project without membership checks.
    pub fn is_platform_operator(&self) -> bool {
        self.is_platform_admin || self.is_platform_owner
    }
}
