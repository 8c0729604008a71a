use serde::Serialize;
use utoipa::ToSchema;

/// Authenticated identity of the process talking to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Identity {
    pub id: String,
}

/// Source of the current identity. Writes gated on authentication ask it first.
pub trait AuthSession: Send + Sync {
    fn current_user(&self) -> Option<Identity>;
}

/// Identity fixed at startup (from `HOTSEAT_HOST_ID`), or none.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    identity: Option<Identity>,
}

impl StaticAuth {
    pub fn new(id: Option<String>) -> Self {
        Self {
            identity: id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .map(|id| Identity { id }),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl AuthSession for StaticAuth {
    fn current_user(&self) -> Option<Identity> {
        self.identity.clone()
    }
}
