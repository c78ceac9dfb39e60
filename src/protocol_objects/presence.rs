use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub user_id: String,
}

impl UserStatus {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: String::from(user_id),
        }
    }
}

/// Inbound `userOnline`/`userOffline` carry a bare id; older servers wrap it.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum UserIdPayload {
    Bare(String),
    Wrapped(UserStatus),
}

impl UserIdPayload {
    pub(crate) fn into_id(self) -> String {
        match self {
            UserIdPayload::Bare(id) => id,
            UserIdPayload::Wrapped(status) => status.user_id,
        }
    }
}
