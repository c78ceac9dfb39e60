use serde::{Deserialize, Serialize};

use super::user::User;

/// `{ "data": ... }` wrapper most list endpoints use.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DataEnvelope<T> {
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

/// `/feed` has shipped both wrapped and bare.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum FeedResponse {
    Wrapped { data: Vec<User> },
    Bare(Vec<User>),
}

impl FeedResponse {
    pub fn into_users(self) -> Vec<User> {
        match self {
            FeedResponse::Wrapped { data } => data,
            FeedResponse::Bare(users) => users,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    #[serde(rename = "_id")]
    pub id: String,
    pub from_user_id: User,
    #[serde(default)]
    pub status: Option<String>,
}

/// Reply to a swipe. The server checks and bumps the daily quota in the same call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionReceipt {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    #[serde(alias = "remainingDecisions")]
    pub remaining: Option<u32>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_feed_response_shapes() {
        let wrapped: FeedResponse =
            serde_json::from_value(json!({"data": [{"_id": "a"}, {"_id": "b"}]})).unwrap();
        assert_eq!(wrapped.into_users().len(), 2);

        let bare: FeedResponse = serde_json::from_value(json!([{"_id": "a"}])).unwrap();
        assert_eq!(bare.into_users()[0].id, "a");
    }

    #[test]
    fn test_decision_receipt_alias() {
        let receipt: DecisionReceipt =
            serde_json::from_value(json!({"message": "ok", "remainingDecisions": 4})).unwrap();
        assert_eq!(receipt.remaining, Some(4));

        let empty: DecisionReceipt = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.remaining, None);
    }
}
