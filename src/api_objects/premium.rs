use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{types::MembershipType, utils::days_until};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipStatus {
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub membership_type: Option<MembershipType>,
    #[serde(default)]
    pub membership_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub days_until_expiry: Option<i64>,
}

impl MembershipStatus {
    /// Premium with an expiry strictly in the future.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.is_premium && self.membership_expiry.is_some_and(|expiry| now < expiry)
    }

    /// Premium on the server but missing an expiry date.
    pub fn needs_expiry_fix(&self) -> bool {
        self.is_premium && self.membership_expiry.is_none()
    }

    /// Computes `days_until_expiry` when the server left it empty or zero.
    pub fn with_days_filled(mut self, now: DateTime<Utc>) -> Self {
        if matches!(self.days_until_expiry, None | Some(0))
            && let Some(expiry) = self.membership_expiry
        {
            self.days_until_expiry = Some(days_until(now, expiry));
        }
        self.days_until_expiry = Some(self.days_until_expiry.unwrap_or(0));
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionLimits {
    #[serde(default)]
    pub daily_limit: Option<u32>,
    #[serde(default)]
    pub used: u32,
    #[serde(default)]
    pub remaining: Option<u32>,
    #[serde(default)]
    pub is_premium: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixExpiryResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub days_until_expiry: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub membership_type: MembershipType,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderNotes {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email_id: String,
    #[serde(default)]
    pub membership_type: Option<MembershipType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub order_id: String,
    pub amount: u64,
    pub currency: String,
    pub key_id: String,
    #[serde(default)]
    pub notes: OrderNotes,
}

/// What the injected checkout widget is opened with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub key: String,
    pub amount: u64,
    pub currency: String,
    pub order_id: String,
    pub name: String,
    pub description: String,
    pub prefill_name: String,
    pub prefill_email: String,
    pub theme_color: String,
}

impl From<&PaymentOrder> for CheckoutRequest {
    fn from(order: &PaymentOrder) -> Self {
        Self {
            key: order.key_id.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            order_id: order.order_id.clone(),
            name: String::from("CommitHub"),
            description: String::from("Connect to other users"),
            prefill_name: format!("{} {}", order.notes.first_name, order.notes.last_name)
                .trim()
                .to_string(),
            prefill_email: order.notes.email_id.clone(),
            theme_color: String::from("#F37254"),
        }
    }
}

/// Success payload handed back by the checkout widget. Informational only;
/// premium status is always re-read from the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutOutcome {
    pub payment_id: String,
    pub order_id: String,
    pub signature: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_days_filled_from_expiry() {
        let status = MembershipStatus {
            is_premium: true,
            membership_type: Some(MembershipType::Gold),
            membership_expiry: Some(now() + Duration::hours(49)),
            days_until_expiry: Some(0),
        }
        .with_days_filled(now());
        assert_eq!(status.days_until_expiry, Some(3));

        let reported = MembershipStatus {
            days_until_expiry: Some(12),
            membership_expiry: Some(now() + Duration::days(2)),
            ..Default::default()
        }
        .with_days_filled(now());
        assert_eq!(reported.days_until_expiry, Some(12));

        let free = MembershipStatus::default().with_days_filled(now());
        assert_eq!(free.days_until_expiry, Some(0));
    }

    #[test]
    fn test_is_active_requires_future_expiry() {
        let mut status: MembershipStatus = serde_json::from_value(json!({
            "isPremium": true,
            "membershipType": "silver",
            "membershipExpiry": "2025-04-10T12:00:00Z"
        }))
        .unwrap();
        assert!(status.is_active(now()));
        assert!(!status.needs_expiry_fix());

        status.membership_expiry = Some(now());
        assert!(!status.is_active(now()));

        status.membership_expiry = None;
        assert!(!status.is_active(now()));
        assert!(status.needs_expiry_fix());
    }

    #[test]
    fn test_checkout_request_from_order() {
        let order: PaymentOrder = serde_json::from_value(json!({
            "orderId": "order_9A33XWu170gUtm",
            "amount": 70000,
            "currency": "INR",
            "keyId": "rzp_test_key",
            "notes": {"firstName": "Ada", "lastName": "L", "emailId": "ada@example.com"}
        }))
        .unwrap();

        let request = CheckoutRequest::from(&order);
        assert_eq!(request.order_id, "order_9A33XWu170gUtm");
        assert_eq!(request.prefill_name, "Ada L");
        assert_eq!(request.prefill_email, "ada@example.com");
        assert_eq!(request.amount, 70000);
    }
}
