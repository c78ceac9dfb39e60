use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    api::ApiClient,
    api_objects::{CheckoutOutcome, CheckoutRequest, DecisionLimits, MembershipStatus},
    store::{Store, StoreEvent},
    types::{MembershipType, Result},
};

/// The payment widget. Implementations open the provider's checkout and
/// resolve once the user completes or abandons it.
#[async_trait]
pub trait PaymentCheckout: Send + Sync {
    async fn open(&self, request: CheckoutRequest) -> Result<CheckoutOutcome>;
}

#[derive(Clone)]
pub struct MembershipService {
    api: ApiClient,
    store: Store,
    verify_delay: Duration,
}

impl MembershipService {
    pub fn new(api: ApiClient, store: Store, verify_delay: Duration) -> Self {
        Self {
            api,
            store,
            verify_delay,
        }
    }

    /// Current membership. Any failure reads as a free account.
    ///
    /// A premium account with no expiry date is repaired on the backend and
    /// read again.
    pub async fn status(&self) -> MembershipStatus {
        let mut status = match self.fetch_status().await {
            Some(status) => status,
            None => return MembershipStatus::default(),
        };

        if status.needs_expiry_fix() {
            info!("Premium membership has no expiry, requesting a fix.");
            match self
                .store
                .intercept(self.api.fix_premium_expiry().await)
                .await
            {
                Ok(fixed) => {
                    debug!("Expiry fixed: {:?}", fixed.message);
                    if let Some(refreshed) = self.fetch_status().await {
                        status = refreshed;
                    }
                }
                Err(error) => warn!("Failed to fix premium expiry: {error}"),
            }
        }

        status.with_days_filled(Utc::now())
    }

    async fn fetch_status(&self) -> Option<MembershipStatus> {
        match self.store.intercept(self.api.premium_status().await).await {
            Ok(status) => Some(status),
            Err(error) => {
                warn!("Failed to verify premium status: {error}");
                None
            }
        }
    }

    pub async fn limits(&self) -> Result<DecisionLimits> {
        self.store
            .intercept(self.api.premium_limits().await)
            .await
    }

    /// Buys `membership_type` through `checkout`, then re-reads the
    /// membership from the backend. The checkout's own success payload is
    /// not trusted.
    pub async fn purchase(
        &self,
        membership_type: MembershipType,
        checkout: &dyn PaymentCheckout,
    ) -> Result<MembershipStatus> {
        let order = self
            .store
            .intercept(self.api.create_order(membership_type).await)
            .await?;
        debug!("Created {membership_type} order {}.", order.order_id);

        let outcome = checkout.open(CheckoutRequest::from(&order)).await?;
        info!(
            "Checkout completed with payment {} for order {}.",
            outcome.payment_id, outcome.order_id
        );

        // Give the payment webhook time to land before re-verifying.
        tokio::time::sleep(self.verify_delay).await;
        let status = self.status().await;

        self.store.publish(StoreEvent::PaymentSucceeded);
        let remaining = match self.limits().await {
            Ok(limits) => limits.remaining,
            Err(error) => {
                warn!("Failed to refresh limits after payment: {error}");
                None
            }
        };
        self.store.publish(StoreEvent::LimitsChanged { remaining });

        Ok(status)
    }
}
