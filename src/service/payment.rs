//! Premium checkout and provider webhooks

use std::sync::Arc;

use chrono::Utc;

use crate::data::{Database, EntityId, NotificationKind, Payment, User};
use crate::error::AppError;
use crate::metrics::PAYMENT_EVENTS_TOTAL;
use crate::payments::{PaymentGateway, PreferenceRequest, WebhookNotification};
use crate::service::NotificationService;
use crate::storage::MediaStorage;

/// Created checkout, ready for redirect
#[derive(Debug, Clone)]
pub struct Checkout {
    pub payment_id: String,
    pub preference_id: String,
    pub init_point: String,
}

/// What a webhook call led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Not a payment notification, or missing its resource id
    Ignored,
    /// Payment looked up and recorded with the provider status
    Recorded { user_id: String, status: String },
    /// Payment approved and the user's profile upgraded
    PremiumActivated { user_id: String },
}

pub struct PaymentService {
    db: Arc<Database>,
    storage: Arc<MediaStorage>,
    gateway: Arc<PaymentGateway>,
    base_url: String,
    premium_price: f64,
}

impl PaymentService {
    pub fn new(
        db: Arc<Database>,
        storage: Arc<MediaStorage>,
        gateway: Arc<PaymentGateway>,
        base_url: String,
        premium_price: f64,
    ) -> Self {
        Self {
            db,
            storage,
            gateway,
            base_url,
            premium_price,
        }
    }

    /// Create a premium checkout preference and record it as pending
    ///
    /// # Errors
    /// `Unavailable` when no access token is configured.
    pub async fn checkout(&self, user: &User, client_ip: &str) -> Result<Checkout, AppError> {
        if !self.gateway.is_configured() {
            tracing::error!(
                target: "audit",
                user_id = %user.id,
                ip = %client_ip,
                "Payment failure: access token missing"
            );
            PAYMENT_EVENTS_TOTAL
                .with_label_values(&["checkout", "unavailable"])
                .inc();
            return Err(AppError::Unavailable(
                "The payment system is temporarily unavailable.".to_string(),
            ));
        }

        let first_name = if user.first_name.is_empty() {
            user.username.as_str()
        } else {
            user.first_name.as_str()
        };
        let request = PreferenceRequest::premium(
            &self.base_url,
            &user.id,
            &user.email,
            first_name,
            self.premium_price,
        );

        let preference = match self.gateway.create_preference(&request).await {
            Ok(preference) => preference,
            Err(error) => {
                tracing::error!(
                    target: "audit",
                    user_id = %user.id,
                    %error,
                    "Checkout preference failed"
                );
                PAYMENT_EVENTS_TOTAL
                    .with_label_values(&["checkout", "error"])
                    .inc();
                return Err(error);
            }
        };

        let now = Utc::now();
        let payment = Payment {
            id: EntityId::new().0,
            user_id: user.id.clone(),
            preference_id: preference.id.clone(),
            provider_payment_id: None,
            status: "pending".to_string(),
            amount: self.premium_price,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_payment(&payment).await?;

        PAYMENT_EVENTS_TOTAL
            .with_label_values(&["checkout", "created"])
            .inc();
        tracing::info!(
            target: "audit",
            user_id = %user.id,
            ip = %client_ip,
            preference_id = %preference.id,
            "Payment initiated"
        );

        Ok(Checkout {
            payment_id: payment.id,
            preference_id: preference.id,
            init_point: preference.init_point,
        })
    }

    /// Handle a provider notification body
    pub async fn webhook(&self, body: &serde_json::Value) -> Result<WebhookOutcome, AppError> {
        let notification = WebhookNotification::from_value(body);
        let Some(payment_id) = notification.payment_id() else {
            tracing::debug!(topic = ?notification.topic, "Ignoring webhook");
            PAYMENT_EVENTS_TOTAL
                .with_label_values(&["webhook", "ignored"])
                .inc();
            return Ok(WebhookOutcome::Ignored);
        };

        // A provider refusal is final; only transport failures are retried.
        let payment = match self.gateway.get_payment(payment_id).await {
            Ok(payment) => payment,
            Err(AppError::Upstream(reason)) => {
                tracing::warn!(
                    target: "audit",
                    payment_id,
                    %reason,
                    "Webhook payment lookup refused by provider"
                );
                PAYMENT_EVENTS_TOTAL
                    .with_label_values(&["webhook", "lookup_refused"])
                    .inc();
                return Ok(WebhookOutcome::Ignored);
            }
            Err(error) => {
                tracing::error!(
                    target: "audit",
                    payment_id,
                    %error,
                    "Webhook payment lookup failed"
                );
                PAYMENT_EVENTS_TOTAL
                    .with_label_values(&["webhook", "error"])
                    .inc();
                return Err(error);
            }
        };

        let Some(user_id) = payment
            .external_reference
            .as_deref()
            .map(str::trim)
            .filter(|reference| !reference.is_empty())
            .map(ToOwned::to_owned)
        else {
            tracing::warn!(
                target: "audit",
                payment_id,
                "Webhook payment without external reference"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        let approved = payment.is_approved();
        let profile_found = self
            .db
            .apply_payment_status(&user_id, payment_id, &payment.status, approved, Utc::now())
            .await?;

        PAYMENT_EVENTS_TOTAL
            .with_label_values(&["webhook", payment.status.as_str()])
            .inc();

        if !profile_found {
            tracing::error!(
                target: "audit",
                %user_id,
                payment_id,
                "Webhook error: profile not found"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        if !approved {
            return Ok(WebhookOutcome::Recorded {
                user_id,
                status: payment.status,
            });
        }

        tracing::info!(target: "audit", %user_id, payment_id, "Premium activated");
        NotificationService::new(self.db.clone(), self.storage.clone())
            .notify(
                &user_id,
                None,
                NotificationKind::System,
                "Your Bird Premium subscription is active.".to_string(),
                Some("/settings".to_string()),
            )
            .await?;

        Ok(WebhookOutcome::PremiumActivated { user_id })
    }
}
