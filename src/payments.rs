//! Mercado Pago REST client
//!
//! Only the two calls the premium checkout needs: creating a checkout
//! preference and reading a payment back when a webhook arrives.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const PREMIUM_TITLE: &str = "Bird Premium";
pub const CURRENCY: &str = "BRL";

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceItem {
    pub title: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub currency_id: String,
    pub category_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferencePayer {
    pub email: String,
    pub first_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

/// Body of `POST /checkout/preferences`
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub payer: PreferencePayer,
    pub external_reference: String,
    pub notification_url: String,
    pub back_urls: BackUrls,
    pub auto_return: String,
}

impl PreferenceRequest {
    /// Single-item premium subscription checkout for one user
    pub fn premium(
        base_url: &str,
        user_id: &str,
        email: &str,
        first_name: &str,
        price: f64,
    ) -> Self {
        Self {
            items: vec![PreferenceItem {
                title: PREMIUM_TITLE.to_string(),
                quantity: 1,
                unit_price: price,
                currency_id: CURRENCY.to_string(),
                category_id: "subscriptions".to_string(),
            }],
            payer: PreferencePayer {
                email: email.to_string(),
                first_name: first_name.to_string(),
            },
            external_reference: user_id.to_string(),
            notification_url: format!("{}/payments/webhook", base_url),
            back_urls: BackUrls {
                success: format!("{}/settings?tab=account&status=success", base_url),
                failure: format!("{}/settings?status=failure", base_url),
                pending: format!("{}/settings?status=pending", base_url),
            },
            auto_return: "approved".to_string(),
        }
    }
}

/// Created checkout preference
#[derive(Debug, Clone, Deserialize)]
pub struct Preference {
    pub id: String,
    pub init_point: String,
}

/// Payment as reported by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderPayment {
    pub id: serde_json::Value,
    pub status: String,
    pub external_reference: Option<String>,
}

impl ProviderPayment {
    pub fn is_approved(&self) -> bool {
        self.status == "approved"
    }
}

/// Mercado Pago client; calls fail with `Unavailable` without an access token
pub struct PaymentGateway {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl PaymentGateway {
    pub fn new(config: &crate::config::PaymentsConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("Bird/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        let access_token = config
            .mercadopago_access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(ToOwned::to_owned);

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }

    fn token(&self) -> Result<&str, AppError> {
        self.access_token
            .as_deref()
            .ok_or_else(|| AppError::Unavailable("Payments are not configured".to_string()))
    }

    pub async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<Preference, AppError> {
        let token = self.token()?;
        let response = self
            .client
            .post(format!("{}/checkout/preferences", self.base_url))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "preference creation failed with status {}",
                response.status()
            )));
        }

        Ok(response.json::<Preference>().await?)
    }

    pub async fn get_payment(&self, payment_id: &str) -> Result<ProviderPayment, AppError> {
        let token = self.token()?;
        let response = self
            .client
            .get(format!(
                "{}/v1/payments/{}",
                self.base_url,
                urlencoding::encode(payment_id)
            ))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "payment lookup failed with status {}",
                response.status()
            )));
        }

        Ok(response.json::<ProviderPayment>().await?)
    }
}

/// Topic and resource id extracted from a webhook body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotification {
    pub topic: Option<String>,
    pub resource_id: Option<String>,
}

impl WebhookNotification {
    /// Accepts both the `type`/`data.id` and the legacy `topic`/`resource` shapes
    pub fn from_value(body: &serde_json::Value) -> Self {
        let topic = body
            .get("type")
            .or_else(|| body.get("topic"))
            .and_then(serde_json::Value::as_str)
            .filter(|topic| !topic.is_empty())
            .map(ToOwned::to_owned);

        let resource_id = body
            .get("data")
            .and_then(|data| data.get("id"))
            .and_then(value_to_id)
            .or_else(|| body.get("resource").and_then(value_to_id));

        Self { topic, resource_id }
    }

    pub fn payment_id(&self) -> Option<&str> {
        match (self.topic.as_deref(), self.resource_id.as_deref()) {
            (Some("payment"), Some(id)) => Some(id),
            _ => None,
        }
    }
}

fn value_to_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_current_webhook_shape() {
        let body = json!({"type": "payment", "data": {"id": "123"}});
        let notification = WebhookNotification::from_value(&body);
        assert_eq!(notification.payment_id(), Some("123"));
    }

    #[test]
    fn parses_legacy_webhook_shape_with_numeric_id() {
        let body = json!({"topic": "payment", "resource": 456});
        let notification = WebhookNotification::from_value(&body);
        assert_eq!(notification.payment_id(), Some("456"));
    }

    #[test]
    fn ignores_other_topics() {
        let body = json!({"type": "merchant_order", "data": {"id": "1"}});
        assert_eq!(WebhookNotification::from_value(&body).payment_id(), None);
    }

    #[test]
    fn premium_preference_references_user() {
        let request =
            PreferenceRequest::premium("https://bird.example", "user-1", "a@b.c", "Ann", 29.90);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["external_reference"], "user-1");
        assert_eq!(value["items"][0]["currency_id"], "BRL");
        assert_eq!(
            value["notification_url"],
            "https://bird.example/payments/webhook"
        );
    }

    #[tokio::test]
    async fn gateway_without_token_is_unavailable() {
        let gateway = PaymentGateway::new(&crate::config::PaymentsConfig {
            mercadopago_access_token: None,
            api_base_url: "http://127.0.0.1:9".to_string(),
            premium_price: 29.90,
        })
        .unwrap();

        assert!(!gateway.is_configured());
        assert!(matches!(
            gateway.get_payment("1").await,
            Err(AppError::Unavailable(_))
        ));
    }
}
