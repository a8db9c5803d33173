use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::Config;

#[derive(Debug, Clone)]
struct CachedBearerToken {
    token: String,
}

/// Holds the lazily-refreshed PayPal OAuth bearer token. Owned by this
/// component rather than living as a bare process-global, per the
/// global-mutable-singleton redesign: the cell is the same shape, it's just
/// attached to the struct that actually uses it.
#[derive(Default)]
pub struct DonationVerifier {
    bearer: RwLock<Option<CachedBearerToken>>,
}

#[derive(Debug, Clone)]
pub struct VerifiedDonation {
    pub amount: String,
    pub message: String,
}

#[derive(Debug)]
pub enum DonationError {
    AlreadyRecorded,
    Rejected(String),
    Upstream(String),
}

#[derive(Deserialize)]
struct PurchaseUnit {
    amount: Amount,
}

#[derive(Deserialize)]
struct Amount {
    currency_code: String,
    value: String,
}

#[derive(Deserialize)]
struct Order {
    create_time: String,
    intent: String,
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

impl DonationVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn api_base(config: &Config) -> &'static str {
        if config.paypal_live {
            "https://api-m.paypal.com"
        } else {
            "https://api-m.sandbox.paypal.com"
        }
    }

    async fn refresh_bearer(&self, client: &Client, config: &Config) -> Result<String, DonationError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let resp = client
            .post(format!("{}/v1/oauth2/token", Self::api_base(config)))
            .basic_auth(&config.paypal_client_id, Some(&config.paypal_client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| DonationError::Upstream(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(DonationError::Upstream(format!("oauth token request failed: {}", resp.status())));
        }

        let body: TokenResponse = resp.json().await.map_err(|e| DonationError::Upstream(e.to_string()))?;
        let mut bearer = self.bearer.write().await;
        *bearer = Some(CachedBearerToken { token: body.access_token.clone() });
        Ok(body.access_token)
    }

    async fn current_bearer(&self) -> Option<String> {
        self.bearer.read().await.as_ref().map(|b| b.token.clone())
    }

    async fn fetch_order(
        &self,
        client: &Client,
        config: &Config,
        order_id: &str,
    ) -> Result<(reqwest::StatusCode, String), DonationError> {
        let token = match self.current_bearer().await {
            Some(t) => t,
            None => self.refresh_bearer(client, config).await?,
        };

        let resp = client
            .get(format!("{}/v2/checkout/orders/{}", Self::api_base(config), order_id))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| DonationError::Upstream(e.to_string()))?;

        Ok((resp.status(), resp.text().await.unwrap_or_default()))
    }

    /// Fetches the order, refreshing and retrying exactly once on a 401 —
    /// the whole authenticated call is retried, not just the raw HTTP GET.
    async fn fetch_order_with_retry(
        &self,
        client: &Client,
        config: &Config,
        order_id: &str,
    ) -> Result<Order, DonationError> {
        let (status, body) = self.fetch_order(client, config, order_id).await?;

        let body = if status == reqwest::StatusCode::UNAUTHORIZED {
            self.refresh_bearer(client, config).await?;
            let (status2, body2) = self.fetch_order(client, config, order_id).await?;
            if !status2.is_success() {
                return Err(DonationError::Upstream(format!("order lookup failed: {status2}")));
            }
            body2
        } else if !status.is_success() {
            return Err(DonationError::Upstream(format!("order lookup failed: {status}")));
        } else {
            body
        };

        serde_json::from_str(&body).map_err(|e| DonationError::Upstream(e.to_string()))
    }

    /// Validates a fetched order against the five gates in order, returning
    /// the donation amount/message pair on success.
    fn validate(
        &self,
        order: &Order,
        order_id: &str,
        message: &str,
        max_chat_length: usize,
        banned_words: &[String],
    ) -> Result<VerifiedDonation, DonationError> {
        let created = chrono::DateTime::parse_from_rfc3339(&order.create_time)
            .map_err(|_| DonationError::Rejected(format!("order {order_id}: unparseable create_time")))?;
        if Utc::now().signed_duration_since(created).num_seconds() > 300 {
            return Err(DonationError::Rejected(format!("order {order_id}: create_time too old")));
        }
        if order.intent != "CAPTURE" {
            return Err(DonationError::Rejected(format!("order {order_id}: intent {}", order.intent)));
        }
        if order.status != "COMPLETED" {
            return Err(DonationError::Rejected(format!("order {order_id}: status {}", order.status)));
        }
        let unit = order
            .purchase_units
            .first()
            .ok_or_else(|| DonationError::Rejected(format!("order {order_id}: no purchase units")))?;
        if unit.amount.currency_code != "USD" {
            return Err(DonationError::Rejected(format!("order {order_id}: non-USD currency")));
        }
        let amount: f64 = unit
            .amount
            .value
            .parse()
            .map_err(|_| DonationError::Rejected(format!("order {order_id}: unparseable amount")))?;
        if amount < 1.00 {
            return Err(DonationError::Rejected(format!("order {order_id}: amount below minimum")));
        }
        if message.len() > max_chat_length {
            return Err(DonationError::Rejected(format!("order {order_id}: message too long")));
        }
        let lower = message.to_lowercase();
        if banned_words.iter().any(|w| lower.contains(&w.to_lowercase())) {
            return Err(DonationError::Rejected(format!("order {order_id}: message contains a banned word")));
        }

        Ok(VerifiedDonation { amount: unit.amount.value.clone(), message: message.to_string() })
    }

    /// Fetches and validates an order. Recording the transaction row (with
    /// `succeeded=0` before validation, per the donor's ordering) is the
    /// caller's responsibility, since it needs the pool and this struct
    /// deliberately stays storage-agnostic.
    pub async fn verify(
        &self,
        client: &Client,
        config: &Config,
        order_id: &str,
        message: &str,
        banned_words: &[String],
    ) -> Result<VerifiedDonation, DonationError> {
        let order = self.fetch_order_with_retry(client, config, order_id).await?;
        self.validate(&order, order_id, message, config.max_chat_length, banned_words)
    }
}

/// Renders the raw PayPal order payload as `serde_json::Value` for the
/// transaction row's `data` column, independent of the typed `Order` shape
/// used for validation.
pub fn order_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            db_host: String::new(),
            db_port: 5432,
            db_name: String::new(),
            db_user: String::new(),
            db_pass: String::new(),
            ssl_key: None,
            ssl_crt: None,
            ssl_ca: None,
            bot_name: "kcbot".into(),
            bot_color: "#fff".into(),
            max_chat_length: 500,
            youtube_client_id: String::new(),
            youtube_client_secret: String::new(),
            paypal_live: false,
            paypal_client_id: "id".into(),
            paypal_client_secret: "secret".into(),
            bind_addr: "0.0.0.0".into(),
            log_format: crate::config::LogFormat::Pretty,
        }
    }

    fn order(overrides: impl Fn(&mut Order)) -> Order {
        let mut o = Order {
            create_time: Utc::now().to_rfc3339(),
            intent: "CAPTURE".into(),
            status: "COMPLETED".into(),
            purchase_units: vec![PurchaseUnit { amount: Amount { currency_code: "USD".into(), value: "5.00".into() } }],
        };
        overrides(&mut o);
        o
    }

    #[test]
    fn validate_accepts_a_well_formed_order() {
        let v = DonationVerifier::new();
        let o = order(|_| {});
        let result = v.validate(&o, "ORDER1", "thanks!", 500, &[]);
        assert!(result.is_ok());
        assert_eq!(result.unwrap().amount, "5.00");
    }

    #[test]
    fn validate_rejects_non_usd_currency() {
        let v = DonationVerifier::new();
        let o = order(|o| o.purchase_units[0].amount.currency_code = "EUR".into());
        assert!(matches!(v.validate(&o, "ORDER2", "", 500, &[]), Err(DonationError::Rejected(_))));
    }

    #[test]
    fn validate_rejects_amount_below_minimum() {
        let v = DonationVerifier::new();
        let o = order(|o| o.purchase_units[0].amount.value = "0.50".into());
        assert!(v.validate(&o, "ORDER3", "", 500, &[]).is_err());
    }

    #[test]
    fn validate_rejects_incomplete_status() {
        let v = DonationVerifier::new();
        let o = order(|o| o.status = "PENDING".into());
        assert!(v.validate(&o, "ORDER4", "", 500, &[]).is_err());
    }

    #[test]
    fn validate_rejects_banned_word_in_message() {
        let v = DonationVerifier::new();
        let o = order(|_| {});
        let words = vec!["badword".to_string()];
        assert!(v.validate(&o, "ORDER5", "this has a BadWord in it", 500, &words).is_err());
    }

    #[test]
    fn api_base_switches_on_paypal_live() {
        let mut c = config();
        assert_eq!(DonationVerifier::api_base(&c), "https://api-m.sandbox.paypal.com");
        c.paypal_live = true;
        assert_eq!(DonationVerifier::api_base(&c), "https://api-m.paypal.com");
    }
}
