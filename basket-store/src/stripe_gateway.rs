use async_trait::async_trait;
use basket_core::payment::{CheckoutSession, CheckoutSessionRequest, PaymentGateway};
use serde::Deserialize;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stripe hosted-checkout gateway. Builds the form-encoded
/// `/v1/checkout/sessions` request and stashes the order ingredients in
/// session metadata so the webhook can rebuild the order without any
/// server-side session state.
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            api_base: "https://api.stripe.com".to_string(),
        }
    }

    /// Point the gateway at a stub server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, BoxError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
        ];

        if let Some(email) = &request.customer_email {
            form.push(("customer_email".to_string(), email.clone()));
        }

        for (i, item) in request.line_items.iter().enumerate() {
            form.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
            form.push((
                format!("line_items[{i}][price_data][currency]"),
                request.currency.clone(),
            ));
            form.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                item.unit_amount_cents.to_string(),
            ));
            form.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                item.name.clone(),
            ));
            if let Some(image) = &item.image {
                form.push((
                    format!("line_items[{i}][price_data][product_data][images][0]"),
                    image.clone(),
                ));
            }
        }

        // Metadata values are capped at 500 characters by the processor, so
        // very large carts would need a server-side session store instead.
        form.push(("metadata[user_id]".to_string(), request.user_id.to_string()));
        form.push((
            "metadata[address_id]".to_string(),
            request.address_id.to_string(),
        ));
        form.push((
            "metadata[line_items]".to_string(),
            serde_json::to_string(&request.line_items)?,
        ));
        form.push((
            "metadata[subtotal_cents]".to_string(),
            request.subtotal_cents.to_string(),
        ));
        form.push((
            "metadata[total_cents]".to_string(),
            request.total_cents.to_string(),
        ));

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("checkout session rejected ({}): {}", status, body).into());
        }

        let session: SessionResponse = response.json().await?;
        Ok(CheckoutSession {
            url: session.url.unwrap_or_default(),
            id: session.id,
        })
    }
}
