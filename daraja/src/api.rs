use std::sync::Arc;

use chrono::Utc;
use log::*;
use reqwest::Client;
use serde_json::{json, Value};
use sokoni_common::Cents;

use crate::{
    config::DarajaConfig,
    data_objects::StkPushAccepted,
    helpers::{normalize_msisdn, stk_password},
    DarajaApiError,
};

#[derive(Clone)]
pub struct DarajaApi {
    config: DarajaConfig,
    client: Arc<Client>,
}

impl DarajaApi {
    pub fn new(config: DarajaConfig) -> Result<Self, DarajaApiError> {
        let client = Client::builder().build().map_err(|e| DarajaApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &DarajaConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base)
    }

    /// Fetches a short-lived OAuth access token from Daraja using the consumer key/secret pair.
    pub async fn access_token(&self) -> Result<String, DarajaApiError> {
        let credentials =
            base64::encode(format!("{}:{}", self.config.consumer_key.reveal(), self.config.consumer_secret.reveal()));
        let url = self.url("/oauth/v1/generate?grant_type=client_credentials");
        trace!("📡️ Requesting Daraja access token");
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Basic {credentials}"))
            .send()
            .await
            .map_err(|e| DarajaApiError::AuthTokenError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DarajaApiError::AuthTokenError(format!("Token endpoint returned {}", response.status())));
        }
        let body = response.json::<Value>().await.map_err(|e| DarajaApiError::JsonError(e.to_string()))?;
        body["access_token"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| DarajaApiError::AuthTokenError("No access_token in response".to_string()))
    }

    /// Initiates an STK push payment prompt on the customer's phone.
    ///
    /// On success, Daraja has *accepted* the request and will deliver the actual payment outcome to the configured
    /// callback url. The returned `checkout_request_id` must be stored so the callback can be correlated back to the
    /// order that triggered it.
    pub async fn initiate_stk_push(
        &self,
        phone: &str,
        amount: Cents,
        account_reference: &str,
        description: &str,
    ) -> Result<StkPushAccepted, DarajaApiError> {
        let msisdn = normalize_msisdn(phone)?;
        let token = self.access_token().await?;
        let (password, timestamp) = stk_password(&self.config.shortcode, self.config.passkey.reveal(), Utc::now());
        let payload = json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": password,
            "Timestamp": timestamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": amount.whole_shillings(),
            "PartyA": msisdn,
            "PartyB": self.config.shortcode,
            "PhoneNumber": msisdn,
            "CallBackURL": self.config.callback_url,
            "AccountReference": account_reference,
            "TransactionDesc": description,
        });
        trace!("📡️ Sending STK push for {amount} to {msisdn}");
        let response = self
            .client
            .post(self.url("/mpesa/stkpush/v1/processrequest"))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DarajaApiError::RestResponseError(e.to_string()))?;
        let status = response.status();
        let body = response.json::<Value>().await.map_err(|e| DarajaApiError::JsonError(e.to_string()))?;
        if !status.is_success() {
            return Err(DarajaApiError::PushRejected {
                code: status.as_u16().to_string(),
                message: body.to_string(),
            });
        }
        match body["ResponseCode"].as_str() {
            Some("0") => {
                let checkout_request_id = body["CheckoutRequestID"]
                    .as_str()
                    .map(String::from)
                    .ok_or_else(|| DarajaApiError::JsonError("Accepted push had no CheckoutRequestID".to_string()))?;
                debug!("📡️ STK push accepted with correlation id {checkout_request_id}");
                Ok(StkPushAccepted {
                    checkout_request_id,
                    merchant_request_id: body["MerchantRequestID"].as_str().map(String::from),
                    response_description: body["ResponseDescription"].as_str().map(String::from),
                })
            },
            Some(code) => Err(DarajaApiError::PushRejected {
                code: code.to_string(),
                message: body["ResponseDescription"].as_str().unwrap_or("STK push failed").to_string(),
            }),
            None => Err(DarajaApiError::PushRejected {
                code: "unknown".to_string(),
                message: "Response did not include a ResponseCode".to_string(),
            }),
        }
    }
}
