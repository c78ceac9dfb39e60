//! Thin typed wrapper over the CommitHub REST backend.
//!
//! Every call carries the session cookie from a shared jar; the jar is the
//! only session object the client has. Status handling:
//! 401 → [`ClientError::Unauthorized`], 429 (or a 403 mentioning a limit) →
//! [`ClientError::QuotaExceeded`], any other non-2xx → [`ClientError::Api`].

use std::sync::Arc;

use reqwest::{
    Client, Method, Response, StatusCode, Url,
    cookie::{CookieStore, Jar},
    header::HeaderValue,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    api_objects::{
        ChangePasswordRequest, ChatHistory, ConnectionRequest, CreateOrderRequest, DataEnvelope,
        DecisionLimits, DecisionReceipt, EmailRequest, FeedResponse, FixExpiryResponse,
        LoginRequest, MembershipStatus, MessageResponse, PaymentOrder, ProfileUpdate,
        ResetPasswordRequest, SignupRequest, SignupResponse, User,
    },
    config::ClientConfig,
    error::ClientError,
    types::{MembershipType, Result, ReviewStatus, Verdict},
};

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    cookies: Arc<Jar>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let cookies = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            cookies,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// `Cookie` header the backend set for `url`, for transports that
    /// bypass `reqwest` (the websocket handshake).
    pub(crate) fn cookie_header(&self, url: &str) -> Option<HeaderValue> {
        let url = Url::parse(url).ok()?;
        self.cookies.cookies(&url)
    }

    // auth

    pub async fn login(&self, request: &LoginRequest) -> Result<User> {
        self.send(Method::POST, "/login", Some(request)).await
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<SignupResponse> {
        self.send(Method::POST, "/signup", Some(request)).await
    }

    pub async fn logout(&self) -> Result<()> {
        // The backend answers logout with plain text.
        self.execute::<Value>(Method::POST, "/logout", None)
            .await
            .map(|_| ())
    }

    pub async fn forgot_password(&self, request: &EmailRequest) -> Result<MessageResponse> {
        self.send(Method::POST, "/auth/forgot-password", Some(request))
            .await
    }

    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<MessageResponse> {
        self.send(Method::POST, "/auth/reset-password", Some(request))
            .await
    }

    pub async fn verify_email(&self, token: &str) -> Result<MessageResponse> {
        let response = self
            .client
            .get(self.url("/verify-email"))
            .query(&[("token", token)])
            .send()
            .await?;
        Self::read(response).await
    }

    pub async fn resend_verification(&self, request: &EmailRequest) -> Result<MessageResponse> {
        self.send(Method::POST, "/resend-verification", Some(request))
            .await
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest) -> Result<MessageResponse> {
        self.send(Method::PATCH, "/auth/change-password", Some(request))
            .await
    }

    // profile

    pub async fn view_profile(&self) -> Result<User> {
        self.get("/profile/view").await
    }

    pub async fn edit_profile(&self, update: &ProfileUpdate) -> Result<User> {
        let envelope: DataEnvelope<User> = self
            .send(Method::PATCH, "/profile/edit", Some(update))
            .await?;
        Ok(envelope.data)
    }

    pub async fn user_profile(&self, user_id: &str) -> Result<User> {
        self.get(&format!("/user/profile/{user_id}")).await
    }

    // feed & requests

    pub async fn feed(&self) -> Result<Vec<User>> {
        let response: FeedResponse = self.get("/feed").await?;
        Ok(response.into_users())
    }

    pub async fn send_request(&self, verdict: Verdict, user_id: &str) -> Result<DecisionReceipt> {
        self.send::<Value, _>(
            Method::POST,
            &format!("/request/send/{}/{user_id}", verdict.as_str()),
            None,
        )
        .await
    }

    pub async fn review_request(
        &self,
        status: ReviewStatus,
        request_id: &str,
    ) -> Result<MessageResponse> {
        self.send::<Value, _>(
            Method::POST,
            &format!("/request/review/{}/{request_id}", status.as_str()),
            None,
        )
        .await
    }

    pub async fn connections(&self) -> Result<Vec<User>> {
        let envelope: DataEnvelope<Vec<User>> = self.get("/user/connections").await?;
        Ok(envelope.data)
    }

    pub async fn requests_received(&self) -> Result<Vec<ConnectionRequest>> {
        let envelope: DataEnvelope<Vec<ConnectionRequest>> =
            self.get("/user/requests/received").await?;
        Ok(envelope.data)
    }

    // chat

    pub async fn chat_history(&self, target_user_id: &str) -> Result<ChatHistory> {
        self.get(&format!("/chat/{target_user_id}")).await
    }

    // premium

    pub async fn premium_status(&self) -> Result<MembershipStatus> {
        self.get("/premium/verify").await
    }

    pub async fn premium_limits(&self) -> Result<DecisionLimits> {
        self.get("/premium/limits").await
    }

    pub async fn fix_premium_expiry(&self) -> Result<FixExpiryResponse> {
        self.send::<Value, _>(Method::POST, "/premium/fix-expiry", None)
            .await
    }

    pub async fn create_order(&self, membership_type: MembershipType) -> Result<PaymentOrder> {
        self.send(
            Method::POST,
            "/payment/create",
            Some(&CreateOrderRequest { membership_type }),
        )
        .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!("GET {path}");
        let response = self.client.get(self.url(path)).send().await?;
        Self::read(response).await
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.execute(method, path, body).await?;
        Self::decode(&text)
    }

    /// Issues the request and returns the body of a 2xx response.
    async fn execute<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<String>
    where
        B: Serialize + ?Sized,
    {
        debug!("{method} {path}");
        let mut request = self.client.request(method, self.url(path));
        request = match body {
            Some(body) => request.json(body),
            None => request.json(&Value::Object(Default::default())),
        };

        let response = request.send().await?;
        Self::checked_body(response).await
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T> {
        let text = Self::checked_body(response).await?;
        Self::decode(&text)
    }

    async fn checked_body(response: Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let error = error_for_status(status, &body);
            warn!("Request failed with {status}: {error}");
            return Err(error);
        }

        Ok(body)
    }

    fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
        // Some endpoints answer 200 with an empty body.
        if body.trim().is_empty() {
            return serde_json::from_value(Value::Object(Default::default()))
                .or_else(|_| serde_json::from_value(Value::Null))
                .map_err(Into::into);
        }

        Ok(serde_json::from_str(body)?)
    }
}

/// Maps a non-2xx response onto the client's error taxonomy.
pub(crate) fn error_for_status(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                String::from(status.canonical_reason().unwrap_or("Request failed"))
            } else {
                String::from(trimmed)
            }
        });

    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => ClientError::QuotaExceeded { message },
        StatusCode::FORBIDDEN if message.to_ascii_lowercase().contains("limit") => {
            ClientError::QuotaExceeded { message }
        }
        _ => ClientError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_for_status_mapping() {
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, "Please login"),
            ClientError::Unauthorized
        ));

        match error_for_status(StatusCode::TOO_MANY_REQUESTS, r#"{"message":"Daily limit reached"}"#) {
            ClientError::QuotaExceeded { message } => assert_eq!(message, "Daily limit reached"),
            other => panic!("Unexpected error {other}"),
        }

        assert!(matches!(
            error_for_status(StatusCode::FORBIDDEN, "You have hit your swipe LIMIT"),
            ClientError::QuotaExceeded { .. }
        ));

        match error_for_status(StatusCode::BAD_REQUEST, "ERROR : Invalid credentials") {
            ClientError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "ERROR : Invalid credentials");
            }
            other => panic!("Unexpected error {other}"),
        }

        match error_for_status(StatusCode::INTERNAL_SERVER_ERROR, "") {
            ClientError::Api { message, .. } => assert_eq!(message, "Internal Server Error"),
            other => panic!("Unexpected error {other}"),
        }
    }

    #[test]
    fn test_new_client_keeps_base_url() {
        let client = ApiClient::new(&ClientConfig::new("http://localhost:7777/")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:7777");
        assert!(client.cookie_header("http://localhost:7777/").is_none());
    }
}
