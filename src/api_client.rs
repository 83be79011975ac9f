// Travel booking API client
// Thin HTTP layer: bearer credentials, base-URL handling and one normalized error shape

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{
    BookingCore, BookingDetail, CreateBookingRequest, CreatePaymentRequest, DetailBody,
    ErrorBody, Image, ImagesBody, ListEnvelope, ListQuery, LoginRequest, LoginResponse,
    PackageWithDestinations, PaymentCore, PaymentDetail, PaymentMethod, RegisterData,
    RegisterResponse, ScheduleDetail, TokenResponse, User, UserPatch,
};
use crate::storage::{clear_session, SessionStorage, StorageError, AUTH_TOKEN_KEY};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const BASE_URL_ENV: &str = "TRAVEL_API_BASE_URL";
pub const TIMEOUT_ENV: &str = "TRAVEL_API_TIMEOUT_MS";

pub const SERVER_ERROR_FALLBACK: &str = "An error occurred";
pub const NETWORK_ERROR_FALLBACK: &str = "Network error occurred";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Unauthorized")]
    Unauthorized { message: Option<String> },

    #[error("API error: {status_code}")]
    ApiResponseError {
        status_code: u16,
        message: Option<String>,
        code: Option<String>,
    },

    #[error("Failed to decode response: {0}")]
    DecodeError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    // Message supplied by the server, if the failure came with one
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message } | ApiError::ApiResponseError { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::ApiResponseError { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED.as_u16()),
            ApiError::ApiResponseError { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// Caller-facing text: the server's message verbatim when there is one,
    /// otherwise a fixed fallback for the failure class.
    pub fn user_message(&self) -> String {
        if let Some(message) = self.server_message() {
            return message.to_string();
        }
        match self {
            ApiError::NetworkError(_) | ApiError::Timeout(_) => NETWORK_ERROR_FALLBACK.to_string(),
            _ => SERVER_ERROR_FALLBACK.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by `TRAVEL_API_BASE_URL` and `TRAVEL_API_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(base_url) = lookup(BASE_URL_ENV) {
            config.base_url = base_url;
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            config.timeout_ms = raw.trim().parse().map_err(|_| {
                ClientError::ConfigError(format!("{} must be a number of milliseconds, got {:?}", TIMEOUT_ENV, raw))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        reqwest::Url::parse(self.base_url()).map_err(|err| {
            ClientError::ConfigError(format!("invalid base URL {:?}: {}", self.base_url, err))
        })?;
        if self.timeout_ms == 0 {
            return Err(ClientError::ConfigError(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

// Server operations the session store depends on
#[async_trait]
pub trait TravelApi: Send + Sync + 'static {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;

    async fn register(&self, data: &RegisterData) -> Result<RegisterResponse, ApiError>;

    async fn get_user_profile(&self) -> Result<User, ApiError>;

    // Authenticated profile request judged on status alone; the body is ignored
    async fn validate_token(&self) -> Result<(), ApiError>;

    /// Sends the partial update. Yields the server's copy of the user when
    /// the reply carries a decodable one.
    async fn update_user_profile(&self, patch: &UserPatch) -> Result<Option<User>, ApiError>;

    // TODO: confirm the refresh route and payload once the backend publishes one
    async fn refresh_token(&self, current_token: &str) -> Result<String, ApiError>;
}

// How a request is credentialed
#[derive(Debug, Clone, Copy)]
enum Credentials<'a> {
    // Token read from persisted storage at send time
    Stored,
    Explicit(&'a str),
    Anonymous,
}

/// reqwest-backed client for the travel booking REST API.
///
/// The bearer token is read from persisted storage on every request rather than
/// from the session store, and a 401 on a credentialed request clears the
/// persisted session before the error is returned.
pub struct HttpApiClient {
    config: ClientConfig,
    http: reqwest::Client,
    storage: Arc<dyn SessionStorage>,
}

impl HttpApiClient {
    pub fn new(config: ClientConfig, storage: Arc<dyn SessionStorage>) -> Result<Self, ClientError> {
        config.validate()?;

        let mut builder = reqwest::Client::builder().timeout(Duration::from_millis(config.timeout_ms));
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let http = builder
            .build()
            .map_err(|err| ClientError::InitError(format!("failed to build HTTP client: {}", err)))?;

        Ok(Self {
            config,
            http,
            storage,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url(), endpoint)
    }

    async fn bearer_token(&self, credentials: Credentials<'_>) -> Option<String> {
        match credentials {
            Credentials::Anonymous => None,
            Credentials::Explicit(token) => Some(token.to_string()),
            Credentials::Stored => match self.storage.get_item(AUTH_TOKEN_KEY).await {
                Ok(token) => token.filter(|t| !t.is_empty()),
                Err(err) => {
                    warn!(error = %err, "Could not read persisted token, sending without credentials");
                    None
                }
            },
        }
    }

    // Single attempt; non-2xx statuses and transport failures become `ApiError`
    async fn execute<B>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&'static str, String)],
        body: Option<&B>,
        credentials: Credentials<'_>,
    ) -> Result<Bytes, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(endpoint);
        let token = self.bearer_token(credentials).await;
        let credentialed = token.is_some();

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(method = %method, url = %url, credentialed, "Sending API request");

        let response = request.send().await.map_err(|err| self.transport_error(err))?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| self.transport_error(err))?;

        if status == StatusCode::UNAUTHORIZED {
            let body = parse_error_body(&bytes);
            if credentialed {
                warn!(url = %url, "Server rejected credentials, clearing persisted session");
                if let Err(err) = clear_session(self.storage.as_ref()).await {
                    warn!(error = %err, "Failed to clear persisted session after 401");
                }
            }
            return Err(ApiError::Unauthorized {
                message: body.message(),
            });
        }

        if !status.is_success() {
            let body = parse_error_body(&bytes);
            debug!(url = %url, status = %status, "API request failed");
            return Err(ApiError::ApiResponseError {
                status_code: status.as_u16(),
                message: body.message(),
                code: body.code_string(),
            });
        }

        Ok(bytes)
    }

    async fn send<B, T>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&'static str, String)],
        body: Option<&B>,
        credentials: Credentials<'_>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = self.execute(method, endpoint, query, body, credentials).await?;
        let payload: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(payload).map_err(|err| ApiError::DecodeError(err.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.config.timeout_ms)
        } else {
            ApiError::NetworkError(err.to_string())
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, ApiError> {
        self.send::<(), T>(Method::GET, endpoint, query, None, Credentials::Stored)
            .await
    }

    async fn get_detail<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let body: DetailBody<T> = self.get(endpoint, &[]).await?;
        Ok(body.into_inner())
    }

    async fn post_detail<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body: DetailBody<T> = self
            .send(Method::POST, endpoint, &[], Some(body), Credentials::Stored)
            .await?;
        Ok(body.into_inner())
    }

    // Packages

    pub async fn get_packages(
        &self,
        query: &ListQuery,
    ) -> Result<ListEnvelope<PackageWithDestinations>, ApiError> {
        self.get("/user/packages", &query.to_pairs()).await
    }

    pub async fn get_package_detail(&self, id: &str) -> Result<PackageWithDestinations, ApiError> {
        self.get_detail(&format!("/user/packages/{}", id)).await
    }

    // Schedules

    pub async fn get_package_schedules(
        &self,
        package_id: &str,
        query: &ListQuery,
    ) -> Result<ListEnvelope<ScheduleDetail>, ApiError> {
        self.get(
            &format!("/user/packages/{}/schedules", package_id),
            &query.to_pairs(),
        )
        .await
    }

    pub async fn get_schedule_detail(&self, id: &str) -> Result<ScheduleDetail, ApiError> {
        self.get_detail(&format!("/user/schedules/{}", id)).await
    }

    // Bookings

    pub async fn get_bookings(&self, query: &ListQuery) -> Result<ListEnvelope<BookingDetail>, ApiError> {
        self.get("/user/bookings", &query.to_pairs()).await
    }

    pub async fn get_booking_detail(&self, id: &str) -> Result<BookingDetail, ApiError> {
        self.get_detail(&format!("/user/bookings/{}", id)).await
    }

    pub async fn create_booking(&self, request: &CreateBookingRequest) -> Result<BookingCore, ApiError> {
        self.post_detail("/user/bookings", request).await
    }

    // Payments

    pub async fn get_payment_methods(
        &self,
        order_by: Option<&str>,
    ) -> Result<ListEnvelope<PaymentMethod>, ApiError> {
        let query = ListQuery {
            order_by: order_by.map(str::to_string),
            ..Default::default()
        };
        self.get("/user/payment-methods", &query.to_pairs()).await
    }

    pub async fn get_payments(&self, query: &ListQuery) -> Result<ListEnvelope<PaymentDetail>, ApiError> {
        self.get("/user/payments", &query.to_pairs()).await
    }

    pub async fn get_payment_detail(&self, id: &str) -> Result<PaymentDetail, ApiError> {
        self.get_detail(&format!("/user/payments/{}", id)).await
    }

    pub async fn create_payment(&self, request: &CreatePaymentRequest) -> Result<PaymentCore, ApiError> {
        self.post_detail("/user/payments", request).await
    }

    // Image proxy

    pub fn image_url(&self, id: &str) -> String {
        self.url(&format!("/file-proxy/{}", id))
    }

    // The server spells this route "singel"
    pub fn single_image_by_fk_url(&self, fk: &str) -> String {
        self.url(&format!("/file-proxy/fk/singel/{}", fk))
    }

    pub async fn get_images_by_fk(&self, fk: &str) -> Result<Vec<Image>, ApiError> {
        let body: ImagesBody = self.get(&format!("/file-proxy/fk/{}", fk), &[]).await?;
        Ok(body.images)
    }
}

#[async_trait]
impl TravelApi for HttpApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = LoginRequest { email, password };
        let response: LoginResponse = self
            .send(Method::POST, "/login", &[], Some(&body), Credentials::Anonymous)
            .await?;
        info!(email = %email, "Login accepted by server");
        Ok(response)
    }

    async fn register(&self, data: &RegisterData) -> Result<RegisterResponse, ApiError> {
        let response: RegisterResponse = self
            .send(Method::POST, "/register", &[], Some(data), Credentials::Anonymous)
            .await?;
        info!(email = %data.email, "Registration accepted by server");
        Ok(response)
    }

    async fn get_user_profile(&self) -> Result<User, ApiError> {
        self.get_detail("/user/profile").await
    }

    async fn validate_token(&self) -> Result<(), ApiError> {
        self.execute::<()>(Method::GET, "/user/profile", &[], None, Credentials::Stored)
            .await?;
        Ok(())
    }

    async fn update_user_profile(&self, patch: &UserPatch) -> Result<Option<User>, ApiError> {
        let bytes = self
            .execute(Method::PUT, "/user/profile", &[], Some(patch), Credentials::Stored)
            .await?;
        match serde_json::from_slice::<DetailBody<User>>(&bytes) {
            Ok(body) => Ok(Some(body.into_inner())),
            Err(err) => {
                debug!(error = %err, "Profile update reply carried no user record");
                Ok(None)
            }
        }
    }

    async fn refresh_token(&self, current_token: &str) -> Result<String, ApiError> {
        let response: TokenResponse = self
            .send::<(), _>(
                Method::POST,
                "/refresh-token",
                &[],
                None,
                Credentials::Explicit(current_token),
            )
            .await?;
        if response.token.is_empty() {
            return Err(ApiError::DecodeError("refresh returned an empty token".to_string()));
        }
        Ok(response.token)
    }
}

fn parse_error_body(bytes: &[u8]) -> ErrorBody {
    serde_json::from_slice(bytes).unwrap_or_default()
}

impl ErrorBody {
    fn message(&self) -> Option<String> {
        self.msg
            .clone()
            .or_else(|| self.error.clone())
            .filter(|m| !m.is_empty())
    }

    fn code_string(&self) -> Option<String> {
        match &self.code {
            Some(serde_json::Value::String(code)) => Some(code.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }
}

// Fake implementation of the server contract for session store tests
#[cfg(test)]
pub mod mock_server {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    struct Account {
        password: String,
        user: User,
    }

    pub struct MockServer {
        storage: Arc<dyn SessionStorage>,
        accounts: Mutex<HashMap<String, Account>>,
        tokens: Mutex<HashMap<String, String>>,
        next_tokens: Mutex<Vec<String>>,
        fail_next_requests: AtomicUsize,
        login_delays_ms: Mutex<Vec<u64>>,
        request_count: AtomicUsize,
    }

    impl MockServer {
        pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
            Self {
                storage,
                accounts: Mutex::new(HashMap::new()),
                tokens: Mutex::new(HashMap::new()),
                next_tokens: Mutex::new(Vec::new()),
                fail_next_requests: AtomicUsize::new(0),
                login_delays_ms: Mutex::new(Vec::new()),
                request_count: AtomicUsize::new(0),
            }
        }

        pub async fn add_account(&self, password: &str, user: User) {
            let mut accounts = self.accounts.lock().await;
            accounts.insert(
                user.email.clone(),
                Account {
                    password: password.to_string(),
                    user,
                },
            );
        }

        // Tokens handed out by the next logins/registrations/refreshes, in order
        pub async fn queue_tokens(&self, tokens: &[&str]) {
            let mut next = self.next_tokens.lock().await;
            next.extend(tokens.iter().map(|t| t.to_string()));
        }

        pub async fn issue_token(&self, token: &str, email: &str) {
            let mut tokens = self.tokens.lock().await;
            tokens.insert(token.to_string(), email.to_string());
        }

        pub async fn revoke_all_tokens(&self) {
            self.tokens.lock().await.clear();
        }

        // Delays applied to successive login calls
        pub async fn set_login_delays(&self, delays_ms: &[u64]) {
            let mut delays = self.login_delays_ms.lock().await;
            *delays = delays_ms.to_vec();
        }

        pub fn fail_next_requests(&self, count: usize) {
            self.fail_next_requests.store(count, Ordering::SeqCst);
        }

        pub fn request_count(&self) -> usize {
            self.request_count.load(Ordering::SeqCst)
        }

        fn begin_request(&self) -> Result<(), ApiError> {
            self.request_count.fetch_add(1, Ordering::SeqCst);
            let fail_count = self.fail_next_requests.load(Ordering::SeqCst);
            if fail_count > 0 {
                self.fail_next_requests.store(fail_count - 1, Ordering::SeqCst);
                return Err(ApiError::NetworkError("Service unavailable".to_string()));
            }
            Ok(())
        }

        async fn mint_token(&self, email: &str) -> String {
            let queued = {
                let mut next = self.next_tokens.lock().await;
                if next.is_empty() {
                    None
                } else {
                    Some(next.remove(0))
                }
            };
            let token = queued.unwrap_or_else(|| format!("tok-{}", rand::random::<u32>()));
            self.issue_token(&token, email).await;
            token
        }

        // Mirrors the HTTP client: token from storage, eviction on rejection
        async fn authorize(&self, presented: Option<String>) -> Result<String, ApiError> {
            let token = match presented {
                Some(token) => Some(token),
                None => self.storage.get_item(AUTH_TOKEN_KEY).await?,
            };
            let email = match &token {
                Some(token) => self.tokens.lock().await.get(token).cloned(),
                None => None,
            };
            match email {
                Some(email) => Ok(email),
                None => {
                    if token.is_some() {
                        let _ = clear_session(self.storage.as_ref()).await;
                    }
                    Err(ApiError::Unauthorized {
                        message: Some("Invalid or expired token".to_string()),
                    })
                }
            }
        }
    }

    #[async_trait]
    impl TravelApi for MockServer {
        async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
            self.begin_request()?;

            let delay = {
                let mut delays = self.login_delays_ms.lock().await;
                if delays.is_empty() {
                    0
                } else {
                    delays.remove(0)
                }
            };
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let user = {
                let accounts = self.accounts.lock().await;
                match accounts.get(email) {
                    Some(account) if account.password == password => account.user.clone(),
                    _ => {
                        return Err(ApiError::ApiResponseError {
                            status_code: 400,
                            message: Some("Invalid credentials".to_string()),
                            code: Some("INVALID_CREDENTIALS".to_string()),
                        })
                    }
                }
            };
            let token = self.mint_token(email).await;
            Ok(LoginResponse {
                msg: Some("Login successful".to_string()),
                token,
                data: user,
            })
        }

        async fn register(&self, data: &RegisterData) -> Result<RegisterResponse, ApiError> {
            self.begin_request()?;

            let user = {
                let mut accounts = self.accounts.lock().await;
                if accounts.contains_key(&data.email) {
                    return Err(ApiError::ApiResponseError {
                        status_code: 409,
                        message: Some("Email already registered".to_string()),
                        code: None,
                    });
                }
                let user = User {
                    id: format!("{}", accounts.len() + 1),
                    name: data.name.clone(),
                    email: data.email.clone(),
                    role: Some(crate::models::UserRole::Customer),
                    phone: Some(data.phone.clone()),
                    avatar: None,
                    image_id: None,
                    created_at: Some(chrono::Utc::now()),
                    last_login: None,
                };
                accounts.insert(
                    data.email.clone(),
                    Account {
                        password: data.password.clone(),
                        user: user.clone(),
                    },
                );
                user
            };
            let token = self.mint_token(&data.email).await;
            Ok(RegisterResponse {
                msg: Some("Registration successful".to_string()),
                token,
                user,
            })
        }

        async fn get_user_profile(&self) -> Result<User, ApiError> {
            self.begin_request()?;
            let email = self.authorize(None).await?;
            let accounts = self.accounts.lock().await;
            accounts
                .get(&email)
                .map(|account| account.user.clone())
                .ok_or_else(|| ApiError::ApiResponseError {
                    status_code: 404,
                    message: Some("User not found".to_string()),
                    code: None,
                })
        }

        async fn validate_token(&self) -> Result<(), ApiError> {
            self.begin_request()?;
            self.authorize(None).await?;
            Ok(())
        }

        async fn update_user_profile(&self, patch: &UserPatch) -> Result<Option<User>, ApiError> {
            self.begin_request()?;
            let email = self.authorize(None).await?;
            let mut accounts = self.accounts.lock().await;
            let account = accounts.get_mut(&email).ok_or_else(|| ApiError::ApiResponseError {
                status_code: 404,
                message: Some("User not found".to_string()),
                code: None,
            })?;
            account.user = account.user.merged(patch);
            Ok(Some(account.user.clone()))
        }

        async fn refresh_token(&self, current_token: &str) -> Result<String, ApiError> {
            self.begin_request()?;
            let email = self.authorize(Some(current_token.to_string())).await?;
            self.tokens.lock().await.remove(current_token);
            Ok(self.mint_token(&email).await)
        }
    }
}
