/*!
 * Authentication and authorization for the CellarStock API.
 *
 * Operators sign in with username/password and receive a short-lived JWT
 * bearer token. Every `/wine` and `/history` route requires a valid token;
 * administrative actions additionally require the `admin` role, carried as
 * an explicit claim rather than inferred from a distinguished username.
 */

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::user::{self, Entity as User, UserRole};
use crate::errors::ErrorResponse;
use crate::events::{Event, EventSender};

const MIN_PASSWORD_LENGTH: usize = 6;
const MIN_USERNAME_LENGTH: usize = 3;
/// Password assigned to accounts created by an administrator; the operator
/// is expected to change it on first login.
pub const DEFAULT_INITIAL_PASSWORD: &str = "123456";

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    pub role: String,
    /// JWT ID, unique per issued token
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated operator extracted from a validated token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub token_id: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        issuer: String,
        audience: String,
        token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            issuer,
            audience,
            token_expiration,
        }
    }
}

/// Issued bearer token and its lifetime.
#[derive(Debug, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Handles token issuance and validation plus operator account management.
#[derive(Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            config,
            db,
            event_sender,
        }
    }

    /// Verify credentials and issue a token. Unknown usernames and wrong
    /// passwords are indistinguishable to the caller.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(IssuedToken, user::Model), AuthError> {
        let account = User::find()
            .filter(user::Column::Username.eq(username))
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &account.password_hash)? {
            warn!(username = %username, "failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.issue_token(&account)?;
        info!(user_id = %account.id, "operator logged in");
        Ok((token, account))
    }

    /// Generate a signed JWT for an account.
    pub fn issue_token(&self, account: &user::Model) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.token_expiration)
                .map_err(|_| AuthError::Internal("invalid token duration".to_string()))?;

        let claims = Claims {
            sub: account.id.to_string(),
            username: account.username.clone(),
            role: account.role.as_str().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(IssuedToken {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.token_expiration.as_secs() as i64,
        })
    }

    /// Validate a JWT and extract its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        Ok(claims)
    }

    /// Re-check a password for an already-authenticated operator. Used as
    /// confirmation for destructive administrative actions.
    pub async fn verify_password_for(&self, user_id: Uuid, password: &str) -> Result<(), AuthError> {
        let account = User::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;

        if verify_password(password, &account.password_hash)? {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Change the caller's own password after verifying the current one.
    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if new_password.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "new password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let account = User::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?
            .ok_or_else(|| AuthError::NotFound("user not found".to_string()))?;

        if !verify_password(current_password, &account.password_hash)? {
            return Err(AuthError::Validation("current password is incorrect".to_string()));
        }

        let mut active: user::ActiveModel = account.into();
        active.password_hash = Set(hash_password(new_password)?);
        active.updated_at = Set(Utc::now());
        active
            .update(&*self.db)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?;

        info!(user_id = %user_id, "password changed");
        Ok(())
    }

    /// Create an operator account. Admin only; enforced by the caller.
    #[instrument(skip(self, password))]
    pub async fn create_user(
        &self,
        username: &str,
        password: Option<&str>,
        role: UserRole,
    ) -> Result<user::Model, AuthError> {
        let username = username.trim();
        if username.len() < MIN_USERNAME_LENGTH {
            return Err(AuthError::Validation(format!(
                "username must be at least {} characters",
                MIN_USERNAME_LENGTH
            )));
        }

        let existing = User::find()
            .filter(user::Column::Username.eq(username))
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?;
        if existing.is_some() {
            return Err(AuthError::Validation(format!(
                "username '{}' already exists",
                username
            )));
        }

        let password = password.unwrap_or(DEFAULT_INITIAL_PASSWORD);
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let now = Utc::now();
        let account = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            password_hash: Set(hash_password(password)?),
            role: Set(role),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))?;

        if let Err(e) = self
            .event_sender
            .send(Event::UserCreated {
                user_id: account.id,
                username: account.username.clone(),
            })
            .await
        {
            warn!(error = %e, "failed to publish user created event");
        }

        Ok(account)
    }

    /// List all operator accounts, newest first.
    pub async fn list_users(&self) -> Result<Vec<user::Model>, AuthError> {
        User::find()
            .order_by_desc(user::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))
    }

    /// Delete an operator account. Admin accounts and the caller's own
    /// account are protected.
    #[instrument(skip(self, acting))]
    pub async fn delete_user(&self, target_id: Uuid, acting: &AuthUser) -> Result<user::Model, AuthError> {
        let target = User::find_by_id(target_id)
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?
            .ok_or_else(|| AuthError::NotFound("user not found".to_string()))?;

        if target.role == UserRole::Admin {
            return Err(AuthError::Validation(
                "administrator accounts cannot be deleted".to_string(),
            ));
        }
        if target.id == acting.user_id {
            return Err(AuthError::Validation(
                "cannot delete the currently signed-in account".to_string(),
            ));
        }

        let snapshot = target.clone();
        target
            .delete(&*self.db)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?;

        if let Err(e) = self
            .event_sender
            .send(Event::UserDeleted {
                user_id: snapshot.id,
                username: snapshot.username.clone(),
            })
            .await
        {
            warn!(error = %e, "failed to publish user deleted event");
        }

        Ok(snapshot)
    }
}

/// Hash a password with argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Verify a password against a stored argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Insufficient permission")]
    InsufficientPermissions,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Password hashing error: {0}")]
    Hash(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingAuth | Self::InvalidToken | Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::InvalidCredentials | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::TokenCreation(_) | Self::Hash(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "auth request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

/// Middleware validating the bearer token and injecting an [`AuthUser`]
/// into request extensions. Expects an `Arc<AuthService>` extension to be
/// installed by the application router.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication service not available",
            )
                .into_response();
        }
    };

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    let token = match token {
        Some(token) if !token.is_empty() => token,
        _ => return AuthError::MissingAuth.into_response(),
    };

    match authenticate_token(&auth_service, token) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

fn authenticate_token(auth_service: &AuthService, token: &str) -> Result<AuthUser, AuthError> {
    let claims = auth_service.validate_token(token)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
    let role = UserRole::parse(&claims.role).ok_or(AuthError::InvalidToken)?;

    Ok(AuthUser {
        user_id,
        username: claims.username,
        role,
        token_id: claims.jti,
    })
}

/// Extension methods for `Router` to attach auth middleware.
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
}

impl<S> AuthRouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }
}

// Request/response payloads for the auth endpoints.

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub role: String,
}

impl From<&user::Model> for UserSummary {
    fn from(account: &user::Model) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            role: account.role.as_str().to_string(),
        }
    }
}

/// Authentication routes
pub fn auth_routes() -> Router<Arc<AuthService>> {
    let protected = Router::new()
        .route("/verify", get(verify_handler))
        .route("/change-password", put(change_password_handler))
        .route("/users", post(create_user_handler).get(list_users_handler))
        .route("/users/:id", delete(delete_user_handler))
        .with_auth();

    Router::new()
        .route("/login", post(login_handler))
        .merge(protected)
}

async fn login_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(credentials): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, AuthError> {
    if credentials.username.is_empty() || credentials.password.is_empty() {
        return Err(AuthError::Validation(
            "username and password are required".to_string(),
        ));
    }

    let (issued, account) = auth_service
        .login(&credentials.username, &credentials.password)
        .await?;

    Ok(Json(serde_json::json!({
        "message": "login successful",
        "token": issued.token,
        "tokenType": issued.token_type,
        "expiresIn": issued.expires_in,
        "user": UserSummary::from(&account),
    })))
}

async fn verify_handler(user: AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "token valid",
        "user": {
            "id": user.user_id,
            "username": user.username,
            "role": user.role.as_str(),
        }
    }))
}

async fn change_password_handler(
    State(auth_service): State<Arc<AuthService>>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, AuthError> {
    if payload.current_password.is_empty() || payload.new_password.is_empty() {
        return Err(AuthError::Validation(
            "current and new passwords are required".to_string(),
        ));
    }

    auth_service
        .change_password(user.user_id, &payload.current_password, &payload.new_password)
        .await?;

    Ok(Json(serde_json::json!({ "message": "password changed" })))
}

async fn create_user_handler(
    State(auth_service): State<Arc<AuthService>>,
    user: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<serde_json::Value>, AuthError> {
    if !user.is_admin() {
        return Err(AuthError::InsufficientPermissions);
    }

    let role = match payload.role.as_deref() {
        None => UserRole::Operator,
        Some(raw) => UserRole::parse(raw)
            .ok_or_else(|| AuthError::Validation(format!("unknown role '{}'", raw)))?,
    };

    let account = auth_service
        .create_user(&payload.username, payload.password.as_deref(), role)
        .await?;

    Ok(Json(serde_json::json!({
        "message": "user created",
        "user": UserSummary::from(&account),
    })))
}

async fn list_users_handler(
    State(auth_service): State<Arc<AuthService>>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, AuthError> {
    if !user.is_admin() {
        return Err(AuthError::InsufficientPermissions);
    }

    let users = auth_service.list_users().await?;
    let users: Vec<UserSummary> = users.iter().map(UserSummary::from).collect();

    Ok(Json(serde_json::json!({ "users": users })))
}

async fn delete_user_handler(
    State(auth_service): State<Arc<AuthService>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AuthError> {
    if !user.is_admin() {
        return Err(AuthError::InsufficientPermissions);
    }

    let deleted = auth_service.delete_user(id, &user).await?;

    Ok(Json(serde_json::json!({
        "message": "user deleted",
        "deletedUser": UserSummary::from(&deleted),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig::new(
            "unit-test-secret-key-that-is-long-enough-for-hs256".to_string(),
            "cellarstock-api".to_string(),
            "cellarstock-clients".to_string(),
            Duration::from_secs(3600),
        )
    }

    fn test_account(role: UserRole) -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            username: "tester".to_string(),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service_without_db(config: AuthConfig) -> AuthService {
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        AuthService::new(
            config,
            Arc::new(DatabaseConnection::Disconnected),
            EventSender::new(tx),
        )
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("s3cret-pass").expect("hashing should succeed");
        assert!(verify_password("s3cret-pass", &hash).unwrap());
        assert!(!verify_password("wrong-pass", &hash).unwrap());
    }

    #[test]
    fn token_round_trip_preserves_claims() {
        let service = service_without_db(test_config());
        let account = test_account(UserRole::Admin);

        let issued = service.issue_token(&account).expect("token issuance");
        let claims = service.validate_token(&issued.token).expect("validation");

        assert_eq!(claims.sub, account.id.to_string());
        assert_eq!(claims.username, "tester");
        assert_eq!(claims.role, "admin");
        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(issued.expires_in, 3600);
    }

    #[test]
    fn token_from_other_issuer_is_rejected() {
        let issuing = service_without_db(AuthConfig::new(
            "unit-test-secret-key-that-is-long-enough-for-hs256".to_string(),
            "someone-else".to_string(),
            "cellarstock-clients".to_string(),
            Duration::from_secs(3600),
        ));
        let validating = service_without_db(test_config());

        let issued = issuing
            .issue_token(&test_account(UserRole::Operator))
            .expect("token issuance");
        assert!(matches!(
            validating.validate_token(&issued.token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let service = service_without_db(test_config());
        let issued = service
            .issue_token(&test_account(UserRole::Operator))
            .expect("token issuance");

        let mut tampered = issued.token;
        tampered.pop();
        tampered.push('x');
        assert!(service.validate_token(&tampered).is_err());
    }
}
