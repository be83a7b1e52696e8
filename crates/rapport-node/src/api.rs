//! HTTP API for Rapport.

use crate::auth::{hash_password, verify_password, AdminUser, AuthUser, MIN_PASSWORD_LEN};
use crate::error::{Error, Result};
use crate::models::{self, generate_id, Profile};
use crate::node::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use rapport_graph::{
    now_millis, resolve_summaries, Account, AccountId, AccountSummary, ConnectionList,
    ConnectionService, GraphError, NetworkService, NetworkView, Role, DEFAULT_IMAGE,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.config.cors_origins))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        // Auth
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        // Connections
        .route("/api/connections", get(list_connections))
        .route("/api/connections/request/:user_id", post(request_connection))
        .route("/api/connections/accept/:user_id", post(accept_connection))
        .route("/api/connections/reject/:user_id", post(reject_connection))
        // Users
        .route("/api/users/profile", get(get_profile))
        .route("/api/users/profile", put(update_profile))
        .route("/api/users/search", get(search_users))
        .route("/api/users/connections/:user_id", delete(remove_connection))
        .route("/api/users/network", get(network))
        // Admin
        .route("/api/admin/login", post(admin_login))
        .route("/api/admin/me", get(admin_me))
        .route("/api/admin/users", get(admin_list_users))
        .route("/api/admin/users", post(admin_create_user))
        .route("/api/admin/users/:id", put(admin_update_user))
        .route("/api/admin/users/:id", delete(admin_delete_user))
        // Queries
        .route("/api/queries/submit", post(submit_query))
        .route("/api/queries/admin-queries", get(admin_queries))
        .route("/api/queries", get(list_queries))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn allowed_origins(origins: &[String]) -> AllowOrigin {
    if origins.is_empty() {
        return AllowOrigin::from(Any);
    }
    let values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(values)
}

// --- Payloads ---

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.into(),
    })
}

/// Token plus the account it was issued for.
#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user: Account,
}

/// An account together with its profile.
#[derive(Debug, Serialize)]
struct AccountDetail {
    #[serde(flatten)]
    account: Account,
    profile: Profile,
}

/// Account looked up by email, with direct connections resolved.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileView {
    #[serde(flatten)]
    summary: AccountSummary,
    bio: String,
    connections: Vec<AccountSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<Profile>,
}

#[derive(Debug, Default, Deserialize)]
struct RegisterRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    image: Option<String>,
    bio: Option<String>,
    #[serde(flatten)]
    profile: Profile,
}

#[derive(Debug, Deserialize)]
struct AdminCreateRequest {
    #[serde(flatten)]
    user: RegisterRequest,
    role: Option<Role>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateProfileRequest {
    name: Option<String>,
    bio: Option<String>,
    image: Option<String>,
    #[serde(flatten)]
    profile: Profile,
}

#[derive(Debug, Deserialize)]
struct AdminUpdateRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    bio: Option<String>,
    image: Option<String>,
    role: Option<Role>,
    #[serde(flatten)]
    profile: Profile,
}

#[derive(Debug, Deserialize)]
struct EmailParams {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitQueryRequest {
    name: Option<String>,
    email: Option<String>,
    subject: Option<String>,
    message: Option<String>,
}

// --- Validation ---

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim and lowercase an email, rejecting anything not shaped `local@domain.tld`.
fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(Error::InvalidInput("Please provide a valid email".into()))
    }
}

fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Images are inline data URLs; blank means the default avatar.
fn check_image(image: Option<String>) -> Result<Option<String>> {
    match required(image) {
        Some(image) if image.starts_with("data:image/") => Ok(Some(image)),
        Some(_) => Err(Error::InvalidInput("Invalid image format".into())),
        None => Ok(None),
    }
}

// --- Shared helpers ---

fn load_account(state: &AppState, id: &AccountId) -> Result<Account> {
    state
        .storage
        .get_account(id)?
        .ok_or_else(|| GraphError::NotFound(format!("account {id}")).into())
}

fn detail(state: &AppState, account: Account) -> Result<AccountDetail> {
    let profile = state.storage.get_profile(&account.id)?;
    Ok(AccountDetail { account, profile })
}

fn create_account(state: &AppState, req: RegisterRequest, role: Role) -> Result<Account> {
    let (name, email, password) = match (
        required(req.name),
        required(req.email),
        req.password.filter(|p| !p.is_empty()),
    ) {
        (Some(name), Some(email), Some(password)) => (name, email, password),
        _ => {
            return Err(Error::InvalidInput(
                "Please provide name, email and password".into(),
            ))
        }
    };
    let email = normalize_email(&email)?;
    check_password(&password)?;
    let image = check_image(req.image)?;

    let id = AccountId::new(generate_id(&email));
    let mut account = Account::new(id, name, email, now_millis());
    account.image = image.unwrap_or_else(|| DEFAULT_IMAGE.to_string());
    account.bio = req.bio.unwrap_or_default();
    account.role = role;

    let password_hash = hash_password(&password)?;
    if !state
        .storage
        .create_account(&account, &password_hash, &req.profile)?
    {
        return Err(GraphError::Conflict("User already exists".into()).into());
    }

    tracing::info!(account = %account.id, role = %account.role, "account created");
    Ok(account)
}

fn authenticate(state: &AppState, req: LoginRequest) -> Result<Account> {
    let invalid = || Error::InvalidInput("Invalid credentials".into());

    let (email, password) = match (required(req.email), req.password) {
        (Some(email), Some(password)) => (email.to_lowercase(), password),
        _ => return Err(Error::InvalidInput("Please provide email and password".into())),
    };

    let account = state
        .storage
        .get_account_by_email(&email)?
        .ok_or_else(invalid)?;
    let stored = state.storage.get_credential(&account.id)?.ok_or_else(invalid)?;
    if !verify_password(&password, &stored) {
        return Err(invalid());
    }
    Ok(account)
}

fn connections(state: &AppState) -> ConnectionService<crate::Storage> {
    ConnectionService::new(Arc::clone(&state.storage))
}

// --- Health ---

async fn health() -> &'static str {
    "OK"
}

// --- Auth endpoints ---

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let account = create_account(&state, req, Role::User)?;
    let token = state.tokens.issue(&account)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: account,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let account = authenticate(&state, req)?;
    let token = state.tokens.issue(&account)?;
    tracing::debug!(account = %account.id, "login");
    Ok(Json(AuthResponse {
        token,
        user: account,
    }))
}

/// Tokens are stateless; the client discards its copy.
async fn logout() -> Json<MessageResponse> {
    message("Logged out successfully")
}

async fn me(State(state): State<AppState>, caller: AuthUser) -> Result<Json<AccountDetail>> {
    let account = load_account(&state, &caller.id)?;
    Ok(Json(detail(&state, account)?))
}

// --- Connection endpoints ---

async fn list_connections(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<ConnectionList>> {
    Ok(Json(connections(&state).list_connections(&caller.id)?))
}

async fn request_connection(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    connections(&state).request_connection(&caller.id, &AccountId::from(user_id))?;
    Ok(message("Connection request sent"))
}

async fn accept_connection(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    connections(&state).accept_connection(&caller.id, &AccountId::from(user_id))?;
    Ok(message("Connection accepted"))
}

async fn reject_connection(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    connections(&state).reject_connection(&caller.id, &AccountId::from(user_id))?;
    Ok(message("Connection rejected"))
}

// --- User endpoints ---

async fn get_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(params): Query<EmailParams>,
) -> Result<Json<ProfileView>> {
    let email = required(params.email)
        .ok_or_else(|| Error::InvalidInput("email query parameter is required".into()))?
        .to_lowercase();
    let account = state
        .storage
        .get_account_by_email(&email)?
        .ok_or_else(|| Error::from(GraphError::NotFound("User not found".into())))?;

    let connections = resolve_summaries(state.storage.as_ref(), &account.connections)?;
    let profile = if caller.id == account.id || state.storage.is_admin(&caller.id)? {
        Some(state.storage.get_profile(&account.id)?)
    } else {
        None
    };

    Ok(Json(ProfileView {
        summary: account.summary(),
        bio: account.bio,
        connections,
        profile,
    }))
}

async fn update_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<AccountDetail>> {
    let mut account = load_account(&state, &caller.id)?;
    if let Some(name) = required(req.name) {
        account.name = name;
    }
    if let Some(bio) = req.bio {
        account.bio = bio;
    }
    if let Some(image) = check_image(req.image)? {
        account.image = image;
    }
    state.storage.put_account(&account)?;

    let mut profile = state.storage.get_profile(&account.id)?;
    profile.merge(req.profile);
    state.storage.put_profile(&account.id, &profile)?;

    Ok(Json(AccountDetail { account, profile }))
}

async fn search_users(
    State(state): State<AppState>,
    _caller: AuthUser,
    Query(params): Query<EmailParams>,
) -> Result<Json<Vec<AccountSummary>>> {
    let fragment = required(params.email)
        .ok_or_else(|| Error::InvalidInput("email query parameter is required".into()))?;
    let found = state.storage.search_accounts_by_email(&fragment)?;
    if found.is_empty() {
        return Err(GraphError::NotFound("No users found".into()).into());
    }
    Ok(Json(found.iter().map(Account::summary).collect()))
}

async fn remove_connection(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    connections(&state).disconnect(&caller.id, &AccountId::from(user_id))?;
    Ok(message("Connection removed"))
}

async fn network(State(state): State<AppState>, caller: AuthUser) -> Result<Json<NetworkView>> {
    let service = NetworkService::new(Arc::clone(&state.storage));
    Ok(Json(service.compute_network(&caller.id)?))
}

// --- Admin endpoints ---

async fn admin_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let account = authenticate(&state, req)?;
    if !account.is_admin() {
        return Err(Error::Forbidden("admin access only".into()));
    }
    let token = state.tokens.issue(&account)?;
    tracing::info!(account = %account.id, "admin login");
    Ok(Json(AuthResponse {
        token,
        user: account,
    }))
}

async fn admin_me(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<AccountDetail>> {
    Ok(Json(detail(&state, admin)?))
}

async fn admin_list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<AccountDetail>>> {
    let accounts = state.storage.list_accounts()?;
    let details = accounts
        .into_iter()
        .map(|account| detail(&state, account))
        .collect::<Result<Vec<_>>>()?;
    Ok(Json(details))
}

async fn admin_create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<AdminCreateRequest>,
) -> Result<(StatusCode, Json<AccountDetail>)> {
    let account = create_account(&state, req.user, req.role.unwrap_or_default())?;
    tracing::info!(admin = %admin.id, account = %account.id, "account created by admin");
    Ok((StatusCode::CREATED, Json(detail(&state, account)?)))
}

async fn admin_update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<AdminUpdateRequest>,
) -> Result<Json<AccountDetail>> {
    let mut account = load_account(&state, &AccountId::from(id))?;

    if let Some(name) = required(req.name) {
        account.name = name;
    }
    if let Some(email) = required(req.email) {
        account.email = normalize_email(&email)?;
    }
    if let Some(bio) = req.bio {
        account.bio = bio;
    }
    if let Some(image) = check_image(req.image)? {
        account.image = image;
    }
    if let Some(role) = req.role {
        account.role = role;
    }
    let password_hash = match req.password.filter(|p| !p.is_empty()) {
        Some(password) => {
            check_password(&password)?;
            Some(hash_password(&password)?)
        }
        None => None,
    };
    state
        .storage
        .update_account(&account, password_hash.as_deref())?;

    let mut profile = state.storage.get_profile(&account.id)?;
    profile.merge(req.profile);
    state.storage.put_profile(&account.id, &profile)?;

    tracing::info!(admin = %admin.id, account = %account.id, "account updated by admin");
    Ok(Json(AccountDetail { account, profile }))
}

async fn admin_delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let id = AccountId::from(id);
    if !state.storage.delete_account(&id)? {
        return Err(GraphError::NotFound(format!("account {id}")).into());
    }
    tracing::info!(admin = %admin.id, account = %id, "account deleted by admin");
    Ok(message("User deleted"))
}

// --- Query endpoints ---

async fn submit_query(
    State(state): State<AppState>,
    Json(req): Json<SubmitQueryRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let (name, email, body) = match (required(req.name), required(req.email), required(req.message))
    {
        (Some(name), Some(email), Some(body)) => (name, email, body),
        _ => {
            return Err(Error::InvalidInput(
                "Please provide name, email and message".into(),
            ))
        }
    };
    let email = normalize_email(&email)?;

    let query = models::Query::new(name, email, req.subject.unwrap_or_default(), body);
    let admins = state.storage.submit_query(&query)?;
    tracing::info!(query = %query.id, admins, "query submitted");

    Ok((StatusCode::CREATED, message("Query submitted successfully")))
}

async fn admin_queries(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<Vec<models::Query>>> {
    Ok(Json(state.storage.inbox_queries(&admin.id)?))
}

async fn list_queries(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<models::Query>>> {
    Ok(Json(state.storage.list_queries()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeConfig, NodeState};
    use crate::Storage;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        _dir: TempDir,
        state: AppState,
        router: Router,
    }

    impl TestApp {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let storage = Arc::new(Storage::open(dir.path().join("db")).unwrap());
            let state =
                Arc::new(NodeState::new(storage, NodeConfig::with_data_dir(dir.path())).unwrap());
            let router = build_router(Arc::clone(&state));
            Self {
                _dir: dir,
                state,
                router,
            }
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }

        /// Register an account and return `(id, token)`.
        async fn register(&self, name: &str) -> (String, String) {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/api/auth/register",
                    None,
                    Some(json!({
                        "name": name,
                        "email": format!("{name}@example.com"),
                        "password": "secret1",
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            (
                body["user"]["id"].as_str().unwrap().to_string(),
                body["token"].as_str().unwrap().to_string(),
            )
        }

        /// Register an account and give it the admin role.
        async fn register_admin(&self, name: &str) -> (String, String) {
            let registered = self.register(name).await;
            self.state
                .storage
                .set_role_by_email(&format!("{name}@example.com"), Role::Admin)
                .unwrap();
            registered
        }
    }

    fn ids(list: &Value) -> Vec<&str> {
        list.as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn health_is_open() {
        let app = TestApp::new();
        let (status, _) = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn register_validates_input() {
        let app = TestApp::new();
        let cases = [
            json!({"email": "a@example.com", "password": "secret1"}),
            json!({"name": "A", "email": "not-an-email", "password": "secret1"}),
            json!({"name": "A", "email": "a@example.com", "password": "short"}),
            json!({"name": "A", "email": "a@example.com", "password": "secret1", "image": "http://x/y.png"}),
        ];
        for body in cases {
            let (status, response) = app
                .send(Method::POST, "/api/auth/register", None, Some(body))
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(response["kind"], "invalid_input");
        }
    }

    #[tokio::test]
    async fn register_normalizes_email_and_rejects_duplicates() {
        let app = TestApp::new();
        let body = json!({"name": "Ada", "email": "  Ada@Example.COM ", "password": "secret1"});
        let (status, response) = app
            .send(Method::POST, "/api/auth/register", None, Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response["user"]["email"], "ada@example.com");
        assert_eq!(response["user"]["image"], DEFAULT_IMAGE);
        assert!(response["user"].get("password").is_none());

        let (status, response) = app
            .send(Method::POST, "/api/auth/register", None, Some(body))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(response["kind"], "conflict");
    }

    #[tokio::test]
    async fn login_checks_password() {
        let app = TestApp::new();
        app.register("ada").await;

        let (status, response) = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "ADA@example.com", "password": "wrong-one"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["message"], "Invalid input: Invalid credentials");

        let (status, response) = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "ada@example.com", "password": "secret1"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = response["token"].as_str().unwrap();

        let (status, me) = app.send(Method::GET, "/api/auth/me", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "ada@example.com");
        assert!(me["profile"].is_object());
    }

    #[tokio::test]
    async fn protected_routes_need_valid_token() {
        let app = TestApp::new();
        let (status, _) = app.send(Method::GET, "/api/connections", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .send(Method::GET, "/api/users/network", Some("00.00"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "unauthorized");
    }

    #[tokio::test]
    async fn connection_lifecycle_over_http() {
        let app = TestApp::new();
        let (a, a_token) = app.register("a").await;
        let (b, b_token) = app.register("b").await;
        let (c, c_token) = app.register("c").await;

        // a -> b, b -> c, both accepted
        for (requester_token, target, target_token, requester) in [
            (&a_token, &b, &b_token, &a),
            (&b_token, &c, &c_token, &b),
        ] {
            let (status, _) = app
                .send(
                    Method::POST,
                    &format!("/api/connections/request/{target}"),
                    Some(requester_token),
                    None,
                )
                .await;
            assert_eq!(status, StatusCode::OK);

            let (_, list) = app
                .send(Method::GET, "/api/connections", Some(target_token), None)
                .await;
            assert_eq!(ids(&list["pendingConnections"]), vec![requester.as_str()]);

            let (status, _) = app
                .send(
                    Method::POST,
                    &format!("/api/connections/accept/{requester}"),
                    Some(target_token),
                    None,
                )
                .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, view) = app
            .send(Method::GET, "/api/users/network", Some(&a_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&view["directConnections"]), vec![b.as_str()]);
        assert_eq!(view["networkSize"], 2);
        let mut expected = vec![b.as_str(), c.as_str()];
        expected.sort();
        assert_eq!(ids(&view["network"]), expected);

        // The accepter's adjacency is untouched
        let (_, view) = app
            .send(Method::GET, "/api/users/network", Some(&c_token), None)
            .await;
        assert_eq!(view["networkSize"], 0);

        // Accepted connections are listed for both parties
        let (_, list) = app
            .send(Method::GET, "/api/connections", Some(&b_token), None)
            .await;
        let mut accepted = ids(&list["connections"]);
        accepted.sort();
        let mut expected = vec![a.as_str(), c.as_str()];
        expected.sort();
        assert_eq!(accepted, expected);
    }

    #[tokio::test]
    async fn request_errors_map_to_statuses() {
        let app = TestApp::new();
        let (a, a_token) = app.register("a").await;
        let (b, b_token) = app.register("b").await;

        let (status, body) = app
            .send(Method::POST, "/api/connections/request/nobody", Some(&a_token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");

        let (status, _) = app
            .send(
                Method::POST,
                &format!("/api/connections/request/{a}"),
                Some(&a_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        app.send(
            Method::POST,
            &format!("/api/connections/request/{b}"),
            Some(&a_token),
            None,
        )
        .await;
        let (status, _) = app
            .send(
                Method::POST,
                &format!("/api/connections/request/{a}"),
                Some(&b_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Only the receiver can accept
        let (status, _) = app
            .send(
                Method::POST,
                &format!("/api/connections/accept/{b}"),
                Some(&a_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .send(
                Method::POST,
                &format!("/api/connections/reject/{a}"),
                Some(&b_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .send(
                Method::POST,
                &format!("/api/connections/request/{b}"),
                Some(&a_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn disconnect_removes_both_directions() {
        let app = TestApp::new();
        let (a, a_token) = app.register("a").await;
        let (b, b_token) = app.register("b").await;
        app.send(
            Method::POST,
            &format!("/api/connections/request/{b}"),
            Some(&a_token),
            None,
        )
        .await;
        app.send(
            Method::POST,
            &format!("/api/connections/accept/{a}"),
            Some(&b_token),
            None,
        )
        .await;

        let (status, _) = app
            .send(
                Method::DELETE,
                &format!("/api/users/connections/{b}"),
                Some(&a_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, view) = app
            .send(Method::GET, "/api/users/network", Some(&a_token), None)
            .await;
        assert_eq!(view["networkSize"], 0);

        let request = app
            .state
            .storage
            .get_request(&AccountId::from(a), &AccountId::from(b))
            .unwrap();
        assert!(request.is_some());
    }

    #[tokio::test]
    async fn profile_and_search() {
        let app = TestApp::new();
        let (_, a_token) = app.register("ada").await;
        let (_, b_token) = app.register("bob").await;

        let (status, updated) = app
            .send(
                Method::PUT,
                "/api/users/profile",
                Some(&a_token),
                Some(json!({"bio": "hello", "district": "North"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["bio"], "hello");
        assert_eq!(updated["profile"]["district"], "North");

        let (status, own) = app
            .send(
                Method::GET,
                "/api/users/profile?email=ada@example.com",
                Some(&a_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(own["profile"]["district"], "North");

        let (_, other) = app
            .send(
                Method::GET,
                "/api/users/profile?email=ada@example.com",
                Some(&b_token),
                None,
            )
            .await;
        assert_eq!(other["bio"], "hello");
        assert!(other.get("profile").is_none());

        let (status, found) = app
            .send(Method::GET, "/api/users/search?email=ADA", Some(&b_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found.as_array().unwrap().len(), 1);

        let (status, _) = app
            .send(Method::GET, "/api/users/search?email=zzz", Some(&b_token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_routes_require_admin_role() {
        let app = TestApp::new();
        let (_, user_token) = app.register("user").await;

        let (status, body) = app
            .send(Method::GET, "/api/admin/users", Some(&user_token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "forbidden");

        let (status, _) = app
            .send(
                Method::POST,
                "/api/admin/login",
                None,
                Some(json!({"email": "user@example.com", "password": "secret1"})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .send(Method::GET, "/api/queries", Some(&user_token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_me_returns_caller() {
        let app = TestApp::new();
        let (admin_id, admin_token) = app.register_admin("root").await;
        let (_, user_token) = app.register("user").await;

        let (status, me) = app
            .send(Method::GET, "/api/admin/me", Some(&admin_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["id"], admin_id.as_str());
        assert_eq!(me["role"], "admin");
        assert!(me["profile"].is_object());

        let (status, _) = app
            .send(Method::GET, "/api/admin/me", Some(&user_token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn failed_admin_update_keeps_old_password() {
        let app = TestApp::new();
        let (_, admin_token) = app.register_admin("root").await;
        let (victim, _) = app.register("victim").await;

        let (status, body) = app
            .send(
                Method::PUT,
                &format!("/api/admin/users/{victim}"),
                Some(&admin_token),
                Some(json!({"email": "root@example.com", "password": "newpass"})),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "conflict");

        let login = |password: &'static str| {
            app.send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "victim@example.com", "password": password})),
            )
        };
        assert_eq!(login("newpass").await.0, StatusCode::BAD_REQUEST);
        assert_eq!(login("secret1").await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_manages_users() {
        let app = TestApp::new();
        let (_, admin_token) = app.register_admin("root").await;

        let (status, created) = app
            .send(
                Method::POST,
                "/api/admin/users",
                Some(&admin_token),
                Some(json!({
                    "name": "Eve",
                    "email": "eve@example.com",
                    "password": "secret1",
                    "role": "admin",
                    "panNo": "ABCDE1234F",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        assert_eq!(created["role"], "admin");
        assert_eq!(created["profile"]["panNo"], "ABCDE1234F");
        let eve = created["id"].as_str().unwrap().to_string();

        let (status, updated) = app
            .send(
                Method::PUT,
                &format!("/api/admin/users/{eve}"),
                Some(&admin_token),
                Some(json!({"role": "user", "name": "Eve B", "password": "newsecret"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["role"], "user");
        assert_eq!(updated["name"], "Eve B");

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "eve@example.com", "password": "newsecret"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, users) = app
            .send(Method::GET, "/api/admin/users", Some(&admin_token), None)
            .await;
        assert_eq!(users.as_array().unwrap().len(), 2);

        let (status, _) = app
            .send(
                Method::DELETE,
                &format!("/api/admin/users/{eve}"),
                Some(&admin_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .send(
                Method::DELETE,
                &format!("/api/admin/users/{eve}"),
                Some(&admin_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn demoted_admin_loses_access_with_old_token() {
        let app = TestApp::new();
        let (_, token) = app.register_admin("root").await;
        app.state
            .storage
            .set_role_by_email("root@example.com", Role::User)
            .unwrap();

        let (status, _) = app
            .send(Method::GET, "/api/admin/users", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn queries_reach_admin_inboxes() {
        let app = TestApp::new();
        let (_, admin_token) = app.register_admin("root").await;

        let (status, _) = app
            .send(
                Method::POST,
                "/api/queries/submit",
                None,
                Some(json!({
                    "name": "Visitor",
                    "email": "visitor@example.com",
                    "subject": "Hi",
                    "message": "Question",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = app
            .send(
                Method::POST,
                "/api/queries/submit",
                None,
                Some(json!({"name": "Visitor", "email": "visitor@example.com"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, inbox) = app
            .send(
                Method::GET,
                "/api/queries/admin-queries",
                Some(&admin_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(inbox.as_array().unwrap().len(), 1);
        assert_eq!(inbox[0]["subject"], "Hi");

        let (_, all) = app
            .send(Method::GET, "/api/queries", Some(&admin_token), None)
            .await;
        assert_eq!(all.as_array().unwrap().len(), 1);
    }

    #[test]
    fn email_shape() {
        assert_eq!(normalize_email(" A@B.io ").unwrap(), "a@b.io");
        for bad in ["", "ab", "a@b", "@b.io", "a@.io", "a@b.", "a b@c.io", "a@b@c.io"] {
            assert!(normalize_email(bad).is_err(), "{bad}");
        }
    }
}
