//! HTTP handlers under `/oauth2`.
//!
//! Codes are only ever delivered by redirect. Token responses carry
//! `Cache-Control: no-store`. `/verify` returns the user and their permissions
//! on active collections, and `/.well-known/oauth-authorization-server` the
//! RFC 8414 document.

use crate::error::AuthError;
use crate::oauth2::tokens::{PKCE_METHOD_S256, resolve_pkce, resolve_redirect_uri, resolve_scopes};
use crate::oauth2::{OAUTH2_TAG, SpaceList, state::OAuth2State};
use crate::entity::oauth2_token;
use axum::{
    Form, Json,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use time::OffsetDateTime;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(authorize))
        .routes(routes!(token))
        .routes(routes!(revoke))
        .routes(routes!(verify))
        .routes(routes!(metadata))
        .with_state(state)
}

/// OAuth2 authorization request, submitted together with the user's credentials.
#[derive(Deserialize, ToSchema)]
pub struct AuthorizeRequest {
    /// Only "code"
    pub response_type: String,
    pub client_id: String,
    /// Redirect URI (must match a registered URI; defaults to the first one)
    pub redirect_uri: Option<String>,
    /// Subset of the client's default scopes; all of them when absent
    pub scope: Option<String>,
    /// Echoed back on the redirect
    pub state: Option<String>,
    /// PKCE code challenge (base64url-encoded SHA-256 of the verifier)
    pub code_challenge: Option<String>,
    /// PKCE method; only "S256" is accepted
    pub code_challenge_method: Option<String>,
    pub email: String,
    #[schema(format = Password)]
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub code_verifier: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub scope: String,
}

impl TokenResponse {
    fn from_token(token: oauth2_token::Model, now: OffsetDateTime) -> Self {
        Self {
            expires_in: token.expires_in(now),
            scope: token.scope_list().encode(),
            access_token: token.access_token,
            token_type: token.token_type,
            refresh_token: token.refresh_token,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RevokeRequest {
    pub token: String,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifiedPermission {
    /// Collection sigel
    pub code: String,
    pub friendly_name: String,
    pub registrant: bool,
    pub cataloger: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifiedUser {
    pub email: String,
    pub full_name: String,
    /// Permissions on active collections, ordered by collection code
    pub permissions: Vec<VerifiedPermission>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub expires_at: OffsetDateTime,
    pub scope: String,
    pub user: VerifiedUser,
}

/// Authorization server metadata (RFC 8414).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub revocation_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
}

/// Remote address of the caller.
///
/// Taken from the connection when available, otherwise from the
/// `X-Forwarded-For` / `X-Real-IP` headers.
pub struct ClientAddr(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(ClientAddr(addr.ip().to_string()));
        }
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| {
                parts
                    .headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(str::trim)
            });
        Ok(ClientAddr(forwarded.unwrap_or("unknown").to_string()))
    }
}

/// Authenticates the resource owner with email and password, then redirects
/// back to the client with a single-use authorization code.
#[tracing::instrument(skip(state, params), fields(client_id = %params.client_id))]
#[utoipa::path(
    post,
    path = "/authorize",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Authorize",
    summary = "Log in and obtain an authorization code",
    description = "Runs the Authorization Code flow in one step: the resource owner's `email` and \
                   `password` are checked (subject to the failed-login throttle) and the user agent is \
                   redirected to the client's `redirect_uri` with `code` and `state`.\n\n\
                   Unknown clients and unregistered redirect URIs are answered with a JSON error and \
                   never redirected. Later failures are reported on the redirect as `error` and \
                   `error_description`.\n\n\
                   **PKCE:** Public clients must send `code_challenge` with `code_challenge_method=S256`.",
    request_body(
        content = AuthorizeRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Authorization request and user credentials"
    ),
    responses(
        (status = 303, description = "Redirect back to the client with a code or an error"),
        (status = 400, description = "Unregistered redirect_uri", body = ErrorResponse),
        (status = 401, description = "Unknown client", body = ErrorResponse),
    )
)]
pub async fn authorize(
    State(state): State<OAuth2State>,
    ClientAddr(remote_addr): ClientAddr,
    Form(params): Form<AuthorizeRequest>,
) -> Response {
    // Until the redirect URI is validated, errors must not be redirected.
    let client = match state.tokens.find_client(&params.client_id).await {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };
    let redirect_uri = match resolve_redirect_uri(&client, params.redirect_uri.as_deref()) {
        Ok(uri) => uri,
        Err(e) => {
            return json_error(StatusCode::BAD_REQUEST, "invalid_request", Some(&e.to_string()));
        }
    };
    let client_state = params.state.as_deref();

    if params.response_type != "code" {
        return redirect_error(
            &redirect_uri,
            client_state,
            "unsupported_response_type",
            Some("Only 'code' response type is supported"),
        );
    }

    let requested = params.scope.as_deref().map(SpaceList::decode);
    let scopes = match resolve_scopes(&client, requested.as_ref()) {
        Ok(s) => s,
        Err(e) => return auth_error_redirect(&redirect_uri, client_state, &e),
    };
    let pkce = match resolve_pkce(
        &client,
        params.code_challenge.as_deref(),
        params.code_challenge_method.as_deref(),
    ) {
        Ok(p) => p,
        Err(e) => return auth_error_redirect(&redirect_uri, client_state, &e),
    };

    let user = match state
        .authenticator
        .login(&params.email, &params.password, &remote_addr)
        .await
    {
        Ok(u) => u,
        Err(e) => return auth_error_redirect(&redirect_uri, client_state, &e),
    };

    let grant = match state
        .tokens
        .issue_grant(&client, &user, redirect_uri.clone(), scopes, pkce)
        .await
    {
        Ok(g) => g,
        Err(e) => return auth_error_redirect(&redirect_uri, client_state, &e),
    };

    match url::Url::parse(&redirect_uri) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("code", &grant.code);
            if let Some(s) = client_state {
                url.query_pairs_mut().append_pair("state", s);
            }
            Redirect::to(url.as_str()).into_response()
        }
        Err(e) => {
            tracing::error!("Registered redirect URI does not parse: {}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", None)
        }
    }
}

/// Code exchange and refresh.
#[tracing::instrument(skip(state, headers, params), fields(grant_type = %params.grant_type))]
#[utoipa::path(
    post,
    path = "/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token",
    summary = "Issue a token pair",
    description = "Exchanges an authorization code for tokens, or rotates an existing token pair.\n\n\
                   Grant types:\n\
                   - `authorization_code`: Exchange an authorization code for access and refresh tokens. \
                   The code is consumed even when the exchange is refused.\n\
                   - `refresh_token`: Use a refresh token to obtain a new pair; the old pair stops working\n\n\
                   Clients authenticate with HTTP Basic or with `client_id`/`client_secret` in the body; \
                   public clients send only `client_id` and prove the code with `code_verifier`.",
    request_body(
        content = TokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Grant to redeem"
    ),
    responses(
        (status = 200, description = "Tokens issued successfully", body = TokenResponse),
        (status = 400, description = "Invalid request (missing parameters, invalid code, PKCE mismatch)", body = ErrorResponse),
        (status = 401, description = "Invalid client credentials or unknown client", body = ErrorResponse),
    )
)]
pub async fn token(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Form(params): Form<TokenRequest>,
) -> Response {
    let Some(credentials) = client_credentials(
        &headers,
        params.client_id.as_deref(),
        params.client_secret.as_deref(),
    ) else {
        return json_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            Some("client_id is required"),
        );
    };

    let client = match state
        .tokens
        .authenticate_client(&credentials.id, credentials.secret.as_deref())
        .await
    {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    let result = match params.grant_type.as_str() {
        "authorization_code" => {
            let Some(code) = params.code.as_deref() else {
                return json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_request",
                    Some("code is required"),
                );
            };
            state
                .tokens
                .exchange_code(
                    &client,
                    code,
                    params.redirect_uri.as_deref(),
                    params.code_verifier.as_deref(),
                )
                .await
        }
        "refresh_token" => {
            let Some(refresh_token) = params.refresh_token.as_deref() else {
                return json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_request",
                    Some("refresh_token is required"),
                );
            };
            let scope = params.scope.as_deref().map(SpaceList::decode);
            state
                .tokens
                .refresh(&client, refresh_token, scope.as_ref())
                .await
        }
        _ => {
            return json_error(StatusCode::BAD_REQUEST, "unsupported_grant_type", None);
        }
    };

    match result {
        Ok(token) => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "no-store")],
            Json(TokenResponse::from_token(token, OffsetDateTime::now_utc())),
        )
            .into_response(),
        // A refresh token nobody holds is an invalid grant on the wire.
        Err(AuthError::TokenNotFound) => json_error(
            StatusCode::BAD_REQUEST,
            "invalid_grant",
            Some("Refresh token not found"),
        ),
        Err(e) => error_response(&e),
    }
}

/// RFC 7009 revocation. Either token of a pair removes both;
/// `token_type_hint` is accepted and ignored.
#[tracing::instrument(skip(state, headers, params))]
#[utoipa::path(
    post,
    path = "/revoke",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Revoke Token",
    summary = "Revoke a token pair",
    description = "Answers 200 for unknown or already revoked tokens. Only the authenticated \
                   client's tokens are matched, and either token of a pair removes both.",
    request_body(
        content = RevokeRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token to revoke"
    ),
    responses(
        (status = 200, description = "Token revoked successfully (or was already invalid)"),
        (status = 401, description = "Invalid client credentials", body = ErrorResponse),
    )
)]
pub async fn revoke(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Form(params): Form<RevokeRequest>,
) -> Response {
    let Some(credentials) = client_credentials(
        &headers,
        params.client_id.as_deref(),
        params.client_secret.as_deref(),
    ) else {
        return error_response(&AuthError::InvalidClient);
    };

    let client = match state
        .tokens
        .authenticate_client(&credentials.id, credentials.secret.as_deref())
        .await
    {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    // RFC 7009: the response is the same whatever happened to the token
    if let Err(e) = state.tokens.revoke(&client, &params.token).await {
        tracing::error!(error = %e, client_id = %client.id, "Token revocation failed");
    }

    StatusCode::OK.into_response()
}

/// Token verification endpoint.
#[tracing::instrument(skip(state, headers))]
#[utoipa::path(
    get,
    path = "/verify",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Verify Token",
    summary = "Resolve a bearer token to its user and permissions",
    description = "Returns the token's expiry and scope together with the user's email, full name and \
                   permissions. Permissions on inactive collections are left out.\n\n\
                   Send the access token as `Authorization: Bearer <token>`.",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Missing, unknown or expired access token", body = ErrorResponse),
    )
)]
pub async fn verify(State(state): State<OAuth2State>, headers: HeaderMap) -> Response {
    let access_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(access_token) = access_token else {
        return json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_token",
            Some("Missing or invalid Authorization header"),
        );
    };

    let principal = match state.tokens.verify(access_token.trim()).await {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };

    let permissions = principal
        .permissions
        .into_iter()
        .map(|entry| VerifiedPermission {
            code: entry.collection.code,
            friendly_name: entry.collection.friendly_name,
            registrant: entry.permission.registrant,
            cataloger: entry.permission.cataloger,
        })
        .collect();

    Json(VerifyResponse {
        expires_at: principal.token.expires_at,
        scope: principal.token.scope_list().encode(),
        user: VerifiedUser {
            email: principal.user.email,
            full_name: principal.user.full_name,
            permissions,
        },
    })
    .into_response()
}

/// Authorization server metadata document.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/.well-known/oauth-authorization-server",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Server Metadata",
    summary = "Authorization server metadata",
    description = "Returns the RFC 8414 metadata document: endpoint URLs, supported grant and \
                   response types, client authentication methods and PKCE methods.",
    responses(
        (status = 200, description = "Metadata document", body = AuthorizationServerMetadata),
    )
)]
pub async fn metadata(State(state): State<OAuth2State>) -> Json<AuthorizationServerMetadata> {
    let issuer = state.issuer_url.trim_end_matches('/');
    Json(AuthorizationServerMetadata {
        issuer: issuer.to_string(),
        authorization_endpoint: format!("{issuer}/oauth2/authorize"),
        token_endpoint: format!("{issuer}/oauth2/token"),
        revocation_endpoint: format!("{issuer}/oauth2/revoke"),
        response_types_supported: vec!["code".to_string()],
        grant_types_supported: vec![
            "authorization_code".to_string(),
            "refresh_token".to_string(),
        ],
        token_endpoint_auth_methods_supported: vec![
            "client_secret_basic".to_string(),
            "client_secret_post".to_string(),
            "none".to_string(),
        ],
        code_challenge_methods_supported: vec![PKCE_METHOD_S256.to_string()],
    })
}

struct ClientCredentials {
    id: String,
    secret: Option<String>,
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    use base64::Engine;
    let encoded = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

/// Client id and secret from HTTP Basic, else from the form body.
fn client_credentials(
    headers: &HeaderMap,
    form_id: Option<&str>,
    form_secret: Option<&str>,
) -> Option<ClientCredentials> {
    if let Some((id, secret)) = basic_credentials(headers) {
        return Some(ClientCredentials {
            id,
            secret: Some(secret),
        });
    }
    form_id.map(|id| ClientCredentials {
        id: id.to_string(),
        secret: form_secret.map(String::from),
    })
}

fn json_error(status: StatusCode, code: &str, description: Option<&str>) -> Response {
    let body = ErrorResponse {
        error: code.to_string(),
        error_description: description.map(String::from),
    };
    (status, Json(body)).into_response()
}

/// JSON error for an `AuthError`.
///
/// Errors RFC 6749 classes as bad requests use 400 on the wire;
/// everything else keeps the status of its category.
fn error_response(err: &AuthError) -> Response {
    let code = err.oauth2_error_code();
    if err.is_fatal() {
        tracing::error!("Request failed: {}", err);
        return json_error(err.status_code(), code, None);
    }
    let status = match code {
        "invalid_grant" | "invalid_scope" | "invalid_request" => StatusCode::BAD_REQUEST,
        _ => err.status_code(),
    };
    json_error(status, code, Some(&err.to_string()))
}

fn auth_error_redirect(redirect_uri: &str, state: Option<&str>, err: &AuthError) -> Response {
    if err.is_fatal() {
        tracing::error!("Authorization failed: {}", err);
        return redirect_error(redirect_uri, state, err.oauth2_error_code(), None);
    }
    let description = err.to_string();
    redirect_error(
        redirect_uri,
        state,
        err.oauth2_error_code(),
        Some(&description),
    )
}

fn redirect_error(
    redirect_uri: &str,
    state: Option<&str>,
    code: &str,
    description: Option<&str>,
) -> Response {
    let Ok(mut target) = url::Url::parse(redirect_uri) else {
        return json_error(StatusCode::BAD_REQUEST, code, description);
    };
    {
        let mut query = target.query_pairs_mut();
        query.append_pair("error", code);
        if let Some(description) = description {
            query.append_pair("error_description", description);
        }
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    Redirect::to(target.as_str()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use base64::Engine;

    #[test]
    fn basic_auth_wins_over_form() {
        let mut headers = HeaderMap::new();
        let encoded = base64::engine::general_purpose::STANDARD.encode("abc:def");
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        let creds = client_credentials(&headers, Some("form"), Some("x")).unwrap();
        assert_eq!(creds.id, "abc");
        assert_eq!(creds.secret.as_deref(), Some("def"));
    }

    #[test]
    fn form_credentials_fallback() {
        let creds = client_credentials(&HeaderMap::new(), Some("form"), None).unwrap();
        assert_eq!(creds.id, "form");
        assert_eq!(creds.secret, None);
        assert!(client_credentials(&HeaderMap::new(), None, Some("x")).is_none());
    }

    #[test]
    fn auth_errors_map_to_oauth2_statuses() {
        let response = error_response(&AuthError::GrantExpired);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = error_response(&AuthError::InvalidClient);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let response = error_response(&AuthError::RateLimited);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn error_redirect_carries_state() {
        let response = redirect_error(
            "https://app.example/cb",
            Some("xyz"),
            "access_denied",
            Some("no"),
        );
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://app.example/cb?error=access_denied"));
        assert!(location.contains("state=xyz"));
    }
}
