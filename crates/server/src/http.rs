use std::{path::PathBuf, sync::Arc};

use api::{
    auth::{AuthConfig, SESSION_COOKIE, decode_token},
    identity::{DbRoleDirectory, Principal, resolve_principal},
    schema::{ShopSchema, expired_session_cookie},
};
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, header},
    response::Html,
    routing::get,
};
use sea_orm::DatabaseConnection;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::Instrument;

#[derive(Clone)]
pub struct AppState {
    pub schema: ShopSchema,
    pub db: Arc<DatabaseConnection>,
    pub auth: Arc<AuthConfig>,
}

/// What the request's session token resolved to.
enum Session {
    Anonymous,
    Active(Principal),
    /// Valid token, but the account no longer plays any role.
    Revoked,
}

pub fn build_router(state: AppState, cors_origins: &[String], files_root: Option<PathBuf>) -> Router {
    let header_name = HeaderName::from_static("x-request-id");
    let mut router = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/graphiql", get(graphiql))
        .route("/graphql", get(graphql_handler).post(graphql_handler));
    if let Some(root) = files_root {
        router = router.nest_service("/files", ServeDir::new(root));
    }
    router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), MakeRequestUuid))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors_layer(cors_origins)),
        )
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let layer = CorsLayer::new()
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST]);
    if allowed.is_empty() {
        layer.allow_origin(AllowOrigin::any())
    } else {
        layer
            .allow_credentials(true)
            .allow_origin(AllowOrigin::list(allowed))
    }
}

async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = req.into_inner();
    let session = authenticate(&state, &headers).await;
    if let Session::Active(principal) = &session {
        request = request.data(principal.clone());
    }
    let mut response = state.schema.execute(request).await;
    if matches!(session, Session::Revoked) {
        if let Ok(cookie) = HeaderValue::from_str(&expired_session_cookie()) {
            response.http_headers.append(header::SET_COOKIE, cookie);
        }
    }
    response.into()
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Session {
    let Some(token) = extract_token(headers) else {
        return Session::Anonymous;
    };
    let claims = match decode_token(&token, &state.auth) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::debug!(error = %err, "ignoring invalid session token");
            return Session::Anonymous;
        }
    };
    let span = tracing::info_span!("shop.session.resolve", account_id = %claims.sub);
    let directory = DbRoleDirectory::new(state.db.as_ref());
    match resolve_principal(&directory, claims.sub).instrument(span).await {
        Ok(Some(principal)) => Session::Active(principal),
        Ok(None) => {
            tracing::info!(account_id = %claims.sub, "session has no profile; signing out");
            Session::Revoked
        }
        Err(err) => {
            tracing::warn!(account_id = %claims.sub, error = %err, "role lookup failed");
            Session::Anonymous
        }
    }
}

/// Bearer header first, then the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|text| text.strip_prefix("Bearer "))
        .map(|rest| rest.trim().to_string())
        .filter(|token| !token.is_empty());
    if bearer.is_some() {
        return bearer;
    }
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|text| text.split(';'))
        .filter_map(|part| part.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|token| !token.is_empty())
}

async fn graphiql() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}
