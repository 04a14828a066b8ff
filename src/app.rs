/*
 * Responsibility
 * - tracing / panic hook setup
 * - Config -> dependencies (pool, store, event channel, pki gate) -> Router
 * - Middleware wiring and axum::serve()
 */
use std::{panic, process, sync::Arc};

use anyhow::Result;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::repos::profile_repo::{PgProfileStore, ProfileStore};
use crate::services::events::{EventPublisher, spawn_audit_subscriber};
use crate::services::pki::{IdentityResolver, PkiAuthenticator, SecureTransport};
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,pki_center=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr can be hidden depending on how the process is launched
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        preprocess_dn = config.preprocess_dn,
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    let profiles: Arc<dyn ProfileStore> = Arc::new(PgProfileStore::new(pool));

    let (events, rx) = EventPublisher::channel();
    spawn_audit_subscriber(rx);

    let resolver = IdentityResolver::new(profiles.clone(), events);
    let pki = Arc::new(PkiAuthenticator::new(resolver, config.preprocess_dn));
    let transport = SecureTransport::new(
        config.secure_proxy_header.clone(),
        config.secure_proxy_value.clone(),
    );

    Ok(AppState::new(profiles, pki, transport))
}

fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state);

    middleware::http::apply(router, config)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{HeaderName, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppEnv;
    use crate::repos::memory_profile_repo::InMemoryProfileStore;

    fn test_config() -> Config {
        Config {
            addr: "127.0.0.1:0".parse().unwrap(),
            app_env: AppEnv::Development,
            database_url: String::new(),
            database_max_connections: 1,
            preprocess_dn: true,
            secure_proxy_header: HeaderName::from_static("x-forwarded-proto"),
            secure_proxy_value: "https".to_string(),
            request_timeout: Duration::from_secs(5),
            request_body_limit_bytes: 64 * 1024,
        }
    }

    fn test_app() -> (Router, Arc<InMemoryProfileStore>) {
        let config = test_config();
        let store = Arc::new(InMemoryProfileStore::new());
        let (events, rx) = EventPublisher::channel();
        spawn_audit_subscriber(rx);

        let resolver = IdentityResolver::new(store.clone(), events);
        let pki = Arc::new(PkiAuthenticator::new(resolver, config.preprocess_dn));
        let state = AppState::new(store.clone(), pki, SecureTransport::default());

        (build_router(state, &config), store)
    }

    fn profile_request(forwarded_proto: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri("/api/v1/self/profile")
            .header("x-forwarded-proto", forwarded_proto)
            .header("x-ssl-authenticated", "SUCCESS")
            .header("x-ssl-user-dn", "/CN=Jane Doe/OU=Org")
            .header("x-ssl-issuer-dn", "/CN=CA")
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_certificate() {
        let (app, _store) = test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn verified_certificate_provisions_and_returns_profile() {
        let (app, store) = test_app();

        let response = app.oneshot(profile_request("https")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["username"], "jane_doe");
        assert_eq!(body["display_name"], "Jane Doe");
        assert_eq!(body["dn"], "OU=Org, CN=Jane Doe");
        assert_eq!(body["issuer_dn"], "CN=CA");
        assert_eq!(store.create_count().await, 1);
    }

    #[tokio::test]
    async fn repeated_requests_reuse_the_profile() {
        let (app, store) = test_app();

        let first = json_body(app.clone().oneshot(profile_request("https")).await.unwrap()).await;
        let second = json_body(app.oneshot(profile_request("https")).await.unwrap()).await;

        assert_eq!(first["id"], second["id"]);
        assert_eq!(store.create_count().await, 1);
    }

    #[tokio::test]
    async fn missing_certificate_headers_are_unauthorized() {
        let (app, _store) = test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/self/profile")
                    .header("x-forwarded-proto", "https")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn plain_http_is_unauthorized_even_with_headers() {
        let (app, store) = test_app();

        let response = app.oneshot(profile_request("http")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(store.create_count().await, 0);
    }

    #[tokio::test]
    async fn inactive_account_looks_like_anonymous() {
        let (app, store) = test_app();
        let ok = app.clone().oneshot(profile_request("https")).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        store.set_active("OU=Org, CN=Jane Doe", false).await;

        let refused = app.clone().oneshot(profile_request("https")).await.unwrap();
        let anonymous = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/self/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(refused.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(refused).await, json_body(anonymous).await);
    }

    #[tokio::test]
    async fn store_failure_is_a_server_error() {
        let (app, store) = test_app();
        store.fail_next_with_db_error().await;

        let response = app.oneshot(profile_request("https")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await["error"]["code"],
            "INTERNAL_SERVER_ERROR"
        );
        assert_eq!(store.create_count().await, 0);
    }
}
