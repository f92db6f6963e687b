use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use diesel::connection::SimpleConnection;
use doc_review::config::{AppConfig, StoreBackend};
use doc_review::db::{self, PgPool};
use doc_review::identity::ACTOR_HEADER;
use doc_review::routes;
use doc_review::seed::SeedData;
use doc_review::state::AppState;
use doc_review::store::{MemoryStore, PgStore};
use doc_review::ReviewEngine;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
pub const LAND: &str = "land-7";
#[allow(dead_code)]
pub const DOC_TYPE: &str = "ownership-documents";
#[allow(dead_code)]
pub const ANALYST: &str = "u-analyst";
#[allow(dead_code)]
pub const LEAD: &str = "u-lead";
#[allow(dead_code)]
pub const UPLOADER: &str = "u-owner";
#[allow(dead_code)]
pub const OUTSIDER: &str = "u-outsider";

pub const SEED: &str = r#"{
    "default_mapping": { "ownership-documents": ["re_analyst", "re_governance_lead"] },
    "land_mappings": { "land-99": { "ownership-documents": ["re_surveyor"] } },
    "users": [
        { "user_id": "u-analyst", "roles": ["re_analyst"], "full_name": "Ama Owusu" },
        { "user_id": "u-lead", "roles": ["re_governance_lead"], "display_name": "Kofi M." },
        { "user_id": "u-owner", "username": "landowner" },
        { "user_id": "u-outsider" }
    ]
}"#;

pub fn test_config(backend: StoreBackend, database_url: Option<String>) -> AppConfig {
    AppConfig {
        store_backend: backend,
        database_url,
        database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        cors_allowed_origin: None,
        seed_file: None,
    }
}

pub struct TestApp {
    #[allow(dead_code)]
    pub store: Arc<MemoryStore>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        SeedData::from_json(SEED)?.apply_to_memory(&store)?;
        let engine = ReviewEngine::with_store(store.clone());
        let state = AppState::new(test_config(StoreBackend::Memory, None), engine);
        let router = routes::create_router(state);
        Ok(Self { store, router })
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        actor: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send(Method::POST, path, Some(serde_json::to_vec(payload)?), actor)
            .await
    }

    #[allow(dead_code)]
    pub async fn post_empty(&self, path: &str, actor: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::POST, path, None, actor).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        actor: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send(Method::PATCH, path, Some(serde_json::to_vec(payload)?), actor)
            .await
    }

    pub async fn get(&self, path: &str, actor: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, None, actor).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        actor: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(actor) = actor {
            builder = builder.header(ACTOR_HEADER, actor);
        }
        let request = match body {
            Some(bytes) => builder
                .header("content-type", "application/json")
                .body(Body::from(bytes))?,
            None => builder.body(Body::empty())?,
        };
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

#[allow(dead_code)]
pub async fn read_json<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let body = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&body).context("response body was not the expected JSON")
}

#[allow(dead_code)]
pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

/// Postgres-backed store for the optional database tests. Returns `None`
/// when `TEST_DATABASE_URL` is unset so those tests skip.
#[allow(dead_code)]
pub fn pg_store() -> Result<Option<PgStore>> {
    let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping postgres test");
        return Ok(None);
    };
    let pool = db::init_pool_with_size(&database_url, db::DEFAULT_MAX_POOL_SIZE)?;
    db::run_migrations(&pool)?;
    truncate_all(&pool)?;
    let store = PgStore::new(pool);
    SeedData::from_json(SEED)?.apply_to_postgres(&store)?;
    Ok(Some(store))
}

fn truncate_all(pool: &PgPool) -> Result<()> {
    let mut conn = pool
        .get()
        .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
    conn.batch_execute(
        "TRUNCATE TABLE review_assignments, document_versions, role_mappings, user_roles, user_profiles RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
