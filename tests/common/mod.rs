use anyhow::{anyhow, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use backend::config::AppConfig;
use backend::db::{self, SqlitePool};
use backend::models::{NewUser, User};
use backend::routes;
use backend::state::AppState;
use diesel::prelude::*;
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use http_body_util::BodyExt;
use serde::Serialize;
use tempfile::TempDir;
use tower::util::ServiceExt;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Spins up the real router over a throwaway SQLite database. Each test gets
/// its own database file, so tests are independent and need no shared lock.
pub struct TestApp {
    pub state: AppState,
    router: Router,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let db_dir = tempfile::tempdir().context("failed to create temp database dir")?;
        let database_url = db_dir
            .path()
            .join("time_study_test.db")
            .to_string_lossy()
            .into_owned();

        let config = AppConfig {
            database_url,
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            cors_allowed_origin: None,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let state = AppState::new(pool, config);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            _db_dir: db_dir,
        })
    }

    pub async fn insert_user(&self, username: &str, role: &str) -> Result<i32> {
        let username = username.to_string();
        let role = role.to_string();
        self.with_conn(move |conn| {
            let created: User = diesel::insert_into(backend::schema::user::table)
                .values(&NewUser {
                    username: &username,
                    role: Some(&role),
                })
                .get_result(conn)
                .context("failed to insert user")?;
            Ok(created.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn count_users(&self) -> Result<i64> {
        self.with_conn(|conn| {
            use backend::schema::user::dsl::user;
            user.count().get_result(conn).context("failed to count users")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn count_studies(&self) -> Result<i64> {
        self.with_conn(|conn| {
            use backend::schema::time_study::dsl::time_study;
            time_study
                .count()
                .get_result(conn)
                .context("failed to count time studies")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn count_steps(&self) -> Result<i64> {
        self.with_conn(|conn| {
            use backend::schema::step::dsl::step;
            step.count().get_result(conn).context("failed to count steps")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn count_machinist_links(&self) -> Result<i64> {
        self.with_conn(|conn| {
            use backend::schema::time_study_machinists::dsl::time_study_machinists;
            time_study_machinists
                .count()
                .get_result(conn)
                .context("failed to count machinist links")
        })
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload).await
    }

    pub async fn get(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(path)
            .body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn put_raw(&self, path: &str, body: &[u8]) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::PUT)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_vec()))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
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
pub async fn body_to_json(body: Body) -> Result<serde_json::Value> {
    let bytes = body_to_vec(body).await?;
    serde_json::from_slice(&bytes).context("response body was not valid JSON")
}

async fn prepare_database(pool: &SqlitePool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}
