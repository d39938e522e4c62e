use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{Mutex, MutexGuard, OnceLock},
};

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use db::{
    models::{role::Role, user::User},
    types::RoleName,
};
use deployment::Deployment;
use serde_json::{Value, json};
use services::services::config::Config;
use tower::ServiceExt;

use crate::DeploymentImpl;

pub fn test_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Points `DATABASE_URL` and `JWT_SECRET` at test values until dropped.
pub struct TestEnvGuard {
    _lock: MutexGuard<'static, ()>,
    prev_database_url: Option<String>,
    prev_jwt_secret: Option<String>,
}

impl TestEnvGuard {
    pub fn new(db_url: String, jwt_secret: &str) -> Self {
        let lock = test_lock().lock().unwrap_or_else(|err| err.into_inner());
        let prev_database_url = std::env::var("DATABASE_URL").ok();
        let prev_jwt_secret = std::env::var("JWT_SECRET").ok();

        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe {
            std::env::set_var("DATABASE_URL", db_url);
            std::env::set_var("JWT_SECRET", jwt_secret);
        }

        Self {
            _lock: lock,
            prev_database_url,
            prev_jwt_secret,
        }
    }
}

impl Drop for TestEnvGuard {
    fn drop(&mut self) {
        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe {
            match &self.prev_database_url {
                Some(value) => std::env::set_var("DATABASE_URL", value),
                None => std::env::remove_var("DATABASE_URL"),
            }
            match &self.prev_jwt_secret {
                Some(value) => std::env::set_var("JWT_SECRET", value),
                None => std::env::remove_var("JWT_SECRET"),
            }
        }
    }
}

pub fn client_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)), 52100)
}

/// A router over a throwaway database, driven with `oneshot`.
pub struct TestApp {
    _test_db: ::test_support::TestDb,
    pub deployment: DeploymentImpl,
    pub app: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let test_db = ::test_support::TestDb::new().unwrap();
        let config = Config {
            database_url: test_db.url(),
            ..config
        };
        let deployment = DeploymentImpl::from_config(config).await.unwrap();
        let app = crate::http::router(deployment.clone());
        Self {
            _test_db: test_db,
            deployment,
            app,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let mut request = builder.body(body).unwrap();
        request.extensions_mut().insert(ConnectInfo(client_addr()));

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body))
            .await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(token), Some(body))
            .await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Registers an account and returns its token and id.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> (String, i64) {
        let response = self
            .request(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "name": name, "email": email, "password": password })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        let token = response.body["token"].as_str().unwrap().to_string();
        let id = response.body["user"]["id"].as_i64().unwrap();
        (token, id)
    }

    /// Registers an account and moves it to `role` directly in the store.
    pub async fn user_with_role(&self, name: &str, role: RoleName) -> (String, i64) {
        let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
        let (token, id) = self.register(name, &email, "secret1").await;
        if role != RoleName::TeamMember {
            let pool = &self.deployment.db().pool;
            let role_id = Role::id_for(pool, role).await.unwrap();
            User::set_role(pool, id, role_id).await.unwrap();
        }
        (token, id)
    }
}
