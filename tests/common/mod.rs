//! Test helpers for the HTTP API tests.
//!
//! Seeds two schools, each with a principal, plus a staff member and a
//! student in the first school.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};

use schoolgate::config::ServerConfig;
use schoolgate::web::middleware::RateLimitState;
use schoolgate::{
    create_router, hash_password, Account, AccountRepository, AppState, Database, NewAccount,
    NewSchool, OtpNotifier, Role, SchoolRepository, SecurityPolicy,
};

pub const SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "password123";

/// Notifier that keeps every issued code.
#[derive(Default)]
pub struct CapturingNotifier {
    codes: Mutex<Vec<String>>,
}

impl CapturingNotifier {
    pub fn last(&self) -> Option<String> {
        self.codes.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl OtpNotifier for CapturingNotifier {
    async fn send_otp(&self, _account: &Account, code: &str) -> schoolgate::Result<()> {
        self.codes.lock().unwrap().push(code.to_string());
        Ok(())
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub db: Database,
    pub state: Arc<AppState>,
    pub notifier: Arc<CapturingNotifier>,
    pub school_id: String,
    pub other_school_id: String,
    pub student: Account,
    pub staff: Account,
    pub principal: Account,
    pub other_principal: Account,
}

async fn create_account(db: &Database, role: Role, school_id: &str, username: &str) -> Account {
    AccountRepository::new(db.pool(), role)
        .create(
            &NewAccount::new(school_id, username, username, hash_password(PASSWORD).unwrap())
                .with_email(format!("{username}@school.test")),
        )
        .await
        .unwrap()
}

/// Create a test app without rate limiting.
pub async fn setup() -> TestApp {
    setup_with_rate_limit(None).await
}

/// Create a test app with the given rate limiter.
pub async fn setup_with_rate_limit(rate_limit: Option<Arc<RateLimitState>>) -> TestApp {
    let db = Database::open_in_memory().await.unwrap();

    let schools = SchoolRepository::new(db.pool());
    let school = schools.create(&NewSchool::new("Greenfield High")).await.unwrap();
    let other = schools.create(&NewSchool::new("Riverside School")).await.unwrap();

    let principal = create_account(&db, Role::Principal, &school.id, "Head.Green").await;
    let other_principal = create_account(&db, Role::Principal, &other.id, "head.river").await;
    let staff = create_account(&db, Role::Staff, &school.id, "mrao").await;
    let student = create_account(&db, Role::Student, &school.id, "arjun").await;

    let notifier = Arc::new(CapturingNotifier::default());
    let state = Arc::new(
        AppState::new(db.clone(), SECRET, SecurityPolicy::default())
            .with_notifier(notifier.clone()),
    );

    let router = create_router(state.clone(), rate_limit, &ServerConfig::default());
    let server = TestServer::new(router).unwrap();

    TestApp {
        server,
        db,
        state,
        notifier,
        school_id: school.id,
        other_school_id: other.id,
        student,
        staff,
        principal,
        other_principal,
    }
}

impl TestApp {
    /// POST credentials to a login path.
    pub async fn login(&self, path: &str, username: &str, password: &str) -> TestResponse {
        self.server
            .post(path)
            .json(&json!({ "username": username, "password": password }))
            .await
    }

    /// Log in and return the token, panicking on failure.
    pub async fn token(&self, path: &str, username: &str) -> String {
        let response = self.login(path, username, PASSWORD).await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["data"]["token"].as_str().unwrap().to_string()
    }

    pub async fn student_token(&self) -> String {
        self.token("/chankya/auth/student/login", "arjun").await
    }

    pub async fn staff_token(&self) -> String {
        self.token("/chankya/auth/staff/login", "mrao").await
    }

    pub async fn principal_token(&self) -> String {
        self.token("/admin/auth/login", "head.green").await
    }

    /// GET with a bearer token.
    pub async fn get_with(&self, path: &str, token: &str) -> TestResponse {
        self.server
            .get(path)
            .add_header(AUTHORIZATION, format!("Bearer {token}"))
            .await
    }

    /// POST JSON with a bearer token.
    pub async fn post_with(&self, path: &str, token: &str, body: &Value) -> TestResponse {
        self.server
            .post(path)
            .add_header(AUTHORIZATION, format!("Bearer {token}"))
            .json(body)
            .await
    }

    /// Fresh copy of an account.
    pub async fn reload(&self, account: &Account) -> Account {
        AccountRepository::new(self.db.pool(), account.role)
            .get_by_id(&account.id)
            .await
            .unwrap()
            .unwrap()
    }
}
