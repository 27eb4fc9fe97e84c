use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;
use tower::ServiceExt;

use todolist::application::auth::{AuthService, TokenIssuer};
use todolist::application::database::DatabaseService;
use todolist::application::history::HistoryService;
use todolist::application::profile::ProfileService;
use todolist::application::repos::{
    CreateUserParams, HistoryRepo, PushSubscriptionsRepo, RepoError, SchemaOptions, SchemaRepo,
    TasksRepo, UpdateProfileParams, UsersRepo,
};
use todolist::application::tasks::TaskService;
use todolist::domain::entities::{HistoryRecord, TaskRecord, UserRecord};
use todolist::domain::tasks::{TaskDraft, statistics};
use todolist::domain::types::{DEFAULT_AVATAR, DEFAULT_ROLE, HistoryKind};
use todolist::infra::assets::StaticFiles;
use todolist::infra::http::{ApiRateLimiter, ApiState, build_router};
use todolist::infra::uploads::UploadStorage;
use todolist_api_types::{DatabaseStatus, StatisticsView, TableInfo};

const SECRET: &str = "integration-test-secret";
const AUTH_PAGE: &str = "<html>sign in</html>";

#[derive(Default)]
struct Store {
    users: Vec<UserRecord>,
    tasks: Vec<TaskRecord>,
    history: Vec<HistoryRecord>,
    subscriptions: Vec<(i32, Value)>,
    schema_calls: Vec<SchemaOptions>,
    next_id: i32,
}

impl Store {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn insert_tasks(&mut self, user_id: i32, drafts: &[TaskDraft]) -> usize {
        for draft in drafts {
            let id = self.next_id();
            self.tasks.push(TaskRecord {
                id,
                user_id,
                name: draft.name.clone(),
                description: draft.description.clone(),
                priority: draft.priority,
                deadline: draft.deadline,
                tags: draft.tags.clone(),
                completed: draft.completed,
                created_at: draft.created_at,
            });
        }
        drafts.len()
    }
}

#[derive(Default)]
struct MemoryRepos {
    store: Mutex<Store>,
}

impl MemoryRepos {
    async fn remove_user(&self, id: i32) {
        self.store.lock().await.users.retain(|user| user.id != id);
    }

    async fn subscriptions(&self) -> Vec<(i32, Value)> {
        self.store.lock().await.subscriptions.clone()
    }

    async fn schema_calls(&self) -> Vec<SchemaOptions> {
        self.store.lock().await.schema_calls.clone()
    }
}

#[async_trait]
impl UsersRepo for MemoryRepos {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut store = self.store.lock().await;
        if store.users.iter().any(|user| user.email == params.email) {
            return Err(RepoError::Duplicate {
                constraint: "users_email_key".to_string(),
            });
        }
        let now = OffsetDateTime::now_utc();
        let user = UserRecord {
            id: store.next_id(),
            name: params.name,
            email: params.email,
            password_hash: params.password_hash,
            avatar: DEFAULT_AVATAR.to_string(),
            registration_date: now.date(),
            role: DEFAULT_ROLE.to_string(),
            tfa_enabled: false,
            created_at: now,
            updated_at: now,
        };
        store.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: i32) -> Result<Option<UserRecord>, RepoError> {
        let store = self.store.lock().await;
        Ok(store.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let store = self.store.lock().await;
        Ok(store.users.iter().find(|user| user.email == email).cloned())
    }

    async fn email_in_use(&self, email: &str, except_id: Option<i32>) -> Result<bool, RepoError> {
        let store = self.store.lock().await;
        Ok(store
            .users
            .iter()
            .any(|user| user.email == email && Some(user.id) != except_id))
    }

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RepoError> {
        let mut store = self.store.lock().await;
        let user = store
            .users
            .iter_mut()
            .find(|user| user.id == params.id)
            .ok_or(RepoError::NotFound)?;
        user.name = params.name;
        user.email = params.email;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn replace_avatar(&self, id: i32, avatar: &str) -> Result<Option<String>, RepoError> {
        let mut store = self.store.lock().await;
        let user = store
            .users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or(RepoError::NotFound)?;
        let previous = std::mem::replace(&mut user.avatar, avatar.to_string());
        Ok(Some(previous))
    }
}

#[async_trait]
impl TasksRepo for MemoryRepos {
    async fn list_tasks(&self, user_id: i32) -> Result<Vec<TaskRecord>, RepoError> {
        let store = self.store.lock().await;
        let mut tasks: Vec<_> = store
            .tasks
            .iter()
            .filter(|task| task.user_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    async fn replace_tasks(&self, user_id: i32, tasks: &[TaskDraft]) -> Result<usize, RepoError> {
        let mut store = self.store.lock().await;
        store.tasks.retain(|task| task.user_id != user_id);
        Ok(store.insert_tasks(user_id, tasks))
    }

    async fn append_tasks(&self, user_id: i32, tasks: &[TaskDraft]) -> Result<usize, RepoError> {
        let mut store = self.store.lock().await;
        Ok(store.insert_tasks(user_id, tasks))
    }

    async fn task_statistics(
        &self,
        user_id: i32,
        today: Date,
    ) -> Result<StatisticsView, RepoError> {
        let tasks = self.list_tasks(user_id).await?;
        Ok(statistics(&tasks, today))
    }
}

#[async_trait]
impl HistoryRepo for MemoryRepos {
    async fn record_history(
        &self,
        user_id: i32,
        kind: HistoryKind,
        action: &str,
        details: Option<&str>,
    ) -> Result<(), RepoError> {
        let mut store = self.store.lock().await;
        let id = store.next_id();
        store.history.push(HistoryRecord {
            id,
            user_id,
            kind: kind.as_str().to_string(),
            action: action.to_string(),
            details: details.map(str::to_string),
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(())
    }

    async fn list_history(&self, user_id: i32, limit: i64) -> Result<Vec<HistoryRecord>, RepoError> {
        let store = self.store.lock().await;
        Ok(store
            .history
            .iter()
            .rev()
            .filter(|entry| entry.user_id == user_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn clear_history(&self, user_id: i32) -> Result<u64, RepoError> {
        let mut store = self.store.lock().await;
        let before = store.history.len();
        store.history.retain(|entry| entry.user_id != user_id);
        Ok((before - store.history.len()) as u64)
    }
}

#[async_trait]
impl PushSubscriptionsRepo for MemoryRepos {
    async fn save_subscription(&self, user_id: i32, subscription: &Value) -> Result<(), RepoError> {
        self.store
            .lock()
            .await
            .subscriptions
            .push((user_id, subscription.clone()));
        Ok(())
    }
}

#[async_trait]
impl SchemaRepo for MemoryRepos {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }

    async fn initialize(
        &self,
        options: SchemaOptions,
        _test_password_hash: &str,
    ) -> Result<(), RepoError> {
        self.store.lock().await.schema_calls.push(options);
        Ok(())
    }

    async fn describe(&self) -> Result<DatabaseStatus, RepoError> {
        let store = self.store.lock().await;
        let users = store.users.len() as i64;
        Ok(DatabaseStatus {
            tables: vec![TableInfo {
                name: "users".to_string(),
                records: users,
                columns: Vec::new(),
            }],
            total_records: users,
            status: "connected".to_string(),
            error: None,
        })
    }
}

struct Harness {
    router: Router,
    repos: Arc<MemoryRepos>,
    tokens: TokenIssuer,
    dir: TempDir,
}

struct Options {
    admin_token: Option<&'static str>,
    max_requests: u32,
    max_avatar_bytes: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            admin_token: None,
            max_requests: 1_000,
            max_avatar_bytes: 1024,
        }
    }
}

fn harness() -> Harness {
    harness_with(Options::default())
}

fn harness_with(options: Options) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let public = dir.path().join("public");
    std::fs::create_dir_all(&public).unwrap();
    std::fs::write(public.join("auth.html"), AUTH_PAGE).unwrap();
    std::fs::write(public.join("app.js"), "console.log('todo');").unwrap();

    let repos = Arc::new(MemoryRepos::default());
    let tokens = TokenIssuer::new(SECRET, time::Duration::hours(24));
    let users: Arc<dyn UsersRepo> = repos.clone();
    let history = HistoryService::new(repos.clone());

    let state = ApiState {
        auth: Arc::new(AuthService::new(
            users.clone(),
            history.clone(),
            tokens.clone(),
        )),
        profile: Arc::new(ProfileService::new(users.clone(), history.clone())),
        tasks: Arc::new(TaskService::new(repos.clone(), users, history.clone())),
        history,
        database: Arc::new(DatabaseService::new(repos.clone())),
        push: repos.clone(),
        uploads: Arc::new(
            UploadStorage::new(dir.path().join("uploads"), options.max_avatar_bytes).unwrap(),
        ),
        files: StaticFiles::new(public),
        rate_limiter: Arc::new(ApiRateLimiter::new(
            Duration::from_secs(900),
            options.max_requests,
        )),
        admin_token: options.admin_token.map(Arc::from),
        body_limit: 10 * 1024 * 1024,
    };

    Harness {
        router: build_router(state),
        repos,
        tokens,
        dir,
    }
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json body")
    }
}

impl Harness {
    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        Reply {
            status,
            headers,
            body,
        }
    }

    async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> Reply {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> Reply {
        let mut builder = Request::get(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Register and sign in, returning the token and the account id.
    async fn sign_up(&self, email: &str) -> (String, i32) {
        let registered = self
            .post_json(
                "/api/auth/register",
                None,
                json!({"name": "Olena", "email": email, "password": "secret1"}),
            )
            .await;
        assert_eq!(registered.status, StatusCode::CREATED);

        let login = self
            .post_json(
                "/api/auth/login",
                None,
                json!({"email": email, "password": "secret1"}),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK);
        let body = login.json();
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_i64().unwrap() as i32,
        )
    }
}

fn multipart_avatar(file_name: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "todolist-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::post("/api/user/avatar")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn registration_validates_and_rejects_duplicates() {
    let app = harness();

    let missing = app
        .post_json("/api/auth/register", None, json!({"name": "Olena"}))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.json()["field"], "registerEmail");

    let short = app
        .post_json(
            "/api/auth/register",
            None,
            json!({"name": "Olena", "email": "olena@example.com", "password": "123"}),
        )
        .await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);
    assert_eq!(short.json()["field"], "registerPassword");

    let created = app
        .post_json(
            "/api/auth/register",
            None,
            json!({"name": "Olena", "email": "olena@example.com", "password": "secret1"}),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let body = created.json();
    assert_eq!(body["user"]["email"], "olena@example.com");
    assert_eq!(body["user"]["avatar"], DEFAULT_AVATAR);
    assert!(body["user"].get("password").is_none());

    let duplicate = app
        .post_json(
            "/api/auth/register",
            None,
            json!({"name": "Other", "email": "olena@example.com", "password": "secret1"}),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.json()["field"], "registerEmail");
}

#[tokio::test]
async fn login_reports_the_failing_field() {
    let app = harness();
    app.sign_up("taras@example.com").await;

    let unknown = app
        .post_json(
            "/api/auth/login",
            None,
            json!({"email": "nobody@example.com", "password": "secret1"}),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.json()["field"], "loginEmail");

    let wrong = app
        .post_json(
            "/api/auth/login",
            None,
            json!({"email": "taras@example.com", "password": "nope-nope"}),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong.json()["field"], "loginPassword");

    let forgot = app
        .post_json(
            "/api/auth/forgot-password",
            None,
            json!({"email": "nobody@example.com"}),
        )
        .await;
    assert_eq!(forgot.status, StatusCode::BAD_REQUEST);
    assert_eq!(forgot.json()["field"], "forgotEmail");

    let forgot = app
        .post_json(
            "/api/auth/forgot-password",
            None,
            json!({"email": "taras@example.com"}),
        )
        .await;
    assert_eq!(forgot.status, StatusCode::OK);
}

#[tokio::test]
async fn token_checks_distinguish_missing_from_invalid() {
    let app = harness();
    let (token, user_id) = app.sign_up("iryna@example.com").await;

    let verified = app.get("/api/auth/verify", Some(&token)).await;
    assert_eq!(verified.status, StatusCode::OK);
    assert_eq!(verified.json()["valid"], true);

    assert_eq!(
        app.get("/api/user/profile", None).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.get("/api/user/profile", Some("not-a-jwt")).await.status,
        StatusCode::FORBIDDEN
    );

    let foreign = TokenIssuer::new("some-other-secret-value", time::Duration::hours(1));
    let user = app.repos.find_user(user_id).await.unwrap().unwrap();
    let forged = foreign.issue(&user, OffsetDateTime::now_utc()).unwrap();
    assert_eq!(
        app.get("/api/user/profile", Some(&forged)).await.status,
        StatusCode::FORBIDDEN
    );

    let expired = app
        .tokens
        .issue(&user, OffsetDateTime::now_utc() - time::Duration::days(2))
        .unwrap();
    assert_eq!(
        app.get("/api/user/profile", Some(&expired)).await.status,
        StatusCode::FORBIDDEN
    );

    app.repos.remove_user(user_id).await;
    let orphaned = app.get("/api/user/profile", Some(&token)).await;
    assert_eq!(orphaned.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn profile_updates_enforce_unique_email() {
    let app = harness();
    app.sign_up("first@example.com").await;
    let (token, _) = app.sign_up("second@example.com").await;

    let update = |body: Value| {
        Request::put("/api/user/profile")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let taken = app
        .send(update(json!({"name": "Second", "email": "first@example.com"})))
        .await;
    assert_eq!(taken.status, StatusCode::BAD_REQUEST);

    let blank = app.send(update(json!({"name": "", "email": "x@y.z"}))).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let updated = app
        .send(update(json!({"name": "Renamed", "email": "renamed@example.com"})))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.json()["name"], "Renamed");

    let profile = app.get("/api/user/profile", Some(&token)).await.json();
    assert_eq!(profile["email"], "renamed@example.com");

    let history = app.get("/api/user/history", Some(&token)).await.json();
    assert_eq!(history[0]["type"], "profile");
    assert_eq!(history[0]["action"], "Profile updated");
}

#[tokio::test]
async fn task_lists_are_replaced_and_reported() {
    let app = harness();
    let (token, _) = app.sign_up("tasks@example.com").await;

    let not_array = app
        .post_json("/api/user/tasks", Some(&token), json!({"tasks": "nope"}))
        .await;
    assert_eq!(not_array.status, StatusCode::BAD_REQUEST);

    let saved = app
        .post_json(
            "/api/user/tasks",
            Some(&token),
            json!({"tasks": [
                {"name": "Old", "deadline": "2000-01-01", "createdAt": "2024-01-01T00:00:00Z"},
                {"name": "Done", "completed": true, "priority": "high", "tags": ["home"],
                 "createdAt": "2024-02-01T00:00:00Z"}
            ]}),
        )
        .await;
    assert_eq!(saved.status, StatusCode::OK);

    let tasks = app.get("/api/user/tasks", Some(&token)).await.json();
    assert_eq!(tasks.as_array().unwrap().len(), 2);
    assert_eq!(tasks[0]["name"], "Done");
    assert_eq!(tasks[1]["deadline"], "2000-01-01");

    let stats = app.get("/api/user/statistics", Some(&token)).await.json();
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["active"], 1);
    assert_eq!(stats["overdue"], 1);
    assert_eq!(stats["completionRate"], 50);

    let replaced = app
        .post_json(
            "/api/user/tasks",
            Some(&token),
            json!({"tasks": [{"name": "Only"}]}),
        )
        .await;
    assert_eq!(replaced.status, StatusCode::OK);
    let tasks = app.get("/api/user/tasks", Some(&token)).await.json();
    assert_eq!(tasks.as_array().unwrap().len(), 1);

    let invalid = app
        .post_json(
            "/api/user/tasks",
            Some(&token),
            json!({"tasks": [{"name": "Fine"}, {"name": ""}]}),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    let tasks = app.get("/api/user/tasks", Some(&token)).await.json();
    assert_eq!(tasks[0]["name"], "Only");
}

#[tokio::test]
async fn export_and_import_round_through_the_api() {
    let app = harness();
    let (token, _) = app.sign_up("export@example.com").await;
    app.post_json(
        "/api/user/tasks",
        Some(&token),
        json!({"tasks": [{"name": "Write report", "tags": ["work"]}]}),
    )
    .await;

    let json_export = app.get("/api/user/export", Some(&token)).await;
    assert_eq!(json_export.status, StatusCode::OK);
    let document = json_export.json();
    assert_eq!(document["user"]["email"], "export@example.com");
    assert_eq!(document["tasks"][0]["name"], "Write report");
    assert!(document["exportDate"].is_string());

    let csv_export = app.get("/api/user/export?format=csv", Some(&token)).await;
    assert_eq!(csv_export.status, StatusCode::OK);
    assert!(
        csv_export.headers[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let text = String::from_utf8(csv_export.body.to_vec()).unwrap();
    assert!(text.starts_with("\"Name\",\"Description\",\"Deadline\""));
    assert!(text.contains("Write report"));

    let unknown = app.get("/api/user/export?format=xml", Some(&token)).await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);

    let imported = app
        .post_json(
            "/api/user/import",
            Some(&token),
            json!({"tasks": [{"name": "Imported"}]}),
        )
        .await;
    assert_eq!(imported.status, StatusCode::OK);
    assert_eq!(imported.json()["imported"], 1);

    let csv_import = app
        .send(
            Request::post("/api/user/import")
                .header(header::CONTENT_TYPE, "text/csv")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(text))
                .unwrap(),
        )
        .await;
    assert_eq!(csv_import.status, StatusCode::OK);

    let tasks = app.get("/api/user/tasks", Some(&token)).await.json();
    assert_eq!(tasks.as_array().unwrap().len(), 3);

    let history = app.get("/api/user/history", Some(&token)).await.json();
    assert_eq!(history[0]["action"], "Tasks imported");

    let cleared = app
        .send(
            Request::delete("/api/user/history")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(cleared.status, StatusCode::OK);
    let history = app.get("/api/user/history", Some(&token)).await.json();
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn avatar_uploads_replace_the_previous_file() {
    let app = harness();
    let (token, _) = app.sign_up("avatar@example.com").await;
    let authorized = |mut request: Request<Body>| {
        request.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        request
    };

    let first = app
        .send(authorized(multipart_avatar("me.png", "image/png", b"first")))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    let first_path = first.json()["avatar"].as_str().unwrap().to_string();
    assert!(first_path.starts_with("/uploads/avatars/avatar-"));

    let served = app.get(&first_path, None).await;
    assert_eq!(served.status, StatusCode::OK);
    assert_eq!(served.body, "first");

    let second = app
        .send(authorized(multipart_avatar("me.gif", "image/gif", b"second")))
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(app.get(&first_path, None).await.status, StatusCode::NOT_FOUND);

    let stored: Vec<_> = std::fs::read_dir(app.dir.path().join("uploads/avatars"))
        .unwrap()
        .collect();
    assert_eq!(stored.len(), 1);

    let wrong_type = app
        .send(authorized(multipart_avatar("notes.txt", "text/plain", b"hello")))
        .await;
    assert_eq!(wrong_type.status, StatusCode::BAD_REQUEST);

    let too_big = app
        .send(authorized(multipart_avatar(
            "big.png",
            "image/png",
            &vec![0u8; 2048],
        )))
        .await;
    assert_eq!(too_big.status, StatusCode::BAD_REQUEST);
    assert_eq!(too_big.json()["code"], "payload_too_large");
}

#[tokio::test]
async fn push_subscriptions_and_analytics() {
    let app = harness();
    let (token, user_id) = app.sign_up("push@example.com").await;

    let subscribed = app
        .post_json(
            "/api/push/subscribe",
            Some(&token),
            json!({"endpoint": "https://push.example/abc", "keys": {"auth": "x"}}),
        )
        .await;
    assert_eq!(subscribed.status, StatusCode::OK);
    assert_eq!(subscribed.json()["success"], true);

    let stored = app.repos.subscriptions().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, user_id);

    let analytics = app
        .post_json("/api/analytics/pwa", None, json!({"event": "installed"}))
        .await;
    assert_eq!(analytics.status, StatusCode::OK);
    assert_eq!(analytics.json(), json!({"success": true}));
}

#[tokio::test]
async fn api_requests_are_rate_limited() {
    let app = harness_with(Options {
        max_requests: 2,
        ..Options::default()
    });

    for _ in 0..2 {
        let reply = app.get("/api/nothing-here", None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }
    let limited = app.get("/api/user/tasks", None).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.headers[header::RETRY_AFTER], "900");

    assert_eq!(app.get("/app.js", None).await.status, StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_need_a_configured_token() {
    let disabled = harness();
    let reply = disabled
        .post_json("/api/admin/database/fix", Some("anything"), json!({}))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json()["code"], "disabled");

    let app = harness_with(Options {
        admin_token: Some("admin-secret"),
        ..Options::default()
    });
    assert_eq!(
        app.get("/api/admin/database/status", None).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.get("/api/admin/database/status", Some("wrong")).await.status,
        StatusCode::FORBIDDEN
    );

    let status = app
        .get("/api/admin/database/status", Some("admin-secret"))
        .await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.json()["status"], "connected");

    let init = app
        .send(
            Request::post("/api/admin/database/init")
                .header(header::AUTHORIZATION, "Bearer admin-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(init.status, StatusCode::OK);
    assert_eq!(init.json()["success"], true);

    let fixed = app
        .post_json("/api/admin/database/fix", Some("admin-secret"), json!({}))
        .await;
    assert_eq!(fixed.status, StatusCode::OK);

    assert_eq!(
        app.repos.schema_calls().await,
        vec![SchemaOptions::default(), SchemaOptions::fix_only()]
    );
}

#[tokio::test]
async fn pages_and_unknown_paths() {
    let app = harness();

    let root = app.get("/", None).await;
    assert_eq!(root.status, StatusCode::FOUND);
    assert_eq!(root.headers[header::LOCATION], "/auth.html");
    assert_eq!(root.headers["x-content-type-options"], "nosniff");

    let check = app.get("/check-auth", None).await;
    assert_eq!(check.status, StatusCode::OK);
    assert_eq!(check.body, AUTH_PAGE);

    let api_missing = app.get("/api/does/not/exist", None).await;
    assert_eq!(api_missing.status, StatusCode::NOT_FOUND);
    assert_eq!(api_missing.json()["error"], "Endpoint not found");

    let page_missing = app.get("/no-such-page", None).await;
    assert_eq!(page_missing.status, StatusCode::NOT_FOUND);
    assert_eq!(page_missing.body, AUTH_PAGE);

    let health = app.get("/_health/db", None).await;
    assert_eq!(health.status, StatusCode::NO_CONTENT);
}
