#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, Response},
};
use http_body_util::BodyExt;
use rust_upload_hooks::config::HookConfig;
use rust_upload_hooks::entities::{attachments, realms, users};
use rust_upload_hooks::infrastructure::database;
use rust_upload_hooks::services::hooks::HookService;
use rust_upload_hooks::services::quota::DatabaseQuotaGuard;
use rust_upload_hooks::utils::auth::create_jwt;
use rust_upload_hooks::{AppState, create_app};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const SHARED_SECRET: &str = "test-shared-secret";
pub const JWT_SECRET: &str = "test-jwt-secret";
pub const MAX_FILE_UPLOAD_SIZE_MIB: u64 = 25;

pub struct TestContext {
    pub db: DatabaseConnection,
    pub config: HookConfig,
    pub realm: realms::Model,
    pub user: users::Model,
    pub token: String,
    pub state: AppState,
    _root: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut HookConfig)) -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = HookConfig {
            max_file_upload_size_mib: MAX_FILE_UPLOAD_SIZE_MIB,
            local_files_dir: root.path().join("files"),
            local_uploads_dir: root.path().join("uploads"),
            shared_secret: SHARED_SECRET.to_string(),
            jwt_secret: JWT_SECRET.to_string(),
            require_loopback_hooks: true,
        };
        tweak(&mut config);
        std::fs::create_dir_all(config.staging_dir()).unwrap();

        let db = Database::connect("sqlite::memory:").await.unwrap();
        database::run_migrations(&db).await.unwrap();

        let realm = create_realm(&db, "zulip", None).await;
        let user = create_user(&db, "hamlet", &realm).await;
        let token = create_jwt(&user.id, JWT_SECRET).unwrap();

        let quota = Arc::new(DatabaseQuotaGuard::new(db.clone()));
        let hook_service = Arc::new(HookService::new(db.clone(), quota, config.clone()));
        let state = AppState {
            db: db.clone(),
            hook_service,
            config: config.clone(),
        };

        Self {
            db,
            config,
            realm,
            user,
            token,
            state,
            _root: root,
        }
    }

    /// Router as seen from a local peer, the way the daemon reaches it.
    pub fn app(&self) -> Router {
        self.app_from(SocketAddr::from(([127, 0, 0, 1], 40123)))
    }

    pub fn app_from(&self, peer: SocketAddr) -> Router {
        create_app(self.state.clone()).layer(MockConnectInfo(peer))
    }

    pub fn staging_path(&self, upload_id: &str) -> PathBuf {
        self.config.staging_dir().join(upload_id)
    }

    pub fn storage_path(&self, path_id: &str) -> PathBuf {
        self.config.local_files_dir.join(path_id)
    }

    pub fn stage_file(&self, upload_id: &str, contents: &[u8]) -> PathBuf {
        let path = self.staging_path(upload_id);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.config.max_file_upload_size_bytes()
    }
}

pub async fn create_realm(
    db: &DatabaseConnection,
    string_id: &str,
    upload_quota_bytes: Option<i64>,
) -> realms::Model {
    realms::ActiveModel {
        string_id: Set(string_id.to_string()),
        name: Set(string_id.to_string()),
        upload_quota_bytes: Set(upload_quota_bytes),
        max_file_upload_size_mib: Set(None),
        created_at: Set(Some(chrono::Utc::now())),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_user(db: &DatabaseConnection, username: &str, realm: &realms::Model) -> users::Model {
    users::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        username: Set(username.to_string()),
        realm_id: Set(realm.id),
        is_active: Set(true),
        created_at: Set(Some(chrono::Utc::now())),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_attachment(
    db: &DatabaseConnection,
    user: &users::Model,
    file_id: &str,
    path_id: &str,
    size: i64,
) -> attachments::Model {
    attachments::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        file_name: Set("existing.bin".to_string()),
        path_id: Set(path_id.to_string()),
        owner_id: Set(user.id.clone()),
        realm_id: Set(user.realm_id),
        size: Set(size),
        file_id: Set(file_id.to_string()),
        content_type: Set(None),
        created_at: Set(Some(chrono::Utc::now())),
    }
    .insert(db)
    .await
    .unwrap()
}

pub fn hook_request(hook: Option<&str>, secret: Option<&str>, token: Option<&str>, body: String) -> Request<Body> {
    let uri = match secret {
        Some(secret) => format!("/tusd/hooks?secret={}", secret),
        None => "/tusd/hooks".to_string(),
    };
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(hook) = hook {
        builder = builder.header("Hook-Name", hook);
    }
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn authed_hook(ctx: &TestContext, hook: &str, body: &Value) -> Request<Body> {
    hook_request(Some(hook), Some(SHARED_SECRET), Some(&ctx.token), body.to_string())
}

pub async fn json_body(response: Response<Body>) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

pub fn upload_body(id: &str, size: u64, filename: &str) -> Value {
    serde_json::json!({
        "Upload": {
            "ID": id,
            "IsFinal": false,
            "IsPartial": false,
            "MetaData": {
                "filename": filename,
                "filetype": "application/zip",
                "name": filename,
                "type": "application/zip"
            },
            "Offset": 0,
            "PartialUploads": null,
            "Size": size,
            "SizeIsDeferred": false,
            "Storage": null
        }
    })
}
