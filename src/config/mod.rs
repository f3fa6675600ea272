use anyhow::{Result, anyhow};
use std::env;
use std::path::PathBuf;

/// Configuration for the upload hook endpoint
#[derive(Debug, Clone)]
pub struct HookConfig {
    /// Maximum size of a single uploaded file in MiB (default: 100)
    pub max_file_upload_size_mib: u64,

    /// Root of the permanent file storage tree
    pub local_files_dir: PathBuf,

    /// Root of the uploads area; the daemon stages blobs under `<dir>/tusd`
    pub local_uploads_dir: PathBuf,

    /// Secret the daemon appends to its callback URL
    pub shared_secret: String,

    /// Secret used to validate forwarded session tokens
    pub jwt_secret: String,

    /// Only accept hook calls from loopback peers (default: true)
    pub require_loopback_hooks: bool,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            max_file_upload_size_mib: 100,
            local_files_dir: PathBuf::from("var/uploads/files"),
            local_uploads_dir: PathBuf::from("var/uploads"),
            // An empty secret never matches, so hooks stay closed until one is set
            shared_secret: String::new(),
            jwt_secret: "secret".to_string(),
            require_loopback_hooks: true,
        }
    }
}

impl HookConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_upload_size_mib: env::var("MAX_FILE_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_upload_size_mib),

            local_files_dir: env::var("LOCAL_FILES_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.local_files_dir),

            local_uploads_dir: env::var("LOCAL_UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.local_uploads_dir),

            shared_secret: env::var("SHARED_SECRET").unwrap_or(default.shared_secret),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            require_loopback_hooks: env::var("REQUIRE_LOOPBACK_HOOKS")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.require_loopback_hooks),
        }
    }

    /// Create config for production (secrets must come from the environment)
    pub fn production() -> Result<Self> {
        let shared_secret = env::var("SHARED_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("CRITICAL: SHARED_SECRET must be set"))?;
        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("CRITICAL: JWT_SECRET must be set"))?;

        Ok(Self {
            shared_secret,
            jwt_secret,
            require_loopback_hooks: true,
            ..Self::from_env()
        })
    }

    /// Directory where the daemon keeps in-progress uploads
    pub fn staging_dir(&self) -> PathBuf {
        self.local_uploads_dir.join("tusd")
    }

    /// Global per-file limit in bytes
    pub fn max_file_upload_size_bytes(&self) -> u64 {
        self.max_file_upload_size_mib.saturating_mul(1024 * 1024)
    }
}
