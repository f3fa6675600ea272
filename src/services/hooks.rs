use crate::api::error::AppError;
use crate::config::HookConfig;
use crate::entities::{attachments, realms};
use crate::models::Principal;
use crate::services::attachments::{AttachmentRegistrar, NewAttachment};
use crate::services::paths::generate_path;
use crate::services::quota::QuotaGuard;
use crate::services::relocator::FileRelocator;
use crate::utils::validation::is_safe_path_component;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

const MIB: u64 = 1024 * 1024;

/// Lifecycle events the daemon is configured to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookName {
    PreCreate,
    PreFinish,
}

impl HookName {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pre-create" => Some(HookName::PreCreate),
            "pre-finish" => Some(HookName::PreFinish),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookName::PreCreate => "pre-create",
            HookName::PreFinish => "pre-finish",
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct HookRequest {
    #[serde(rename = "Upload")]
    pub upload: UploadInfo,
}

/// The daemon's view of one upload session. Only the fields used here are
/// modelled; everything else in the payload is ignored.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UploadInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "SizeIsDeferred")]
    pub size_is_deferred: bool,
    #[serde(rename = "MetaData")]
    pub meta_data: Option<HashMap<String, String>>,
}

impl UploadInfo {
    fn meta(&self, key: &str) -> Option<&str> {
        self.meta_data
            .as_ref()
            .and_then(|m| m.get(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Client-supplied name; some clients only send `name`.
    pub fn file_name(&self) -> Option<&str> {
        self.meta("filename").or_else(|| self.meta("name"))
    }

    pub fn content_type(&self) -> Option<&str> {
        self.meta("filetype").or_else(|| self.meta("type"))
    }
}

/// Runs the admission and finalization steps behind the hook endpoint.
pub struct HookService {
    config: HookConfig,
    quota: Arc<dyn QuotaGuard>,
    relocator: FileRelocator,
    registrar: AttachmentRegistrar,
}

impl HookService {
    pub fn new(db: DatabaseConnection, quota: Arc<dyn QuotaGuard>, config: HookConfig) -> Self {
        let relocator = FileRelocator::new(config.staging_dir(), config.local_files_dir.clone());
        Self {
            config,
            quota,
            relocator,
            registrar: AttachmentRegistrar::new(db),
        }
    }

    /// Per-file limit for a realm. A realm may tighten the global limit but
    /// never raise it.
    pub fn max_file_upload_size_mib(&self, realm: &realms::Model) -> u64 {
        let global = self.config.max_file_upload_size_mib;
        realm
            .max_file_upload_size_mib
            .and_then(|v| u64::try_from(v).ok())
            .map_or(global, |own| own.min(global))
    }

    /// Admission check for a new upload. Touches no state, so repeating it
    /// gives the same answer as long as the realm's usage is unchanged.
    pub async fn pre_create(&self, principal: &Principal, upload: &UploadInfo) -> Result<(), AppError> {
        if upload.size == 0 {
            warn!(
                user_id = %principal.user.id,
                deferred = upload.size_is_deferred,
                "Rejecting upload without a declared size"
            );
            return Err(AppError::InvalidUpload(
                "Upload size must be declared and non-zero.".to_string(),
            ));
        }

        let limit_mib = self.max_file_upload_size_mib(&principal.realm);
        if upload.size > limit_mib.saturating_mul(MIB) {
            info!(
                realm_id = principal.realm.id,
                size = upload.size,
                limit_mib,
                "Upload rejected by size limit"
            );
            return Err(AppError::SizeLimitExceeded { limit_mib });
        }

        self.quota
            .check_upload_within_quota(&principal.realm, upload.size)
            .await?;

        info!(
            realm_id = principal.realm.id,
            user_id = %principal.user.id,
            size = upload.size,
            "Upload admitted"
        );
        Ok(())
    }

    /// Moves the finished upload into permanent storage under a freshly
    /// generated path and registers it as an attachment.
    pub async fn pre_finish(
        &self,
        principal: &Principal,
        upload: &UploadInfo,
    ) -> Result<attachments::Model, AppError> {
        let (file_name, size) = self.validate_finish(upload)?;
        let path_id = {
            let mut rng = rand::thread_rng();
            generate_path(&mut rng, principal.realm.id, &upload.id, file_name)
        };
        self.relocate_and_register(principal, upload, file_name, size, path_id)
            .await
    }

    /// Finish flow with a caller-chosen storage path.
    pub async fn finalize(
        &self,
        principal: &Principal,
        upload: &UploadInfo,
        path_id: String,
    ) -> Result<attachments::Model, AppError> {
        let (file_name, size) = self.validate_finish(upload)?;
        self.relocate_and_register(principal, upload, file_name, size, path_id)
            .await
    }

    async fn relocate_and_register(
        &self,
        principal: &Principal,
        upload: &UploadInfo,
        file_name: &str,
        size: i64,
        path_id: String,
    ) -> Result<attachments::Model, AppError> {
        let stored_at = self
            .relocator
            .relocate(&upload.id, &path_id)
            .await
            .inspect_err(|e| {
                error!(upload_id = %upload.id, path_id = %path_id, error = %e, "Failed to relocate upload");
            })?;

        let registered = self
            .registrar
            .register(NewAttachment {
                file_name: file_name.to_string(),
                path_id: path_id.clone(),
                owner_id: principal.user.id.clone(),
                realm_id: principal.realm.id,
                size,
                file_id: upload.id.clone(),
                content_type: upload.content_type().map(str::to_string),
            })
            .await;

        match registered {
            Ok(attachment) => {
                info!(
                    upload_id = %upload.id,
                    path_id = %attachment.path_id,
                    realm_id = attachment.realm_id,
                    size = attachment.size,
                    "Upload finalized"
                );
                Ok(attachment)
            }
            Err(e) => {
                // The blob stays where it is; reconciliation happens outside this service
                error!(
                    upload_id = %upload.id,
                    path = %stored_at.display(),
                    error = %e,
                    "Upload relocated but not registered; file is orphaned"
                );
                Err(e.into())
            }
        }
    }

    fn validate_finish<'a>(&self, upload: &'a UploadInfo) -> Result<(&'a str, i64), AppError> {
        if !is_safe_path_component(&upload.id) {
            return Err(AppError::InvalidUpload("Invalid upload id.".to_string()));
        }
        let file_name = upload
            .file_name()
            .ok_or_else(|| AppError::InvalidUpload("Missing filename.".to_string()))?;
        let size = i64::try_from(upload.size)
            .map_err(|_| AppError::InvalidUpload("Invalid upload size.".to_string()))?;
        Ok((file_name, size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_name_parse() {
        assert_eq!(HookName::parse("pre-create"), Some(HookName::PreCreate));
        assert_eq!(HookName::parse("pre-finish"), Some(HookName::PreFinish));
        assert_eq!(HookName::parse("pre-xyz"), None);
        assert_eq!(HookName::parse("PRE-CREATE"), None);
        assert_eq!(HookName::PreFinish.as_str(), "pre-finish");
    }

    #[test]
    fn test_upload_info_tolerates_partial_payloads() {
        let req: HookRequest = serde_json::from_str(r#"{"Upload": {"ID": "xyz"}}"#).unwrap();
        assert_eq!(req.upload.id, "xyz");
        assert_eq!(req.upload.size, 0);
        assert!(req.upload.file_name().is_none());

        let req: HookRequest =
            serde_json::from_str(
                r#"{"Upload": {"Size": 5, "Offset": 5, "IsFinal": true, "MetaData": null, "PartialUploads": null}}"#,
            )
            .unwrap();
        assert_eq!(req.upload.size, 5);
        assert!(req.upload.id.is_empty());
    }

    #[test]
    fn test_upload_info_metadata() {
        let req: HookRequest = serde_json::from_str(
            r#"{"Upload": {"ID": "a", "Size": 10, "MetaData": {
                "filename": "report.zip", "filetype": "application/zip"}}}"#,
        )
        .unwrap();
        assert_eq!(req.upload.file_name(), Some("report.zip"));
        assert_eq!(req.upload.content_type(), Some("application/zip"));

        let req: HookRequest =
            serde_json::from_str(r#"{"Upload": {"MetaData": {"name": "fallback.txt"}}}"#).unwrap();
        assert_eq!(req.upload.file_name(), Some("fallback.txt"));
    }
}
