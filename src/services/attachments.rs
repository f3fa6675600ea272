use crate::entities::attachments;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, Set, SqlErr};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Attachment already registered for upload {0}")]
    Duplicate(String),

    #[error("Failed to register attachment: {0}")]
    Database(#[from] DbErr),
}

/// Everything needed to record a finished upload.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub file_name: String,
    pub path_id: String,
    pub owner_id: String,
    pub realm_id: i32,
    pub size: i64,
    pub file_id: String,
    pub content_type: Option<String>,
}

pub struct AttachmentRegistrar {
    db: DatabaseConnection,
}

impl AttachmentRegistrar {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts the attachment row. Uniqueness of the upload id and path is
    /// enforced by the table constraints, so a repeated registration fails
    /// instead of producing a second row.
    pub async fn register(
        &self,
        attachment: NewAttachment,
    ) -> Result<attachments::Model, RegistrationError> {
        let file_id = attachment.file_id.clone();
        let model = attachments::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            file_name: Set(attachment.file_name),
            path_id: Set(attachment.path_id),
            owner_id: Set(attachment.owner_id),
            realm_id: Set(attachment.realm_id),
            size: Set(attachment.size),
            file_id: Set(attachment.file_id),
            content_type: Set(attachment.content_type),
            created_at: Set(Some(Utc::now())),
        };

        model.insert(&self.db).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => RegistrationError::Duplicate(file_id),
            _ => RegistrationError::Database(e),
        })
    }
}
