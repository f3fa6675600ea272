use crate::entities::{attachments, realms};
use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("Upload would exceed your organization's upload quota.")]
    Exceeded,

    #[error("Quota lookup failed: {0}")]
    Database(#[from] DbErr),
}

/// Decides whether a realm still has room for a file of the given size.
///
/// Accounting is owned by the implementation; callers only ask, they never
/// reserve space.
#[async_trait]
pub trait QuotaGuard: Send + Sync {
    async fn check_upload_within_quota(
        &self,
        realm: &realms::Model,
        size: u64,
    ) -> Result<(), QuotaError>;
}

/// Measures usage as the sum of the realm's registered attachment sizes.
pub struct DatabaseQuotaGuard {
    db: DatabaseConnection,
}

impl DatabaseQuotaGuard {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn used_bytes(&self, realm_id: i32) -> Result<i64, DbErr> {
        let used: Option<Option<i64>> = attachments::Entity::find()
            .select_only()
            .column_as(
                Expr::col(attachments::Column::Size)
                    .sum()
                    .cast_as(Alias::new("BIGINT")),
                "used",
            )
            .filter(attachments::Column::RealmId.eq(realm_id))
            .into_tuple()
            .one(&self.db)
            .await?;

        Ok(used.flatten().unwrap_or(0))
    }
}

#[async_trait]
impl QuotaGuard for DatabaseQuotaGuard {
    async fn check_upload_within_quota(
        &self,
        realm: &realms::Model,
        size: u64,
    ) -> Result<(), QuotaError> {
        let Some(quota) = realm.upload_quota_bytes else {
            return Ok(());
        };

        let used = self.used_bytes(realm.id).await?;
        let requested = i64::try_from(size).unwrap_or(i64::MAX);

        if used.saturating_add(requested) > quota {
            tracing::info!(
                realm_id = realm.id,
                used,
                requested,
                quota,
                "Upload rejected by realm quota"
            );
            return Err(QuotaError::Exceeded);
        }

        Ok(())
    }
}
