use crate::entities::file_scans::{self, ScanStatus};
use crate::entities::prelude::FileScans;
use crate::utils::hash::ContentDigests;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

/// Fields needed to create a scan record. Everything else starts unset.
#[derive(Debug, Clone)]
pub struct NewScan {
    pub filename: String,
    pub file_type: String,
    pub digests: ContentDigests,
    pub owner_id: i32,
}

/// Partial update of a scan record. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ScanPatch {
    pub status: Option<ScanStatus>,
    pub provider_scan_id: Option<String>,
    pub scan_submitted_at: Option<DateTime<Utc>>,
    pub result_available_at: Option<DateTime<Utc>>,
    pub positives: Option<i32>,
    pub total_scans: Option<i32>,
    pub error_message: Option<String>,
}

impl ScanPatch {
    fn apply(self, active: &mut file_scans::ActiveModel) {
        if let Some(status) = self.status {
            active.status = Set(status);
        }
        if let Some(scan_id) = self.provider_scan_id {
            active.provider_scan_id = Set(Some(scan_id));
        }
        if let Some(at) = self.scan_submitted_at {
            active.scan_submitted_at = Set(Some(at));
        }
        if let Some(at) = self.result_available_at {
            active.result_available_at = Set(Some(at));
        }
        if let Some(positives) = self.positives {
            active.positives = Set(Some(positives));
        }
        if let Some(total) = self.total_scans {
            active.total_scans = Set(Some(total));
        }
        if let Some(message) = self.error_message {
            active.error_message = Set(Some(message));
        }
    }
}

/// Durable home of `file_scans` rows between requests.
#[derive(Clone)]
pub struct ScanStore {
    db: DatabaseConnection,
}

impl ScanStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewScan) -> Result<file_scans::Model, DbErr> {
        #[allow(clippy::needless_update)]
        let record = file_scans::ActiveModel {
            filename: Set(new.filename.clone()),
            original_filename: Set(new.filename),
            file_size: Set(new.digests.size as i64),
            file_type: Set(new.file_type),
            md5_hash: Set(new.digests.md5),
            sha1_hash: Set(new.digests.sha1),
            sha256_hash: Set(new.digests.sha256),
            status: Set(ScanStatus::Pending),
            provider_scan_id: Set(None),
            scan_submitted_at: Set(None),
            result_available_at: Set(None),
            positives: Set(None),
            total_scans: Set(None),
            error_message: Set(None),
            owner_id: Set(new.owner_id),
            ..Default::default()
        };

        record.insert(&self.db).await
    }

    pub async fn get(&self, id: i32) -> Result<Option<file_scans::Model>, DbErr> {
        FileScans::find_by_id(id).one(&self.db).await
    }

    /// Matches the value against the MD5, SHA1 and SHA256 columns.
    pub async fn find_by_any_hash(&self, hash: &str) -> Result<Option<file_scans::Model>, DbErr> {
        FileScans::find()
            .filter(any_hash_condition(hash))
            .order_by_asc(file_scans::Column::Id)
            .one(&self.db)
            .await
    }

    pub async fn find_by_any_hash_for_owner(
        &self,
        owner_id: i32,
        hash: &str,
    ) -> Result<Option<file_scans::Model>, DbErr> {
        FileScans::find()
            .filter(file_scans::Column::OwnerId.eq(owner_id))
            .filter(any_hash_condition(hash))
            .order_by_asc(file_scans::Column::Id)
            .one(&self.db)
            .await
    }

    pub async fn list_for_owner(
        &self,
        owner_id: i32,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<file_scans::Model>, DbErr> {
        FileScans::find()
            .filter(file_scans::Column::OwnerId.eq(owner_id))
            .order_by_asc(file_scans::Column::CreatedAt)
            .order_by_asc(file_scans::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await
    }

    /// Applies the patch unconditionally. `updated_at` is refreshed by the entity hook.
    pub async fn update(&self, id: i32, patch: ScanPatch) -> Result<file_scans::Model, DbErr> {
        let existing = self.get(id).await?.ok_or_else(|| {
            DbErr::RecordNotFound(format!("file scan {} does not exist", id))
        })?;

        let mut active: file_scans::ActiveModel = existing.into();
        patch.apply(&mut active);
        active.update(&self.db).await
    }

    /// Applies the patch only while the row still has `expected` status.
    ///
    /// Returns `None` when the row is missing or another writer moved it first.
    pub async fn transition(
        &self,
        id: i32,
        expected: ScanStatus,
        patch: ScanPatch,
    ) -> Result<Option<file_scans::Model>, DbErr> {
        let mut active = <file_scans::ActiveModel as Default>::default();
        patch.apply(&mut active);
        active.updated_at = Set(Utc::now());

        let result = FileScans::update_many()
            .set(active)
            .filter(file_scans::Column::Id.eq(id))
            .filter(file_scans::Column::Status.eq(expected))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.get(id).await
    }
}

fn any_hash_condition(hash: &str) -> Condition {
    let hash = hash.trim().to_lowercase();
    Condition::any()
        .add(file_scans::Column::Md5Hash.eq(hash.clone()))
        .add(file_scans::Column::Sha1Hash.eq(hash.clone()))
        .add(file_scans::Column::Sha256Hash.eq(hash))
}
