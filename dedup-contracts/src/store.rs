use async_trait::async_trait;

use dedup_model::{
    DuplicateGroup, File, FileId, GroupId, GroupMember, IgnorePair, ImageSignature, MediaMetadata,
    MergeTransaction, Preference, TransactionId, VideoSignature,
};

use crate::error::Result;

/// Read-side repository port for the persistent store.
/// Implementations live in `dedup-core`'s `store` module; this crate only
/// describes the shape other collaborators may depend on.
#[async_trait]
pub trait StoreReadPort: Send + Sync {
    async fn get_file(&self, id: FileId) -> Result<Option<File>>;
    async fn list_files(&self, media_kind: Option<dedup_model::MediaKind>) -> Result<Vec<File>>;
    async fn get_metadata(&self, file_id: FileId) -> Result<Option<MediaMetadata>>;
    async fn get_image_signatures(&self, file_id: FileId) -> Result<Vec<ImageSignature>>;
    async fn get_video_signature(&self, file_id: FileId) -> Result<Option<VideoSignature>>;
    async fn get_group(&self, id: GroupId) -> Result<Option<DuplicateGroup>>;
    async fn list_open_groups(&self) -> Result<Vec<DuplicateGroup>>;
    async fn get_group_members(&self, group_id: GroupId) -> Result<Vec<GroupMember>>;
    async fn list_ignore_pairs(&self) -> Result<Vec<IgnorePair>>;
    async fn get_preference(&self, key: &str) -> Result<Option<Preference>>;
    async fn get_transaction(&self, id: TransactionId) -> Result<Option<MergeTransaction>>;
    async fn list_staged_transactions(&self) -> Result<Vec<MergeTransaction>>;
}

/// Write-side repository port for the persistent store.
#[async_trait]
pub trait StoreWritePort: Send + Sync {
    async fn upsert_file(&self, file: &File) -> Result<()>;
    async fn mark_missing(&self, file_id: FileId) -> Result<()>;
    async fn upsert_metadata(&self, metadata: &MediaMetadata) -> Result<()>;
    async fn upsert_image_signature(&self, signature: &ImageSignature) -> Result<()>;
    async fn upsert_video_signature(&self, signature: &VideoSignature) -> Result<()>;
    async fn put_group(&self, group: &DuplicateGroup, members: &[GroupMember]) -> Result<()>;
    async fn delete_group(&self, group_id: GroupId) -> Result<()>;
    async fn put_ignore_pair(&self, pair: IgnorePair) -> Result<()>;
    async fn set_preference(&self, preference: Preference) -> Result<()>;
    async fn put_transaction(&self, transaction: &MergeTransaction) -> Result<()>;
    async fn delete_transaction(&self, id: TransactionId) -> Result<()>;
}
