//! [`SignatureApi`] implementation: wires the pure metadata/hashing
//! functions to the store, clearing each file's refresh flags once its
//! extraction is persisted.

use std::sync::Arc;

use async_trait::async_trait;

use dedup_contracts::error::{ContractError, Result};
use dedup_contracts::signature::SignatureApi;
use dedup_contracts::store::{StoreReadPort, StoreWritePort};

use dedup_model::{FileId, ImageSignature, MediaKind, MediaMetadata, VideoSignature};

use crate::config::EngineConfig;
use crate::hashing;
use crate::metadata;

/// Default [`SignatureApi`] implementation, delegating the actual
/// extraction work to the free functions in [`crate::metadata`] and
/// [`crate::hashing`] and persisting the result through the store ports.
pub struct SignatureEngine {
    reader: Arc<dyn StoreReadPort>,
    writer: Arc<dyn StoreWritePort>,
    config: EngineConfig,
}

impl SignatureEngine {
    pub fn new(reader: Arc<dyn StoreReadPort>, writer: Arc<dyn StoreWritePort>, config: EngineConfig) -> Self {
        Self { reader, writer, config }
    }

    async fn file_or_not_found(&self, file_id: FileId) -> Result<dedup_model::File> {
        self.reader
            .get_file(file_id)
            .await?
            .ok_or_else(|| ContractError::NotFound(file_id.to_string()))
    }
}

#[async_trait]
impl SignatureApi for SignatureEngine {
    async fn extract_metadata(&self, file_id: FileId) -> Result<MediaMetadata> {
        let file = self.file_or_not_found(file_id).await?;

        if !file.needs_metadata_refresh {
            if let Some(existing) = self.reader.get_metadata(file_id).await? {
                return Ok(existing);
            }
        }

        let extracted = metadata::extract(&file).map_err(|e| ContractError::Backend(e.to_string()))?;
        self.writer.upsert_metadata(&extracted).await?;

        let mut refreshed = file;
        refreshed.needs_metadata_refresh = false;
        self.writer.upsert_file(&refreshed).await?;

        Ok(extracted)
    }

    async fn hash_image(&self, file_id: FileId) -> Result<Vec<ImageSignature>> {
        let file = self.file_or_not_found(file_id).await?;
        if file.media_kind != MediaKind::Photo {
            return Err(ContractError::Backend(format!("{file_id} is not a photo")));
        }

        if !file.needs_signature_refresh {
            let existing = self.reader.get_image_signatures(file_id).await?;
            if !existing.is_empty() {
                return Ok(existing);
            }
        }

        let meta = self.reader.get_metadata(file_id).await?.unwrap_or_else(|| MediaMetadata::empty(file_id));
        let (width, height) = (meta.width.unwrap_or(0), meta.height.unwrap_or(0));

        let signatures = hashing::hash_image(&file.path, file_id, width, height, self.config.compute_phash)
            .map_err(|e| ContractError::Backend(e.to_string()))?;
        for signature in &signatures {
            self.writer.upsert_image_signature(signature).await?;
        }

        let mut refreshed = file;
        refreshed.needs_signature_refresh = false;
        self.writer.upsert_file(&refreshed).await?;

        Ok(signatures)
    }

    async fn hash_video(&self, file_id: FileId) -> Result<VideoSignature> {
        let file = self.file_or_not_found(file_id).await?;
        if file.media_kind != MediaKind::Video {
            return Err(ContractError::Backend(format!("{file_id} is not a video")));
        }

        if !file.needs_signature_refresh {
            if let Some(existing) = self.reader.get_video_signature(file_id).await? {
                return Ok(existing);
            }
        }

        let signature = hashing::video_hash::hash_video(&file.path, file_id)
            .map_err(|e| ContractError::Backend(e.to_string()))?;
        self.writer.upsert_video_signature(&signature).await?;

        let mut refreshed = file;
        refreshed.needs_signature_refresh = false;
        self.writer.upsert_file(&refreshed).await?;

        Ok(signature)
    }

    async fn compute_checksum(&self, file_id: FileId) -> Result<Vec<u8>> {
        let file = self.file_or_not_found(file_id).await?;

        if !file.needs_signature_refresh {
            if let Some(existing) = &file.checksum {
                return Ok(existing.clone());
            }
        }

        let checksum = hashing::checksum::sha256_file(&file.path)
            .await
            .map_err(|e| ContractError::Backend(e.to_string()))?;

        let mut refreshed = file;
        refreshed.checksum = Some(checksum.clone());
        refreshed.needs_signature_refresh = false;
        self.writer.upsert_file(&refreshed).await?;

        Ok(checksum)
    }
}
