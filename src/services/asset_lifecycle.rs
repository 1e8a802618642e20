use crate::api::error::AppError;
use crate::services::assets::{AssetStore, key_from_public, public_path};
use crate::services::cleanup::AssetCleaner;
use crate::utils::validation::{
    sanitize_filename, validate_file_size, validate_image_extension, validate_image_type,
    verify_image_bytes,
};
use bytes::Bytes;
use std::sync::Arc;

/// An image received for one named slot of a record.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub slot: String,
    pub original_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    /// Size, declared type and content checks. Runs before anything is written.
    pub fn validate(&self, max_size: usize) -> Result<(), AppError> {
        validate_file_size(self.data.len(), max_size)?;
        validate_image_type(self.content_type.as_deref())?;
        validate_image_extension(&self.original_name)?;
        verify_image_bytes(&self.data)?;
        Ok(())
    }
}

/// What happens to one slot during a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotAction {
    /// No upload and no removal: the stored path is left as it is.
    Keep,
    /// A new file takes the slot; the previous one is retired after the write.
    Replace { retire: Option<String> },
    /// The slot is emptied on request; the previous file is retired.
    Clear { retire: Option<String> },
}

/// Decides a slot's fate. An upload wins over a removal flag.
pub fn plan_slot(previous: Option<&str>, uploaded: bool, remove: bool) -> SlotAction {
    let retire = previous.filter(|p| !p.is_empty()).map(str::to_string);
    if uploaded {
        SlotAction::Replace { retire }
    } else if remove {
        SlotAction::Clear { retire }
    } else {
        SlotAction::Keep
    }
}

/// Files written for a pending database statement, plus the paths that
/// become unreferenced once it succeeds.
#[derive(Debug, Default)]
pub struct StagedAssets {
    assignments: Vec<(&'static str, Option<String>)>,
    stored: Vec<String>,
    retired: Vec<String>,
}

impl StagedAssets {
    /// Slot columns to write: `Some(path)` for a new file, `None` to clear.
    /// Kept slots are absent.
    pub fn assignments(&self) -> &[(&'static str, Option<String>)] {
        &self.assignments
    }

    pub fn retired(&self) -> &[String] {
        &self.retired
    }
}

#[derive(Clone)]
pub struct AssetLifecycle {
    store: Arc<dyn AssetStore>,
    cleaner: AssetCleaner,
    max_upload_size: usize,
}

impl AssetLifecycle {
    pub fn new(store: Arc<dyn AssetStore>, cleaner: AssetCleaner, max_upload_size: usize) -> Self {
        Self {
            store,
            cleaner,
            max_upload_size,
        }
    }

    /// Rejects uploads for slots the resource does not have, and any upload
    /// failing size or type checks.
    pub fn check_uploads(
        &self,
        slots: &[&'static str],
        files: &[UploadedFile],
    ) -> Result<(), AppError> {
        for file in files {
            if !slots.contains(&file.slot.as_str()) {
                return Err(AppError::Validation(format!("Unexpected file field '{}'", file.slot)));
            }
            file.validate(self.max_upload_size)?;
        }
        Ok(())
    }

    /// Writes new files and works out every slot's new value. Nothing is
    /// retired yet: call [`commit`](Self::commit) after the database write, or
    /// [`rollback`](Self::rollback) if it failed.
    pub async fn stage<F>(
        &self,
        dir: &str,
        slots: &[&'static str],
        previous: F,
        files: Vec<UploadedFile>,
        removals: &[&'static str],
    ) -> Result<StagedAssets, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut staged = StagedAssets::default();

        for &slot in slots {
            // Last upload for a slot wins
            let upload = files.iter().rev().find(|f| f.slot == slot);
            let prev = previous(slot);

            match plan_slot(prev.as_deref(), upload.is_some(), removals.contains(&slot)) {
                SlotAction::Keep => {}
                SlotAction::Replace { retire } => {
                    let Some(file) = upload else { continue };
                    let name = sanitize_filename(&file.original_name);
                    let key = match self.store.store(dir, &name, &file.data).await {
                        Ok(key) => key,
                        Err(e) => {
                            self.rollback(staged).await;
                            return Err(AppError::Internal(format!(
                                "Failed to store upload for '{}': {}",
                                slot, e
                            )));
                        }
                    };
                    let path = public_path(&key);
                    staged.stored.push(key);
                    if let Some(old) = retire.filter(|old| *old != path) {
                        staged.retired.push(old);
                    }
                    staged.assignments.push((slot, Some(path)));
                }
                SlotAction::Clear { retire } => {
                    staged.retired.extend(retire);
                    staged.assignments.push((slot, None));
                }
            }
        }

        Ok(staged)
    }

    /// The write referencing the staged files succeeded: queue the old ones.
    pub fn commit(&self, staged: StagedAssets) {
        self.retire(staged.retired);
    }

    /// The write failed: remove the files staged for it.
    pub async fn rollback(&self, staged: StagedAssets) {
        for key in staged.stored {
            if let Err(e) = self.store.delete(&key).await {
                tracing::warn!("Could not remove staged asset {}: {}", key, e);
            }
        }
    }

    /// Queues stored paths for deletion. Paths outside the asset store are skipped.
    pub fn retire(&self, paths: impl IntoIterator<Item = String>) {
        for path in paths {
            match key_from_public(&path) {
                Some(key) => self.cleaner.schedule(key.to_string()),
                None => tracing::debug!("Not a managed asset, leaving in place: {}", path),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_keep_without_upload() {
        assert_eq!(
            plan_slot(Some("/Uploads/x/old.png"), false, false),
            SlotAction::Keep
        );
        assert_eq!(plan_slot(None, false, false), SlotAction::Keep);
    }

    #[test]
    fn test_plan_replace_retires_previous() {
        assert_eq!(
            plan_slot(Some("/Uploads/x/old.png"), true, false),
            SlotAction::Replace {
                retire: Some("/Uploads/x/old.png".to_string())
            }
        );
        assert_eq!(
            plan_slot(None, true, false),
            SlotAction::Replace { retire: None }
        );
    }

    #[test]
    fn test_plan_upload_wins_over_remove() {
        assert!(matches!(
            plan_slot(Some("/Uploads/x/old.png"), true, true),
            SlotAction::Replace { .. }
        ));
    }

    #[test]
    fn test_plan_clear() {
        assert_eq!(
            plan_slot(Some("/Uploads/x/old.png"), false, true),
            SlotAction::Clear {
                retire: Some("/Uploads/x/old.png".to_string())
            }
        );
        assert_eq!(
            plan_slot(Some(""), false, true),
            SlotAction::Clear { retire: None }
        );
    }

    #[test]
    fn test_upload_validation() {
        let png = UploadedFile {
            slot: "image".into(),
            original_name: "a.png".into(),
            content_type: Some("image/png".into()),
            data: Bytes::from_static(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
        };
        assert!(png.validate(1024).is_ok());
        assert!(png.validate(4).is_err());

        let pdf = UploadedFile {
            content_type: Some("application/pdf".into()),
            ..png.clone()
        };
        assert!(matches!(pdf.validate(1024), Err(AppError::Validation(_))));
    }
}
