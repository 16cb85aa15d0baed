use std::path::{Component, Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    utils::UploadedFile,
};

const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Public URL prefix under which `ImageStore::root` is served.
pub const UPLOADS_URL: &str = "/uploads";

/// Image files on local disk, addressed by the URL stored in the database.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lower-cased extension of an accepted image, or a validation error.
    pub fn validate(file: &UploadedFile) -> AppResult<String> {
        let extension = Path::new(&file.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            Ok(extension)
        } else {
            Err(AppError::Validation(
                "Only image files (png, jpg, jpeg, gif, webp) are allowed".to_string(),
            ))
        }
    }

    pub async fn store_item_image(&self, item_id: i32, file: &UploadedFile) -> AppResult<String> {
        self.store(&format!("inventory/items/{}", item_id), file).await
    }

    pub async fn store_event_image(
        &self,
        event_id: i32,
        kind: &str,
        file: &UploadedFile,
    ) -> AppResult<String> {
        self.store(&format!("gallery/events/{}/{}", event_id, kind), file)
            .await
    }

    async fn store(&self, relative_dir: &str, file: &UploadedFile) -> AppResult<String> {
        let extension = Self::validate(file)?;
        let dir = self.root.join(relative_dir);
        fs::create_dir_all(&dir).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        fs::write(dir.join(&file_name), &file.data).await?;

        Ok(format!("{}/{}/{}", UPLOADS_URL, relative_dir, file_name))
    }

    /// Maps a stored URL back to its file, refusing anything that would
    /// escape the upload root.
    pub fn resolve(&self, url: &str) -> Option<PathBuf> {
        let relative = Path::new(url.strip_prefix(UPLOADS_URL)?.strip_prefix('/')?);
        let mut components = relative.components().peekable();
        components.peek()?;
        if components.all(|c| matches!(c, Component::Normal(_))) {
            Some(self.root.join(relative))
        } else {
            None
        }
    }

    /// Deletes the file behind `url` and its directory once empty.
    pub async fn remove(&self, url: &str) -> std::io::Result<()> {
        let Some(path) = self.resolve(url) else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not an upload path: {}", url),
            ));
        };
        fs::remove_file(&path).await?;

        if let Some(dir) = path.parent() {
            if dir != self.root && is_empty_dir(dir).await {
                fs::remove_dir(dir).await?;
            }
        }
        Ok(())
    }

    /// Best-effort removal; failures are logged and otherwise ignored.
    pub async fn discard(&self, url: &str) {
        if let Err(err) = self.remove(url).await {
            log::warn!("could not remove image {}: {}", url, err);
        }
    }
}

async fn is_empty_dir(dir: &Path) -> bool {
    match fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            data: Bytes::from_static(b"image-bytes"),
        }
    }

    #[test]
    fn only_image_extensions_are_accepted() {
        assert_eq!(ImageStore::validate(&upload("chair.JPG")).unwrap(), "jpg");
        assert!(ImageStore::validate(&upload("notes.txt")).is_err());
        assert!(ImageStore::validate(&upload("no-extension")).is_err());
    }

    #[test]
    fn resolve_rejects_paths_outside_the_root() {
        let store = ImageStore::new("/srv/uploads");
        assert_eq!(
            store.resolve("/uploads/inventory/items/3/a.png"),
            Some(PathBuf::from("/srv/uploads/inventory/items/3/a.png"))
        );
        assert_eq!(store.resolve("/uploads/../etc/passwd"), None);
        assert_eq!(store.resolve("/static/a.png"), None);
        assert_eq!(store.resolve("/uploads/"), None);
        assert_eq!(store.resolve("/uploadsx/a.png"), None);
    }

    #[tokio::test]
    async fn stores_item_images_under_the_item_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ImageStore::new(tmp.path());

        let url = store.store_item_image(12, &upload("frame.png")).await.unwrap();
        assert!(url.starts_with("/uploads/inventory/items/12/"));
        assert!(url.ends_with(".png"));

        let path = store.resolve(&url).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"image-bytes");
    }

    #[tokio::test]
    async fn removing_the_last_image_removes_its_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ImageStore::new(tmp.path());

        let first = store.store_item_image(5, &upload("a.png")).await.unwrap();
        let second = store.store_item_image(5, &upload("b.png")).await.unwrap();
        let dir = tmp.path().join("inventory/items/5");

        store.remove(&first).await.unwrap();
        assert!(dir.exists());

        store.remove(&second).await.unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn discard_tolerates_missing_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ImageStore::new(tmp.path());
        store.discard("/uploads/inventory/items/1/gone.png").await;
    }
}
