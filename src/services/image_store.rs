//! Product image storage and the non-critical cleanup policy.
//!
//! Deleting an image never blocks or fails the catalog operation that
//! triggered it: removal runs on a detached task and failures are logged.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::ServiceError;

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Removes the object at `path` (see [`storage_path`]).
    async fn remove(&self, path: &str) -> Result<(), ServiceError>;
}

/// Store used when no object storage is wired in; it only records intent.
#[derive(Debug, Default, Clone)]
pub struct LoggingImageStore;

#[async_trait]
impl ImageStore for LoggingImageStore {
    async fn remove(&self, path: &str) -> Result<(), ServiceError> {
        info!(%path, "Image removal requested");
        Ok(())
    }
}

/// Object path of an image: the last two `/`-separated segments of its URL.
pub fn storage_path(image_url: &str) -> Option<String> {
    let mut segments = image_url
        .trim_end_matches('/')
        .rsplit('/')
        .filter(|s| !s.is_empty());
    let file = segments.next()?;
    let folder = segments.next()?;
    if folder.ends_with(':') {
        return None;
    }
    Some(format!("{}/{}", folder, file))
}

/// Fire-and-forget removal of `image_url`. Returns the spawned task handle.
pub fn spawn_cleanup(
    store: Arc<dyn ImageStore>,
    image_url: String,
) -> Option<tokio::task::JoinHandle<()>> {
    let Some(path) = storage_path(&image_url) else {
        warn!(%image_url, "Cannot derive storage path for image; skipping cleanup");
        return None;
    };

    Some(tokio::spawn(async move {
        if let Err(e) = store.remove(&path).await {
            warn!(error = %e, %path, "Non-critical image cleanup failed");
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn storage_path_takes_last_two_segments() {
        assert_eq!(
            storage_path("https://cdn.example.com/storage/v1/object/public/product-images/abc.png")
                .as_deref(),
            Some("product-images/abc.png")
        );
        assert_eq!(storage_path("folder/file.jpg").as_deref(), Some("folder/file.jpg"));
        assert_eq!(storage_path("file.jpg"), None);
        assert_eq!(storage_path("https://host.example"), None);
    }

    struct FailingStore(Mutex<Vec<String>>);

    #[async_trait]
    impl ImageStore for FailingStore {
        async fn remove(&self, path: &str) -> Result<(), ServiceError> {
            self.0.lock().unwrap().push(path.to_string());
            Err(ServiceError::ExternalServiceError("storage down".into()))
        }
    }

    #[tokio::test]
    async fn cleanup_failure_is_swallowed() {
        let store = Arc::new(FailingStore(Mutex::new(Vec::new())));
        let handle = spawn_cleanup(store.clone(), "https://cdn/img/a.png".into()).unwrap();

        handle.await.expect("cleanup task must not panic");
        assert_eq!(store.0.lock().unwrap().as_slice(), ["img/a.png"]);
    }
}
