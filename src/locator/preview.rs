//! Last-resort media search: the catalog's own preview clip.

use std::sync::Arc;

use async_trait::async_trait;

use crate::enrichment::{CatalogSearchApi, CredentialRotator, EnrichmentError, MediaSearchStrategy};
use crate::model::MediaLocator;

pub struct CatalogPreviewSearch<C> {
    rotator: Arc<CredentialRotator<C>>,
}

impl<C> CatalogPreviewSearch<C> {
    pub fn new(rotator: Arc<CredentialRotator<C>>) -> Self {
        Self { rotator }
    }
}

#[async_trait]
impl<C: CatalogSearchApi + 'static> MediaSearchStrategy for CatalogPreviewSearch<C> {
    fn name(&self) -> &str {
        "catalog-preview"
    }

    async fn find_media(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<Option<MediaLocator>, EnrichmentError> {
        let handle = self.rotator.current_client();
        match handle.track_preview(title, artist).await {
            Ok(found) => Ok(found),
            Err(e) => {
                if e.is_transient() {
                    // Only the first worker to see this handle fail moves the pool on
                    self.rotator.rotate_after_failure(&handle);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::CredentialSet;
    use crate::enrichment::traits::mocks::{CatalogScript, MockCatalog};
    use crate::model::LocatorKind;
    use std::sync::atomic::Ordering;

    fn rotator(script: Arc<CatalogScript>) -> Arc<CredentialRotator<MockCatalog>> {
        let pool = vec![CredentialSet {
            index: 0,
            identity: "id".to_string(),
            secret: "secret".to_string(),
        }];
        Arc::new(
            CredentialRotator::new(pool, move |set| MockCatalog {
                index: set.index,
                script: Arc::clone(&script),
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_preview_found() {
        let script = Arc::new(CatalogScript::default().with_preview("https://p.scdn.co/mp3-preview/x"));
        let search = CatalogPreviewSearch::new(rotator(script.clone()));

        let found = search.find_media("Srivalli", "Sid Sriram").await.unwrap().unwrap();

        assert_eq!(found.kind, LocatorKind::DirectAudio);
        assert_eq!(script.preview_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_preview() {
        let script = Arc::new(CatalogScript::default());
        let search = CatalogPreviewSearch::new(rotator(script));
        assert!(search.find_media("Song", "Artist").await.unwrap().is_none());
    }
}
