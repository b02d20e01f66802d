//! Asset resolution: fetching every logical asset of a job into its workspace.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt, TryStreamExt};
use metrics::histogram;
use reel_media::{AssetKind, Workspace};
use reel_models::Job;
use reel_storage::BlobStore;
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

/// One logical asset to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub name: String,
    pub kind: AssetKind,
}

/// The deduplicated assets a job needs, in first-reference order.
///
/// A name referenced under two roles keeps the kind of its first reference.
pub fn asset_requests(job: &Job) -> Vec<AssetRequest> {
    let mut requests: Vec<AssetRequest> = Vec::new();
    let mut push = |name: &str, kind: AssetKind| {
        if !requests.iter().any(|r| r.name == name) {
            requests.push(AssetRequest {
                name: name.to_string(),
                kind,
            });
        }
    };

    for scene in &job.scenes {
        push(&scene.image, AssetKind::Image);
        push(&scene.narration, AssetKind::Audio);
    }
    if let Some(music) = &job.music {
        push(music, AssetKind::Audio);
    }
    if let Some(subtitle) = &job.subtitle {
        push(subtitle, AssetKind::Subtitle);
    }
    requests
}

/// Local paths of resolved assets, keyed by logical name.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAssets {
    paths: HashMap<String, PathBuf>,
}

impl ResolvedAssets {
    /// Local path of `name`.
    pub fn path(&self, name: &str) -> WorkerResult<&Path> {
        self.paths
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| WorkerError::asset_unavailable(name, "not resolved"))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Downloads assets concurrently with a per-download timeout.
#[derive(Clone)]
pub struct AssetResolver {
    store: Arc<dyn BlobStore>,
    max_parallel: usize,
    timeout: Duration,
}

impl AssetResolver {
    pub fn new(store: Arc<dyn BlobStore>, max_parallel: usize, timeout: Duration) -> Self {
        Self {
            store,
            max_parallel: max_parallel.max(1),
            timeout,
        }
    }

    /// Fetch each request into `workspace`.
    ///
    /// Fails with `AssetUnavailable` on the first failed download; remaining
    /// downloads are dropped and no partial result is returned.
    pub async fn resolve(
        &self,
        workspace: &Workspace,
        requests: &[AssetRequest],
    ) -> WorkerResult<ResolvedAssets> {
        let mut targets = Vec::with_capacity(requests.len());
        let mut seen = HashSet::new();
        for request in requests {
            if !seen.insert(request.name.as_str()) {
                continue;
            }
            let path = workspace.resolve_asset(&request.name, request.kind)?;
            targets.push((request.name.clone(), path));
        }

        let paths: HashMap<String, PathBuf> = stream::iter(targets)
            .map(|(name, path)| async move {
                self.download(&name, &path).await?;
                Ok::<_, WorkerError>((name, path))
            })
            .buffer_unordered(self.max_parallel)
            .try_collect()
            .await?;

        Ok(ResolvedAssets { paths })
    }

    async fn download(&self, name: &str, path: &Path) -> WorkerResult<()> {
        let started = Instant::now();
        let bytes = tokio::time::timeout(self.timeout, self.store.download_to(name, path))
            .await
            .map_err(|_| {
                WorkerError::asset_unavailable(
                    name,
                    format!("download timed out after {} ms", self.timeout.as_millis()),
                )
            })?
            .map_err(|e| WorkerError::asset_unavailable(name, e.to_string()))?;

        histogram!("reel_download_duration_seconds").record(started.elapsed().as_secs_f64());
        debug!(asset = name, path = %path.display(), bytes, "Fetched asset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use reel_models::{FormatFallback, MixDuration, RenderRequest, SceneRef};

    fn job(scenes: Vec<SceneRef>, music: Option<&str>) -> Job {
        let request = RenderRequest {
            scenes,
            music: music.map(str::to_string),
            subtitle: None,
            output_file: "out.mp4".to_string(),
            mix_duration: None,
            format_fallback: None,
        };
        Job::from_request(&request, MixDuration::First, FormatFallback::Warn).unwrap()
    }

    #[test]
    fn test_asset_requests_dedupe_shared_names() {
        let job = job(
            vec![
                SceneRef::new("a.jpg", "voice.mp3"),
                SceneRef::new("b.jpg", "voice.mp3"),
            ],
            Some("a.jpg"),
        );

        let requests = asset_requests(&job);
        let names: Vec<&str> = requests.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "voice.mp3", "b.jpg"]);
        assert_eq!(requests[0].kind, AssetKind::Image);
    }

    #[tokio::test]
    async fn test_shared_narration_downloaded_once() {
        let base = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::allocate(base.path(), "dedupe").await.unwrap();

        let store = Arc::new(MemoryStore::new());
        store.insert("a.jpg", b"img-a".to_vec());
        store.insert("b.jpg", b"img-b".to_vec());
        store.insert("voice.mp3", b"voice".to_vec());

        let job = job(
            vec![
                SceneRef::new("a.jpg", "voice.mp3"),
                SceneRef::new("b.jpg", "voice.mp3"),
            ],
            None,
        );
        let resolver = AssetResolver::new(store.clone(), 4, Duration::from_secs(5));
        let assets = resolver
            .resolve(&workspace, &asset_requests(&job))
            .await
            .unwrap();

        assert_eq!(assets.len(), 3);
        assert_eq!(store.download_count("voice.mp3"), 1);
        assert_eq!(
            tokio::fs::read(assets.path("voice.mp3").unwrap()).await.unwrap(),
            b"voice"
        );
        workspace.destroy().await;
    }

    #[tokio::test]
    async fn test_missing_asset_fails_whole_resolve() {
        let base = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::allocate(base.path(), "missing").await.unwrap();

        let store = Arc::new(MemoryStore::new());
        store.insert("a.jpg", b"img".to_vec());

        let requests = vec![
            AssetRequest {
                name: "a.jpg".into(),
                kind: AssetKind::Image,
            },
            AssetRequest {
                name: "gone.mp3".into(),
                kind: AssetKind::Audio,
            },
        ];
        let resolver = AssetResolver::new(store, 2, Duration::from_secs(5));
        let err = resolver.resolve(&workspace, &requests).await.unwrap_err();

        match err {
            WorkerError::AssetUnavailable { name, .. } => assert_eq!(name, "gone.mp3"),
            other => panic!("unexpected error: {other}"),
        }
        workspace.destroy().await;
    }

    #[tokio::test]
    async fn test_download_timeout() {
        let base = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::allocate(base.path(), "slow").await.unwrap();

        let store = Arc::new(MemoryStore::new().with_delay(Duration::from_secs(5)));
        store.insert("a.jpg", b"img".to_vec());

        let requests = vec![AssetRequest {
            name: "a.jpg".into(),
            kind: AssetKind::Image,
        }];
        let resolver = AssetResolver::new(store, 1, Duration::from_millis(50));
        let err = resolver.resolve(&workspace, &requests).await.unwrap_err();

        assert!(matches!(err, WorkerError::AssetUnavailable { .. }));
        assert!(err.to_string().contains("timed out"));
        workspace.destroy().await;
    }

    #[tokio::test]
    async fn test_hostile_name_is_opaque() {
        let base = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::allocate(base.path(), "hostile").await.unwrap();

        let store = Arc::new(MemoryStore::new());
        store.insert("a; rm -rf /.jpg", b"img".to_vec());

        let requests = vec![AssetRequest {
            name: "a; rm -rf /.jpg".into(),
            kind: AssetKind::Image,
        }];
        let resolver = AssetResolver::new(store, 1, Duration::from_secs(5));
        let assets = resolver.resolve(&workspace, &requests).await.unwrap();

        let path = assets.path("a; rm -rf /.jpg").unwrap();
        assert_eq!(path.parent().unwrap(), workspace.assets_dir());
        assert!(path.exists());
        workspace.destroy().await;
    }
}
