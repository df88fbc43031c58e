//! Cache-aside preview generation.
//!
//! [`PreviewGenerator::get_or_create`] returns the stored image when there is
//! one and renders, stores and returns a new one otherwise. Requests for the same
//! id are serialized so concurrent identical requests render once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::renderer::{PreviewRenderer, RenderError};
use crate::request::{RenderOptions, RenderRequest, ValidationError};
use crate::store::{PreviewId, PreviewStore, StoreError};

/// How long a render may take before the request gives up.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error("failed to store preview: {0}")]
    Storage(#[from] StoreError),
    #[error("render did not finish within {} ms", .0.as_millis())]
    Timeout(Duration),
    #[error("render task failed: {0}")]
    Task(#[from] JoinError),
}

impl GenerateError {
    /// Whether the caller, rather than the service, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result of a successful [`PreviewGenerator::get_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOutcome {
    pub id: PreviewId,
    pub url: String,
    /// True when an existing image was returned without rendering.
    pub cached: bool,
    /// When the image was rendered, for fresh renders only.
    pub generated_at: Option<OffsetDateTime>,
}

// ============================================================================
// PreviewGenerator
// ============================================================================

type InFlight = DashMap<PreviewId, Arc<Mutex<()>>>;

pub struct PreviewGenerator {
    store: PreviewStore,
    renderer: Arc<dyn PreviewRenderer>,
    render_timeout: Duration,
    in_flight: InFlight,
}

impl PreviewGenerator {
    pub fn new(store: PreviewStore, renderer: Arc<dyn PreviewRenderer>) -> Self {
        Self {
            store,
            renderer,
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            in_flight: DashMap::new(),
        }
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn store(&self) -> &PreviewStore {
        &self.store
    }

    pub fn render_timeout(&self) -> Duration {
        self.render_timeout
    }

    /// Returns the preview for `request`, rendering it if needed.
    ///
    /// Invalid requests are rejected before the store or renderer is touched.
    /// With `force_regenerate` the stored image is replaced unconditionally.
    pub async fn get_or_create(
        &self,
        request: &RenderRequest,
    ) -> Result<GenerateOutcome, GenerateError> {
        let (id, options) = request.validate()?;

        if !request.force_regenerate && self.store.exists(&id).await {
            debug!(id = %id, "preview cache hit");
            return Ok(self.cached(id));
        }

        let slot = self.slot(&id);
        let _locked = slot.lock.lock().await;
        self.generate_locked(&id, options, request.force_regenerate)
            .await
    }

    async fn generate_locked(
        &self,
        id: &PreviewId,
        options: RenderOptions,
        force: bool,
    ) -> Result<GenerateOutcome, GenerateError> {
        if force {
            if self.store.delete(id).await? {
                debug!(id = %id, "dropped cached preview for regeneration");
            }
        } else if self.store.exists(id).await {
            // Another request finished this id while we waited.
            debug!(id = %id, "preview rendered by concurrent request");
            return Ok(self.cached(id.clone()));
        }

        let started = Instant::now();
        let renderer = Arc::clone(&self.renderer);
        let task = tokio::task::spawn_blocking(move || renderer.render(&options));
        let rendered = match tokio::time::timeout(self.render_timeout, task).await {
            Ok(joined) => joined??,
            Err(_) => {
                warn!(id = %id, timeout_ms = self.render_timeout.as_millis() as u64, "render timed out");
                return Err(GenerateError::Timeout(self.render_timeout));
            }
        };

        self.store.write(id, &rendered.bytes).await?;
        info!(
            id = %id,
            size_bytes = rendered.bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "preview generated"
        );

        Ok(GenerateOutcome {
            url: self.store.url(id),
            id: id.clone(),
            cached: false,
            generated_at: Some(OffsetDateTime::now_utc()),
        })
    }

    fn cached(&self, id: PreviewId) -> GenerateOutcome {
        GenerateOutcome {
            url: self.store.url(&id),
            id,
            cached: true,
            generated_at: None,
        }
    }

    fn slot<'a>(&'a self, id: &'a PreviewId) -> InFlightSlot<'a> {
        let lock = Arc::clone(
            self.in_flight
                .entry(id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        InFlightSlot {
            in_flight: &self.in_flight,
            id,
            lock,
        }
    }
}

/// A reference to the per-id lock that removes the map entry when dropped,
/// including when the request future is abandoned mid-render.
struct InFlightSlot<'a> {
    in_flight: &'a InFlight,
    id: &'a PreviewId,
    lock: Arc<Mutex<()>>,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        // Only the map and this slot still reference the lock.
        self.in_flight
            .remove_if(self.id, |_, lock| Arc::strong_count(lock) == 2);
    }
}

impl std::fmt::Debug for PreviewGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewGenerator")
            .field("store", &self.store)
            .field("render_timeout", &self.render_timeout)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    use crate::renderer::RenderedImage;

    /// Writes the title as the image bytes and counts calls.
    #[derive(Default)]
    struct FakeRenderer {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
        stamp: bool,
    }

    impl FakeRenderer {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        /// Appends the call number so identical requests yield distinct bytes.
        fn stamped() -> Self {
            Self {
                stamp: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PreviewRenderer for FakeRenderer {
        fn render(&self, options: &RenderOptions) -> Result<RenderedImage, RenderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            if self.fail {
                return Err(RenderError::Font("no fonts".to_string()));
            }
            let mut bytes = options.title.clone().into_bytes();
            if self.stamp {
                bytes.extend_from_slice(format!("#{call}").as_bytes());
            }
            Ok(RenderedImage {
                bytes,
                width: 1200,
                height: 630,
            })
        }
    }

    fn setup(renderer: FakeRenderer) -> (TempDir, Arc<FakeRenderer>, PreviewGenerator) {
        let dir = TempDir::new().unwrap();
        let store = PreviewStore::new(dir.path(), "/previews");
        let renderer = Arc::new(renderer);
        let generator = PreviewGenerator::new(store, renderer.clone());
        (dir, renderer, generator)
    }

    fn id(value: &str) -> PreviewId {
        PreviewId::parse(value).unwrap()
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let (_dir, renderer, generator) = setup(FakeRenderer::default());
        let request = RenderRequest::new("blog-42", "Great Tool").with_description("Short desc");

        let first = generator.get_or_create(&request).await.unwrap();
        assert!(!first.cached);
        assert!(first.generated_at.is_some());
        assert_eq!(first.url, "/previews/blog-42.png");

        let second = generator.get_or_create(&request).await.unwrap();
        assert!(second.cached);
        assert!(second.generated_at.is_none());
        assert_eq!(second.url, first.url);
        assert_eq!(renderer.calls(), 1);
    }

    #[tokio::test]
    async fn cache_hit_ignores_changed_parameters() {
        let (_dir, renderer, generator) = setup(FakeRenderer::default());
        generator
            .get_or_create(&RenderRequest::new("tool-x", "Old"))
            .await
            .unwrap();
        let outcome = generator
            .get_or_create(&RenderRequest::new("tool-x", "New"))
            .await
            .unwrap();

        assert!(outcome.cached);
        assert_eq!(renderer.calls(), 1);
        let bytes = generator.store().read(&id("tool-x")).await.unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"Old"[..]));
    }

    #[tokio::test]
    async fn forced_regeneration_replaces_image() {
        let (_dir, renderer, generator) = setup(FakeRenderer::default());
        generator
            .get_or_create(&RenderRequest::new("tool-x", "Old"))
            .await
            .unwrap();
        let outcome = generator
            .get_or_create(&RenderRequest::new("tool-x", "New").regenerate(true))
            .await
            .unwrap();

        assert!(!outcome.cached);
        assert_eq!(renderer.calls(), 2);
        let bytes = generator.store().read(&id("tool-x")).await.unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"New"[..]));
    }

    #[tokio::test]
    async fn forced_regeneration_with_identical_parameters_rewrites() {
        let (_dir, renderer, generator) = setup(FakeRenderer::stamped());
        let request = RenderRequest::new("page-home", "Same").with_description("Same desc");

        let first = generator.get_or_create(&request).await.unwrap();
        let before = generator.store().inspect(&id("page-home")).await.unwrap().unwrap();

        let forced = request.clone().regenerate(true);
        let second = generator.get_or_create(&forced).await.unwrap();
        let after = generator.store().inspect(&id("page-home")).await.unwrap().unwrap();

        assert!(!first.cached);
        assert!(!second.cached);
        assert!(second.generated_at.is_some());
        assert_eq!(second.url, first.url);
        assert_eq!(renderer.calls(), 2);
        assert_ne!(before.checksum, after.checksum);
        assert!(after.created_at >= before.created_at);
        let bytes = generator.store().read(&id("page-home")).await.unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"Same#2"[..]));
    }

    #[tokio::test]
    async fn abandoned_request_releases_its_slot() {
        let (_dir, _renderer, generator) = setup(FakeRenderer::slow(Duration::from_millis(200)));
        let request = RenderRequest::new("blog-9", "Dropped");

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), generator.get_or_create(&request)).await;
        assert!(abandoned.is_err());
        assert!(generator.in_flight.is_empty());
    }

    #[tokio::test]
    async fn ids_are_isolated() {
        let (_dir, renderer, generator) = setup(FakeRenderer::default());
        let a = generator
            .get_or_create(&RenderRequest::new("a", "Same"))
            .await
            .unwrap();
        let b = generator
            .get_or_create(&RenderRequest::new("b", "Same"))
            .await
            .unwrap();

        assert!(!a.cached && !b.cached);
        assert_ne!(a.url, b.url);
        assert_eq!(renderer.calls(), 2);
        assert_eq!(generator.store().list().await.len(), 2);
    }

    #[tokio::test]
    async fn invalid_requests_never_reach_the_renderer() {
        let (_dir, renderer, generator) = setup(FakeRenderer::default());

        let missing_title = generator.get_or_create(&RenderRequest::new("blog-1", "")).await;
        assert!(matches!(
            missing_title,
            Err(GenerateError::Validation(ValidationError::MissingTitle))
        ));

        let missing_id = generator.get_or_create(&RenderRequest::new("", "Title")).await;
        assert!(matches!(
            missing_id,
            Err(GenerateError::Validation(ValidationError::MissingId))
        ));

        assert_eq!(renderer.calls(), 0);
        assert!(!generator.store().exists(&id("blog-1")).await);
    }

    #[tokio::test]
    async fn render_failure_stores_nothing() {
        let (_dir, _renderer, generator) = setup(FakeRenderer::failing());
        let result = generator.get_or_create(&RenderRequest::new("blog-1", "T")).await;
        assert!(matches!(result, Err(GenerateError::Render(_))));
        assert!(!generator.store().exists(&id("blog-1")).await);
    }

    #[tokio::test]
    async fn concurrent_identical_requests_render_once() {
        let (_dir, renderer, generator) = setup(FakeRenderer::slow(Duration::from_millis(100)));
        let request = RenderRequest::new("blog-7", "Busy");

        let (first, second) = tokio::join!(
            generator.get_or_create(&request),
            generator.get_or_create(&request)
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(renderer.calls(), 1);
        assert_ne!(first.cached, second.cached);
        assert_eq!(first.url, second.url);
        assert!(generator.in_flight.is_empty());
    }

    #[tokio::test]
    async fn timeout_leaves_no_entry() {
        let (_dir, _renderer, generator) = setup(FakeRenderer::slow(Duration::from_millis(300)));
        let generator = generator.with_render_timeout(Duration::from_millis(20));

        let result = generator.get_or_create(&RenderRequest::new("slow", "T")).await;
        assert!(matches!(result, Err(GenerateError::Timeout(_))));
        assert!(!generator.store().exists(&id("slow")).await);
        assert!(generator.in_flight.is_empty());
    }

    #[test]
    fn only_validation_errors_are_client_errors() {
        assert!(GenerateError::from(ValidationError::MissingTitle).is_client_error());
        assert!(!GenerateError::Timeout(Duration::from_secs(1)).is_client_error());
    }
}
