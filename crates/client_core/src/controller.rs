//! Selection and staleness tracking for the article list.
//!
//! The controller owns the last fetched collection, the selected ids and the
//! cached bundle reference. Every selection mutation and every fetch drops the
//! cached bundle at the moment it happens, so a bundle is only ever reused
//! when it was built from exactly the ids that are selected now.

use std::{collections::HashSet, path::PathBuf, sync::Arc, time::Duration};

use shared::domain::{reading_minutes, Article, ArticleId, BundleRef};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::{ControllerError, Operation},
    ArtifactSink, BackendError, ReaderBackend,
};

const DEFAULT_PHASE_PAUSE: Duration = Duration::from_millis(500);
const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Pause between bundle creation and the next phase. Purely cosmetic.
    pub phase_pause: Duration,
    pub event_capacity: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            phase_pause: DEFAULT_PHASE_PAUSE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Externally visible steps of the create/deliver and download workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    FetchingContent,
    CreatingBundle,
    Delivering,
    PreparingDownload,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::FetchingContent => "Fetching full article content...",
            Phase::CreatingBundle => "Creating EPUB...",
            Phase::Delivering => "Sending to Kindle...",
            Phase::PreparingDownload => "Preparing download...",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivedStats {
    pub count: usize,
    pub total_words: u64,
    pub estimated_minutes: u64,
}

impl DerivedStats {
    pub fn compute(collection: &[Article], selected: &HashSet<ArticleId>) -> Self {
        let total_words = collection
            .iter()
            .filter(|article| selected.contains(&article.id))
            .map(Article::words)
            .sum();
        Self {
            count: selected.len(),
            total_words,
            estimated_minutes: reading_minutes(total_words),
        }
    }

    /// Both "create & send" and "download" are enabled iff this holds.
    pub fn can_submit(&self) -> bool {
        self.count > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Loading { active: bool },
    CollectionReplaced { article_count: usize },
    SelectionChanged(DerivedStats),
    BundleInvalidated,
    BundleReady(BundleRef),
    Phase(Phase),
    ProgressCleared,
    AuthRedirect { login_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    NothingSelected,
    Delivered {
        article_count: usize,
        digest_title: Option<String>,
        message: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    NothingSelected,
    Saved {
        path: PathBuf,
        filename: String,
        size_bytes: usize,
        article_count: usize,
    },
}

#[derive(Default)]
struct ControllerState {
    collection: Vec<Article>,
    selected: HashSet<ArticleId>,
    bundle: Option<BundleRef>,
    /// Bumped on every fetch and selection mutation.
    selection_generation: u64,
    loading: bool,
    phase: Option<Phase>,
}

impl ControllerState {
    fn contains(&self, id: &ArticleId) -> bool {
        self.collection.iter().any(|article| &article.id == id)
    }

    /// Returns whether a cached bundle was dropped.
    fn invalidate_bundle(&mut self) -> bool {
        self.selection_generation += 1;
        self.bundle.take().is_some()
    }

    /// Selected ids in collection order.
    fn selected_snapshot(&self) -> Vec<ArticleId> {
        self.collection
            .iter()
            .filter(|article| self.selected.contains(&article.id))
            .map(|article| article.id.clone())
            .collect()
    }

    fn stats(&self) -> DerivedStats {
        DerivedStats::compute(&self.collection, &self.selected)
    }
}

pub struct SelectionController {
    backend: Arc<dyn ReaderBackend>,
    options: ControllerOptions,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl SelectionController {
    pub fn new(backend: Arc<dyn ReaderBackend>) -> Arc<Self> {
        Self::with_options(backend, ControllerOptions::default())
    }

    pub fn with_options(backend: Arc<dyn ReaderBackend>, options: ControllerOptions) -> Arc<Self> {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Arc::new(Self {
            backend,
            options,
            inner: Mutex::new(ControllerState::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn collection(&self) -> Vec<Article> {
        self.inner.lock().await.collection.clone()
    }

    pub async fn is_selected(&self, id: &ArticleId) -> bool {
        self.inner.lock().await.selected.contains(id)
    }

    pub async fn selected_ids(&self) -> Vec<ArticleId> {
        self.inner.lock().await.selected_snapshot()
    }

    pub async fn bundle(&self) -> Option<BundleRef> {
        self.inner.lock().await.bundle.clone()
    }

    pub async fn derived_stats(&self) -> DerivedStats {
        self.inner.lock().await.stats()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.lock().await.loading
    }

    pub async fn current_phase(&self) -> Option<Phase> {
        self.inner.lock().await.phase
    }

    /// Replaces the collection with a fresh listing. Selection and bundle are
    /// cleared on success and left untouched on failure.
    pub async fn load(&self, location: Option<&str>) -> Result<usize, ControllerError> {
        let location = location.map(str::trim).filter(|loc| !loc.is_empty());
        info!(location = location.unwrap_or("all"), "loading articles");

        self.set_loading(true).await;
        let result = self.backend.list_articles(location).await;
        self.set_loading(false).await;

        let articles = result.map_err(|err| self.fail(Operation::ListArticles, err))?;
        let article_count = articles.len();
        let (dropped, stats) = {
            let mut inner = self.inner.lock().await;
            inner.collection = articles;
            inner.selected.clear();
            let dropped = inner.invalidate_bundle();
            (dropped, inner.stats())
        };

        info!(article_count, "article collection replaced");
        self.emit(ControllerEvent::CollectionReplaced { article_count });
        self.emit(ControllerEvent::SelectionChanged(stats));
        if dropped {
            self.emit(ControllerEvent::BundleInvalidated);
        }
        Ok(article_count)
    }

    /// Re-checking an already checked row still drops the cached bundle.
    pub async fn set_selected(
        &self,
        id: &ArticleId,
        is_selected: bool,
    ) -> Result<DerivedStats, ControllerError> {
        let (dropped, stats) = {
            let mut inner = self.inner.lock().await;
            if !inner.contains(id) {
                return Err(ControllerError::UnknownArticle(id.clone()));
            }
            if is_selected {
                inner.selected.insert(id.clone());
            } else {
                inner.selected.remove(id);
            }
            (inner.invalidate_bundle(), inner.stats())
        };
        debug!(article_id = %id, is_selected, "selection toggled");
        Ok(self.selection_changed(dropped, stats))
    }

    /// Adds the ids the view currently shows. Ids outside the collection are ignored.
    pub async fn select_all(&self, visible_ids: &[ArticleId]) -> DerivedStats {
        let (dropped, stats) = {
            let mut inner = self.inner.lock().await;
            for id in visible_ids {
                if inner.contains(id) {
                    inner.selected.insert(id.clone());
                }
            }
            (inner.invalidate_bundle(), inner.stats())
        };
        debug!(visible = visible_ids.len(), selected = stats.count, "select all");
        self.selection_changed(dropped, stats)
    }

    /// Clears the whole selection, not only the visible rows.
    pub async fn deselect_all(&self) -> DerivedStats {
        let (dropped, stats) = {
            let mut inner = self.inner.lock().await;
            inner.selected.clear();
            (inner.invalidate_bundle(), inner.stats())
        };
        debug!("deselect all");
        self.selection_changed(dropped, stats)
    }

    /// Returns the cached bundle or creates one from a snapshot of the
    /// current selection.
    ///
    /// The result is cached only if the selection did not change while the
    /// create call was in flight; otherwise the in-flight caller still gets
    /// it, and the next call builds a fresh one.
    pub async fn ensure_bundle(&self) -> Result<BundleRef, ControllerError> {
        let (article_ids, generation) = {
            let inner = self.inner.lock().await;
            if let Some(bundle) = &inner.bundle {
                debug!(filename = %bundle.filename, "reusing cached bundle");
                return Ok(bundle.clone());
            }
            (inner.selected_snapshot(), inner.selection_generation)
        };

        info!(article_count = article_ids.len(), "creating bundle");
        let bundle = self
            .backend
            .create_bundle(&article_ids)
            .await
            .map_err(|err| self.fail(Operation::CreateBundle, err))?;

        let cached = {
            let mut inner = self.inner.lock().await;
            if inner.selection_generation == generation {
                inner.bundle = Some(bundle.clone());
                true
            } else {
                false
            }
        };

        if cached {
            info!(
                filename = %bundle.filename,
                article_count = bundle.article_count,
                "bundle cached"
            );
            self.emit(ControllerEvent::BundleReady(bundle.clone()));
        } else {
            warn!(
                filename = %bundle.filename,
                "selection changed while the bundle was created; not caching it"
            );
        }
        Ok(bundle)
    }

    pub async fn create_and_deliver(&self) -> Result<DeliveryOutcome, ControllerError> {
        if !self.derived_stats().await.can_submit() {
            return Ok(DeliveryOutcome::NothingSelected);
        }
        let outcome = self.run_delivery().await;
        self.clear_progress().await;
        outcome
    }

    pub async fn download(&self, sink: &dyn ArtifactSink) -> Result<DownloadOutcome, ControllerError> {
        if !self.derived_stats().await.can_submit() {
            return Ok(DownloadOutcome::NothingSelected);
        }
        let outcome = self.run_download(sink).await;
        self.clear_progress().await;
        outcome
    }

    async fn run_delivery(&self) -> Result<DeliveryOutcome, ControllerError> {
        let bundle = self.prepare_bundle().await?;

        self.enter_phase(Phase::Delivering).await;
        let ack = self
            .backend
            .deliver_bundle(&bundle)
            .await
            .map_err(|err| self.fail(Operation::Deliver, err))?;

        info!(
            filename = %bundle.filename,
            article_count = bundle.article_count,
            "bundle delivered"
        );
        Ok(DeliveryOutcome::Delivered {
            article_count: bundle.article_count,
            digest_title: bundle.digest_title,
            message: ack.message,
        })
    }

    async fn run_download(&self, sink: &dyn ArtifactSink) -> Result<DownloadOutcome, ControllerError> {
        let bundle = self.prepare_bundle().await?;

        self.enter_phase(Phase::PreparingDownload).await;
        let bytes = self
            .backend
            .download_bundle(&bundle)
            .await
            .map_err(|err| self.fail(Operation::Download, err))?;

        let path = sink.save(&bundle.filename, &bytes).await.map_err(|err| {
            warn!(filename = %bundle.filename, error = %err, "saving bundle failed");
            Operation::Download.error(format!("Failed to save {}: {err}", bundle.filename))
        })?;

        info!(path = %path.display(), size_bytes = bytes.len(), "bundle saved");
        Ok(DownloadOutcome::Saved {
            path,
            filename: bundle.filename,
            size_bytes: bytes.len(),
            article_count: bundle.article_count,
        })
    }

    /// Shared first two phases of both workflows.
    async fn prepare_bundle(&self) -> Result<BundleRef, ControllerError> {
        self.enter_phase(Phase::FetchingContent).await;
        let bundle = self.ensure_bundle().await?;

        self.enter_phase(Phase::CreatingBundle).await;
        if !self.options.phase_pause.is_zero() {
            tokio::time::sleep(self.options.phase_pause).await;
        }
        Ok(bundle)
    }

    async fn set_loading(&self, active: bool) {
        self.inner.lock().await.loading = active;
        self.emit(ControllerEvent::Loading { active });
    }

    async fn enter_phase(&self, phase: Phase) {
        self.inner.lock().await.phase = Some(phase);
        debug!(phase = ?phase, "phase");
        self.emit(ControllerEvent::Phase(phase));
    }

    async fn clear_progress(&self) {
        self.inner.lock().await.phase = None;
        self.emit(ControllerEvent::ProgressCleared);
    }

    fn selection_changed(&self, dropped: bool, stats: DerivedStats) -> DerivedStats {
        self.emit(ControllerEvent::SelectionChanged(stats));
        if dropped {
            self.emit(ControllerEvent::BundleInvalidated);
        }
        stats
    }

    fn fail(&self, operation: Operation, err: BackendError) -> ControllerError {
        let classified = operation.classify(&err);
        if classified.requires_reauth() {
            let login_url = self.backend.login_entry_point();
            warn!(operation = operation.name(), %login_url, "authentication required; redirecting");
            self.emit(ControllerEvent::AuthRedirect { login_url });
        } else {
            warn!(operation = operation.name(), error = %err, "collaborator call failed");
        }
        classified
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
