//! Feature lifecycle coordinator.
//!
//! [`Genux`] owns the resolved configuration and every component, and runs
//! the create, edit, remove and clear flows against them:
//!
//! ```text
//! Idle → Compiling → Requesting → Sanitizing → Persisting → Executing → Idle
//!                        ↘            ↘             ↘           ↘
//!                                        Failed → Idle
//! ```
//!
//! A failure before `Persisting` completes leaves nothing behind. A failure
//! while `Executing` removes the feature that was just persisted, so a
//! failed generation never leaves a stored-but-unapplied feature.
//!
//! Concurrent flows are not serialized: two creations racing through
//! `list` + `save` can lose one of the writes. Interactive submissions go
//! through a [`Debouncer`] to make that unlikely.

mod debounce;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::dom::{Document, PageDocument, Selector};
use crate::engine::ExecutionEngine;
use crate::error::{GenuxError, ValidationError};
use crate::models::{ArtifactType, Feature, FeatureId, NewFeature};
use crate::prompt::{self, PromptInput, PromptText};
use crate::sanitize;
use crate::store::{Backend, FeatureStore, LocalStore, RemoteCollection, StorageAdapter};
use crate::surface::{AutoConfirm, Confirmer, Draft, Level, Notifier, Surface, TracingNotifier};
use crate::transport::{GenerationAdapter, RetryPolicy, TransportClient, TransportError};

pub use debounce::Debouncer;

/// Where the most recent generation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Compiling,
    Requesting,
    Sanitizing,
    Persisting,
    Executing,
    Failed,
}

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRequest {
    pub prompt: String,
    pub artifact_type: ArtifactType,
}

impl FeatureRequest {
    pub fn new(prompt: impl Into<String>, artifact_type: ArtifactType) -> Self {
        Self {
            prompt: prompt.into(),
            artifact_type,
        }
    }
}

pub struct GenuxBuilder {
    config: Config,
    api_adapter: Option<Arc<dyn GenerationAdapter>>,
    storage_adapter: Option<Arc<dyn StorageAdapter>>,
    remote_collection: Option<Arc<dyn RemoteCollection>>,
    local_store: Option<LocalStore>,
    document: Option<Arc<Mutex<dyn Document>>>,
    notifier: Option<Arc<dyn Notifier>>,
    confirmer: Option<Arc<dyn Confirmer>>,
    retry: RetryPolicy,
}

impl GenuxBuilder {
    pub fn api_adapter(mut self, adapter: Arc<dyn GenerationAdapter>) -> Self {
        self.api_adapter = Some(adapter);
        self
    }

    pub fn storage_adapter(mut self, adapter: Arc<dyn StorageAdapter>) -> Self {
        self.storage_adapter = Some(adapter);
        self
    }

    /// Collection used when the `cloud` backend is configured. Without one,
    /// an HTTP collection is built from `remote_endpoint`.
    pub fn remote_collection(mut self, remote: Arc<dyn RemoteCollection>) -> Self {
        self.remote_collection = Some(remote);
        self
    }

    /// Use an already opened local store instead of opening `db_path`.
    pub fn local_store(mut self, store: LocalStore) -> Self {
        self.local_store = Some(store);
        self
    }

    pub fn document<D: Document + 'static>(mut self, document: Arc<Mutex<D>>) -> Self {
        self.document = Some(document);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve transport and backend once and assemble the coordinator.
    pub fn build(self) -> Result<Genux, GenuxError> {
        // A target that does not parse only fails markup features, when
        // they are applied.
        let target = self.config.target_container.as_deref().map(|source| {
            Selector::parse(source).unwrap_or_else(|e| {
                tracing::warn!("{}; markup features will not be applied", e);
                Selector::unresolvable(source)
            })
        });

        let backend = Backend::resolve(
            &self.config,
            self.storage_adapter,
            self.remote_collection,
            self.local_store,
        )?;
        let transport = TransportClient::from_config(&self.config, self.api_adapter).with_retry(self.retry);

        tracing::info!(
            "Genux using {} transport and {} storage",
            transport.transport().kind(),
            backend.kind()
        );

        let (state, _) = watch::channel(GenerationState::Idle);

        Ok(Genux {
            inner: Arc::new(Inner {
                store: FeatureStore::new(backend),
                transport,
                engine: ExecutionEngine::new(target),
                document: self
                    .document
                    .unwrap_or_else(|| Arc::new(Mutex::new(PageDocument::new()))),
                notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
                confirmer: self.confirmer.unwrap_or_else(|| Arc::new(AutoConfirm)),
                state,
                surface_open: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                config: self.config,
            }),
        })
    }

    /// Build, then apply every saved feature to the document.
    pub async fn initialize(self) -> Result<Genux, GenuxError> {
        let genux = self.build()?;
        genux.apply_saved().await?;
        Ok(genux)
    }
}

struct Inner {
    config: Config,
    store: FeatureStore,
    transport: TransportClient,
    engine: ExecutionEngine,
    document: Arc<Mutex<dyn Document>>,
    notifier: Arc<dyn Notifier>,
    confirmer: Arc<dyn Confirmer>,
    state: watch::Sender<GenerationState>,
    surface_open: AtomicBool,
    shutdown: CancellationToken,
}

/// The lifecycle coordinator. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct Genux {
    inner: Arc<Inner>,
}

impl Genux {
    pub fn builder(config: Config) -> GenuxBuilder {
        GenuxBuilder {
            config,
            api_adapter: None,
            storage_adapter: None,
            remote_collection: None,
            local_store: None,
            document: None,
            notifier: None,
            confirmer: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn document(&self) -> Arc<Mutex<dyn Document>> {
        self.inner.document.clone()
    }

    pub fn state(&self) -> GenerationState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions. Concurrent generations share one channel.
    pub fn subscribe(&self) -> watch::Receiver<GenerationState> {
        self.inner.state.subscribe()
    }

    fn set_state(&self, state: GenerationState) {
        self.inner.state.send_replace(state);
    }

    fn notify(&self, level: Level, message: &str) {
        self.inner.notifier.notify(level, message);
    }

    fn with_document<R>(&self, f: impl FnOnce(&mut dyn Document) -> R) -> R {
        let mut doc = self.inner.document.lock().expect("document lock poisoned");
        f(&mut *doc)
    }

    /// Cancel every in-flight generation, including those of open surfaces.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    // ============================================================
    // Initialization
    // ============================================================

    /// Apply every stored feature. A feature that cannot be applied is
    /// reported and skipped. Returns how many were applied.
    pub async fn apply_saved(&self) -> Result<usize, GenuxError> {
        let features = self.inner.store.list().await?;
        tracing::info!("Applying {} saved features...", features.len());

        let mut applied = 0;
        for feature in &features {
            let result = self.with_document(|doc| self.inner.engine.apply(doc, feature));
            match result {
                Ok(()) => applied += 1,
                Err(e) => {
                    tracing::warn!("Could not apply feature {}: {}", feature.id, e);
                    self.notify(Level::Error, &e.to_string());
                }
            }
        }
        Ok(applied)
    }

    // ============================================================
    // Queries
    // ============================================================

    pub async fn list_features(&self) -> Result<Vec<Feature>, GenuxError> {
        Ok(self.inner.store.list().await?)
    }

    pub async fn get_feature(&self, id: FeatureId) -> Result<Option<Feature>, GenuxError> {
        Ok(self.inner.store.get(id).await?)
    }

    /// Prompt and type of a stored feature, for pre-filling an edit.
    pub async fn edit_draft(&self, id: FeatureId) -> Result<Draft, GenuxError> {
        let feature = self
            .get_feature(id)
            .await?
            .ok_or(ValidationError::UnknownFeature(id))?;
        Ok(Draft {
            prompt: feature.prompt,
            artifact_type: feature.artifact_type,
        })
    }

    // ============================================================
    // Create / edit
    // ============================================================

    /// Generate, store and apply a new feature.
    pub async fn create(&self, request: FeatureRequest) -> Result<Feature, GenuxError> {
        let cancel = self.inner.shutdown.child_token();
        self.create_with_cancel(request, &cancel).await
    }

    pub async fn create_with_cancel(
        &self,
        request: FeatureRequest,
        cancel: &CancellationToken,
    ) -> Result<Feature, GenuxError> {
        let prompt = match PromptText::parse(&request.prompt) {
            Ok(prompt) => prompt,
            Err(e) => {
                self.notify(Level::Error, &e.to_string());
                return Err(e.into());
            }
        };

        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("generate", %request_id, kind = %request.artifact_type);
        let result = self
            .run_create(prompt, request.artifact_type, cancel)
            .instrument(span)
            .await;

        match &result {
            Ok(feature) => {
                tracing::info!("Created feature {}", feature.id);
                self.notify(Level::Success, "Feature created successfully!");
            }
            Err(GenuxError::Cancelled) => {
                tracing::info!("Generation {} cancelled", request_id);
                self.set_state(GenerationState::Failed);
                self.notify(Level::Info, "Generation cancelled.");
            }
            Err(e) => {
                tracing::error!("Error generating feature: {}", e);
                self.set_state(GenerationState::Failed);
                self.notify(Level::Error, &e.user_message());
            }
        }
        self.set_state(GenerationState::Idle);
        result
    }

    async fn run_create(
        &self,
        prompt: PromptText,
        artifact_type: ArtifactType,
        cancel: &CancellationToken,
    ) -> Result<Feature, GenuxError> {
        if cancel.is_cancelled() {
            return Err(GenuxError::Cancelled);
        }

        self.set_state(GenerationState::Compiling);
        let target = self.inner.engine.target();
        let (structure, region) = self.with_document(|doc| {
            (doc.structure(target), doc.inner_html(target).unwrap_or_default())
        });
        let compiled = prompt::compile(&PromptInput {
            prompt: &prompt,
            artifact_type,
            structure: &structure,
            region_markup: &region,
        });

        self.set_state(GenerationState::Requesting);
        let generated = self
            .inner
            .transport
            .generate(&compiled, artifact_type, cancel)
            .await
            .map_err(|e| match e {
                TransportError::Cancelled => GenuxError::Cancelled,
                other => GenuxError::Transport(other),
            })?;

        self.set_state(GenerationState::Sanitizing);
        let code = sanitize::sanitize(artifact_type, &generated.code);
        if cancel.is_cancelled() {
            return Err(GenuxError::Cancelled);
        }

        self.set_state(GenerationState::Persisting);
        let feature = Feature::new(prompt.into_string(), artifact_type, code);
        self.inner.store.add(feature.clone()).await?;

        self.set_state(GenerationState::Executing);
        self.apply_or_roll_back(&feature).await?;
        Ok(feature)
    }

    /// Apply a just-persisted feature, deleting it again if it cannot be applied.
    async fn apply_or_roll_back(&self, feature: &Feature) -> Result<(), GenuxError> {
        let applied = self.with_document(|doc| self.inner.engine.apply(doc, feature));
        if let Err(e) = applied {
            tracing::warn!("Rolling back feature {}: {}", feature.id, e);
            if let Err(rollback) = self.inner.store.remove(feature.id).await {
                tracing::error!("Rollback of feature {} failed: {}", feature.id, rollback);
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Replace a feature: remove it without confirmation, then create a new
    /// one (with a new id) from `request`.
    pub async fn update(&self, id: FeatureId, request: FeatureRequest) -> Result<Feature, GenuxError> {
        let cancel = self.inner.shutdown.child_token();
        self.update_with_cancel(id, request, &cancel).await
    }

    pub async fn update_with_cancel(
        &self,
        id: FeatureId,
        request: FeatureRequest,
        cancel: &CancellationToken,
    ) -> Result<Feature, GenuxError> {
        if let Err(e) = PromptText::parse(&request.prompt) {
            self.notify(Level::Error, &e.to_string());
            return Err(e.into());
        }
        self.remove_feature(id, false).await?;
        self.create_with_cancel(request, cancel).await
    }

    // ============================================================
    // Programmatic add / remove / clear
    // ============================================================

    /// Store and apply a feature supplied by the host, skipping prompt
    /// compilation and generation. The code is still sanitized.
    pub async fn add_feature(&self, input: NewFeature) -> Result<Feature, GenuxError> {
        let feature = Feature {
            id: input.id.unwrap_or_else(FeatureId::generate),
            code: sanitize::sanitize(input.artifact_type, &input.code),
            prompt: input.prompt,
            artifact_type: input.artifact_type,
        };
        let result = match self.inner.store.add(feature.clone()).await {
            Ok(()) => self.apply_or_roll_back(&feature).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            self.notify(Level::Error, &e.user_message());
            return Err(e);
        }
        Ok(feature)
    }

    /// Remove a feature from the store and the document. With `confirm`, the
    /// confirmer is asked first; returns `false` if it declined.
    pub async fn remove_feature(&self, id: FeatureId, confirm: bool) -> Result<bool, GenuxError> {
        if confirm && !self.inner.confirmer.confirm("Remove this feature?").await {
            return Ok(false);
        }
        self.inner.store.remove(id).await?;
        let nodes = self.with_document(|doc| self.inner.engine.remove(doc, id));
        tracing::info!("Removed feature {} ({} nodes)", id, nodes);
        self.notify(Level::Info, "Feature removed.");
        Ok(true)
    }

    /// Remove every feature from the store and the document.
    pub async fn clear_features(&self, confirm: bool) -> Result<bool, GenuxError> {
        if confirm && !self.inner.confirmer.confirm("Clear all features?").await {
            return Ok(false);
        }
        self.inner.store.clear().await?;
        let nodes = self.with_document(|doc| self.inner.engine.clear(doc));
        tracing::info!("Cleared all features ({} nodes)", nodes);
        self.notify(Level::Info, "All features cleared.");
        Ok(true)
    }

    // ============================================================
    // Surface
    // ============================================================

    /// Open the interactive surface. Returns `None` while one is already open.
    pub fn open_surface(&self) -> Option<Surface> {
        if self.inner.surface_open.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(Surface::new(self.clone(), self.inner.shutdown.child_token()))
    }

    pub(crate) fn release_surface(&self) {
        self.inner.surface_open.store(false, Ordering::SeqCst);
    }
}
