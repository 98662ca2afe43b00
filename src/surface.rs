//! The interactive surface and the UI collaborators Genux reports to.
//!
//! Rendering dialogs, buttons and toasts is left to the host. Genux only
//! needs somewhere to send short messages ([`Notifier`]) and a way to ask
//! yes/no questions ([`Confirmer`]).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::coordinator::{Debouncer, FeatureRequest, Genux};
use crate::error::GenuxError;
use crate::models::{ArtifactType, Feature, FeatureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
    Info,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, level: Level, message: &str);
}

/// Logs notifications. The default.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: Level, message: &str) {
        match level {
            Level::Error => tracing::warn!(target: "genux::notify", "{}", message),
            Level::Success | Level::Info => tracing::info!(target: "genux::notify", "{}", message),
        }
    }
}

/// Keeps every notification, for hosts that poll instead of being called back.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    messages: Mutex<Vec<(Level, String)>>,
}

impl MemoryNotifier {
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.lock().expect("notifier lock poisoned").clone()
    }

    pub fn take(&self) -> Vec<(Level, String)> {
        std::mem::take(&mut *self.messages.lock().expect("notifier lock poisoned"))
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, level: Level, message: &str) {
        self.messages
            .lock()
            .expect("notifier lock poisoned")
            .push((level, message.to_string()));
    }
}

#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

/// Answers yes to everything. The default.
#[derive(Debug, Default)]
pub struct AutoConfirm;

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn confirm(&self, _message: &str) -> bool {
        true
    }
}

/// Prompt and type pre-filled when editing a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub prompt: String,
    pub artifact_type: ArtifactType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Update(FeatureId),
}

/// Handle for the open interactive surface.
///
/// Only one surface is open at a time. Submissions are debounced; closing
/// (or dropping) the surface cancels whatever it still has in flight.
pub struct Surface {
    genux: Genux,
    cancel: CancellationToken,
    debouncer: Debouncer,
    mode: Arc<Mutex<Mode>>,
}

impl Surface {
    pub(crate) fn new(genux: Genux, cancel: CancellationToken) -> Self {
        let debouncer = Debouncer::new(genux.config().debounce());
        Self {
            genux,
            cancel,
            debouncer,
            mode: Arc::new(Mutex::new(Mode::Create)),
        }
    }

    /// Stored features, for the surface's list.
    pub async fn features(&self) -> Result<Vec<Feature>, GenuxError> {
        self.genux.list_features().await
    }

    /// Submit the prompt. Only the last submission within the debounce delay
    /// runs; earlier ones resolve to `None`.
    ///
    /// After [`Surface::begin_edit`] the submission that runs replaces the
    /// edited feature instead of adding a new one.
    pub fn submit(&self, request: FeatureRequest) -> JoinHandle<Option<Result<Feature, GenuxError>>> {
        let genux = self.genux.clone();
        let cancel = self.cancel.clone();
        let mode = self.mode.clone();
        self.debouncer.call(async move {
            let current = std::mem::replace(&mut *mode.lock().expect("surface lock poisoned"), Mode::Create);
            match current {
                Mode::Create => genux.create_with_cancel(request, &cancel).await,
                Mode::Update(id) => genux.update_with_cancel(id, request, &cancel).await,
            }
        })
    }

    /// Switch to update mode for `id` and return its prompt and type.
    pub async fn begin_edit(&self, id: FeatureId) -> Result<Draft, GenuxError> {
        let draft = self.genux.edit_draft(id).await?;
        *self.mode.lock().expect("surface lock poisoned") = Mode::Update(id);
        Ok(draft)
    }

    pub fn cancel_edit(&self) {
        *self.mode.lock().expect("surface lock poisoned") = Mode::Create;
    }

    pub fn editing(&self) -> Option<FeatureId> {
        match *self.mode.lock().expect("surface lock poisoned") {
            Mode::Update(id) => Some(id),
            Mode::Create => None,
        }
    }

    /// Remove a feature after asking for confirmation.
    pub async fn remove(&self, id: FeatureId) -> Result<bool, GenuxError> {
        self.genux.remove_feature(id, true).await
    }

    /// Clear every feature after asking for confirmation.
    pub async fn clear(&self) -> Result<bool, GenuxError> {
        self.genux.clear_features(true).await
    }

    pub fn close(self) {}
}

impl Drop for Surface {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.genux.release_surface();
    }
}
