use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use super::error::PipelineError;
use super::file_tree::{FileTreeBuilder, TreeNode, default_selection};
use super::project_library::ProjectLibrary;
use super::prompt_compositor::PromptCompositor;
use super::response_extractor::ResponseExtractor;
use super::stream_aggregator::{DEFAULT_MODEL, StreamAggregator};
use crate::data::{
    AiClient, AuthProvider, ImagePayload, PersistenceGateway, ProjectDocument, ProjectFile,
    SavedProjectMetadata,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Generating,
    Ready,
    Failed,
}

/// Non-blocking notification produced by the best-effort save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Saved(SavedProjectMetadata),
    SaveFailed(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Saved(_) => "Project saved to your dashboard",
            Notice::SaveFailed(_) => "Failed to auto-save project",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyReport {
    /// Id of the stored snapshot: the saved id after a generation, the loaded id after a load.
    pub project_id: Option<String>,
    pub selected_path: Option<String>,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Blank prompt, or a cycle was already in flight. Nothing changed.
    Ignored,
    Ready(ReadyReport),
}

#[derive(Debug)]
struct Session {
    status: SessionStatus,
    active: Option<ProjectDocument>,
    selected_path: Option<String>,
    last_error: Option<String>,
    history: Vec<SavedProjectMetadata>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            active: None,
            selected_path: None,
            last_error: None,
            history: Vec::new(),
        }
    }
}

/// Sequences generation, iteration and loading for one user session.
///
/// Owns the active project and the file selection. At most one cycle runs at a
/// time; requests arriving meanwhile are ignored rather than queued. The session
/// lock is only taken between suspension points, never across one.
pub struct ProjectOrchestrator {
    compositor: PromptCompositor,
    aggregator: StreamAggregator,
    library: ProjectLibrary,
    auth: Arc<dyn AuthProvider>,
    session: Mutex<Session>,
}

impl ProjectOrchestrator {
    pub fn new(
        client: Arc<dyn AiClient>,
        gateway: Arc<dyn PersistenceGateway>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            compositor: PromptCompositor::default(),
            aggregator: StreamAggregator::new(client, DEFAULT_MODEL),
            library: ProjectLibrary::new(gateway),
            auth,
            session: Mutex::new(Session::default()),
        }
    }

    pub fn with_compositor(mut self, compositor: PromptCompositor) -> Self {
        self.compositor = compositor;
        self
    }

    pub fn with_aggregator(mut self, aggregator: StreamAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    /// Backend model used for generation.
    pub fn model(&self) -> &str {
        self.aggregator.model()
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    pub fn active_project(&self) -> Option<ProjectDocument> {
        self.lock().active.clone()
    }

    pub fn selected_path(&self) -> Option<String> {
        self.lock().selected_path.clone()
    }

    pub fn selected_file(&self) -> Option<ProjectFile> {
        let session = self.lock();
        let path = session.selected_path.as_deref()?;
        session.active.as_ref()?.file(path).cloned()
    }

    /// Selects `path` if the active project has such a file.
    pub fn select_file(&self, path: &str) -> bool {
        let mut session = self.lock();
        let exists = session
            .active
            .as_ref()
            .is_some_and(|doc| doc.contains_path(path));
        if exists {
            session.selected_path = Some(path.to_string());
        }
        exists
    }

    /// Message of the last failed cycle, cleared when a new cycle starts.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Hierarchy of the active project, rebuilt from its file list.
    pub fn file_tree(&self) -> Option<TreeNode> {
        self.lock()
            .active
            .as_ref()
            .map(|doc| FileTreeBuilder::build(&doc.files))
    }

    /// Dashboard entries known to this session, newest first.
    pub fn history(&self) -> Vec<SavedProjectMetadata> {
        self.lock().history.clone()
    }

    /// Reloads the dashboard list of the signed-in user.
    pub async fn refresh_history(&self) -> Result<Vec<SavedProjectMetadata>, PipelineError> {
        let user = self
            .auth
            .get_user()
            .await
            .map_err(|e| PipelineError::PersistenceFailure(format!("{:#}", e)))?;

        let projects = if user.is_logged_in {
            self.library.list(&user.id).await?
        } else {
            Vec::new()
        };

        self.lock().history = projects.clone();
        Ok(projects)
    }

    /// Starts a brand-new project from `prompt`.
    pub async fn generate(
        &self,
        prompt: &str,
        attachment: Option<ImagePayload>,
    ) -> Result<Outcome, PipelineError> {
        self.run_cycle(prompt, attachment, false).await
    }

    /// Applies `prompt` as a change to the active project. Without an active
    /// project this behaves like [`ProjectOrchestrator::generate`].
    pub async fn iterate(
        &self,
        prompt: &str,
        attachment: Option<ImagePayload>,
    ) -> Result<Outcome, PipelineError> {
        self.run_cycle(prompt, attachment, true).await
    }

    async fn run_cycle(
        &self,
        prompt: &str,
        attachment: Option<ImagePayload>,
        iterate: bool,
    ) -> Result<Outcome, PipelineError> {
        if prompt.trim().is_empty() {
            return Ok(Outcome::Ignored);
        }

        let Some(mut cycle) = self.begin_cycle() else {
            info!("Generation already in flight, ignoring request");
            return Ok(Outcome::Ignored);
        };
        let prior = if iterate { self.active_project() } else { None };

        let extracted = self.produce(prompt, prior.as_ref(), attachment).await;

        let mut document = match extracted {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "Generation failed");
                let mut session = self.lock();
                session.status = SessionStatus::Failed;
                session.last_error = Some(e.user_message());
                return Err(e);
            }
        };

        let mut history = prior
            .map(|p| p.metadata.prompt_history)
            .unwrap_or_default();
        history.push(prompt.to_string());
        document.metadata.prompt_history = history;

        info!(
            name = %document.metadata.name,
            files = document.files.len(),
            iteration = document.metadata.prompt_history.len() - 1,
            "Project generated"
        );

        let selected_path = self.install(document.clone());
        cycle.fallback = SessionStatus::Ready;

        // The in-memory project is already authoritative; saving only produces a notice.
        let notice = self.persist(&document).await;

        let project_id = {
            let mut session = self.lock();
            session.status = SessionStatus::Ready;
            match &notice {
                Some(Notice::Saved(meta)) => {
                    session.history.insert(0, meta.clone());
                    Some(meta.id.clone())
                }
                _ => None,
            }
        };

        Ok(Outcome::Ready(ReadyReport {
            project_id,
            selected_path,
            notice,
        }))
    }

    /// Replaces the active project with a saved snapshot.
    pub async fn load_project(&self, id: &str) -> Result<Outcome, PipelineError> {
        let Some(_cycle) = self.begin_cycle() else {
            return Ok(Outcome::Ignored);
        };

        let loaded = match self.library.get(id).await {
            Ok(Some(stored)) => Ok(stored),
            Ok(None) => Err(PipelineError::ProjectNotFound(id.to_string())),
            Err(e) => Err(e),
        };

        match loaded {
            Ok(stored) => {
                let selected_path = self.install(stored.document);
                self.lock().status = SessionStatus::Ready;
                info!(project_id = %id, "Project loaded");
                Ok(Outcome::Ready(ReadyReport {
                    project_id: Some(stored.id),
                    selected_path,
                    notice: None,
                }))
            }
            Err(e) => {
                warn!(project_id = %id, error = %e, "Failed to load project");
                let mut session = self.lock();
                session.status = SessionStatus::Idle;
                session.last_error = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Claims the session for one cycle, `None` while another cycle runs.
    fn begin_cycle(&self) -> Option<CycleGuard<'_>> {
        let mut session = self.lock();
        if session.status == SessionStatus::Generating {
            return None;
        }
        let fallback = session.status;
        session.status = SessionStatus::Generating;
        session.last_error = None;
        Some(CycleGuard {
            session: &self.session,
            fallback,
        })
    }

    async fn produce(
        &self,
        prompt: &str,
        prior: Option<&ProjectDocument>,
        attachment: Option<ImagePayload>,
    ) -> Result<ProjectDocument, PipelineError> {
        let prompt_text = self.compositor.compose(prompt, prior)?;
        let raw = self.aggregator.run(&prompt_text, attachment).await?;
        ResponseExtractor::extract(&raw)
    }

    /// Swaps in a new active document and re-resolves the selection.
    fn install(&self, document: ProjectDocument) -> Option<String> {
        let mut session = self.lock();
        let selected = resolve_selection(session.selected_path.as_deref(), &document);
        session.active = Some(document);
        session.selected_path = selected.clone();
        selected
    }

    async fn persist(&self, document: &ProjectDocument) -> Option<Notice> {
        let user = match self.auth.get_user().await {
            Ok(user) if user.is_logged_in => user,
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "Could not determine user, skipping save");
                return None;
            }
        };

        match self.library.save(document, &user.id).await {
            Ok(meta) => Some(Notice::Saved(meta)),
            Err(e) => {
                warn!(error = %e, "Failed to save project");
                Some(Notice::SaveFailed(e.to_string()))
            }
        }
    }
}

/// Releases the session if a cycle is dropped before it settles, e.g. when the
/// caller stops polling it. A settled cycle has already left `Generating`.
struct CycleGuard<'a> {
    session: &'a Mutex<Session>,
    fallback: SessionStatus,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if session.status == SessionStatus::Generating {
            warn!(status = ?self.fallback, "Cycle abandoned before completion");
            session.status = self.fallback;
        }
    }
}

/// Keeps the previous selection when it still exists, else falls back to the
/// default selection policy.
fn resolve_selection(previous: Option<&str>, document: &ProjectDocument) -> Option<String> {
    match previous {
        Some(path) if document.contains_path(path) => Some(path.to_string()),
        _ => default_selection(&document.files).map(str::to_string),
    }
}
