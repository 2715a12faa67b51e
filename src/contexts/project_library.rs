use std::sync::Arc;
use tracing::debug;

use super::error::PipelineError;
use crate::data::{PersistenceGateway, ProjectDocument, SavedProjectMetadata, StoredProject};

fn project_key(id: &str) -> String {
    format!("project_{}", id)
}

fn projects_key(user_id: &str) -> String {
    format!("projects_{}", user_id)
}

/// Saved projects on top of a [`PersistenceGateway`].
///
/// Keys:
/// - `project_<id>`: full document plus `id` and `createdAt`
/// - `projects_<userId>`: the user's dashboard list, newest first, grown by prepending
#[derive(Clone)]
pub struct ProjectLibrary {
    gateway: Arc<dyn PersistenceGateway>,
}

impl ProjectLibrary {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Stores a snapshot under a fresh id and prepends it to the user's list.
    pub async fn save(
        &self,
        document: &ProjectDocument,
        user_id: &str,
    ) -> Result<SavedProjectMetadata, PipelineError> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().timestamp_millis();

        let tech_stack = document
            .metadata
            .tech_stack
            .frontend
            .iter()
            .chain(document.metadata.tech_stack.backend.iter())
            .cloned()
            .collect();

        let summary = SavedProjectMetadata {
            id: id.clone(),
            name: document.metadata.name.clone(),
            summary: document.metadata.summary.clone(),
            tech_stack,
            created_at,
        };

        let stored = StoredProject {
            document: document.clone(),
            id: id.clone(),
            created_at,
        };
        let stored = serde_json::to_value(&stored)
            .map_err(|e| PipelineError::PersistenceFailure(e.to_string()))?;
        self.gateway
            .set(&project_key(&id), stored)
            .await
            .map_err(persistence_failure)?;

        let mut list = self.list(user_id).await?;
        list.insert(0, summary.clone());
        let list = serde_json::to_value(&list)
            .map_err(|e| PipelineError::PersistenceFailure(e.to_string()))?;
        self.gateway
            .set(&projects_key(user_id), list)
            .await
            .map_err(persistence_failure)?;

        debug!(project_id = %id, user_id = %user_id, "Saved project");
        Ok(summary)
    }

    /// The user's saved projects, newest first.
    pub async fn list(&self, user_id: &str) -> Result<Vec<SavedProjectMetadata>, PipelineError> {
        let key = projects_key(user_id);
        match self.gateway.get(&key).await.map_err(persistence_failure)? {
            None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(|e| {
                PipelineError::PersistenceFailure(format!("Invalid project list '{}': {}", key, e))
            }),
        }
    }

    /// Loads one saved project, `None` when the id is unknown.
    pub async fn get(&self, id: &str) -> Result<Option<StoredProject>, PipelineError> {
        match self.gateway.get(&project_key(id)).await.map_err(persistence_failure)? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| PipelineError::SchemaViolation(e.to_string())),
        }
    }
}

fn persistence_failure(e: anyhow::Error) -> PipelineError {
    PipelineError::PersistenceFailure(format!("{:#}", e))
}
