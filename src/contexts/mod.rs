mod error;
mod file_store;
mod file_tree;
mod project_library;
mod project_orchestrator;
mod prompt_compositor;
mod response_extractor;
mod stream_aggregator;

pub mod packaging;

pub use error::{PipelineError, TemplateError};
pub use file_store::FileStore;
pub use file_tree::{ENTRY_POINT_MARKERS, FileTreeBuilder, TreeNode, default_selection};
pub use project_library::ProjectLibrary;
pub use project_orchestrator::{Notice, Outcome, ProjectOrchestrator, ReadyReport, SessionStatus};
pub use prompt_compositor::{PromptCompositor, SYSTEM_CONTRACT, render_template};
pub use stream_aggregator::{DEFAULT_MODEL, GENERATION_DEADLINE, StreamAggregator};
pub use response_extractor::ResponseExtractor;
