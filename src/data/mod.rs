mod gateway;
mod project;

pub use gateway::{
    AiClient, AuthProvider, ChatOptions, Fragment, FragmentStream, ImagePayload,
    PersistenceGateway, PromptPayload,
};
pub use project::{
    ProjectDocument, ProjectFile, ProjectMetadata, SavedProjectMetadata, StoredProject,
    TechStack, User,
};
