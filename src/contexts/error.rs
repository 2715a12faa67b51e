use std::fmt;
use std::time::Duration;

/// Failures of a generate, iterate or load cycle.
///
/// None of these are fatal: the session stays usable and the next user action
/// starts a fresh cycle.
#[derive(Debug)]
pub enum PipelineError {
    /// The backend did not hand back a stream before the deadline.
    TransportTimeout(Duration),
    /// The backend call or the stream itself failed.
    TransportFailure(anyhow::Error),
    /// The stream completed without any text.
    EmptyResponse,
    /// No `{` ... `}` span was found in the response.
    MalformedResponse,
    /// The isolated span is not valid JSON. Carries the last characters of the span.
    ParseError { tail: String },
    /// The JSON does not have the shape of a project document.
    SchemaViolation(String),
    ProjectNotFound(String),
    PersistenceFailure(String),
    /// The request text could not be composed from the prompt templates.
    Composition(TemplateError),
}

impl PipelineError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::ParseError { .. } => "The AI generated a response that was too large or incomplete. Please try a simpler request.".to_string(),
            PipelineError::ProjectNotFound(_) => "Failed to load project.".to_string(),
            other => format!("AI Service Failed: {}", other),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PipelineError::TransportTimeout(deadline) => {
                write!(f, "Connection timed out after {} ms", deadline.as_millis())
            }
            PipelineError::TransportFailure(cause) => {
                write!(f, "Transport failure: {:#}", cause)
            }
            PipelineError::EmptyResponse => write!(f, "No content generated from API"),
            PipelineError::MalformedResponse => {
                write!(f, "Response contains no structured document boundaries")
            }
            PipelineError::ParseError { tail } => {
                write!(f, "Response could not be parsed, content might be truncated (ends with: {})", tail)
            }
            PipelineError::SchemaViolation(details) => {
                write!(f, "Response does not describe a project: {}", details)
            }
            PipelineError::ProjectNotFound(id) => write!(f, "Project '{}' not found", id),
            PipelineError::PersistenceFailure(details) => {
                write!(f, "Persistence failure: {}", details)
            }
            PipelineError::Composition(e) => write!(f, "Prompt composition failed: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::TransportFailure(cause) => Some(&**cause),
            PipelineError::Composition(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors raised while populating a prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    MissingMandatoryPlaceholder(String),
    InvalidPlaceholderPath(String),
    /// The composition input could not be turned into a template value.
    InvalidInput(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TemplateError::MissingMandatoryPlaceholder(ph) => {
                write!(f, "Required placeholder '{}' could not be resolved", ph)
            }
            TemplateError::InvalidPlaceholderPath(path) => {
                write!(f, "Invalid path '{}' in placeholder", path)
            }
            TemplateError::InvalidInput(details) => {
                write!(f, "Invalid template input: {}", details)
            }
        }
    }
}

impl std::error::Error for TemplateError {}

impl From<TemplateError> for PipelineError {
    fn from(e: TemplateError) -> Self {
        PipelineError::Composition(e)
    }
}
