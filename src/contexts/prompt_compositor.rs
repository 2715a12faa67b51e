use serde::Serialize;

use super::error::TemplateError;
use crate::data::ProjectDocument;

/// The fixed generation contract sent ahead of every request.
pub const SYSTEM_CONTRACT: &str = "You are an elite AI Software Architect.
Your task is to generate COMPLETE, PRODUCTION-READY FULL-STACK APPLICATIONS.
You must return a strictly valid JSON object.

Follow these rules:
1. Architecture: Use MVC for backend, component-based for frontend.
2. Code Quality: Clean, scalable, proper error handling, no placeholders.
3. Tech Stack: React (Tailwind), Node.js (Express), MongoDB (Mongoose), JWT Auth.
4. Completeness: Every file needed to run the app must be included in the 'files' array.
5. PREVIEW FILE: You MUST include a file named 'preview.html' at the root. It is a fully functional single-page simulation of the app.
   - It must use Tailwind CSS via CDN.
   - It must include a <script> block with vanilla JS that simulates the backend.
   - State lives in in-memory arrays; add, edit and delete actions update that state and re-render immediately.
   - All navigation links switch views, modals open and close, forms validate and submit, and toasts confirm success.
   - Seed the state with 20+ realistic mock items.
6. VISUALS: Use high-quality placeholders and an image-rich, polished design.

The output MUST be a JSON object with:
- metadata: { name, summary, architecture, roles: [], techStack: { frontend: [], backend: [], database: [] } }
- files: [ { path, content, description } ]";

const FRESH_TEMPLATE: &str = "{{input.contract}}

User Request: Design and build a full-stack application for: {{input.user_prompt}}
Ensure you include at least:
- A standalone 'preview.html' for visual demonstration (MANDATORY).
- Frontend source (App.tsx, components, services, hooks)
- Backend source (server.js, models, controllers, routes, auth middleware)
- Configuration (.env example, package.json hints)
- Database schemas using Mongoose.
- 20+ mock items in data displays.
- A preview.html that is fully functional with mock CRUD.

IMPORTANT: RETURN ONLY THE RAW JSON OBJECT. NO MARKDOWN BLOCK, NO EXPLANATION.";

const ITERATION_TEMPLATE: &str = "{{input.contract}}

BASE PROJECT CONTEXT:
Name: {{input.project.name}}
Summary: {{input.project.summary}}
Architecture: {{input.project.architecture}}

EXISTING FILES MAP (path):
{{input.file_paths}}

The user wants to ITERATE on this EXACT project. Do NOT regenerate a random new one.
Maintain the file structure above and apply only the following change.

USER REQUEST FOR ITERATION: {{input.user_prompt}}

IMPORTANT: RETURN ONLY THE RAW JSON OBJECT WITH THE COMPLETE FILE SET. NO MARKDOWN BLOCK, NO EXPLANATION.";

#[derive(Serialize)]
struct ProjectContext<'a> {
    name: &'a str,
    summary: &'a str,
    architecture: &'a str,
}

#[derive(Serialize)]
struct CompositionInput<'a> {
    contract: &'a str,
    user_prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<ProjectContext<'a>>,
    file_paths: String,
}

/// Builds the request text for a fresh generation or an iteration.
#[derive(Debug, Clone)]
pub struct PromptCompositor {
    contract: String,
}

impl Default for PromptCompositor {
    fn default() -> Self {
        Self::new(SYSTEM_CONTRACT)
    }
}

impl PromptCompositor {
    pub fn new(contract: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
        }
    }

    /// Composes the request text. Pure: identical inputs give byte-identical output.
    pub fn compose(
        &self,
        user_prompt: &str,
        prior: Option<&ProjectDocument>,
    ) -> Result<String, TemplateError> {
        let (template, project, file_paths) = match prior {
            None => (FRESH_TEMPLATE, None, String::new()),
            Some(document) => (
                ITERATION_TEMPLATE,
                Some(ProjectContext {
                    name: &document.metadata.name,
                    summary: &document.metadata.summary,
                    architecture: &document.metadata.architecture_notes,
                }),
                document
                    .paths()
                    .map(|p| format!("- {}", p))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
        };

        let input = CompositionInput {
            contract: &self.contract,
            user_prompt,
            project,
            file_paths,
        };
        let input = serde_json::to_value(&input)
            .map_err(|e| TemplateError::InvalidInput(e.to_string()))?;

        render_template(template, &input)
    }
}

/// Replaces `{{input.path}}` placeholders with values from `input`.
///
/// Supports:
/// - Mandatory: {{input.prop_name}}
/// - Optional: {{input.prop_name?}}
/// - Nested: {{input.prop1.prop2}}
///
/// Substituted text is never rescanned, so values containing braces pass through untouched.
pub fn render_template(template: &str, input: &serde_json::Value) -> Result<String, TemplateError> {
    let mut result = template.to_string();
    let mut offset = 0;

    while let Some(start) = result[offset..].find("{{") {
        let start = offset + start;
        let Some(end_pos) = result[start..].find("}}") else {
            break;
        };
        let end = start + end_pos;

        let placeholder = &result[start + 2..end];
        let (path, is_optional) = match placeholder.strip_suffix('?') {
            Some(path) => (path, true),
            None => (placeholder, false),
        };

        match resolve_path(input, path)? {
            Some(value) => {
                let replacement = match value {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                result.replace_range(start..end + 2, &replacement);
                offset = start + replacement.len();
            }
            None if is_optional => {
                result.replace_range(start..end + 2, "");
                offset = start;
            }
            None => return Err(TemplateError::MissingMandatoryPlaceholder(path.to_string())),
        }
    }

    Ok(result)
}

fn resolve_path<'a>(
    value: &'a serde_json::Value,
    path: &str,
) -> Result<Option<&'a serde_json::Value>, TemplateError> {
    let mut parts = path.split('.');
    if parts.next() != Some("input") {
        return Err(TemplateError::InvalidPlaceholderPath(path.to_string()));
    }

    let mut current = value;
    for part in parts {
        match current.get(part) {
            Some(v) => current = v,
            None => return Ok(None),
        }
    }

    Ok(Some(current))
}
