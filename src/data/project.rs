use serde::{Deserialize, Serialize};

/// Paths checked, in priority order, when looking for the standalone preview page.
const PREVIEW_PATHS: [&str; 3] = ["preview.html", "/preview.html", "index.html"];

/// A single generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub path: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProjectFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            description: None,
        }
    }
}

/// Technology choices grouped by tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechStack {
    #[serde(default)]
    pub frontend: Vec<String>,
    #[serde(default)]
    pub backend: Vec<String>,
    #[serde(default)]
    pub database: Vec<String>,
}

/// Descriptive metadata of a generated project.
///
/// `prompt_history` is append-only across iterations of one logical project and
/// starts over when a brand-new project is generated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub summary: String,
    /// Serialized as `architecture`, which is what the generator emits.
    #[serde(default, rename = "architecture", alias = "architectureNotes")]
    pub architecture_notes: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub tech_stack: TechStack,
    #[serde(default)]
    pub prompt_history: Vec<String>,
}

/// The structured result of one generation call.
///
/// A document is never patched in place: every iteration yields a new document
/// that replaces the previous one wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub metadata: ProjectMetadata,
    pub files: Vec<ProjectFile>,
}

impl ProjectDocument {
    pub fn file(&self, path: &str) -> Option<&ProjectFile> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.file(path).is_some()
    }

    /// File paths in document order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.path.as_str())
    }

    /// The standalone preview page, if the generator produced one.
    pub fn preview_file(&self) -> Option<&ProjectFile> {
        PREVIEW_PATHS.iter().find_map(|candidate| self.file(candidate))
    }
}

/// A full project snapshot as written under `project_<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProject {
    #[serde(flatten)]
    pub document: ProjectDocument,
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

/// Dashboard entry kept in the per-user project list, newest first.
///
/// Derived one way from [`ProjectMetadata`] at save time; it is never turned
/// back into full metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedProjectMetadata {
    pub id: String,
    pub name: String,
    pub summary: String,
    pub tech_stack: Vec<String>,
    pub created_at: i64,
}

/// The signed-in (or anonymous) user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub is_logged_in: bool,
}

impl User {
    pub fn anonymous() -> Self {
        Self {
            id: String::new(),
            username: String::new(),
            is_logged_in: false,
        }
    }
}
