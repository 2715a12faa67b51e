use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod report;

use promptcraft::clients::{GeminiClient, LocalAuthProvider};
use promptcraft::config::{self, Settings};
use promptcraft::contexts::{
    FileStore, FileTreeBuilder, PipelineError, ProjectLibrary, ProjectOrchestrator,
    PromptCompositor, StreamAggregator, packaging,
};
use promptcraft::data::{AuthProvider, ImagePayload, StoredProject, User};
use report::{print_outcome, print_project, print_saved_projects};

#[derive(Clone, Copy)]
pub struct Config {
    pub verbose: bool,
}

const PREVIEW_WIDTH: usize = 100;

/// Store and auth shared by every command.
struct Workspace {
    settings: Settings,
    store: Arc<FileStore>,
    auth: Arc<LocalAuthProvider>,
}

impl Workspace {
    fn open(settings: Settings) -> Self {
        let store = Arc::new(FileStore::new(Some(settings.store_dir.clone())));
        let auth = Arc::new(LocalAuthProvider::new(
            store.clone(),
            config::local_username(),
        ));
        Self {
            settings,
            store,
            auth,
        }
    }

    fn library(&self) -> ProjectLibrary {
        ProjectLibrary::new(self.store.clone())
    }

    fn orchestrator(&self) -> Result<ProjectOrchestrator> {
        let client = Arc::new(GeminiClient::new(
            config::api_key()?,
            self.settings.api_base_url.clone(),
        )?);

        let compositor = match &self.settings.system_contract {
            Some(contract) => PromptCompositor::new(contract.clone()),
            None => PromptCompositor::default(),
        };
        let aggregator = StreamAggregator::new(client.clone(), self.settings.model.clone());

        Ok(
            ProjectOrchestrator::new(client, self.store.clone(), self.auth.clone())
                .with_compositor(compositor)
                .with_aggregator(aggregator),
        )
    }

    async fn current_user(&self) -> Result<User> {
        self.auth.get_user().await.context("Failed to read session")
    }

    async fn stored_project(&self, id: &str) -> Result<StoredProject> {
        let stored = self
            .library()
            .get(id)
            .await?
            .ok_or_else(|| PipelineError::ProjectNotFound(id.to_string()))?;
        Ok(stored)
    }
}

pub async fn login(settings: Settings, _config: &Config) -> Result<()> {
    let workspace = Workspace::open(settings);
    let user = workspace.auth.sign_in().await.context("Failed to sign in")?;
    println!("✓ Signed in as {} ({})", user.username, user.id);
    Ok(())
}

pub async fn logout(settings: Settings, _config: &Config) -> Result<()> {
    let workspace = Workspace::open(settings);
    workspace.auth.sign_out().await.context("Failed to sign out")?;
    println!("✓ Signed out");
    Ok(())
}

pub async fn whoami(settings: Settings, config: &Config) -> Result<()> {
    let workspace = Workspace::open(settings);
    let user = workspace.current_user().await?;
    if user.is_logged_in {
        println!("{} ({})", user.username, user.id);
    } else {
        println!("Not signed in. Run `promptcraft login` to save generated projects.");
    }
    if config.verbose {
        println!("Store: {}", workspace.store.folder().display());
    }
    Ok(())
}

pub async fn generate(
    prompt: Vec<String>,
    image: Option<PathBuf>,
    settings: Settings,
    config: &Config,
) -> Result<()> {
    let workspace = Workspace::open(settings);
    let orchestrator = workspace.orchestrator()?;
    let attachment = load_attachment(image.as_deref())?;

    warn_if_anonymous(&workspace).await?;
    println!("Generating project with {}...", orchestrator.model());

    let outcome = orchestrator
        .generate(&prompt.join(" "), attachment)
        .await
        .map_err(describe_failure)?;

    print_outcome(&orchestrator, &outcome, config);
    Ok(())
}

pub async fn iterate(
    id: String,
    prompt: Vec<String>,
    image: Option<PathBuf>,
    settings: Settings,
    config: &Config,
) -> Result<()> {
    let workspace = Workspace::open(settings);
    let orchestrator = workspace.orchestrator()?;
    let attachment = load_attachment(image.as_deref())?;

    orchestrator
        .load_project(&id)
        .await
        .map_err(describe_failure)?;
    if config.verbose
        && let Some(project) = orchestrator.active_project()
    {
        println!(
            "Loaded '{}' ({} file(s), {} prior prompt(s))",
            project.metadata.name,
            project.files.len(),
            project.metadata.prompt_history.len()
        );
    }

    warn_if_anonymous(&workspace).await?;
    println!("Iterating on project {}...", id);

    let outcome = orchestrator
        .iterate(&prompt.join(" "), attachment)
        .await
        .map_err(describe_failure)?;

    print_outcome(&orchestrator, &outcome, config);
    Ok(())
}

pub async fn list(settings: Settings, _config: &Config) -> Result<()> {
    let workspace = Workspace::open(settings);
    let user = workspace.current_user().await?;
    if !user.is_logged_in {
        println!("Not signed in. Run `promptcraft login` first.");
        return Ok(());
    }

    let projects = workspace.library().list(&user.id).await?;
    if projects.is_empty() {
        println!("No saved projects yet");
        return Ok(());
    }

    print_saved_projects(&projects);
    Ok(())
}

pub async fn show(
    id: String,
    file: Option<String>,
    settings: Settings,
    _config: &Config,
) -> Result<()> {
    let workspace = Workspace::open(settings);
    let stored = workspace.stored_project(&id).await?;

    match file {
        Some(path) => {
            let file = stored
                .document
                .file(&path)
                .with_context(|| format!("Project {} has no file '{}'", id, path))?;
            if let Some(description) = &file.description {
                println!("// {}", description);
            }
            println!("{}", file.content);
        }
        None => {
            let tree = FileTreeBuilder::build(&stored.document.files);
            print_project(&stored, &tree);
        }
    }
    Ok(())
}

pub async fn preview(id: String, settings: Settings, _config: &Config) -> Result<()> {
    let workspace = Workspace::open(settings);
    let stored = workspace.stored_project(&id).await?;

    let Some(page) = stored.document.preview_file() else {
        println!("Project {} has no preview page", id);
        return Ok(());
    };

    let text = html2text::from_read(page.content.as_bytes(), PREVIEW_WIDTH)
        .map_err(|e| anyhow::anyhow!("Failed to render {}: {}", page.path, e))?;
    println!("{}", text);
    Ok(())
}

pub async fn export(
    id: String,
    out: Option<PathBuf>,
    settings: Settings,
    config: &Config,
) -> Result<()> {
    let workspace = Workspace::open(settings);
    let stored = workspace.stored_project(&id).await?;
    let out = out.unwrap_or_else(|| PathBuf::from("."));

    let root = packaging::export_to_dir(&stored.document, &out).await?;
    if config.verbose {
        for (entry, _) in packaging::archive_entries(&stored.document) {
            println!("  {}", entry);
        }
    }
    println!(
        "✓ Exported {} file(s) to {}",
        stored.document.files.len(),
        root.display()
    );
    Ok(())
}

/// A `data:` URI is attached as is, anything else is read as an image file.
fn load_attachment(image: Option<&Path>) -> Result<Option<ImagePayload>> {
    image
        .map(|path| match path.to_str() {
            Some(uri) if uri.starts_with("data:") => Ok(ImagePayload::from_data_uri(uri)),
            _ => ImagePayload::from_file(path)
                .with_context(|| format!("Failed to attach image {}", path.display())),
        })
        .transpose()
}

async fn warn_if_anonymous(workspace: &Workspace) -> Result<()> {
    if !workspace.current_user().await?.is_logged_in {
        println!("Not signed in: the result will not be saved to your dashboard.");
    }
    Ok(())
}

fn describe_failure(e: PipelineError) -> anyhow::Error {
    let message = e.user_message();
    anyhow::Error::new(e).context(message)
}
