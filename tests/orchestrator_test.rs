mod common;

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use common::{FixedAuth, MemoryStore, Reply, ScriptedAiClient, document_json, fenced_response};
use promptcraft::contexts::{Notice, Outcome, PipelineError, ProjectOrchestrator, SessionStatus};
use promptcraft::data::AuthProvider;

const SHOP_FILES: &[&str] = &["preview.html", "src/App.tsx", "backend/server.js", "README.md"];

fn orchestrator(
    client: Arc<ScriptedAiClient>,
    store: Arc<MemoryStore>,
    auth: Arc<dyn AuthProvider>,
) -> ProjectOrchestrator {
    ProjectOrchestrator::new(client, store, auth)
}

fn ready(outcome: Outcome) -> promptcraft::contexts::ReadyReport {
    match outcome {
        Outcome::Ready(report) => report,
        Outcome::Ignored => panic!("expected a ready outcome"),
    }
}

#[tokio::test]
async fn fresh_generation_installs_and_saves_the_project() {
    let client = ScriptedAiClient::new(vec![Reply::body(&fenced_response("Shop", SHOP_FILES))]);
    let store = MemoryStore::new();
    let orch = orchestrator(client.clone(), store.clone(), FixedAuth::signed_in("u1"));

    let report = ready(orch.generate("an online shop", None).await.unwrap());

    assert_eq!(orch.status(), SessionStatus::Ready);
    assert_eq!(report.selected_path.as_deref(), Some("src/App.tsx"));
    assert_eq!(orch.selected_path().as_deref(), Some("src/App.tsx"));

    let project = orch.active_project().unwrap();
    assert_eq!(project.metadata.name, "Shop");
    assert_eq!(project.metadata.prompt_history, vec!["an online shop".to_string()]);

    let Some(Notice::Saved(saved)) = report.notice else {
        panic!("expected the project to be saved");
    };
    assert_eq!(report.project_id.as_deref(), Some(saved.id.as_str()));
    assert_eq!(saved.tech_stack, vec!["React".to_string(), "Express".to_string()]);
    assert!(store.value(&format!("project_{}", saved.id)).is_some());
    assert_eq!(orch.history(), vec![saved]);

    let prompts = client.prompts();
    assert!(prompts[0].contains("Design and build a full-stack application for: an online shop"));
}

#[tokio::test]
async fn iteration_sends_context_and_extends_history() {
    let client = ScriptedAiClient::new(vec![
        Reply::body(&document_json("Shop", SHOP_FILES)),
        Reply::body(&document_json("Shop v2", &["preview.html", "src/App.tsx", "src/Cart.tsx"])),
    ]);
    let orch = orchestrator(client.clone(), MemoryStore::new(), FixedAuth::signed_in("u1"));

    orch.generate("an online shop", None).await.unwrap();
    orch.iterate("add a cart", None).await.unwrap();

    let prompt = &client.prompts()[1];
    assert!(prompt.contains("BASE PROJECT CONTEXT:\nName: Shop\nSummary: Shop summary"));
    assert!(prompt.contains("- src/App.tsx\n- backend/server.js\n- README.md"));
    assert!(prompt.contains("USER REQUEST FOR ITERATION: add a cart"));

    let project = orch.active_project().unwrap();
    assert_eq!(project.metadata.name, "Shop v2");
    assert_eq!(
        project.metadata.prompt_history,
        vec!["an online shop".to_string(), "add a cart".to_string()]
    );
    assert_eq!(orch.history().len(), 2);
}

#[tokio::test]
async fn generate_starts_a_new_history() {
    let client = ScriptedAiClient::new(vec![
        Reply::body(&document_json("Shop", SHOP_FILES)),
        Reply::body(&document_json("Shop", SHOP_FILES)),
        Reply::body(&document_json("Blog", &["index.html"])),
    ]);
    let orch = orchestrator(client.clone(), MemoryStore::new(), FixedAuth::anonymous());

    orch.generate("shop", None).await.unwrap();
    orch.iterate("dark mode", None).await.unwrap();
    orch.generate("a blog", None).await.unwrap();

    let project = orch.active_project().unwrap();
    assert_eq!(project.metadata.prompt_history, vec!["a blog".to_string()]);
    assert!(!client.prompts()[2].contains("BASE PROJECT CONTEXT"));
}

#[tokio::test]
async fn iterate_without_active_project_is_a_fresh_generation() {
    let client = ScriptedAiClient::new(vec![Reply::body(&document_json("Todo", &["App.jsx"]))]);
    let orch = orchestrator(client.clone(), MemoryStore::new(), FixedAuth::anonymous());

    let report = ready(orch.iterate("a todo app", None).await.unwrap());

    assert_eq!(report.selected_path.as_deref(), Some("App.jsx"));
    assert!(client.prompts()[0].contains("Design and build a full-stack application for: a todo app"));
    assert_eq!(
        orch.active_project().unwrap().metadata.prompt_history,
        vec!["a todo app".to_string()]
    );
}

#[tokio::test]
async fn selection_survives_iteration_when_the_file_still_exists() {
    let client = ScriptedAiClient::new(vec![
        Reply::body(&document_json("Shop", SHOP_FILES)),
        Reply::body(&document_json("Shop", SHOP_FILES)),
        Reply::body(&document_json("Shop", &["preview.html", "backend/server.js"])),
    ]);
    let orch = orchestrator(client, MemoryStore::new(), FixedAuth::anonymous());

    orch.generate("shop", None).await.unwrap();
    assert!(orch.select_file("README.md"));
    assert!(!orch.select_file("missing.txt"));

    orch.iterate("tweak copy", None).await.unwrap();
    assert_eq!(orch.selected_path().as_deref(), Some("README.md"));

    orch.iterate("drop the readme", None).await.unwrap();
    assert_eq!(orch.selected_path().as_deref(), Some("backend/server.js"));
    assert_eq!(orch.selected_file().unwrap().content, "// backend/server.js");
}

#[tokio::test]
async fn document_without_files_has_no_selection() {
    let client = ScriptedAiClient::new(vec![Reply::body(&document_json("Empty", &[]))]);
    let orch = orchestrator(client, MemoryStore::new(), FixedAuth::anonymous());

    let report = ready(orch.generate("nothing", None).await.unwrap());

    assert_eq!(report.selected_path, None);
    assert_eq!(orch.file_tree().unwrap().leaf_count(), 0);
}

#[tokio::test]
async fn failed_iteration_keeps_the_previous_project() {
    let client = ScriptedAiClient::new(vec![
        Reply::body(&document_json("Shop", SHOP_FILES)),
        Reply::body("I am sorry, I cannot help with that."),
    ]);
    let orch = orchestrator(client, MemoryStore::new(), FixedAuth::anonymous());

    orch.generate("shop", None).await.unwrap();
    orch.select_file("README.md");
    let before = orch.active_project();

    let err = orch.iterate("break it", None).await.unwrap_err();

    assert!(matches!(err, PipelineError::MalformedResponse));
    assert_eq!(orch.status(), SessionStatus::Failed);
    assert_eq!(orch.active_project(), before);
    assert_eq!(orch.selected_path().as_deref(), Some("README.md"));
    assert_eq!(
        orch.last_error().as_deref(),
        Some("AI Service Failed: Response contains no structured document boundaries")
    );
}

#[tokio::test]
async fn truncated_response_reports_a_parse_error() {
    let full = document_json("Shop", SHOP_FILES);
    let truncated = format!("{}}}", &full[..full.len() / 2]);
    let client = ScriptedAiClient::new(vec![Reply::body(&truncated)]);
    let orch = orchestrator(client, MemoryStore::new(), FixedAuth::anonymous());

    let err = orch.generate("shop", None).await.unwrap_err();

    assert!(matches!(err, PipelineError::ParseError { .. }));
    assert_eq!(orch.active_project(), None);
    assert_eq!(
        orch.last_error().as_deref(),
        Some("The AI generated a response that was too large or incomplete. Please try a simpler request.")
    );
}

#[tokio::test]
async fn next_cycle_clears_the_previous_error() {
    let client = ScriptedAiClient::new(vec![
        Reply::Fail("503 Service Unavailable".to_string()),
        Reply::body(&document_json("Shop", SHOP_FILES)),
    ]);
    let orch = orchestrator(client, MemoryStore::new(), FixedAuth::anonymous());

    assert!(orch.generate("shop", None).await.is_err());
    assert!(orch.last_error().is_some());

    orch.generate("shop", None).await.unwrap();
    assert_eq!(orch.last_error(), None);
    assert_eq!(orch.status(), SessionStatus::Ready);
}

#[tokio::test]
async fn blank_prompt_is_ignored() {
    let client = ScriptedAiClient::new(vec![]);
    let orch = orchestrator(client.clone(), MemoryStore::new(), FixedAuth::anonymous());

    assert_eq!(orch.generate("   \n", None).await.unwrap(), Outcome::Ignored);
    assert_eq!(orch.iterate("", None).await.unwrap(), Outcome::Ignored);

    assert!(client.calls().is_empty());
    assert_eq!(orch.status(), SessionStatus::Idle);
}

#[tokio::test]
async fn request_during_a_running_cycle_is_ignored() {
    let gate = Arc::new(Notify::new());
    let client = ScriptedAiClient::new(vec![Reply::Gated(
        gate.clone(),
        Box::new(Reply::body(&document_json("Shop", SHOP_FILES))),
    )]);
    let orch = orchestrator(client.clone(), MemoryStore::new(), FixedAuth::anonymous());

    let (first, (second, load)) = tokio::join!(orch.generate("shop", None), async {
        assert_eq!(orch.status(), SessionStatus::Generating);
        let second = orch.iterate("and a blog", None).await;
        let load = orch.load_project("some-id").await;
        gate.notify_one();
        (second, load)
    });

    assert!(matches!(first.unwrap(), Outcome::Ready(_)));
    assert_eq!(second.unwrap(), Outcome::Ignored);
    assert_eq!(load.unwrap(), Outcome::Ignored);
    assert_eq!(client.calls().len(), 1);
    assert_eq!(orch.status(), SessionStatus::Ready);
}

#[tokio::test]
async fn save_failure_is_a_notice_not_an_error() {
    let client = ScriptedAiClient::new(vec![Reply::body(&document_json("Shop", SHOP_FILES))]);
    let store = MemoryStore::new();
    store.fail_writes(true);
    let orch = orchestrator(client, store.clone(), FixedAuth::signed_in("u1"));

    let report = ready(orch.generate("shop", None).await.unwrap());

    assert!(matches!(report.notice, Some(Notice::SaveFailed(_))));
    assert_eq!(report.project_id, None);
    assert_eq!(orch.status(), SessionStatus::Ready);
    assert!(orch.active_project().is_some());
    assert!(orch.history().is_empty());
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn anonymous_sessions_are_not_saved() {
    let client = ScriptedAiClient::new(vec![Reply::body(&document_json("Shop", SHOP_FILES))]);
    let store = MemoryStore::new();
    let orch = orchestrator(client, store.clone(), FixedAuth::anonymous());

    let report = ready(orch.generate("shop", None).await.unwrap());

    assert_eq!(report.notice, None);
    assert_eq!(report.project_id, None);
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn saved_project_can_be_loaded_in_a_new_session() {
    let store = MemoryStore::new();
    let auth = FixedAuth::signed_in("u1");
    let first = orchestrator(
        ScriptedAiClient::new(vec![Reply::body(&document_json("Shop", SHOP_FILES))]),
        store.clone(),
        auth.clone(),
    );
    let id = ready(first.generate("shop", None).await.unwrap())
        .project_id
        .unwrap();

    let second = orchestrator(ScriptedAiClient::new(vec![]), store, auth);
    let report = ready(second.load_project(&id).await.unwrap());

    assert_eq!(report.project_id.as_deref(), Some(id.as_str()));
    assert_eq!(report.selected_path.as_deref(), Some("src/App.tsx"));
    assert_eq!(second.active_project(), first.active_project());
    assert_eq!(second.status(), SessionStatus::Ready);

    let history = second.refresh_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, id);
}

#[tokio::test]
async fn loading_an_unknown_project_returns_to_idle() {
    let orch = orchestrator(ScriptedAiClient::new(vec![]), MemoryStore::new(), FixedAuth::anonymous());

    let err = orch.load_project("does-not-exist").await.unwrap_err();

    assert!(matches!(err, PipelineError::ProjectNotFound(ref id) if id == "does-not-exist"));
    assert_eq!(orch.status(), SessionStatus::Idle);
    assert_eq!(orch.active_project(), None);
    assert_eq!(orch.last_error().as_deref(), Some("Failed to load project."));
}

#[tokio::test]
async fn failed_load_keeps_the_active_project() {
    let store = MemoryStore::new();
    store.insert("project_broken", serde_json::json!({ "files": "nope" }));
    let client = ScriptedAiClient::new(vec![Reply::body(&document_json("Shop", SHOP_FILES))]);
    let orch = orchestrator(client, store, FixedAuth::anonymous());

    orch.generate("shop", None).await.unwrap();
    let err = orch.load_project("broken").await.unwrap_err();

    assert!(matches!(err, PipelineError::SchemaViolation(_)));
    assert_eq!(orch.status(), SessionStatus::Idle);
    assert_eq!(orch.active_project().unwrap().metadata.name, "Shop");
}

#[tokio::test(start_paused = true)]
async fn abandoned_cycle_releases_the_session() {
    let client = ScriptedAiClient::new(vec![
        Reply::Hang,
        Reply::body(&document_json("Shop", SHOP_FILES)),
    ]);
    let orch = orchestrator(client.clone(), MemoryStore::new(), FixedAuth::anonymous());

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), orch.generate("shop", None)).await;

    assert!(abandoned.is_err());
    assert_eq!(orch.status(), SessionStatus::Idle);

    let report = ready(orch.generate("shop again", None).await.unwrap());
    assert_eq!(report.selected_path.as_deref(), Some("src/App.tsx"));
    assert_eq!(client.calls().len(), 2);
    assert_eq!(orch.status(), SessionStatus::Ready);
}

#[tokio::test(start_paused = true)]
async fn abandoned_iteration_keeps_the_ready_project() {
    let client = ScriptedAiClient::new(vec![
        Reply::body(&document_json("Shop", SHOP_FILES)),
        Reply::Hang,
    ]);
    let orch = orchestrator(client.clone(), MemoryStore::new(), FixedAuth::anonymous());
    orch.generate("shop", None).await.unwrap();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), orch.iterate("add a cart", None)).await;

    assert!(abandoned.is_err());
    assert_eq!(orch.status(), SessionStatus::Ready);
    assert_eq!(orch.active_project().unwrap().metadata.name, "Shop");
    assert_eq!(orch.last_error(), None);
}
