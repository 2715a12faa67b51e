use chrono::{Local, TimeZone};

use super::Config;
use promptcraft::contexts::{Notice, Outcome, ProjectOrchestrator, TreeNode};
use promptcraft::data::{ProjectMetadata, SavedProjectMetadata, StoredProject};

fn rule() {
    println!("{}", "=".repeat(60));
}

fn format_millis(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn print_metadata(metadata: &ProjectMetadata) {
    println!("Name:         {}", metadata.name);
    println!("Summary:      {}", metadata.summary);
    if !metadata.architecture_notes.is_empty() {
        println!("Architecture: {}", metadata.architecture_notes);
    }
    if !metadata.roles.is_empty() {
        println!("Roles:        {}", metadata.roles.join(", "));
    }

    let stack = &metadata.tech_stack;
    for (tier, entries) in [
        ("Frontend", &stack.frontend),
        ("Backend", &stack.backend),
        ("Database", &stack.database),
    ] {
        if !entries.is_empty() {
            println!("{:<13} {}", format!("{}:", tier), entries.join(", "));
        }
    }
}

fn print_history(history: &[String]) {
    println!("Prompt history:");
    for (i, prompt) in history.iter().enumerate() {
        println!("  {}. {}", i + 1, prompt);
    }
}

/// Result of a generate or iterate run.
pub fn print_outcome(orchestrator: &ProjectOrchestrator, outcome: &Outcome, config: &Config) {
    let report = match outcome {
        Outcome::Ignored => {
            println!("Nothing to do: the prompt is empty");
            return;
        }
        Outcome::Ready(report) => report,
    };
    let Some(project) = orchestrator.active_project() else {
        return;
    };

    println!();
    rule();
    print_metadata(&project.metadata);
    println!("Files:        {}", project.files.len());
    if let Some(path) = &report.selected_path {
        println!("Selected:     {}", path);
    }
    if let Some(id) = &report.project_id {
        println!("Project id:   {}", id);
    }
    rule();

    if config.verbose {
        if let Some(tree) = orchestrator.file_tree() {
            println!("{}", tree.render());
        }
        print_history(&project.metadata.prompt_history);
    }

    if let Some(notice) = &report.notice {
        match notice {
            Notice::Saved(_) => println!("✓ {}", notice.message()),
            Notice::SaveFailed(reason) => eprintln!("✗ {}: {}", notice.message(), reason),
        }
    }
}

pub fn print_saved_projects(projects: &[SavedProjectMetadata]) {
    for project in projects {
        println!("{}  {}", project.id, format_millis(project.created_at));
        println!("    {}", project.name);
        if !project.summary.is_empty() {
            println!("    {}", project.summary);
        }
        if !project.tech_stack.is_empty() {
            println!("    [{}]", project.tech_stack.join(", "));
        }
    }
    println!("\n{} project(s)", projects.len());
}

pub fn print_project(stored: &StoredProject, tree: &TreeNode) {
    rule();
    println!("Project id:   {}", stored.id);
    println!("Created:      {}", format_millis(stored.created_at));
    print_metadata(&stored.document.metadata);
    rule();
    print_history(&stored.document.metadata.prompt_history);
    println!("\nFiles ({}):", tree.leaf_count());
    println!("{}", tree.render());
}
