use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use promptcraft::config::Settings;

mod cli;

#[derive(Parser)]
#[command(name = "promptcraft")]
#[command(about = "Turn natural-language prompts into complete multi-file projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,

    #[arg(long, global = true, help = "Path to a YAML settings file (default: promptcraft.yml)")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Sign in locally so generated projects are saved")]
    Login,

    #[command(about = "Sign out")]
    Logout,

    #[command(about = "Show the signed-in user")]
    Whoami,

    #[command(about = "Generate a new project from a prompt")]
    Generate {
        #[arg(required = true, help = "What to build")]
        prompt: Vec<String>,

        #[arg(long, help = "Attach an image (mockup, sketch) to the request")]
        image: Option<PathBuf>,
    },

    #[command(about = "Apply a change request to a saved project")]
    Iterate {
        #[arg(help = "Id of the saved project")]
        id: String,

        #[arg(required = true, help = "The requested change")]
        prompt: Vec<String>,

        #[arg(long, help = "Attach an image to the request")]
        image: Option<PathBuf>,
    },

    #[command(about = "List saved projects, newest first")]
    List,

    #[command(about = "Show a saved project's metadata and file tree")]
    Show {
        id: String,

        #[arg(long, help = "Print the content of one file instead")]
        file: Option<String>,
    },

    #[command(about = "Render a saved project's preview page as text")]
    Preview { id: String },

    #[command(about = "Write a saved project's files to a directory")]
    Export {
        id: String,

        #[arg(long, help = "Target directory (default: current directory)")]
        out: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        eprintln!("Warning: failed to load .env file: {}", e);
    }

    init_tracing(cli.verbose);

    let config = cli::Config {
        verbose: cli.verbose,
    };
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Login => cli::login(settings, &config).await?,
        Commands::Logout => cli::logout(settings, &config).await?,
        Commands::Whoami => cli::whoami(settings, &config).await?,
        Commands::Generate { prompt, image } => {
            cli::generate(prompt, image, settings, &config).await?;
        }
        Commands::Iterate { id, prompt, image } => {
            cli::iterate(id, prompt, image, settings, &config).await?;
        }
        Commands::List => cli::list(settings, &config).await?,
        Commands::Show { id, file } => cli::show(id, file, settings, &config).await?,
        Commands::Preview { id } => cli::preview(id, settings, &config).await?,
        Commands::Export { id, out } => cli::export(id, out, settings, &config).await?,
    }

    Ok(())
}
