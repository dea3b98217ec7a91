mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    checkpoint::CheckpointSubcommand, config::ConfigSubcommand, file::FileSubcommand,
    hook::HookSubcommand, research::ResearchSubcommand, scope::ScopeSubcommand,
    session::SessionSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "phasegate",
    about = "Interview-driven phase gates for API and UI workflows",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .phasegate/ or .git/)
    #[arg(long, global = true, env = "PHASEGATE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize .phasegate/ in the current project
    Init,

    /// Start a workflow and make it active
    Start {
        name: String,
        /// Workflow kind: api, combine, ui-component, ui-page
        #[arg(long, default_value = "api")]
        kind: String,
    },

    /// Make an existing workflow the active one
    Use { name: String },

    /// Show a workflow's phases, decisions and scope coverage
    Status {
        /// Workflow name (default: active workflow)
        name: Option<String>,
    },

    /// Evaluate whether an action may proceed
    Gate {
        /// Target path of the action
        #[arg(long)]
        path: Option<String>,
        /// Action kind: write, edit, read, ask_user, web_search, ...
        #[arg(long, default_value = "write")]
        action: String,
        /// Workflow to evaluate against (default: active workflow)
        #[arg(long)]
        workflow: Option<String>,
    },

    /// Drive a phase's checkpoint protocol
    Checkpoint {
        /// Workflow name (default: active workflow)
        #[arg(long, short = 'w', global = true)]
        workflow: Option<String>,
        #[command(subcommand)]
        subcommand: CheckpointSubcommand,
    },

    /// Record and inspect scope decisions
    Scope {
        #[arg(long, short = 'w', global = true)]
        workflow: Option<String>,
        #[command(subcommand)]
        subcommand: ScopeSubcommand,
    },

    /// Record research sources
    Research {
        #[arg(long, short = 'w', global = true)]
        workflow: Option<String>,
        #[command(subcommand)]
        subcommand: ResearchSubcommand,
    },

    /// Track files created or modified by the workflow
    File {
        #[arg(long, short = 'w', global = true)]
        workflow: Option<String>,
        #[command(subcommand)]
        subcommand: FileSubcommand,
    },

    /// Generate examples and test cases from a request schema
    Generate {
        /// Schema file: .json, .yaml/.yml, or Zod source (.ts/.js)
        #[arg(long)]
        schema: PathBuf,
        /// Endpoint path appended to the API prefix (default: schema file stem)
        #[arg(long)]
        endpoint: Option<String>,
        /// HTTP method
        #[arg(long, default_value = "POST")]
        method: String,
    },

    /// Host hook transport: JSON on stdin, JSON on stdout
    Hook {
        #[command(subcommand)]
        subcommand: HookSubcommand,
    },

    /// Session start/end bookkeeping
    Session {
        #[command(subcommand)]
        subcommand: SessionSubcommand,
    },

    /// Validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Start { name, kind } => cmd::workflow::start(&root, &name, &kind, cli.json),
        Commands::Use { name } => cmd::workflow::use_workflow(&root, &name, cli.json),
        Commands::Status { name } => cmd::status::run(&root, name.as_deref(), cli.json),
        Commands::Gate {
            path,
            action,
            workflow,
        } => cmd::gate::run(
            &root,
            path.as_deref(),
            &action,
            workflow.as_deref(),
            cli.json,
        ),
        Commands::Checkpoint {
            workflow,
            subcommand,
        } => cmd::checkpoint::run(&root, workflow.as_deref(), subcommand, cli.json),
        Commands::Scope {
            workflow,
            subcommand,
        } => cmd::scope::run(&root, workflow.as_deref(), subcommand, cli.json),
        Commands::Research {
            workflow,
            subcommand,
        } => cmd::research::run(&root, workflow.as_deref(), subcommand, cli.json),
        Commands::File {
            workflow,
            subcommand,
        } => cmd::file::run(&root, workflow.as_deref(), subcommand, cli.json),
        Commands::Generate {
            schema,
            endpoint,
            method,
        } => cmd::generate::run(&root, &schema, endpoint.as_deref(), &method, cli.json),
        Commands::Hook { subcommand } => cmd::hook::run(&root, subcommand),
        Commands::Session { subcommand } => cmd::session::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
