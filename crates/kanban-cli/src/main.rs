#![forbid(unsafe_code)]

mod agent;
mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use cmd::Context;
use kanban_core::config::{Workspace, load_user_config};
use kanban_core::{ErrorCode, KanbanError};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "kb",
    author,
    version,
    about = "kb: ticket lifecycle and branch-per-ticket git workflow",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output (alias for --format json).
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Output format: pretty, text, json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Caller identity recorded in ticket logs.
    #[arg(long, global = true)]
    agent: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Tickets",
        about = "Create a ticket",
        after_help = "EXAMPLES:\n    kb create -t \"Add login form\" --type feature -p P1 --owns src/auth/\n\n    kb create -t \"Fix crash\" --type bug --status READY --json"
    )]
    Create(cmd::create::CreateArgs),

    #[command(next_help_heading = "Tickets", about = "List tickets")]
    List(cmd::list::ListArgs),

    #[command(next_help_heading = "Tickets", about = "Show one ticket with its log")]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Tickets",
        about = "Move a ticket to another status",
        after_help = "EXAMPLES:\n    kb transition T-0001 READY\n\n    kb --agent worker-1 transition T-0001 IN_PROGRESS --note \"picked up\""
    )]
    Transition(cmd::transition::TransitionArgs),

    #[command(next_help_heading = "Tickets", about = "Update ticket fields")]
    Update(cmd::update::UpdateArgs),

    #[command(
        next_help_heading = "Tickets",
        about = "Validate every ticket file against the schema"
    )]
    Validate,

    #[command(next_help_heading = "Tickets", about = "Print the next free ticket id")]
    NextId,

    #[command(
        next_help_heading = "Workflow",
        about = "Branch, commit and merge on behalf of tickets"
    )]
    Git {
        #[command(subcommand)]
        command: cmd::git::GitCommand,
    },

    #[command(about = "Generate shell completions")]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("KANBAN_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "kanban=debug,info"
        } else {
            "kanban=info,warn"
        })
    });

    let format = env::var("KANBAN_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Map a command failure onto a stable error code.
fn classify(err: &anyhow::Error) -> CliError {
    if let Some(kanban) = err.downcast_ref::<KanbanError>() {
        return CliError::from(kanban);
    }
    if let Some(missing) = err.downcast_ref::<agent::AgentResolutionError>() {
        return CliError::from_code(ErrorCode::MissingAgent, missing.message.clone());
    }
    CliError::from_code(ErrorCode::InternalUnexpected, format!("{err:#}"))
}

fn build_context(cli: &Cli) -> Result<Context, CliError> {
    let config_error =
        |err: anyhow::Error| CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}"));

    let user = load_user_config().map_err(config_error)?;
    let output = resolve_output_mode(cli.format, cli.json, user.output.as_deref());
    let cwd = env::current_dir().map_err(|err| {
        CliError::from_code(ErrorCode::InternalUnexpected, format!("cannot read cwd: {err}"))
    })?;
    let workspace = Workspace::discover(&cwd).map_err(config_error)?;
    debug!(root = %workspace.root.display(), ?output, "workspace resolved");

    Ok(Context {
        workspace,
        output,
        agent_flag: cli.agent.clone(),
        configured_agent: user.agent,
    })
}

fn dispatch(command: Commands, ctx: &Context) -> anyhow::Result<()> {
    match command {
        Commands::Create(args) => cmd::create::run_create(args, ctx),
        Commands::List(args) => cmd::list::run_list(&args, ctx),
        Commands::Show(args) => cmd::show::run_show(&args, ctx),
        Commands::Transition(args) => cmd::transition::run_transition(&args, ctx),
        Commands::Update(args) => cmd::update::run_update(args, ctx),
        Commands::Validate => cmd::validate::run_validate(ctx),
        Commands::NextId => cmd::next_id::run_next_id(ctx),
        Commands::Git { command } => cmd::git::run_git(command, ctx),
        Commands::Completions(args) => {
            cmd::completions::run_completions(args.shell, &mut Cli::command())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let fallback_mode = cli.format.unwrap_or(if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    });
    let ctx = match build_context(&cli) {
        Ok(ctx) => ctx,
        Err(error) => {
            let _ = render_error(fallback_mode, &error);
            return ExitCode::FAILURE;
        }
    };

    match dispatch(cli.command, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(error = ?err, "command failed");
            let _ = render_error(ctx.output, &classify(&err));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn json_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["kb", "list", "--json"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::List(_)));
    }

    #[test]
    fn format_and_agent_are_global() {
        let cli = Cli::parse_from([
            "kb", "transition", "T-0001", "READY", "--format", "text", "--agent", "w1",
        ]);
        assert_eq!(cli.format, Some(OutputMode::Text));
        assert_eq!(cli.agent.as_deref(), Some("w1"));
    }

    #[test]
    fn git_subcommands_parse() {
        let cli = Cli::parse_from(["kb", "git", "commit", "T-0002", "-m", "add form"]);
        match cli.command {
            Commands::Git {
                command: cmd::git::GitCommand::Commit { id, summary, cwd },
            } => {
                assert_eq!(id.as_str(), "T-0002");
                assert_eq!(summary, "add form");
                assert!(cwd.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::parse_from([
            "kb", "git", "merge-command", "feat/login", "--target", "release",
        ]);
        assert!(matches!(
            cli.command,
            Commands::Git {
                command: cmd::git::GitCommand::MergeCommand { .. }
            }
        ));
    }

    #[test]
    fn invalid_status_is_a_parse_error() {
        assert!(Cli::try_parse_from(["kb", "transition", "T-0001", "DOING"]).is_err());
    }

    #[test]
    fn classify_maps_kanban_and_agent_errors() {
        let err = anyhow::Error::from(KanbanError::PreconditionFailed("nope".into()));
        assert_eq!(classify(&err).error_code, "E2006");

        let err = anyhow::Error::from(agent::AgentResolutionError {
            message: "who".into(),
        });
        assert_eq!(classify(&err).error_code, "E1002");

        assert_eq!(classify(&anyhow::anyhow!("boom")).error_code, "E9001");
    }
}
