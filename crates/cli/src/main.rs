use anyhow::Result;
use audioshelf_config::{Config, ConfigManager};
use audioshelf_core::AppError;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

fn build_cli() -> Command {
    Command::new("audioshelf")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reconciles downloaded audiobook folders against a managed library")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Config file (default: platform config directory)")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("state")
                .long("state")
                .value_name("PATH")
                .help("State file, overriding state.path")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("library")
                .short('l')
                .long("library")
                .value_name("PATH")
                .help("Managed library root, overriding library.root")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .subcommand(
            Command::new("reconcile")
                .about("Resolve, check and rename or import candidate folders")
                .arg(
                    Arg::new("source")
                        .required(true)
                        .value_name("SOURCE")
                        .help("Directory whose subfolders are candidates")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("pattern")
                        .short('p')
                        .long("pattern")
                        .value_name("GLOB")
                        .help("Only folders whose name matches (* and ?)")
                        .default_value("*"),
                )
                .arg(
                    Arg::new("dry-run")
                        .short('n')
                        .long("dry-run")
                        .help("Report what would happen without touching anything")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("search")
                        .short('s')
                        .long("search")
                        .help("Resolve untagged folders through the catalog")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("catalog")
                        .long("catalog")
                        .value_name("FILE")
                        .help("JSON catalog used for search and canonical metadata")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("confidence")
                        .long("confidence")
                        .value_name("F")
                        .help("Minimum search confidence (0-1)")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    Arg::new("similarity")
                        .long("similarity")
                        .value_name("F")
                        .help("Title/author similarity below which a rename is flagged (0-1)")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .help("Apply flagged renames anyway")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("force-lock")
                        .long("force-lock")
                        .help("Run even if another run holds the lock")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .value_name("N")
                        .help("Candidates processed in parallel")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("import")
                        .short('i')
                        .long("import")
                        .help("Hardlink into the import root instead of renaming in place")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("report")
                        .short('r')
                        .long("report")
                        .value_name("FILE")
                        .help("Write a run report to FILE")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Report format")
                        .value_parser(["json", "markdown"])
                        .default_value("json"),
                ),
        )
        .subcommand(Command::new("status").about("Show state file counts"))
        .subcommand(
            Command::new("list")
                .about("List processed identities")
                .arg(
                    Arg::new("failed")
                        .long("failed")
                        .help("List failures instead")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("clear")
                .about("Forget an identity so it is processed again")
                .arg(
                    Arg::new("identity")
                        .required(true)
                        .value_name("IDENTITY")
                        .help("Identity, or a path: failure key"),
                ),
        )
        .subcommand(
            Command::new("reset-state")
                .about("Back up the state file and start over")
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .help("Confirm the reset")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("duplicates")
                .about("Group library entries that look like the same book")
                .arg(
                    Arg::new("threshold")
                        .short('t')
                        .long("threshold")
                        .value_name("F")
                        .help("Similarity at or above which entries are grouped (0-1)")
                        .value_parser(clap::value_parser!(f64)),
                ),
        )
}

/// File, then `AUDIOSHELF_*` variables, then the global flags
fn load_config(matches: &ArgMatches) -> Result<Config> {
    let manager = match matches.get_one::<PathBuf>("config") {
        Some(path) => ConfigManager::with_file(path),
        None => ConfigManager::new().map_err(AppError::from)?,
    };
    let mut config = manager
        .load_with_env_overrides()
        .map_err(AppError::from)?;

    if let Some(state) = matches.get_one::<PathBuf>("state") {
        config.state.path = state.clone();
    }
    if let Some(library) = matches.get_one::<PathBuf>("library") {
        config.library.root = Some(library.clone());
    }
    Ok(config)
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.app.log_level.to_string()),
    )
    .init();

    match matches.subcommand() {
        Some(("reconcile", sub_matches)) => commands::reconcile(config, sub_matches).await,
        Some(("status", _)) => commands::show_status(&config),
        Some(("list", sub_matches)) => commands::list_state(&config, sub_matches.get_flag("failed")),
        Some(("clear", sub_matches)) => {
            let identity = sub_matches
                .get_one::<String>("identity")
                .ok_or_else(|| anyhow::anyhow!("Identity is required"))?;
            commands::clear_identity(&config, identity)
        }
        Some(("reset-state", sub_matches)) => {
            commands::reset_state(&config, sub_matches.get_flag("yes"))
        }
        Some(("duplicates", sub_matches)) => commands::show_duplicates(config, sub_matches),
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = build_cli().get_matches();
    match run(&matches).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            commands::print_error(&err);
            ExitCode::FAILURE
        }
    }
}
