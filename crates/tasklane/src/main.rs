//! CLI entry point for tasklane.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tasklane_app::AppConfig;
use tasklane_app::config::CONFIG_FILE;
use tasklane_core::SystemClock;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod commands;
mod view;

/// Personal tasks with categories, schedules and recurrence.
#[derive(Parser, Debug)]
#[command(
    name = "tasklane",
    version,
    about = "tasklane: personal tasks grouped by category, with schedules and recurrence"
)]
struct Cli {
    /// Directory holding the configuration and the task store.
    #[arg(long, env = "TASKLANE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file (defaults to <data dir>/tasklane.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

/// Optional task fields shared by `add` and `edit`.
///
/// On `edit`, an empty value clears the field.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
struct FieldArgs {
    #[arg(long)]
    notes: Option<String>,
    /// Category name or id.
    #[arg(short = 'c', long)]
    category: Option<String>,
    /// Due date (YYYY-MM-DD).
    #[arg(long)]
    due: Option<String>,
    /// Due time (HH:MM); the due date defaults to today.
    #[arg(long)]
    at: Option<String>,
    /// Start of the calendar block (HH:MM).
    #[arg(long)]
    start: Option<String>,
    /// End of the calendar block (HH:MM).
    #[arg(long)]
    end: Option<String>,
    /// Recurrence: none, daily or weekly.
    #[arg(long)]
    repeat: Option<String>,
    /// Weekday of a weekly task, 0 (Sunday) to 6 (Saturday).
    #[arg(long)]
    weekday: Option<u8>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a configuration signed in as a new or given user.
    Init {
        /// User id to sign in as.
        #[arg(long)]
        user: Option<String>,
        /// Evaluate recurrence in a fixed offset (+HH:MM) instead of local time.
        #[arg(long)]
        utc_offset: Option<String>,
        /// Overwrite an existing configuration.
        #[arg(long)]
        force: bool,
    },

    /// Create a task at the end of its group.
    Add {
        title: String,
        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Change the fields of a task.
    Edit {
        task: String,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Mark a task completed.
    Done { task: String },

    /// Mark a task not completed.
    Reopen { task: String },

    /// Delete a task.
    Rm { task: String },

    /// List the tasks visible today.
    Ls {
        /// Only tasks of this category ("uncategorized" for none).
        #[arg(short = 'c', long)]
        category: Option<String>,
        /// Case-insensitive text matched against title and notes.
        #[arg(short = 's', long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = LsFormat::Table)]
        format: LsFormat,
    },

    /// Show visible tasks grouped by category in their stored order.
    Groups,

    /// Show scheduled time blocks.
    Calendar {
        /// Only blocks on this date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<String>,
    },

    /// Move a task within or across category groups.
    Mv {
        task: String,
        /// Take the position of this task.
        #[arg(long, conflicts_with = "into", required_unless_present = "into")]
        before: Option<String>,
        /// Move into this category ("uncategorized" for none).
        #[arg(long)]
        into: Option<String>,
        /// Position within the group given by --into (default: first).
        #[arg(long, requires = "into")]
        index: Option<usize>,
    },

    /// Manage categories.
    Category {
        #[command(subcommand)]
        cmd: CategoryCommand,
    },

    /// Run one maintenance pass: reopen daily tasks and purge old completed ones.
    Maintain,

    /// Keep running maintenance on a timer and whenever the process is resumed.
    Watch,
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    /// Create a category.
    Add {
        name: String,
        /// Color such as #15803d.
        #[arg(long)]
        color: Option<String>,
    },
    /// Rename or recolor a category.
    Rename {
        category: String,
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a category; its tasks become uncategorized.
    Rm { category: String },
    /// List categories.
    Ls,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LsFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let Cli { data_dir, config, cmd } = Cli::parse();
    install_tracing();

    let data_dir = resolve_data_dir(data_dir)?;
    let config_path = config.unwrap_or_else(|| data_dir.join(CONFIG_FILE));
    if let Command::Init {
        user,
        utc_offset,
        force,
    } = cmd
    {
        return commands::init(&config_path, user.as_deref(), utc_offset, force);
    }

    let config = AppConfig::from_file(&config_path)?;
    // Resolve the local offset before the runtime starts any thread.
    let clock = config
        .fixed_offset()?
        .map_or_else(SystemClock::local, SystemClock::fixed);
    let app = commands::App::open(&data_dir, &config, clock)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(commands::run(cmd, &app))
}

fn resolve_data_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    flag.or_else(|| dirs::data_local_dir().map(|dir| dir.join("tasklane")))
        .ok_or_else(|| anyhow!("cannot determine a data directory; pass --data-dir"))
}

fn install_tracing() {
    // RUST_LOG overrides the default INFO level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_add_command() {
        let cli = Cli::parse_from([
            "tasklane",
            "--data-dir",
            "/tmp/tl",
            "add",
            "Water plants",
            "--category",
            "Home",
            "--at",
            "18:00",
            "--repeat",
            "weekly",
            "--weekday",
            "3",
        ]);

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/tl")));
        match cli.cmd {
            Command::Add { title, fields } => {
                assert_eq!(title, "Water plants");
                assert_eq!(fields.category.as_deref(), Some("Home"));
                assert_eq!(fields.at.as_deref(), Some("18:00"));
                assert_eq!(fields.repeat.as_deref(), Some("weekly"));
                assert_eq!(fields.weekday, Some(3));
            }
            _ => panic!("expected add command"),
        }
    }

    #[test]
    fn parse_mv_into_group_with_index() {
        let cli = Cli::parse_from(["tasklane", "mv", "1a2b", "--into", "Work", "--index", "2"]);
        match cli.cmd {
            Command::Mv {
                task,
                before,
                into,
                index,
            } => {
                assert_eq!(task, "1a2b");
                assert_eq!(before, None);
                assert_eq!(into.as_deref(), Some("Work"));
                assert_eq!(index, Some(2));
            }
            _ => panic!("expected mv command"),
        }
    }

    #[test]
    fn mv_requires_a_destination() {
        assert!(Cli::try_parse_from(["tasklane", "mv", "1a2b"]).is_err());
        assert!(Cli::try_parse_from(["tasklane", "mv", "1a2b", "--before", "3c", "--into", "Work"]).is_err());
        assert!(Cli::try_parse_from(["tasklane", "mv", "1a2b", "--before", "3c", "--index", "1"]).is_err());
    }

    #[test]
    fn parse_category_rename() {
        let cli = Cli::parse_from(["tasklane", "category", "rename", "Work", "Office", "--color", "#15803d"]);
        match cli.cmd {
            Command::Category {
                cmd: CategoryCommand::Rename { category, name, color },
            } => {
                assert_eq!(category, "Work");
                assert_eq!(name.as_deref(), Some("Office"));
                assert_eq!(color.as_deref(), Some("#15803d"));
            }
            _ => panic!("expected category rename"),
        }
    }

    #[test]
    fn parse_ls_json() {
        let cli = Cli::parse_from(["tasklane", "ls", "--search", "milk", "--format", "json"]);
        match cli.cmd {
            Command::Ls { search, format, .. } => {
                assert_eq!(search.as_deref(), Some("milk"));
                assert_eq!(format, LsFormat::Json);
            }
            _ => panic!("expected ls command"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
