use crate::config::{self, TrackerConfig};
use crate::demo::{self, DemoOptions};
use crate::logging::{self, ndjson};
use crate::replay;
use crate::tracker::Tracker;
use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "taskline", version)]
#[command(
    about = "Live terminal tree of task lifecycle events",
    long_about = "taskline renders a live tree of task events in the terminal, captures stdout/stderr while it runs, and replays both streams when tracking ends."
)]
#[command(arg_required_else_help = true)]
#[command(after_long_help = "Examples:
  taskline demo
  taskline demo --record run.ndjson --fail
  taskline replay run.ndjson --delay-ms 100
  taskline completion zsh > ~/.zsh/completions/_taskline
  taskline man > taskline.1

Keys while tracking:
  ctrl+c           exit
  ctrl+e           toggle output truncation
  ctrl+left/right  switch between tasks, stdout and stderr views")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Tracker config file (default: .taskline/config.toml)"
    )]
    config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Write diagnostics to file instead of the captured stderr"
    )]
    log: Option<PathBuf>,
    #[arg(long, global = true, help = "Disable colours")]
    no_color: bool,
    #[arg(long, global = true, help = "Start with output truncation enabled")]
    truncate: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Track a simulated nested workload",
        long_about = "Run a small simulated agent workload (research, search, summarize, notify) through a live tracker."
    )]
    #[command(after_long_help = "Examples:
  taskline demo
  taskline demo --step-ms 100 --fail
  taskline demo --record run.ndjson")]
    Demo {
        #[arg(
            long,
            default_value_t = 400,
            value_name = "MS",
            help = "Delay between simulated events"
        )]
        step_ms: u64,
        #[arg(long, help = "Make the summarize task fail")]
        fail: bool,
        #[arg(long, value_name = "PATH", help = "Write emitted events as NDJSON")]
        record: Option<PathBuf>,
    },
    #[command(about = "Track events replayed from an NDJSON file")]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Example:
  taskline replay run.ndjson --delay-ms 100")]
    Replay {
        #[arg(value_name = "FILE", help = "NDJSON file of serialized events")]
        file: PathBuf,
        #[arg(
            long,
            default_value_t = 200,
            value_name = "MS",
            help = "Delay between replayed task events"
        )]
        delay_ms: u64,
    },
    #[command(
        about = "Print a shell completion script",
        long_about = "Print a completion script for SHELL on stdout. Save it wherever your shell loads completions from."
    )]
    #[command(arg_required_else_help = true)]
    #[command(after_long_help = "Examples:
  taskline completion bash > ~/.local/share/bash-completion/completions/taskline
  taskline completion zsh > ~/.zsh/completions/_taskline
  taskline completion fish > ~/.config/fish/completions/taskline.fish")]
    Completion {
        #[arg(value_enum, value_name = "SHELL", help = "Shell to generate for")]
        shell: Shell,
    },
    #[command(
        about = "Print the taskline man page",
        long_about = "Render the taskline(1) man page as roff."
    )]
    #[command(after_long_help = "Examples:
  taskline man > taskline.1
  taskline man --output docs/taskline.1")]
    Man {
        #[arg(long, value_name = "PATH", help = "Write the page here instead of stdout")]
        output: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Demo {
            step_ms,
            fail,
            record,
        } => {
            let opts = DemoOptions {
                step: Duration::from_millis(step_ms),
                fail,
                record,
            };
            track(&cli.global, |tracker| demo::spawn_demo(tracker.handle(), opts))
        }
        Commands::Replay { file, delay_ms } => {
            let events = ndjson::read_events(&file)?;
            let delay = Duration::from_millis(delay_ms);
            let sent = track(&cli.global, |tracker| {
                replay::spawn_replay(tracker.handle(), events, delay)
            })?;
            info!(sent, file = %file.display(), "replay finished");
            Ok(())
        }
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
        Commands::Man { output } => write_man_page(output.as_deref()),
    }
}

fn print_completion(shell: Shell) {
    let mut cmd = Cli::command();
    let bin = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, bin, &mut io::stdout());
}

fn write_man_page(output: Option<&Path>) -> Result<()> {
    let page = clap_mangen::Man::new(Cli::command());
    let Some(path) = output else {
        return page.render(&mut io::stdout()).context("render man page");
    };
    let mut roff = Vec::new();
    page.render(&mut roff).context("render man page")?;
    fs::write(path, roff).with_context(|| format!("write man page {}", path.display()))
}

fn track<T, F>(global: &GlobalArgs, spawn: F) -> Result<T>
where
    F: FnOnce(&Tracker) -> JoinHandle<Result<T>>,
{
    let cfg = resolve_config(global)?;
    let mut tracker = Tracker::install(cfg)?;
    logging::init(global.log.as_deref(), tracker.handle().stderr())?;

    let worker = spawn(&tracker);
    tracker.run()?;
    worker
        .join()
        .map_err(|_| anyhow!("collaborator thread panicked"))?
}

fn resolve_config(global: &GlobalArgs) -> Result<TrackerConfig> {
    let mut cfg = match &global.config {
        Some(path) => config::load_config_file(path)?,
        None => load_default_config()?,
    };
    if global.no_color {
        cfg.color = false;
    }
    if global.truncate {
        cfg.truncate_output = true;
    }
    Ok(cfg)
}

fn load_default_config() -> Result<TrackerConfig> {
    let cwd = std::env::current_dir().context("resolve working directory")?;
    Ok(config::load_config(Path::new(&cwd))?.unwrap_or_default())
}
