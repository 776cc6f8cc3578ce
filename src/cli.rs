use clap::Parser;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_NUMBER"));

#[derive(Parser, Debug)]
#[command(name = "runw", version = VERSION, about = "Job run watcher TUI")]
pub struct Cli {
    /// Run service client to shell out to
    #[arg(long = "cli", env = "RUNW_CLI", default_value = "runctl", value_name = "PROGRAM")]
    pub program: String,

    /// Poll interval in seconds
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Maximum number of runs to display
    #[arg(short, long, default_value_t = 50)]
    pub limit: usize,

    /// Only show runs of this job
    #[arg(short, long)]
    pub job: Option<String>,

    /// Write debug logs to $XDG_STATE_HOME/runw/debug.log
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable desktop notifications
    #[arg(long)]
    pub no_notify: bool,
}
