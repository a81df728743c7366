use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "planflow", version, about = "Inspect plans, plan records and event logs")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to load instead of ~/.planflow/config.toml or ./config.toml.
    #[arg(long, global = true)]
    pub config: Option<String>,
}

/// Where plan text is read from. Defaults to stdin.
#[derive(ClapArgs, Debug, Clone)]
#[group(multiple = false)]
pub struct PlanInput {
    #[arg(long)]
    pub plan_file: Option<String>,

    #[arg(long)]
    pub plan: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ParseArgs {
    #[command(flatten)]
    pub input: PlanInput,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct LayersArgs {
    #[command(flatten)]
    pub input: PlanInput,

    /// Plan id to assign; generated when omitted.
    #[arg(long)]
    pub plan_id: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ClapArgs, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct RecordSource {
    /// Plan id looked up in the configured records directory.
    #[arg(long)]
    pub plan_id: Option<String>,

    /// Path to a record file.
    #[arg(long)]
    pub record: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub source: RecordSource,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ReplayArgs {
    #[arg(long)]
    pub events: String,

    #[arg(long)]
    pub plan_id: Option<String>,

    /// `text` or `jsonl`.
    #[arg(long, default_value = "text")]
    pub format: String,

    #[arg(long, default_value_t = false)]
    pub ascii: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Recover plan steps from raw text and print them as JSON.
    Parse(ParseArgs),
    /// Build the dependency graph and print its execution layers.
    Layers(LayersArgs),
    /// Show a persisted plan record grouped by layer.
    Restore(RestoreArgs),
    /// Render a recorded progress-event log.
    Replay(ReplayArgs),
}
