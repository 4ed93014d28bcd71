//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use evana_core::{Pipeline, ProgressReporter};
use evana_schema::{SchemaKind, registry};
use evana_shared::{
    AggregateResult, AppConfig, RunContext, Stage, init_config, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Evana: turn an event description into a complete plan.
#[derive(Parser)]
#[command(
    name = "evana",
    version,
    about = "Plan an event from a free-text description: requirements, agenda, vendors, venues, checklist and brief.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.evana/evana.toml.
    #[arg(long, global = true, env = "EVANA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the planning pipeline and print the result as JSON.
    Plan {
        /// Event description, e.g. "birthday party for 20 in Austin".
        #[arg(required_unless_present = "input_file", conflicts_with = "input_file")]
        text: Option<String>,

        /// Read the event description from a file.
        #[arg(short, long)]
        input_file: Option<PathBuf>,

        /// Write the result to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Emit compact JSON instead of pretty-printed.
        #[arg(long)]
        compact: bool,

        /// Model identifier (overrides config).
        #[arg(short, long)]
        model: Option<String>,

        /// Deadline for the whole run in seconds (overrides config).
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print the JSON schemas used for structured model output.
    Schema {
        /// Schema name (EventRequirements, EventAgenda, TimelineChecklist).
        name: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout
/// carries only the result.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "evana=info",
        1 => "evana=debug",
        _ => "evana=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Plan {
            text,
            input_file,
            out,
            compact,
            model,
            timeout,
        } => {
            let input = read_input(text, input_file.as_deref())?;
            let overrides = PlanOverrides { model, timeout };
            cmd_plan(config_path, &input, &overrides, out.as_deref(), compact).await
        }
        Command::Schema { name } => cmd_schema(name.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

fn read_input(text: Option<String>, input_file: Option<&Path>) -> Result<String> {
    match (text, input_file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| eyre!("cannot read input file '{}': {e}", path.display())),
        (None, None) => Err(eyre!("no event description given")),
    }
}

// ---------------------------------------------------------------------------
// plan
// ---------------------------------------------------------------------------

/// Flag values that take precedence over the config file.
#[derive(Debug, Default)]
struct PlanOverrides {
    model: Option<String>,
    timeout: Option<u64>,
}

impl PlanOverrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(model) = &self.model {
            config.model.model = model.clone();
        }
        if let Some(secs) = self.timeout {
            config.pipeline.run_timeout_secs = secs;
        }
    }
}

async fn cmd_plan(
    config_path: Option<&Path>,
    input: &str,
    overrides: &PlanOverrides,
    out: Option<&Path>,
    compact: bool,
) -> Result<()> {
    let mut config = load(config_path)?;
    overrides.apply(&mut config);
    let ctx = RunContext::from_config(&config)?;

    info!(
        model = %ctx.model.model,
        run_timeout_secs = ctx.limits.run_timeout.as_secs(),
        "planning event"
    );

    let pipeline = Pipeline::from_context(&ctx)?;
    let reporter = CliProgress::new();
    let started = Instant::now();
    let result = pipeline.run(input, &reporter).await;
    reporter.spinner.finish_and_clear();
    let result = result?;

    let json = render(&result, compact)?;
    match out {
        Some(path) => {
            std::fs::write(path, &json)
                .map_err(|e| eyre!("cannot write '{}': {e}", path.display()))?;
            eprintln!();
            eprintln!("  Event plan written to {}", path.display());
            eprintln!("  Email:  {}", result.email_result.message());
            eprintln!("  Time:   {:.1}s", started.elapsed().as_secs_f64());
            eprintln!();
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn render(result: &AggregateResult, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(result)?
    } else {
        serde_json::to_string_pretty(result)?
    };
    Ok(json)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

fn stage_label(stage: Stage) -> String {
    format!(
        "[{}/{}] {}",
        stage.number(),
        Stage::ALL.len(),
        stage.as_str().replace('_', " ")
    )
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: Stage) {
        self.spinner.set_message(stage_label(stage));
    }

    fn stage_finished(&self, stage: Stage, degraded: bool) {
        if degraded {
            self.spinner
                .println(format!("  ! {} degraded", stage_label(stage)));
        }
    }

    fn done(&self, _result: &AggregateResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// schema
// ---------------------------------------------------------------------------

fn cmd_schema(name: Option<&str>) -> Result<()> {
    let value = match name {
        Some(name) => {
            let kind = SchemaKind::from_name(name).ok_or_else(|| {
                let known: Vec<&str> = SchemaKind::ALL.iter().map(SchemaKind::name).collect();
                eyre!("unknown schema '{name}': expected one of {}", known.join(", "))
            })?;
            let descriptor = kind.descriptor();
            serde_json::json!({ "name": descriptor.name, "schema": descriptor.schema })
        }
        None => serde_json::Value::Array(
            registry()
                .into_iter()
                .map(|d| serde_json::json!({ "name": d.name, "schema": d.schema }))
                .collect(),
        ),
    };

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_takes_text_or_file_but_not_both() {
        assert!(Cli::try_parse_from(["evana", "plan", "party for 10"]).is_ok());
        assert!(Cli::try_parse_from(["evana", "plan", "--input-file", "in.txt"]).is_ok());
        assert!(Cli::try_parse_from(["evana", "plan"]).is_err());
        assert!(
            Cli::try_parse_from(["evana", "plan", "party", "--input-file", "in.txt"]).is_err()
        );
    }

    #[test]
    fn plan_flags_parse() {
        let cli = Cli::try_parse_from([
            "evana", "-vv", "plan", "party", "--compact", "--model", "gpt-x", "--timeout", "30",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Plan {
                text,
                compact,
                model,
                timeout,
                ..
            } => {
                assert_eq!(text.as_deref(), Some("party"));
                assert!(compact);
                assert_eq!(model.as_deref(), Some("gpt-x"));
                assert_eq!(timeout, Some(30));
            }
            _ => panic!("expected plan"),
        }
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = AppConfig::default();
        PlanOverrides {
            model: Some("gpt-x".into()),
            timeout: Some(42),
        }
        .apply(&mut config);
        assert_eq!(config.model.model, "gpt-x");
        assert_eq!(config.pipeline.run_timeout_secs, 42);

        let before = AppConfig::default();
        let mut untouched = AppConfig::default();
        PlanOverrides::default().apply(&mut untouched);
        assert_eq!(untouched.model.model, before.model.model);
        assert_eq!(
            untouched.pipeline.run_timeout_secs,
            before.pipeline.run_timeout_secs
        );
    }

    #[test]
    fn stage_label_shows_position() {
        assert_eq!(
            stage_label(Stage::CrawlVenues),
            "[4/7] crawl venues"
        );
    }

    #[test]
    fn unknown_schema_is_an_error() {
        assert!(cmd_schema(Some("Nope")).is_err());
        assert!(cmd_schema(Some("eventagenda")).is_ok());
    }
}
