//! presetkit CLI - resolve and check preset documents

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use presetkit::prelude::*;
use presetkit::Setting;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "presetkit")]
#[command(author, version, about = "Resolve parametric machine-setting presets")]
struct Cli {
    /// Verbosity: -v for info, -vv for debug, -vvv for trace
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a preset and print every setting
    Resolve {
        /// Preset document (JSON)
        input: PathBuf,

        /// Override a setting, e.g. --set layer_height=0.3 (repeatable)
        #[arg(short = 's', long = "set", value_name = "KEY=VALUE", value_parser = parse_override)]
        overrides: Vec<(String, SettingValue)>,

        /// Order in which settings are visited
        #[arg(long, value_enum, default_value_t = OrderArg::Declared)]
        order: OrderArg,

        /// Maximum number of sweeps
        #[arg(long, default_value_t = 1)]
        passes: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Compile every formula of a preset and resolve it once
    Check {
        /// Preset document (JSON)
        input: PathBuf,
    },

    /// List the keys of a preset with their type and formula
    Keys {
        /// Preset document (JSON)
        input: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OrderArg {
    Declared,
    Dependency,
}

impl From<OrderArg> for EvaluationOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Declared => EvaluationOrder::Declared,
            OrderArg::Dependency => EvaluationOrder::Dependency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Resolve {
            input,
            overrides,
            order,
            passes,
            format,
        } => {
            let options = ResolveOptions {
                order: order.into(),
                max_passes: passes,
                ..Default::default()
            };
            resolve_preset(&input, overrides, &options, format)
        }
        Commands::Check { input } => check_preset(&input),
        Commands::Keys { input } => list_keys(&input),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Read a preset document from disk and build its table
fn load_preset(path: &Path, strict: bool) -> Result<SettingsTable> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let document: PresetDocument = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse '{}'", path.display()))?;

    let table = if strict {
        SettingsTable::from_document_strict(document)
    } else {
        SettingsTable::from_document(document)
    };
    table.with_context(|| format!("Invalid preset '{}'", path.display()))
}

/// Parse a `KEY=VALUE` override; the resolver coerces it to the setting's type
fn parse_override(arg: &str) -> std::result::Result<(String, SettingValue), String> {
    let (key, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", arg))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{}'", arg));
    }

    let raw = raw.trim();
    let value = match raw {
        "true" => SettingValue::Bool(true),
        "false" => SettingValue::Bool(false),
        _ => match raw.parse::<f64>() {
            Ok(n) => SettingValue::Float(n),
            Err(_) => SettingValue::string(raw),
        },
    };
    Ok((key.to_string(), value))
}

#[derive(Serialize)]
struct ResolveReport<'a> {
    name: Option<&'a str>,
    settings: Vec<SettingReport<'a>>,
    diagnostics: &'a DiagnosticList,
}

#[derive(Serialize)]
struct SettingReport<'a> {
    key: &'a str,
    value: &'a SettingValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'a str>,
    mismatch: bool,
    enabled: bool,
}

impl<'a> From<&'a Setting> for SettingReport<'a> {
    fn from(setting: &'a Setting) -> Self {
        Self {
            key: setting.key(),
            value: setting.value(),
            unit: setting.unit(),
            mismatch: setting.is_mismatched(),
            enabled: setting.is_enabled(),
        }
    }
}

fn resolve_preset(
    input: &Path,
    overrides: Vec<(String, SettingValue)>,
    options: &ResolveOptions,
    format: Format,
) -> Result<()> {
    let mut table = load_preset(input, false)?;
    let diagnostics = table.resolve_with_options(overrides, options);

    let mut stdout = io::stdout().lock();
    match format {
        Format::Text => {
            for setting in table.settings() {
                writeln!(stdout, "{}", format_setting(setting))
                    .context("Failed to write to stdout")?;
            }
            for diagnostic in &diagnostics {
                eprintln!("{}", diagnostic);
            }
        }
        Format::Json => {
            let report = ResolveReport {
                name: table.name(),
                settings: table.settings().map(SettingReport::from).collect(),
                diagnostics: &diagnostics,
            };
            serde_json::to_writer_pretty(&mut stdout, &report)
                .context("Failed to write to stdout")?;
            writeln!(stdout).context("Failed to write to stdout")?;
        }
    }

    let errors = diagnostics.errors().count();
    if errors > 0 {
        bail!("{} error(s) while resolving '{}'", errors, input.display());
    }
    Ok(())
}

/// One line of text output: `key = value unit [flags]`
fn format_setting(setting: &Setting) -> String {
    let mut line = format!("{} = {}", setting.key(), setting.value());
    if let Some(unit) = setting.unit() {
        line.push(' ');
        line.push_str(unit);
    }
    if setting.is_mismatched() {
        line.push_str(" [mismatch]");
    }
    if !setting.is_enabled() {
        line.push_str(" [disabled]");
    }
    line
}

fn check_preset(input: &Path) -> Result<()> {
    let mut table = load_preset(input, true)?;
    let diagnostics = table.resolve();

    for diagnostic in &diagnostics {
        eprintln!("{}", diagnostic);
    }
    let errors = diagnostics.errors().count();
    if errors > 0 {
        bail!("{} error(s) while resolving '{}'", errors, input.display());
    }

    println!(
        "{}: {} settings, {} warning(s)",
        input.display(),
        table.len(),
        diagnostics.warnings().count()
    );
    Ok(())
}

fn list_keys(input: &Path) -> Result<()> {
    let table = load_preset(input, false)?;

    let width = table.keys().map(str::len).max().unwrap_or(0);
    for setting in table.settings() {
        let formula = setting
            .definition()
            .value_expression
            .as_deref()
            .unwrap_or("-");
        println!(
            "{:width$}  {:6}  {}",
            setting.key(),
            setting.setting_type().name(),
            formula,
            width = width
        );
    }
    Ok(())
}
