use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dbmapper_core::{DbMapper, MapperConfig, TableMetadata};
use dbmapper_sqlite::SqliteConnection;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for table descriptions.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
    Table,
}

#[derive(Debug, Parser)]
#[command(name = "dbmapper")]
#[command(about = "Inspect how dbmapper sees a database and its configuration")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the columns and primary key discovered for a table.
    Describe(DescribeArgs),
    /// Load a mapper configuration file and print the effective settings.
    CheckConfig(CheckConfigArgs),
}

#[derive(Debug, Args)]
struct DescribeArgs {
    /// SQLite database file.
    #[arg(long)]
    db: PathBuf,
    /// Table to describe.
    #[arg(long)]
    table: String,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct CheckConfigArgs {
    /// YAML mapper configuration file.
    config: PathBuf,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Describe(args) => run_describe(args),
        Command::CheckConfig(args) => run_check_config(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run_describe(args: DescribeArgs) -> Result<(), String> {
    if !args.db.exists() {
        return Err(format!("Database '{}' does not exist", args.db.display()));
    }
    let conn = SqliteConnection::open(&args.db)
        .map_err(|e| format!("Failed to open database '{}': {e}", args.db.display()))?;
    let mapper = DbMapper::new(conn);
    let metadata = mapper
        .table_metadata(&args.table)
        .map_err(|e| format!("Failed to describe '{}': {e}", args.table))?;
    debug!(table = %args.table, columns = metadata.len(), "Described table");

    let rendered = match args.format {
        CliOutputFormat::Json => serde_json::to_string_pretty(&*metadata)
            .map_err(|e| format!("Failed to serialize metadata: {e}"))?,
        CliOutputFormat::Yaml => serde_yaml::to_string(&*metadata)
            .map_err(|e| format!("Failed to serialize metadata: {e}"))?,
        CliOutputFormat::Table => render_table(&metadata),
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn render_table(metadata: &TableMetadata) -> String {
    let name_width = metadata
        .columns()
        .map(|c| c.name.len())
        .chain(std::iter::once("COLUMN".len()))
        .max()
        .unwrap_or(0);
    let property_width = metadata
        .columns()
        .map(|c| c.property_name.len())
        .chain(std::iter::once("PROPERTY".len()))
        .max()
        .unwrap_or(0);

    let mut out = format!("Table: {}\n", metadata.table_name());
    out.push_str(&format!(
        "{:<name_width$}  {:<property_width$}  KEY  GENERATED\n",
        "COLUMN", "PROPERTY"
    ));
    for column in metadata.columns() {
        out.push_str(&format!(
            "{:<name_width$}  {:<property_width$}  {:<3}  {}\n",
            column.name,
            column.property_name,
            if column.is_primary_key { "yes" } else { "no" },
            if column.is_auto_generated { "yes" } else { "no" },
        ));
    }
    out
}

fn run_check_config(args: CheckConfigArgs) -> Result<(), String> {
    let config = MapperConfig::load(&args.config)
        .map_err(|e| format!("Failed to load '{}': {e}", args.config.display()))?;

    println!("Configuration '{}' is valid.", args.config.display());
    println!("  Log SQL: {}", if config.log_sql { "yes" } else { "no" });
    if config.table_names.is_empty() {
        println!("  Table name overrides: none");
    } else {
        println!("  Table name overrides:");
        for (type_name, table) in &config.table_names {
            println!("    {type_name} -> {table}");
        }
    }
    Ok(())
}
