//! sqlweave: compile condition trees and run paged SELECTs from the shell.
//!
//! # Usage
//!
//! ```bash
//! # Compile a JSON condition
//! sqlweave compile '{"age >": 18, "OR": [{"role": "admin"}, {"role": "owner"}]}'
//!
//! # Show the SQL for a page without executing
//! sqlweave select --table users --where '{"status": "active"}' --page 2 --size 10 --dry-run
//!
//! # Execute against a database from sqlweave.toml
//! sqlweave select --table users --db main --format json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use sqlweave::prelude::*;

#[derive(Parser)]
#[command(name = "sqlweave")]
#[command(version)]
#[command(about = "Weave JSON condition trees into MySQL predicates and paged SELECTs", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlweave compile '{\"id in\": [1, 2, 3]}' --params
    sqlweave select --table orders --where '{\"total >=\": 100}' --order-by 'id DESC' --page 1 --size 20 --dry-run
    sqlweave operators")]
struct Cli {
    /// Config file (defaults to ./sqlweave.toml, then the user config dir)
    #[arg(short, long, global = true, env = "SQLWEAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogicArg {
    And,
    Or,
}

impl From<LogicArg> for Logic {
    fn from(l: LogicArg) -> Self {
        match l {
            LogicArg::And => Logic::And,
            LogicArg::Or => Logic::Or,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON condition tree into a predicate
    Compile {
        /// JSON condition (string, array or object)
        condition: String,

        /// Logic joining top-level members
        #[arg(short, long, value_enum, default_value = "and")]
        logic: LogicArg,

        /// Emit `?` placeholders and list the bound values
        #[arg(short, long)]
        params: bool,
    },
    /// Assemble (and optionally run) a SELECT
    Select(SelectArgs),
    /// List supported match operators
    Operators,
}

#[derive(clap::Args)]
struct SelectArgs {
    /// Source table
    #[arg(short, long)]
    table: String,

    /// Selected fields, verbatim
    #[arg(long, default_value = "*")]
    fields: String,

    /// WHERE condition as JSON
    #[arg(short, long = "where")]
    filter: Option<String>,

    #[arg(long)]
    group_by: Option<String>,

    /// HAVING condition as JSON
    #[arg(long)]
    having: Option<String>,

    #[arg(long)]
    order_by: Option<String>,

    #[arg(long)]
    limit: Option<u64>,

    #[arg(long)]
    offset: Option<u64>,

    /// Page number (1-based); enables count-then-fetch
    #[arg(long)]
    page: Option<u64>,

    /// Page size
    #[arg(long, default_value_t = 20)]
    size: u64,

    /// Use `?` placeholders instead of inline literals
    #[arg(short, long)]
    params: bool,

    /// Database name from the config file
    #[arg(long, default_value = "default")]
    db: String,

    /// Don't execute, just show the generated SQL
    #[arg(short, long)]
    dry_run: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let level = if cli.verbose { "debug" } else { config.logging.level.as_str() };
    sqlweave::logging::init(level)?;

    match cli.command {
        Commands::Compile {
            condition,
            logic,
            params,
        } => compile(&condition, logic.into(), params),
        Commands::Select(args) => select(args, &config).await,
        Commands::Operators => {
            show_operators();
            Ok(())
        }
    }
}

fn compile(condition: &str, logic: Logic, params: bool) -> Result<()> {
    let tree = parse_condition(condition).context("invalid condition")?;
    let builder = ConditionBuilder::new();
    if params {
        let fragment = builder.build_params(&tree, logic)?;
        print_statement(&fragment.sql, &fragment.params);
    } else {
        let sql = builder.build(&tree, logic)?;
        if sql.is_empty() {
            println!("{}", "(empty condition)".dimmed());
        } else {
            println!("{}", sql.white());
        }
    }
    Ok(())
}

fn build_querier(args: &SelectArgs) -> Result<Querier> {
    let mut q = Querier::new().select(args.fields.as_str()).from(args.table.as_str());
    if let Some(filter) = &args.filter {
        q = q.filter(parse_condition(filter).context("invalid --where")?);
    }
    if let Some(group_by) = &args.group_by {
        q = q.group_by(group_by.as_str());
    }
    if let Some(having) = &args.having {
        q = q.having(parse_condition(having).context("invalid --having")?);
    }
    if let Some(order_by) = &args.order_by {
        q = q.order_by(order_by.as_str());
    }
    if let Some(offset) = args.offset {
        q = q.offset(offset);
    }
    if let Some(limit) = args.limit {
        q = q.limit(limit);
    }
    if args.params {
        q = q.parameterized();
    }
    Ok(q)
}

async fn select(args: SelectArgs, config: &Config) -> Result<()> {
    let mut q = build_querier(&args)?;
    if let Some(page) = args.page {
        q.paginate(page, args.size);
    }

    let known_db = config.database(&args.db).is_some();
    if args.dry_run || !known_db {
        if args.page.is_some() {
            let count = q.count_statement()?;
            println!("{}", "Count SQL:".green().bold());
            print_statement(&count.sql, &count.params);
            println!();
        }
        let statement = q.build()?;
        println!("{}", "Generated SQL:".green().bold());
        print_statement(&statement.sql, &statement.params);

        if !known_db && !args.dry_run {
            println!();
            println!(
                "{}",
                format!("⚠ No database '{}' configured. Add it to sqlweave.toml", args.db).yellow()
            );
        }
        return Ok(());
    }

    let registry = Registry::from_config(config);
    let executor = registry.get(&args.db)?;
    let result = match args.page {
        Some(page) => q.query_page(executor.as_ref(), page, args.size).await?,
        None => q.query(executor.as_ref()).await?,
    };
    format_output(&result, args.format, args.page.is_some());
    Ok(())
}

fn print_statement(sql: &str, params: &[SqlValue]) {
    println!("{}", sql.white());
    if !params.is_empty() {
        println!("{}", "Bindings:".cyan());
        for (i, p) in params.iter().enumerate() {
            println!("  ?{} = {}", i + 1, p.to_literal().yellow());
        }
    }
}

fn format_output(result: &QueryResult, format: OutputFormat, paged: bool) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result).unwrap_or_default());
        }
        OutputFormat::Table => {
            if result.rows.is_empty() {
                println!("{}", "(no results)".dimmed());
                if paged {
                    println!("{} total row(s)", result.total_count.to_string().cyan());
                }
                return;
            }

            let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
            for row in &result.rows {
                for (w, v) in widths.iter_mut().zip(row.values()) {
                    *w = (*w).max(v.chars().count());
                }
            }

            let header: Vec<String> = result
                .columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = *w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for row in &result.rows {
                let cells: Vec<String> = row
                    .values()
                    .iter()
                    .zip(&widths)
                    .map(|(v, w)| format!("{:width$}", v, width = *w))
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            if paged {
                println!(
                    "{} row(s) of {} total, offset {}",
                    result.rows_count.to_string().cyan(),
                    result.total_count.to_string().cyan(),
                    result.offset
                );
            } else {
                println!("{} row(s) returned", result.rows_count.to_string().cyan());
            }
        }
    }
}

fn show_operators() {
    println!("{}", "sqlweave match operators".cyan().bold());
    println!();
    println!(
        "{:14} {:34} {}",
        "Operator".white().bold(),
        "Key example".white().bold(),
        "SQL".white().bold()
    );
    println!("{}", "─".repeat(80).dimmed());

    for op in MatchOp::ALL {
        let (key, value, sql) = match op.shape() {
            OperandShape::Scalar if op == MatchOp::Is => ("deleted_at is".to_string(), "null", "`deleted_at` IS NULL".to_string()),
            OperandShape::Scalar => (
                format!("age {}", op.sql_symbol().to_lowercase()),
                "18",
                format!("`age` {} 18", op.sql_symbol()),
            ),
            OperandShape::Set => (
                format!("id {}", op.sql_symbol().to_lowercase()),
                "[1, 2]",
                format!("`id` {} (1, 2)", op.sql_symbol()),
            ),
            OperandShape::Range => (
                format!("age {}", op.sql_symbol().to_lowercase()),
                "[18, 30]",
                format!("`age` {} 18 AND 30", op.sql_symbol()),
            ),
        };
        println!(
            "{:14} {:34} {}",
            op.sql_symbol().cyan().bold(),
            format!("\"{}\": {}", key, value).yellow(),
            sql.dimmed()
        );
    }
    println!();
    println!("{}", "Keys \"AND\" / \"OR\" nest a group; a bare string is raw SQL.".dimmed());
}
