//! tangle CLI - Main entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use tangle_cli::commands::plan::PlanArgs;
use tangle_cli::config::{CONFIG_FILE, Config};
use tangle_cli::error::CliError;
use tangle_cli::output;
use tangle_core::Method;

/// tangle - inspect relational model registries
#[derive(Parser, Debug)]
#[command(name = "tangle")]
#[command(author, version, about = "Inspect tangle model registries", long_about = None)]
struct Cli {
    /// Path to config file (default: tangle.toml)
    #[arg(short, long, global = true, value_name = "PATH", env = "TANGLE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a starter tangle.toml
    Init,

    /// Validate the models and list their connections
    Check,

    /// Compile a path expression and print its accessors
    Path {
        /// Path expression, e.g. `$post>$user.name@author`
        expression: String,
    },

    /// Find the shortest connection chain between two models
    Route {
        from: String,
        to: String,

        /// Longest chain to consider
        #[arg(long, default_value_t = 3)]
        max_hops: usize,

        /// Models the chain may not pass through
        #[arg(long, value_delimiter = ',')]
        block: Vec<String>,
    },

    /// Print write order and join anchor for a set of models
    Order {
        #[arg(required = true)]
        models: Vec<String>,
    },

    /// Print the statement a selection builds, as JSON
    Plan {
        /// Base model
        #[arg(long)]
        base: String,

        /// Field selection path (repeatable)
        #[arg(long = "field")]
        fields: Vec<String>,

        /// Join path (repeatable)
        #[arg(long = "join")]
        joins: Vec<String>,

        /// Filter expression (repeatable, combined with AND)
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Parameter expression (repeatable, combined with AND)
        #[arg(long = "params")]
        params: Vec<String>,

        /// Sort keys, e.g. `-$post.title,$post.id`
        #[arg(long)]
        sort: Option<String>,

        #[arg(long)]
        limit: Option<u64>,

        #[arg(long)]
        offset: Option<u64>,

        /// create, read, update or delete
        #[arg(long, default_value = "read", value_parser = parse_method)]
        method: Method,
    },
}

fn parse_method(s: &str) -> Result<Method, String> {
    match s.to_ascii_lowercase().as_str() {
        "create" => Ok(Method::Create),
        "read" => Ok(Method::Read),
        "update" => Ok(Method::Update),
        "delete" => Ok(Method::Delete),
        _ => Err(format!(
            "invalid method '{s}'. Expected create, read, update or delete"
        )),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", output::err_line(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Init => run_init(cli.config),
        Command::Check => {
            let config = load_config(cli.config.as_deref())?;
            tangle_cli::commands::check::run(&config)
        }
        Command::Path { expression } => tangle_cli::commands::path::run(&expression),
        Command::Route {
            from,
            to,
            max_hops,
            block,
        } => {
            let config = load_config(cli.config.as_deref())?;
            tangle_cli::commands::route::run(&config, &from, &to, max_hops, &block)
        }
        Command::Order { models } => {
            let config = load_config(cli.config.as_deref())?;
            tangle_cli::commands::order::run(&config, &models)
        }
        Command::Plan {
            base,
            fields,
            joins,
            filters,
            params,
            sort,
            limit,
            offset,
            method,
        } => {
            let config = load_config(cli.config.as_deref())?;
            tangle_cli::commands::plan::run(
                &config,
                PlanArgs {
                    base,
                    method,
                    fields,
                    joins,
                    filters,
                    params,
                    sort,
                    limit,
                    offset,
                },
            )
        }
    }
}

fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config, CliError> {
    match custom_path {
        Some(path) => Config::load_from(path).map_err(Into::into),
        None => Config::load().map_err(Into::into),
    }
}

fn run_init(custom_path: Option<PathBuf>) -> Result<(), CliError> {
    let config_path = custom_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

    if config_path.exists() {
        return Err(CliError::Other(format!(
            "{} already exists. Delete it first to reinitialize.",
            config_path.display()
        )));
    }

    std::fs::write(&config_path, STARTER).map_err(|e| CliError::IoError(e.to_string()))?;

    println!(
        "{}",
        output::success(&format!("Created {}", config_path.display()))
    );
    println!();
    println!("Next steps:");
    println!("  1. Describe your models in {}", config_path.display());
    println!("  2. Run {} to validate them", output::heading("tangle check"));
    println!(
        "  3. Run {} to preview a statement",
        output::heading("tangle plan --base post --field '$post.title'")
    );

    Ok(())
}

const STARTER: &str = r#"# tangle configuration

[statement]
maxDepth = 3
validate = true

[[model]]
name = "user"
primary_key = "id"
unique = [["email"]]

[[model.field]]
name = "id"

[[model.field]]
name = "name"
required = true

[[model.field]]
name = "email"

[[model]]
name = "post"
primary_key = "id"

[[model.field]]
name = "id"

[[model.field]]
name = "title"
rank = "major"

[[model.field]]
name = "authorId"
storage = "author_id"
relation = "user.id"
"#;
