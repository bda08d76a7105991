//! Plan command - prints the statement a selection builds

use tangle_core::Method;

use crate::config::Config;
use crate::error::CliError;

/// Selection assembled from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct PlanArgs {
    pub base: String,
    pub method: Method,
    pub fields: Vec<String>,
    pub joins: Vec<String>,
    pub filters: Vec<String>,
    pub params: Vec<String>,
    pub sort: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub fn run(config: &Config, args: PlanArgs) -> Result<(), CliError> {
    let registry = config.registry()?;

    let mut builder = config
        .statement(&registry, &args.base)
        .method(args.method)
        .fields(args.fields);
    for join in args.joins {
        builder = builder.join(join);
    }
    for filter in args.filters {
        builder = builder.filter(filter);
    }
    for params in args.params {
        builder = builder.params(params);
    }
    if let Some(sort) = args.sort {
        builder = builder.sort(sort);
    }
    if let Some(limit) = args.limit {
        builder = builder.limit(limit);
    }
    if let Some(offset) = args.offset {
        builder = builder.offset(offset);
    }

    let statement = builder.build()?;
    let json = serde_json::to_string_pretty(&statement.to_json()?)
        .map_err(|e| CliError::Other(e.to_string()))?;
    println!("{json}");
    Ok(())
}
