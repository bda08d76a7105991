//! Route command - shortest connection chain between two models

use tangle_core::{SearchScope, TangleError, find_path};

use crate::config::Config;
use crate::error::CliError;
use crate::output;

pub fn run(config: &Config, from: &str, to: &str, max_hops: usize, blocked: &[String]) -> Result<(), CliError> {
    let registry = config.registry()?;
    registry.require_model(from)?;
    registry.require_model(to)?;

    let scope = SearchScope::new().block(blocked.iter().map(String::as_str));
    let chain = find_path(registry.graph(), from, to, max_hops, &scope).ok_or_else(|| {
        TangleError::GraphUnreachable(format!(
            "no path from '{from}' to '{to}' within {max_hops} hops"
        ))
    })?;

    println!("{}", output::heading(&format!("Route {from} -> {to}")));
    for hop in &chain.hops {
        let connection = &hop.connection;
        println!(
            "  {}",
            output::edge(
                &hop.from,
                &connection.local,
                &connection.model,
                &connection.remote,
                connection.is_outgoing()
            )
        );
    }
    println!();
    println!("  {} {} hops", output::status_ok(), chain.len());
    Ok(())
}
