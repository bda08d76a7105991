//! Order command - write order and join anchor for a set of models

use tangle_core::{anchor_order, dependency_order};

use crate::config::Config;
use crate::error::CliError;
use crate::output;

pub fn run(config: &Config, models: &[String]) -> Result<(), CliError> {
    let registry = config.registry()?;
    for model in models {
        registry.require_model(model)?;
    }

    let writes = dependency_order(registry.graph(), models)?;
    let joins = anchor_order(registry.graph(), models);

    println!("  {}: {}", output::label("Write order"), writes.join(", "));
    if let Some(anchor) = joins.first() {
        println!("  {}: {}", output::label("Anchor"), anchor);
    }
    println!("  {}: {}", output::label("Join order"), joins.join(", "));
    Ok(())
}
