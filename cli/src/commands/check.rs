//! Check command - validates the models and lists their connections

use crate::config::Config;
use crate::error::CliError;
use crate::output;

pub fn run(config: &Config) -> Result<(), CliError> {
    println!("{}", output::heading("Checking models..."));
    println!();

    let registry = config.registry()?;
    let graph = registry.graph();

    for model in registry.models() {
        let key = model
            .primary_key_field()
            .map(|pk| format!(", key {pk}"))
            .unwrap_or_default();
        println!(
            "  {} {}",
            output::label(model.name()),
            output::muted(&format!("({} fields{key})", model.all_fields().len()))
        );
        for connection in graph.outgoing(model.name()) {
            println!(
                "    {}",
                output::edge(
                    model.name(),
                    &connection.local,
                    &connection.model,
                    &connection.remote,
                    true
                )
            );
        }
    }

    println!();
    println!(
        "  {} {} models, max depth {}",
        output::status_ok(),
        registry.len(),
        config.statement.max_depth
    );
    Ok(())
}
