//! Path command - compiles a path expression and prints its accessors

use tangle_core::{Accessor, Loader, accessors_to_path, compile};

use crate::error::CliError;
use crate::output;

pub fn run(expression: &str) -> Result<(), CliError> {
    let accessors = compile(expression)?;

    println!("{}", output::heading("Accessors"));
    for (idx, accessor) in accessors.iter().enumerate() {
        println!("  {idx}. {}", describe(accessor));
    }
    println!();
    println!(
        "  {}: {}",
        output::label("Canonical"),
        accessors_to_path(&accessors)
    );
    Ok(())
}

fn describe(accessor: &Accessor) -> String {
    let kind = match accessor.loader {
        Loader::Access => "access",
        Loader::Include => "include",
        Loader::Method => "method",
    };
    let mut line = format!("{kind} {accessor}");
    if accessor.series != accessor.model && !accessor.model.is_empty() {
        line.push_str(&output::muted(&format!(" as {}", accessor.series)));
    }
    if accessor.optional {
        line.push_str(&output::muted(" optional"));
    }
    line
}
