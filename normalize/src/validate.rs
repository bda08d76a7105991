use tangle_core::{ModelRegistry, TangleError, ValidationIssue};

use crate::datum::{Datum, Slot};

/// Structural checks run over a whole batch before the first write.
pub fn validate<'d, I>(registry: &ModelRegistry, datums: I) -> Result<(), TangleError>
where
    I: IntoIterator<Item = &'d Datum>,
{
    let mut issues = Vec::new();
    for datum in datums {
        check(registry, datum, &mut issues);
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(TangleError::Validation(issues))
    }
}

fn check(registry: &ModelRegistry, datum: &Datum, issues: &mut Vec<ValidationIssue>) {
    let Some(model) = registry.model(&datum.model) else {
        issues.push(ValidationIssue::new(
            datum.location.clone(),
            format!("unknown model '{}'", datum.model),
        ));
        return;
    };

    for (name, slot) in &datum.content {
        let at = datum.location.child(name.as_str());
        let Some(field) = model.get_field(name) else {
            issues.push(ValidationIssue::new(
                at,
                format!("'{}' has no field '{name}'", datum.model),
            ));
            continue;
        };
        match slot {
            Slot::Pending { .. } if field.relation_target().is_none() => {
                issues.push(ValidationIssue::new(at, "reference on a field that is not a foreign key"));
            }
            Slot::Value(value) if value.is_null() && field.is_required() => {
                issues.push(ValidationIssue::new(at, "required field is null"));
            }
            _ => {}
        }
    }

    // Only a create has to supply every required field.
    if datum.record.is_some() {
        return;
    }
    for field in model.all_fields().iter().filter(|f| f.is_required()) {
        if !datum.content.contains_key(field.name()) {
            issues.push(ValidationIssue::new(
                datum.location.child(field.name()),
                "required field is missing",
            ));
        }
    }
}
