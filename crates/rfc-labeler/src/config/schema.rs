//! Field validation for the settings document.

use serde_yaml::Value;

use super::{LabelerConfig, MAX_ACTIONS_PER_RUN};

/// Apply every recognised field of `doc` onto `config`.
///
/// Fields that fail validation keep their default. Returns one message per
/// problem.
pub(super) fn apply(doc: &Value, config: &mut LabelerConfig) -> Vec<String> {
    let mut errors = Vec::new();

    let map = match doc {
        Value::Null => return errors,
        Value::Mapping(map) => map,
        _ => {
            errors.push(r#""value" must be an object"#.to_string());
            return errors;
        }
    };

    for (key, value) in map {
        let Some(key) = key.as_str() else {
            errors.push(format!("{key:?} is not a valid key"));
            continue;
        };

        match key {
            "daysUntilTimeout" => match number(value) {
                Some(days) if days.is_finite() && days > 0.0 => config.days_until_timeout = days,
                _ => errors.push(r#""daysUntilTimeout" must be a positive number"#.to_string()),
            },
            "onlyLabels" => match label_list(value) {
                Some(labels) => config.only_labels = labels,
                None => errors.push(r#""onlyLabels" must be a list of labels"#.to_string()),
            },
            "exemptLabels" => match label_list(value) {
                Some(labels) => config.exempt_labels = labels,
                None => errors.push(r#""exemptLabels" must be a list of labels"#.to_string()),
            },
            "exemptAssignees" => match value.as_bool() {
                Some(flag) => config.exempt_assignees = flag,
                None => errors.push(r#""exemptAssignees" must be a boolean"#.to_string()),
            },
            "timeoutLabel" => match value.as_str() {
                Some(label) if !label.trim().is_empty() => {
                    config.timeout_label = label.to_string();
                }
                _ => errors.push(r#""timeoutLabel" must be a non-empty string"#.to_string()),
            },
            "markComment" => match comment(value) {
                Some(body) => config.mark_comment = body,
                None => errors.push(r#""markComment" must be a string or false"#.to_string()),
            },
            "unmarkComment" => match comment(value) {
                Some(body) => config.unmark_comment = body,
                None => errors.push(r#""unmarkComment" must be a string or false"#.to_string()),
            },
            "limitPerRun" => {
                let (limit, valid) = limit_per_run(value);
                config.limit_per_run = limit;
                if !valid {
                    errors.push(
                        r#""limitPerRun" must be an integer between 1 and 30"#.to_string(),
                    );
                }
            }
            "perform" => match value.as_bool() {
                Some(flag) => config.perform = flag,
                None => errors.push(r#""perform" must be a boolean"#.to_string()),
            },
            // Coordinates always come from the repository being processed;
            // `_extends` is consumed by the loader.
            "owner" | "repo" | "_extends" => {}
            other => errors.push(format!(r#""{other}" is not allowed"#)),
        }
    }

    errors
}

/// A label list: a sequence, a single label, or null for none.
fn label_list(value: &Value) -> Option<Vec<String>> {
    let raw: Vec<String> = match value {
        Value::Null => Vec::new(),
        Value::Sequence(items) => items.iter().map(scalar).collect::<Option<_>>()?,
        other => vec![scalar(other)?],
    };

    let mut labels: Vec<String> = Vec::with_capacity(raw.len());
    for label in raw {
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    Some(labels)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `Some(Some(body))` for a comment, `Some(None)` when disabled with `false`.
fn comment(value: &Value) -> Option<Option<String>> {
    match value {
        Value::String(body) if !body.is_empty() => Some(Some(body.clone())),
        Value::Bool(false) => Some(None),
        _ => None,
    }
}

/// A number, or a string holding one.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        other => other.as_f64(),
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        other => other.as_i64(),
    }
}

/// Clamp into `1..=30`; the flag reports whether the raw value was valid.
fn limit_per_run(value: &Value) -> (u32, bool) {
    match integer(value) {
        Some(n) if (1..=i64::from(MAX_ACTIONS_PER_RUN)).contains(&n) => (n as u32, true),
        Some(n) if n < 1 => (1, false),
        _ => (MAX_ACTIONS_PER_RUN, false),
    }
}
