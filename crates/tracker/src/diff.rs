//! Diff computation for tracked resources
//!
//! The diffs are free text intended for people reading a report, not for
//! parsing. Each recognized kind has one pure function; [`build`] picks it
//! by the record's kind and turns any rendering error into an
//! `"Error: ..."` diff, so report finalization never fails because of a
//! diff.
//!
//! Package diff (install action):
//!
//! ```text
//! Packages: sous-package-one, sous-package-two
//! Current versions: 0.0.1, none
//! Wanted versions: 0.0.2, any
//! ```
//!
//! Service diff (stop action):
//!
//! ```text
//! Running: yes. Wants no.
//! ```

use crate::error::{Error, Result};
use crate::record::TrackedResource;
use crate::types::{Attributes, ResourceKind};
use serde_json::Value;

/// Build the diff for a finalized record
///
/// `engine_diff` is the content diff the engine rendered itself; only
/// file kinds use it.
pub fn build(record: &TrackedResource, engine_diff: Option<&str>) -> Option<String> {
    match render(record, engine_diff) {
        Ok(rendered) => rendered,
        Err(e) => Some(format!("Error: {e}")),
    }
}

fn render(record: &TrackedResource, engine_diff: Option<&str>) -> Result<Option<String>> {
    match record.kind() {
        ResourceKind::Package => package_diff(record),
        ResourceKind::Service => service_diff(record),
        ResourceKind::User => user_diff(record),
        ResourceKind::File => Ok(file_diff(engine_diff)),
        ResourceKind::Other => Ok(None),
    }
}

/// Compare installed and wanted package versions
///
/// Versions are lists aligned by position; a single package is a list of
/// one. The wanted side depends on the action.
pub fn package_diff(record: &TrackedResource) -> Result<Option<String>> {
    if !record.attributes_loaded {
        return Ok(None);
    }

    let current = versions(&record.loaded_attributes)?;
    let wanted = versions(&record.wanted_attributes)?;

    let installed: Vec<String> = current
        .iter()
        .map(|v| v.clone().unwrap_or_else(|| "none".to_string()))
        .collect();

    let wanted = match record.action.as_str() {
        "remove" | "purge" => vec!["none"; installed.len()].join(", "),
        "upgrade" => vec!["latest"; installed.len()].join(", "),
        // Locked packages cannot change, so wanted mirrors installed
        "lock" => installed.join(", "),
        // Blank rather than "none": unlocking does not imply a version
        "unlock" => " ".to_string(),
        _ => (0..installed.len())
            .map(|idx| {
                wanted
                    .get(idx)
                    .cloned()
                    .flatten()
                    .unwrap_or_else(|| "any".to_string())
            })
            .collect::<Vec<_>>()
            .join(", "),
    };

    Ok(Some(format!(
        "Packages: {}\nCurrent versions: {}\nWanted versions: {}\n",
        record.identity,
        installed.join(", "),
        wanted
    )))
}

/// Version attribute as a positional list
fn versions(attributes: &Attributes) -> Result<Vec<Option<String>>> {
    let invalid = || Error::InvalidAttribute {
        name: "version".to_string(),
        expected: "a string, a list of strings or null",
    };

    match attributes.get("version") {
        None | Some(Value::Null) => Ok(vec![None]),
        Some(Value::String(v)) => Ok(vec![Some(v.clone())]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => Ok(None),
                Value::String(v) => Ok(Some(v.clone())),
                _ => Err(invalid()),
            })
            .collect(),
        Some(_) => Err(invalid()),
    }
}

/// Compare the enabled or running state of a service
///
/// Only one axis is reported, picked by the action.
pub fn service_diff(record: &TrackedResource) -> Result<Option<String>> {
    if !record.attributes_loaded {
        return Ok(None);
    }

    let enabled = flag(&record.loaded_attributes, "enabled")?;
    let running = flag(&record.loaded_attributes, "running")?;

    let diff = match record.action.as_str() {
        "enable" => format!("Enabled: {}. Wants yes.", yes_no(enabled)),
        "disable" => format!("Enabled: {}. Wants no.", yes_no(enabled)),
        "start" | "restart" => format!("Running: {}. Wants yes.", yes_no(running)),
        "stop" => format!("Running: {}. Wants no.", yes_no(running)),
        _ => return Ok(None),
    };

    Ok(Some(diff))
}

fn flag(attributes: &Attributes, name: &str) -> Result<bool> {
    match attributes.get(name) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(Error::InvalidAttribute {
            name: name.to_string(),
            expected: "a boolean or null",
        }),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Describe what will happen to a user account
///
/// Passwords are never part of the diff, so a user can be "updated" while
/// every listed attribute is identical.
pub fn user_diff(record: &TrackedResource) -> Result<Option<String>> {
    if !record.attributes_loaded {
        return Ok(None);
    }

    let user_exists = !matches!(
        record.loaded_attributes.get("uid"),
        None | Some(Value::Null) | Some(Value::Bool(false))
    );
    let mut will_update = false;
    let mut output = vec![format!("Username: {}\n", record.identity)];

    match record.action.as_str() {
        "create" => {
            will_update = true;
            let verb = if user_exists { "updated" } else { "created" };
            output.push(format!("User will be {verb}.\n"));
        }
        // Lock state is not an attribute; an attempted converge means it was
        // not in the target state yet
        "lock" => {
            let phrase = will_be_or_is_already(record);
            output.push(format!("User {phrase} locked.\n"));
        }
        "unlock" => {
            let phrase = will_be_or_is_already(record);
            output.push(format!("User {phrase} unlocked.\n"));
        }
        "manage" | "modify" => {
            will_update = user_exists;
            let phrase = if user_exists { "will be" } else { "will not be" };
            output.push(format!("User {phrase} updated.\n"));
        }
        "remove" => {
            if user_exists {
                output.push("User will be deleted.\n".to_string());
            }
        }
        _ => {}
    }

    if user_exists {
        output.push("Current attributes:\n".to_string());
        output.push(user_info(&record.loaded_attributes)?);
    } else {
        output.push("User does not exist.\n".to_string());
    }

    if will_update {
        output.push("Declared attributes:\n".to_string());
        output.push(user_info(&record.wanted_attributes)?);
    }

    Ok(Some(output.join("\n")))
}

fn will_be_or_is_already(record: &TrackedResource) -> &'static str {
    if record.status.is_attempted() {
        "will be"
    } else {
        "is already"
    }
}

fn user_info(attributes: &Attributes) -> Result<String> {
    Ok(format!(
        "UID:      {}\nGID:      {}\nHome:     {}\nShell:    {}\nComment:  {}\n",
        display_value(attributes, "uid")?,
        display_value(attributes, "gid")?,
        display_value(attributes, "home")?,
        display_value(attributes, "shell")?,
        display_value(attributes, "comment")?,
    ))
}

fn display_value(attributes: &Attributes, name: &str) -> Result<String> {
    match attributes.get(name) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(_) => Err(Error::InvalidAttribute {
            name: name.to_string(),
            expected: "a string or a number",
        }),
    }
}

/// Unescape a content diff rendered by the engine
///
/// File diffs come from the engine so size and sensitivity limits stay
/// under its control.
pub fn file_diff(engine_diff: Option<&str>) -> Option<String> {
    engine_diff.map(|diff| diff.replace("\\n", "\n"))
}
