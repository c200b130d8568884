//! Text renderings of live objects: YAML manifests and describe output

use std::fmt::Write;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Event;
use serde_json::Value;

use crate::error::RepositoryError;
use kubedeck_types::format_age;

/// Manifest as YAML, without `metadata.managedFields`
pub fn to_yaml(mut value: Value) -> Result<String, RepositoryError> {
    if let Some(meta) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        meta.remove("managedFields");
    }
    serde_yaml::to_string(&value)
        .map_err(|e| RepositoryError::Invalid(format!("cannot render YAML: {}", e)))
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
}

fn write_map(out: &mut String, title: &str, map: Option<&Value>) {
    let entries = map.and_then(Value::as_object).filter(|m| !m.is_empty());
    match entries {
        None => {
            let _ = writeln!(out, "{:<14}<none>", format!("{}:", title));
        }
        Some(entries) => {
            for (i, (k, v)) in entries.iter().enumerate() {
                let label = if i == 0 { format!("{}:", title) } else { String::new() };
                let v = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                let _ = writeln!(out, "{:<14}{}={}", label, k, v);
            }
        }
    }
}

fn event_time(event: &Event) -> Option<DateTime<Utc>> {
    event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
        .or_else(|| event.metadata.creation_timestamp.as_ref().map(|t| t.0))
}

/// kubectl-describe style summary of an object and its recent events
pub fn describe(value: &Value, events: &[Event], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let field = |label: &str, text: &str| format!("{:<14}{}\n", format!("{}:", label), text);

    out.push_str(&field("Name", str_at(value, &["metadata", "name"]).unwrap_or("")));
    if let Some(ns) = str_at(value, &["metadata", "namespace"]) {
        out.push_str(&field("Namespace", ns));
    }
    out.push_str(&field("Kind", str_at(value, &["kind"]).unwrap_or("")));
    out.push_str(&field(
        "API Version",
        str_at(value, &["apiVersion"]).unwrap_or(""),
    ));
    write_map(&mut out, "Labels", value.pointer("/metadata/labels"));
    write_map(&mut out, "Annotations", value.pointer("/metadata/annotations"));
    if let Some(created) = str_at(value, &["metadata", "creationTimestamp"]) {
        out.push_str(&field("Created", created));
    }
    if let Some(phase) = str_at(value, &["status", "phase"]) {
        out.push_str(&field("Status", phase));
    }

    if let Some(conditions) = value.pointer("/status/conditions").and_then(Value::as_array) {
        out.push_str("Conditions:\n");
        let _ = writeln!(out, "  {:<28}{:<8}{}", "Type", "Status", "Reason");
        for cond in conditions {
            let _ = writeln!(
                out,
                "  {:<28}{:<8}{}",
                str_at(cond, &["type"]).unwrap_or(""),
                str_at(cond, &["status"]).unwrap_or(""),
                str_at(cond, &["reason"]).unwrap_or("")
            );
        }
    }

    out.push_str("Events:");
    if events.is_empty() {
        out.push_str("       <none>\n");
        return out;
    }
    out.push('\n');

    let mut events: Vec<&Event> = events.iter().collect();
    events.sort_by_key(|e| event_time(e));
    let _ = writeln!(out, "  {:<9}{:<22}{:<6}{}", "Type", "Reason", "Age", "Message");
    for event in events {
        let age = event_time(event)
            .map(|t| format_age(now.signed_duration_since(t)))
            .unwrap_or_else(|| "<unknown>".to_string());
        let _ = writeln!(
            out,
            "  {:<9}{:<22}{:<6}{}",
            event.type_.as_deref().unwrap_or(""),
            event.reason.as_deref().unwrap_or(""),
            age,
            event.message.as_deref().unwrap_or("").trim()
        );
    }
    out
}
