//! Shoot list columns: identifiers, raw attribute extraction and sort values.
//!
//! This module provides:
//! - The [`Column`] identifiers accepted by `--sort` and the view commands
//! - Human-readable specs for the default list layout
//! - Raw text values (search, display) and comparable [`SortValue`]s

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::Value;
use vigil_core::Resource;

use crate::shoot;
use crate::tickets::TicketSource;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Column {
    Name,
    Purpose,
    LastOperation,
    CreatedAt,
    CreatedBy,
    Project,
    K8sVersion,
    Infrastructure,
    Seed,
    TicketLabels,
    Readiness,
    Ticket,
    /// Any other string-valued `metadata` field.
    Metadata(String),
}

impl Column {
    pub fn as_str(&self) -> &str {
        match self {
            Column::Name => "name",
            Column::Purpose => "purpose",
            Column::LastOperation => "lastOperation",
            Column::CreatedAt => "createdAt",
            Column::CreatedBy => "createdBy",
            Column::Project => "project",
            Column::K8sVersion => "k8sVersion",
            Column::Infrastructure => "infrastructure",
            Column::Seed => "seed",
            Column::TicketLabels => "ticketLabels",
            Column::Readiness => "readiness",
            Column::Ticket => "ticket",
            Column::Metadata(field) => field,
        }
    }

    /// Values of these columns never change over an object's lifetime.
    pub fn is_immutable(&self) -> bool {
        matches!(self, Column::Name | Column::Infrastructure | Column::Project | Column::CreatedAt | Column::CreatedBy)
    }
}

impl FromStr for Column {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "name" => Column::Name,
            "purpose" => Column::Purpose,
            "lastOperation" => Column::LastOperation,
            "createdAt" => Column::CreatedAt,
            "createdBy" => Column::CreatedBy,
            "project" => Column::Project,
            "k8sVersion" => Column::K8sVersion,
            "infrastructure" => Column::Infrastructure,
            "seed" => Column::Seed,
            "ticketLabels" => Column::TicketLabels,
            "readiness" => Column::Readiness,
            "ticket" => Column::Ticket,
            other => Column::Metadata(other.to_string()),
        })
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSpec {
    pub column: Column,
    pub label: &'static str,
    pub width: usize,
}

fn col(column: Column, label: &'static str, width: usize) -> ColumnSpec {
    ColumnSpec { column, label, width }
}

/// Default list layout for shoots.
pub fn shoot_columns(all_namespaces: bool) -> Vec<ColumnSpec> {
    let mut cols = Vec::new();
    if all_namespaces {
        cols.push(col(Column::Project, "PROJECT", 16));
    }
    cols.push(col(Column::Name, "NAME", 24));
    cols.push(col(Column::Infrastructure, "INFRASTRUCTURE", 24));
    cols.push(col(Column::Seed, "SEED", 16));
    cols.push(col(Column::K8sVersion, "VERSION", 10));
    cols.push(col(Column::Purpose, "PURPOSE", 14));
    cols.push(col(Column::LastOperation, "LAST OPERATION", 20));
    cols.push(col(Column::CreatedBy, "CREATED BY", 18));
    cols
}

/// Text value of a column as shown and searched.
pub fn raw_value(column: &Column, obj: &Resource, tickets: &dyn TicketSource) -> Option<String> {
    let owned = |s: Option<&str>| s.map(str::to_string);
    match column {
        Column::Name => owned(obj.name()),
        Column::Purpose => owned(obj.str_at("/spec/purpose")),
        Column::LastOperation => {
            let op = obj.pointer("/status/lastOperation")?;
            let kind = op.get("type").and_then(Value::as_str).unwrap_or("");
            let state = op.get("state").and_then(Value::as_str).unwrap_or("");
            Some(match op.get("progress").and_then(Value::as_u64) {
                Some(p) if state == "Processing" => format!("{} {} {}%", kind, state, p),
                _ => format!("{} {}", kind, state),
            })
        }
        Column::CreatedAt => owned(obj.creation_timestamp()),
        Column::CreatedBy => owned(shoot::created_by(obj)),
        Column::Project => owned(shoot::project_name(obj)),
        Column::K8sVersion => owned(obj.str_at("/spec/kubernetes/version")),
        Column::Infrastructure => Some(format!(
            "{} {}",
            obj.str_at("/spec/provider/type").unwrap_or(""),
            obj.str_at("/spec/region").unwrap_or("")
        )),
        Column::Seed => owned(obj.str_at("/spec/seedName")),
        Column::TicketLabels => {
            let (ns, name) = (obj.namespace().unwrap_or(""), obj.name().unwrap_or(""));
            Some(tickets.label_names(ns, name).join(" "))
        }
        Column::Readiness => earliest_failing_transition(obj).map(str::to_string),
        Column::Ticket => {
            let (ns, name) = (obj.namespace().unwrap_or(""), obj.name().unwrap_or(""));
            tickets.latest_updated(ns, name).map(|t| t.updated_at)
        }
        Column::Metadata(field) => obj.pointer("/metadata").and_then(|m| m.get(field.as_str())).and_then(Value::as_str).map(str::to_string),
    }
}

/// Comparable sort key of one object for one column.
///
/// Variants order `Rank < Time < Version < Text < Missing`, so absent values
/// land last in ascending order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Rank(u32),
    Time(DateTime<Utc>),
    Version(semver::Version),
    Text(String),
    Missing,
}

impl SortValue {
    pub fn is_missing(&self) -> bool { matches!(self, SortValue::Missing) }

    fn time_or_text(s: Option<&str>) -> Self {
        match s {
            None => SortValue::Missing,
            Some(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(t) => SortValue::Time(t.with_timezone(&Utc)),
                Err(_) => SortValue::Text(s.to_lowercase()),
            },
        }
    }
}

pub fn sort_value(column: &Column, obj: &Resource, tickets: &dyn TicketSource) -> SortValue {
    match column {
        Column::Purpose => SortValue::Rank(purpose_rank(obj.str_at("/spec/purpose"))),
        Column::LastOperation => SortValue::Rank(last_operation_rank(obj)),
        Column::K8sVersion => match obj.str_at("/spec/kubernetes/version") {
            None => SortValue::Missing,
            Some(v) => semver::Version::parse(v.trim_start_matches('v'))
                .map(SortValue::Version)
                .unwrap_or_else(|_| SortValue::Text(v.to_lowercase())),
        },
        Column::CreatedAt => SortValue::time_or_text(obj.creation_timestamp()),
        Column::Readiness => SortValue::time_or_text(earliest_failing_transition(obj)),
        Column::Ticket => SortValue::time_or_text(raw_value(column, obj, tickets).as_deref()),
        _ => match raw_value(column, obj, tickets) {
            Some(s) => SortValue::Text(s.to_lowercase()),
            None => SortValue::Missing,
        },
    }
}

pub fn purpose_rank(purpose: Option<&str>) -> u32 {
    match purpose {
        Some("infrastructure") => 0,
        Some("production") => 1,
        Some("development") => 2,
        Some("evaluation") => 3,
        _ => 4,
    }
}

/// Rank bands for the last operation column; lower means more urgent.
///
/// Bands that carry progress add it (0..=99) to the band base.
pub fn last_operation_rank(obj: &Resource) -> u32 {
    let op = obj.pointer("/status/lastOperation");
    let state = op.and_then(|o| o.get("state")).and_then(Value::as_str);
    let progress = op.and_then(|o| o.get("progress")).and_then(Value::as_u64).unwrap_or(0);
    let in_progress = progress != 0 && progress != 100 && state != Some("Failed");
    let progress = progress.min(99) as u32;

    let last_errors = shoot::last_errors(obj);
    let has_errors = last_errors.and_then(Value::as_array).map(|a| !a.is_empty()).unwrap_or(false);
    let is_error = state == Some("Failed") || has_errors;
    let user_error = shoot::is_user_error(&shoot::error_codes(last_errors));

    if shoot::is_reconciliation_deactivated(obj) {
        return if is_error { 400 } else { 450 };
    }
    match (user_error, is_error, in_progress) {
        (true, _, false) => 200,
        (true, _, true) => 300 + progress,
        (false, true, false) => 0,
        (false, true, true) => 100 + progress,
        (false, false, true) => 600 + progress,
        (false, false, false) if shoot::is_hibernated(obj) => 500,
        (false, false, false) => 700,
    }
}

/// Earliest `lastTransitionTime` among conditions whose status is not `True`.
pub fn earliest_failing_transition(obj: &Resource) -> Option<&str> {
    shoot::conditions(obj)?
        .as_array()?
        .iter()
        .filter(|c| c.get("status").and_then(Value::as_str) != Some("True"))
        .filter_map(|c| c.get("lastTransitionTime").and_then(Value::as_str))
        .min()
}

/// Whether replacing `old` by `new` can move the object under `column`.
pub fn sort_value_changed(column: &Column, old: &Resource, new: &Resource, tickets: &dyn TicketSource) -> bool {
    sort_value(column, old, tickets) != sort_value(column, new, tickets)
}
