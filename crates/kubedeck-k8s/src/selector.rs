//! Label selectors evaluated against cached objects

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RepositoryError;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    NotExists(String),
    In(String, Vec<String>),
    NotIn(String, Vec<String>),
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Equals(k, v) => labels.get(k) == Some(v),
            Self::NotEquals(k, v) => labels.get(k) != Some(v),
            Self::Exists(k) => labels.contains_key(k),
            Self::NotExists(k) => !labels.contains_key(k),
            Self::In(k, values) => labels.get(k).is_some_and(|v| values.contains(v)),
            Self::NotIn(k, values) => labels.get(k).is_none_or(|v| !values.contains(v)),
        }
    }
}

/// A parsed Kubernetes label selector (`app=web,tier!=db,env in (a,b)`)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Selector that matches every object
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        let empty = BTreeMap::new();
        let labels = labels.unwrap_or(&empty);
        self.requirements.iter().all(|r| r.matches(labels))
    }

    /// Add an equality requirement
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements
            .push(Requirement::Equals(key.into(), value.into()));
        self
    }
}

/// Split on commas that are not inside a parenthesised value set
fn split_terms(input: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                terms.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(&input[start..]);
    terms
}

fn parse_set(key: &str, rest: &str) -> Result<(String, Vec<String>), RepositoryError> {
    let rest = rest.trim();
    let inner = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| RepositoryError::Invalid(format!("expected '(...)' after '{}'", key)))?;
    let values: Vec<String> = inner
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return Err(RepositoryError::Invalid(format!(
            "empty value set for '{}'",
            key
        )));
    }
    Ok((key.to_string(), values))
}

fn parse_term(term: &str) -> Result<Requirement, RepositoryError> {
    let term = term.trim();

    if let Some(key) = term.strip_prefix('!') {
        return Ok(Requirement::NotExists(key.trim().to_string()));
    }
    if let Some((key, value)) = term.split_once("!=") {
        return Ok(Requirement::NotEquals(
            key.trim().to_string(),
            value.trim().to_string(),
        ));
    }
    if let Some((key, value)) = term.split_once("==").or_else(|| term.split_once('=')) {
        return Ok(Requirement::Equals(
            key.trim().to_string(),
            value.trim().to_string(),
        ));
    }
    if let Some((key, rest)) = term.split_once(" notin ") {
        let (key, values) = parse_set(key.trim(), rest)?;
        return Ok(Requirement::NotIn(key, values));
    }
    if let Some((key, rest)) = term.split_once(" in ") {
        let (key, values) = parse_set(key.trim(), rest)?;
        return Ok(Requirement::In(key, values));
    }
    if term.contains(char::is_whitespace) || term.contains('(') {
        return Err(RepositoryError::Invalid(format!(
            "cannot parse selector term '{}'",
            term
        )));
    }
    Ok(Requirement::Exists(term.to_string()))
}

impl FromStr for Selector {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::everything());
        }
        let requirements = split_terms(s)
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .map(parse_term)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { requirements })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self
            .requirements
            .iter()
            .map(|r| match r {
                Requirement::Equals(k, v) => format!("{}={}", k, v),
                Requirement::NotEquals(k, v) => format!("{}!={}", k, v),
                Requirement::Exists(k) => k.clone(),
                Requirement::NotExists(k) => format!("!{}", k),
                Requirement::In(k, vs) => format!("{} in ({})", k, vs.join(",")),
                Requirement::NotIn(k, vs) => format!("{} notin ({})", k, vs.join(",")),
            })
            .collect();
        f.write_str(&terms.join(","))
    }
}
