//! Rule-based attribute validation.
//!
//! A [`RuleSet`] maps column names to rule lists (or nested rule sets for
//! JSON object attributes). Rules are written in pipe syntax,
//! `"required|string|max:255"`, and merged with [`RuleSet::merge`].
//!
//! [`model_rules`] derives the baseline rules of an entity from its column
//! descriptors; a model's attributes are *complete* exactly when they pass
//! the validator built from those rules plus any registered overrides.

use crate::model::Attributes;
use crate::schema::{ColumnDef, ColumnType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

static EMAIL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// Error raised when a rule string cannot be parsed
#[derive(Debug, Clone, PartialEq)]
pub enum RuleError {
    /// Rule name is not known
    UnknownRule(String),
    /// Rule parameter is missing or malformed (`min:abc`)
    InvalidParameter { rule: String, parameter: String },
    /// A rule document value is neither a pipe string, a list nor an object
    InvalidDocument(String),
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::UnknownRule(rule) => write!(f, "Unknown validation rule: {rule}"),
            RuleError::InvalidParameter { rule, parameter } => {
                write!(f, "Invalid parameter for rule {rule}: {parameter:?}")
            }
            RuleError::InvalidDocument(msg) => write!(f, "Invalid rule document: {msg}"),
        }
    }
}

impl std::error::Error for RuleError {}

/// A single validation rule
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    Integer,
    Numeric,
    String,
    Boolean,
    Email,
    Min(f64),
    Max(f64),
    In(Vec<JsonValue>),
}

impl Rule {
    /// Parse `"required|string"` into its rules, in order
    pub fn parse_list(rules: &str) -> Result<Vec<Rule>, RuleError> {
        rules
            .split('|')
            .map(str::trim)
            .filter(|rule| !rule.is_empty())
            .map(Rule::from_str)
            .collect()
    }

    fn check(&self, value: Option<&JsonValue>) -> bool {
        let value = match value {
            None | Some(JsonValue::Null) => return !matches!(self, Rule::Required),
            Some(value) => value,
        };
        match self {
            Rule::Required => match value {
                JsonValue::String(s) => !s.is_empty(),
                JsonValue::Array(a) => !a.is_empty(),
                _ => true,
            },
            Rule::Integer => match value {
                JsonValue::Number(n) => n.is_i64() || n.is_u64(),
                JsonValue::String(s) => s.parse::<i64>().is_ok(),
                _ => false,
            },
            Rule::Numeric => numeric(value).is_some(),
            Rule::String => value.is_string(),
            Rule::Boolean => {
                value.is_boolean()
                    || matches!(value.as_i64(), Some(0 | 1))
                    || matches!(value.as_str(), Some("true" | "false" | "0" | "1"))
            }
            Rule::Email => match (value.as_str(), EMAIL.as_ref()) {
                (Some(s), Some(regex)) => regex.is_match(s),
                _ => false,
            },
            Rule::Min(min) => size(value).is_some_and(|size| size >= *min),
            Rule::Max(max) => size(value).is_some_and(|size| size <= *max),
            Rule::In(allowed) => allowed.iter().any(|candidate| {
                candidate == value || as_plain_string(candidate) == as_plain_string(value)
            }),
        }
    }
}

fn numeric(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Numbers compare by value, strings by character count, arrays by length
fn size(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => Some(s.chars().count() as f64),
        JsonValue::Array(a) => Some(a.len() as f64),
        _ => None,
    }
}

fn as_plain_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl FromStr for Rule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, parameter) = match s.split_once(':') {
            Some((name, parameter)) => (name, Some(parameter)),
            None => (s, None),
        };
        let number = |parameter: Option<&str>| {
            parameter
                .and_then(|p| p.trim().parse::<f64>().ok())
                .ok_or_else(|| RuleError::InvalidParameter {
                    rule: name.to_string(),
                    parameter: parameter.unwrap_or_default().to_string(),
                })
        };
        match name {
            "required" => Ok(Rule::Required),
            "integer" => Ok(Rule::Integer),
            "numeric" => Ok(Rule::Numeric),
            "string" => Ok(Rule::String),
            "boolean" => Ok(Rule::Boolean),
            "email" => Ok(Rule::Email),
            "min" => number(parameter).map(Rule::Min),
            "max" => number(parameter).map(Rule::Max),
            "in" => Ok(Rule::In(
                parameter
                    .unwrap_or_default()
                    .split(',')
                    .filter(|item| !item.is_empty())
                    .map(|item| {
                        item.parse::<i64>()
                            .map(JsonValue::from)
                            .unwrap_or_else(|_| JsonValue::String(item.to_string()))
                    })
                    .collect(),
            )),
            other => Err(RuleError::UnknownRule(other.to_string())),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => f.write_str("required"),
            Rule::Integer => f.write_str("integer"),
            Rule::Numeric => f.write_str("numeric"),
            Rule::String => f.write_str("string"),
            Rule::Boolean => f.write_str("boolean"),
            Rule::Email => f.write_str("email"),
            Rule::Min(n) => write!(f, "min:{n}"),
            Rule::Max(n) => write!(f, "max:{n}"),
            Rule::In(values) => {
                let values: Vec<String> = values.iter().map(as_plain_string).collect();
                write!(f, "in:{}", values.join(","))
            }
        }
    }
}

/// Rules attached to one attribute
#[derive(Debug, Clone, PartialEq)]
pub enum RuleNode {
    List(Vec<Rule>),
    Nested(RuleSet),
}

impl From<Vec<Rule>> for RuleNode {
    fn from(rules: Vec<Rule>) -> Self {
        RuleNode::List(rules)
    }
}

impl From<Rule> for RuleNode {
    fn from(rule: Rule) -> Self {
        RuleNode::List(vec![rule])
    }
}

impl From<RuleSet> for RuleNode {
    fn from(rules: RuleSet) -> Self {
        RuleNode::Nested(rules)
    }
}

/// Ordered mapping of attribute name to its rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    entries: Vec<(String, RuleNode)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rules for `field`, merging with what is already there
    pub fn with(mut self, field: &str, rules: impl Into<RuleNode>) -> Self {
        self.add(field, rules.into());
        self
    }

    /// Parse pipe syntax and add it for `field`
    pub fn with_str(self, field: &str, rules: &str) -> Result<Self, RuleError> {
        Ok(self.with(field, Rule::parse_list(rules)?))
    }

    /// Build from a JSON document: `{"name": "required|string", "tags": ["string"], "bio": {...}}`
    pub fn from_json(document: &JsonValue) -> Result<Self, RuleError> {
        let map = document
            .as_object()
            .ok_or_else(|| RuleError::InvalidDocument(format!("expected object, got {document}")))?;
        let mut set = RuleSet::new();
        for (field, value) in map {
            let node = match value {
                JsonValue::String(s) => RuleNode::List(Rule::parse_list(s)?),
                JsonValue::Array(items) => RuleNode::List(
                    items
                        .iter()
                        .map(|item| {
                            item.as_str()
                                .ok_or_else(|| {
                                    RuleError::InvalidDocument(format!("expected rule string, got {item}"))
                                })
                                .and_then(Rule::from_str)
                        })
                        .collect::<Result<_, _>>()?,
                ),
                JsonValue::Object(_) => RuleNode::Nested(RuleSet::from_json(value)?),
                other => {
                    return Err(RuleError::InvalidDocument(format!(
                        "unexpected rule value for {field}: {other}"
                    )))
                }
            };
            set.add(field, node);
        }
        Ok(set)
    }

    pub fn get(&self, field: &str) -> Option<&RuleNode> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, node)| node)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuleNode)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Deep merge `other` into `self`
    ///
    /// Existing fields keep their position; new rules are appended after the
    /// existing ones and duplicates are dropped. Nested sets merge
    /// recursively. A list and a nested set never merge: the existing node wins.
    pub fn merge(&mut self, other: RuleSet) {
        for (field, node) in other.entries {
            self.add(&field, node);
        }
    }

    fn add(&mut self, field: &str, node: RuleNode) {
        let Some(index) = self.entries.iter().position(|(name, _)| name == field) else {
            self.entries.push((field.to_string(), node));
            return;
        };
        match (&mut self.entries[index].1, node) {
            (RuleNode::List(current), RuleNode::List(additional)) => {
                for rule in additional {
                    if !current.contains(&rule) {
                        current.push(rule);
                    }
                }
            }
            (RuleNode::Nested(current), RuleNode::Nested(additional)) => {
                current.merge(additional);
            }
            _ => {}
        }
    }
}

/// Derive baseline rules from column descriptors
///
/// A column is `required` unless it is nullable, has a default, or is an
/// auto-increment primary key. Typed columns add the matching type rule.
pub fn model_rules(columns: &[ColumnDef]) -> RuleSet {
    let mut rules = RuleSet::new();
    for column in columns {
        let generated_key = column.auto_increment && column.primary_key;
        if !column.nullable && !generated_key && column.default.is_none() {
            rules.add(&column.name, Rule::Required.into());
        }
        let type_rule = match column.column_type {
            ColumnType::Integer => Some(Rule::Integer),
            ColumnType::Text => Some(Rule::String),
            ColumnType::Real => Some(Rule::Numeric),
            ColumnType::Boolean => Some(Rule::Boolean),
            ColumnType::Json => None,
        };
        if let Some(rule) = type_rule {
            rules.add(&column.name, rule.into());
        }
    }
    rules
}

/// A failed rule, with the dotted path of the attribute it applies to
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub field: String,
    pub rule: Rule,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "The {} field failed the {} rule", self.field, self.rule)
    }
}

/// Checks attribute maps against a rule set
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: RuleSet,
}

impl Validator {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Baseline column rules merged with `overrides`
    pub fn for_columns(columns: &[ColumnDef], overrides: Option<&RuleSet>) -> Self {
        let mut rules = model_rules(columns);
        if let Some(overrides) = overrides {
            rules.merge(overrides.clone());
        }
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn passes(&self, attributes: &Attributes) -> bool {
        self.errors(attributes).is_empty()
    }

    pub fn errors(&self, attributes: &Attributes) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();
        collect_failures(&self.rules, attributes, "", &mut failures);
        failures
    }
}

fn collect_failures(
    rules: &RuleSet,
    attributes: &Attributes,
    prefix: &str,
    failures: &mut Vec<ValidationFailure>,
) {
    for (field, node) in rules.iter() {
        let path = format!("{prefix}{field}");
        let value = attributes.get(field);
        match node {
            RuleNode::List(list) => {
                for rule in list {
                    if !rule.check(value) {
                        failures.push(ValidationFailure {
                            field: path.clone(),
                            rule: rule.clone(),
                        });
                    }
                }
            }
            RuleNode::Nested(nested) => {
                let empty = Attributes::new();
                let inner = value.and_then(JsonValue::as_object).unwrap_or(&empty);
                collect_failures(nested, inner, &format!("{path}."), failures);
            }
        }
    }
}
