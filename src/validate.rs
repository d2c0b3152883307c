//! Runtime validation of decoded tool arguments.
//!
//! Rules come from each field's `#[validate("...")]` annotation and are kept
//! separate from the schema annotation: a field may carry a rule the
//! advertised schema never mentions, and the other way round.
//!
//! Rules are evaluated against [`ToolArgs::field_values`]: each field of the
//! decoded instance, keyed by the wire name the caller used, so numbers and
//! strings are judged after decoding rather than in whatever form the caller
//! sent them.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::error::TypeShapeError;
use crate::schema::{FieldSpec, FieldValues, JsonObject, Shape, ToolArgs};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern compiles")
});

const KNOWN_RULES: &[&str] = &[
    "required", "omitempty", "min", "max", "gte", "lte", "gt", "lt", "len", "oneof", "email", "url",
];

/// One rule violated by one field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldViolation {
    /// Wire name of the offending field.
    pub field: String,
    pub rule: String,
    pub message: String,
}

/// Every violation found in one validation pass, in field then rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("validation failed: {}", join_violations(.0))]
pub struct ValidationErrors(pub Vec<FieldViolation>);

impl ValidationErrors {
    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldViolation> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a FieldViolation;
    type IntoIter = std::slice::Iter<'a, FieldViolation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single named rule with its optional parameter, e.g. `min=3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub param: Option<String>,
}

enum Verdict {
    Pass,
    Fail,
    /// The rule cannot be evaluated: unknown name, or a missing or malformed parameter.
    Unusable,
}

impl Rule {
    pub fn parse(token: &str) -> Option<Rule> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        let (name, param) = match token.split_once('=') {
            Some((name, param)) => (name.trim(), Some(param.to_string())),
            None => (token, None),
        };
        Some(Rule {
            name: name.to_string(),
            param,
        })
    }

    /// Whether this is one of the rules the gate evaluates.
    pub fn is_known(&self) -> bool {
        KNOWN_RULES.contains(&self.name.as_str())
    }

    fn evaluate(&self, value: &Value) -> Verdict {
        match self.name.as_str() {
            "required" => verdict(!is_zero(value)),
            "omitempty" => Verdict::Pass,
            "min" => self.compare(value, |actual, limit| actual >= limit),
            "max" => self.compare(value, |actual, limit| actual <= limit),
            "gte" => self.compare(value, |actual, limit| actual >= limit),
            "lte" => self.compare(value, |actual, limit| actual <= limit),
            "gt" => self.compare(value, |actual, limit| actual > limit),
            "lt" => self.compare(value, |actual, limit| actual < limit),
            "len" => self.compare(value, |actual, limit| actual == limit),
            "oneof" => match &self.param {
                Some(param) => verdict(is_one_of(value, param)),
                None => Verdict::Unusable,
            },
            "email" => verdict(value.as_str().is_some_and(|s| EMAIL_PATTERN.is_match(s))),
            "url" => verdict(value.as_str().is_some_and(|s| Url::parse(s).is_ok())),
            _ => Verdict::Unusable,
        }
    }

    fn compare(&self, value: &Value, accept: impl Fn(f64, f64) -> bool) -> Verdict {
        let Some(limit) = self.param.as_deref().and_then(|p| p.trim().parse::<f64>().ok()) else {
            return Verdict::Unusable;
        };
        match measure(value) {
            Some(actual) => verdict(accept(actual, limit)),
            None => Verdict::Fail,
        }
    }

    /// Human-readable explanation of a violation of this rule.
    pub fn message(&self) -> String {
        let param = self.param.as_deref().unwrap_or_default();
        match self.name.as_str() {
            "required" => "is required".to_string(),
            "min" => format!("must be at least {}", param),
            "max" => format!("must be at most {}", param),
            "email" => "must be a valid email address".to_string(),
            "url" => "must be a valid URL".to_string(),
            "oneof" => format!("must be one of: {}", param),
            "gte" => format!("must be greater than or equal to {}", param),
            "lte" => format!("must be less than or equal to {}", param),
            "gt" => format!("must be greater than {}", param),
            "lt" => format!("must be less than {}", param),
            "len" => format!("must be {} characters long", param),
            other => generic_message(other),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "{}={}", self.name, param),
            None => f.write_str(&self.name),
        }
    }
}

fn generic_message(rule: &str) -> String {
    format!("failed validation: {}", rule)
}

fn verdict(passed: bool) -> Verdict {
    if passed {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}

/// Whether a value is the zero value of its type.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Character count for text, the value for numbers, element count for collections.
fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Number(n) => n.as_f64(),
        Value::Array(items) => Some(items.len() as f64),
        Value::Object(map) => Some(map.len() as f64),
        Value::Bool(_) | Value::Null => None,
    }
}

fn is_one_of(value: &Value, param: &str) -> bool {
    let mut candidates = param.split_whitespace();
    match value {
        Value::String(s) => candidates.any(|candidate| candidate == s),
        Value::Number(n) => candidates.any(|candidate| {
            candidate == n.to_string()
                || candidate.parse::<f64>().ok().zip(n.as_f64()).is_some_and(|(a, b)| a == b)
        }),
        Value::Bool(b) => candidates.any(|candidate| candidate == b.to_string()),
        _ => false,
    }
}

/// The ordered rules of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRules {
    pub field: String,
    pub rules: Vec<Rule>,
}

impl FieldRules {
    pub fn parse(field: impl Into<String>, tag: &str) -> Self {
        Self {
            field: field.into(),
            rules: tag.split(',').filter_map(Rule::parse).collect(),
        }
    }

    fn check(&self, value: &Value, violations: &mut Vec<FieldViolation>) {
        let omit_empty = self.rules.first().is_some_and(|rule| rule.name == "omitempty");
        if omit_empty && is_zero(value) {
            return;
        }

        for rule in &self.rules {
            let message = match rule.evaluate(value) {
                Verdict::Pass => continue,
                Verdict::Fail => rule.message(),
                Verdict::Unusable => generic_message(&rule.name),
            };
            violations.push(FieldViolation {
                field: self.field.clone(),
                rule: rule.name.clone(),
                message,
            });
        }
    }
}

/// Validation rules for every annotated field of an argument type.
///
/// Stateless once built; one set is shared by all concurrent invocations of a tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    fields: Vec<FieldRules>,
}

impl RuleSet {
    /// Collect rules from field specs. Fields without a wire name are not validated.
    pub fn from_fields(specs: &[FieldSpec]) -> Self {
        let fields = specs
            .iter()
            .filter_map(|spec| {
                let name = spec.resolved_name()?;
                let tag = spec.validate?;
                Some(FieldRules::parse(name, tag))
            })
            .filter(|field| !field.rules.is_empty())
            .collect();
        Self { fields }
    }

    pub fn for_type<A: ToolArgs>() -> Result<Self, TypeShapeError> {
        match A::shape() {
            Shape::Record(specs) => Ok(Self::from_fields(&specs)),
            other => Err(TypeShapeError {
                type_name: A::type_name().to_string(),
                found: other.describe(),
            }),
        }
    }

    pub fn fields(&self) -> &[FieldRules] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check a map of field values keyed by wire name.
    ///
    /// All fields are evaluated; every violated rule is reported.
    pub fn check(&self, instance: &JsonObject) -> Result<(), ValidationErrors> {
        self.evaluate(|name| Ok(instance.get(name)))
    }

    /// Check the field values of a decoded instance.
    ///
    /// A field whose value could not be read is reported as a violation of
    /// its own instead of being judged absent.
    pub fn check_values(&self, values: &FieldValues) -> Result<(), ValidationErrors> {
        self.evaluate(|name| values.lookup(name))
    }

    /// Check a typed instance.
    pub fn validate<A: ToolArgs + Serialize>(&self, args: &A) -> Result<(), ValidationErrors> {
        self.check_values(&args.field_values())
    }

    /// `(field, rule)` pairs naming rules this gate does not know.
    ///
    /// Such a rule fails on every input, so a tool carrying one can never
    /// pass validation.
    pub fn unknown_rules(&self) -> Vec<(&str, &str)> {
        self.fields
            .iter()
            .flat_map(|field| {
                field
                    .rules
                    .iter()
                    .filter(|rule| !rule.is_known())
                    .map(move |rule| (field.field.as_str(), rule.name.as_str()))
            })
            .collect()
    }

    fn evaluate<'v>(
        &self,
        lookup: impl Fn(&str) -> Result<Option<&'v Value>, &'v str>,
    ) -> Result<(), ValidationErrors> {
        let mut violations = Vec::new();
        for field in &self.fields {
            match lookup(&field.field) {
                Ok(value) => field.check(value.unwrap_or(&Value::Null), &mut violations),
                Err(error) => violations.push(FieldViolation {
                    field: field.field.clone(),
                    rule: "readable".to_string(),
                    message: format!("could not be read for validation: {}", error),
                }),
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(violations))
        }
    }
}
