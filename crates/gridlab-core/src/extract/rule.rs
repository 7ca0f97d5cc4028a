use gridlab_model::ValueType;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigurationError, ParseError};

/// How many matches a rule keeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    /// First match only; no match leaves the attribute absent.
    #[default]
    Single,
    /// Every match in document order.
    Repeated,
}

/// Declarative form of a rule, as written in experiment files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    pub name: String,
    pub pattern: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
    #[serde(default)]
    pub cardinality: Cardinality,
}

/// A compiled extraction rule. The pattern has exactly one capture group and is matched in
/// multi-line mode, so `^` and `$` anchor at line boundaries.
#[derive(Clone, Debug)]
pub struct Rule {
    name: String,
    regex: Regex,
    ty: ValueType,
    cardinality: Cardinality,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        ty: ValueType,
        cardinality: Cardinality,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let invalid = |reason: String| ConfigurationError::InvalidRule {
            name: name.clone(),
            reason,
        };
        if name.trim().is_empty() {
            return Err(invalid("empty attribute name".into()));
        }
        let regex = RegexBuilder::new(pattern)
            .multi_line(true)
            .build()
            .map_err(|e| invalid(e.to_string()))?;
        let groups = regex.captures_len() - 1;
        if groups != 1 {
            return Err(invalid(format!(
                "pattern must have exactly one capture group, found {groups}"
            )));
        }
        Ok(Self {
            name,
            regex,
            ty,
            cardinality,
        })
    }

    pub fn single(name: impl Into<String>, pattern: &str, ty: ValueType) -> Result<Self, ConfigurationError> {
        Self::new(name, pattern, ty, Cardinality::Single)
    }

    pub fn repeated(name: impl Into<String>, pattern: &str, ty: ValueType) -> Result<Self, ConfigurationError> {
        Self::new(name, pattern, ty, Cardinality::Repeated)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.ty
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Apply the rule to the full text. `Ok(None)` means the attribute is absent.
    pub fn apply(&self, text: &str) -> Result<Option<Value>, ParseError> {
        match self.cardinality {
            Cardinality::Single => {
                let Some(raw) = self
                    .regex
                    .captures(text)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str())
                else {
                    return Ok(None);
                };
                self.coerce(raw).map(Some)
            }
            Cardinality::Repeated => {
                let values = self
                    .regex
                    .captures_iter(text)
                    .filter_map(|c| c.get(1))
                    .map(|m| self.coerce(m.as_str()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Some(Value::Array(values)))
            }
        }
    }

    fn coerce(&self, raw: &str) -> Result<Value, ParseError> {
        let fail = || ParseError::Coercion {
            attribute: self.name.clone(),
            raw: raw.to_string(),
            ty: self.ty,
        };
        let float = |s: &str| -> Result<f64, ParseError> {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(fail)
        };

        let trimmed = raw.trim();
        match self.ty {
            ValueType::Int => trimmed.parse::<i64>().map(Value::from).map_err(|_| fail()),
            ValueType::Float => float(trimmed).map(Value::from),
            ValueType::String => Ok(Value::String(raw.to_string())),
            ValueType::FloatList => trimmed
                .split_whitespace()
                .map(|s| float(s).map(Value::from))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }
}

impl TryFrom<RuleSpec> for Rule {
    type Error = ConfigurationError;
    fn try_from(spec: RuleSpec) -> Result<Self, Self::Error> {
        Rule::new(spec.name, &spec.pattern, spec.ty, spec.cardinality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pattern_needs_exactly_one_group() {
        assert!(Rule::single("x", r"no group", ValueType::Int).is_err());
        assert!(Rule::single("x", r"(a)(b)", ValueType::Int).is_err());
        assert!(Rule::single("x", r"(?:a)(b)", ValueType::Int).is_ok());
        assert!(Rule::single("x", r"(unclosed", ValueType::Int).is_err());
    }

    #[test]
    fn float_list_reads_whitespace_separated_values() {
        let rule = Rule::single("row", r"^Row: (.+)$", ValueType::FloatList).unwrap();
        let v = rule.apply("Row: 1 -2.5  3e2\n").unwrap();
        assert_eq!(v, Some(json!([1.0, -2.5, 300.0])));
    }

    #[test]
    fn int_rejects_fractions() {
        let rule = Rule::single("steps", r"steps=(\S+)", ValueType::Int).unwrap();
        assert_eq!(rule.apply("steps=12").unwrap(), Some(json!(12)));
        assert!(matches!(
            rule.apply("steps=1.5"),
            Err(ParseError::Coercion { ref raw, .. }) if raw == "1.5"
        ));
    }

    #[test]
    fn rule_spec_deserializes() {
        let spec: RuleSpec = serde_json::from_str(
            r#"{"name":"nodes","pattern":"nodes: (\\d+)","type":"int","cardinality":"repeated"}"#,
        )
        .unwrap();
        let rule = Rule::try_from(spec).unwrap();
        assert_eq!(rule.cardinality(), Cardinality::Repeated);
        assert_eq!(rule.apply("nodes: 1\nnodes: 2\n").unwrap(), Some(json!([1, 2])));
    }
}
