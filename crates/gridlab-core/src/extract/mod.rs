//! Rule-driven extraction of typed metrics from run logs.
//!
//! Every rule is applied independently to the whole text. A coercion failure drops only the
//! attribute of the failing rule and is reported alongside the successful attributes.
mod rule;
pub use rule::{Cardinality, Rule, RuleSpec};

use gridlab_model::{Properties, ValueType, constants::*};
use serde_json::Value;
use tracing::warn;

use crate::error::{ConfigurationError, ParseError};

/// Outcome of parsing one log.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParseReport {
    pub properties: Properties,
    pub errors: Vec<ParseError>,
}

#[derive(Clone, Debug, Default)]
pub struct MetricExtractor {
    rules: Vec<Rule>,
    splits: Vec<String>,
}

impl MetricExtractor {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            splits: Vec::new(),
        }
    }

    /// Compile declarative rules.
    pub fn from_specs<I>(specs: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = RuleSpec>,
    {
        let rules = specs
            .into_iter()
            .map(Rule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Rules for the planner's `run.log`.
    pub fn planner_defaults() -> Self {
        let number = r"-?\d+(?:\.\d+)?";
        let rules = [
            Rule::single(
                PROP_TOTAL_TIME,
                r"PROST complete running time: (\d+(?:\.\d+)?)s",
                ValueType::Float,
            ),
            Rule::single(
                PROP_TOTAL_REWARD,
                &format!(r">>> .* TOTAL REWARD: ({number})\s*$"),
                ValueType::Float,
            ),
            Rule::single(
                PROP_AVERAGE_REWARD,
                &format!(r">>> .* AVERAGE REWARD: ({number})\s*$"),
                ValueType::Float,
            ),
            Rule::repeated(
                PROP_ROUND_REWARDS,
                r">>> END OF ROUND .* -- REWARD RECEIVED: (-?\d+(?:\.\d*)?)\s*$",
                ValueType::Float,
            ),
            Rule::repeated(PROP_STEP_REWARDS, r"^Round .*: (.+) = .*$", ValueType::FloatList),
        ];
        // The patterns above are fixed and known to compile.
        let rules = rules.into_iter().flatten().collect();
        Self::new(rules).with_split(PROP_ROUND_REWARDS)
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Expand the list attribute `<base>-all` into `<base>_0`, `<base>_1`, ...
    pub fn with_split(mut self, name: impl Into<String>) -> Self {
        self.splits.push(name.into());
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Attributes only; failed rules are logged and dropped.
    pub fn parse(&self, text: &str) -> Properties {
        let report = self.parse_report(text);
        for e in &report.errors {
            warn!(error = %e, "attribute dropped");
        }
        report.properties
    }

    pub fn parse_report(&self, text: &str) -> ParseReport {
        let mut report = ParseReport::default();
        for rule in &self.rules {
            match rule.apply(text) {
                Ok(Some(value)) => {
                    report.properties.insert(rule.name(), value);
                }
                Ok(None) => {}
                Err(e) => report.errors.push(e),
            }
        }
        for name in &self.splits {
            split(&mut report.properties, name);
        }
        report
    }
}

fn split(props: &mut Properties, name: &str) {
    let Some(Value::Array(items)) = props.get(name).cloned() else {
        return;
    };
    let base = name.strip_suffix("-all").unwrap_or(name);
    for (i, v) in items.into_iter().enumerate() {
        props.insert(format!("{base}_{i}"), v);
    }
}
