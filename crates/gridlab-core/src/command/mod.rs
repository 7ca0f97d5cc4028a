//! Run command templates.
//!
//! A template is a sequence of tokens. A token written as `{name}` is a placeholder resolved from
//! a [`CommandContext`]; every other token is passed through verbatim. Resolution never goes
//! through a shell: each token stays one argument, so descriptors with brackets or spaces need
//! no quoting.
use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Token {
    Literal(String),
    Placeholder(String),
}

impl Token {
    fn placeholder_name(s: &str) -> Option<&str> {
        let name = s.strip_prefix('{')?.strip_suffix('}')?;
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        valid.then_some(name)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        match Token::placeholder_name(s) {
            Some(name) => Token::Placeholder(name.to_string()),
            None => Token::Literal(s.to_string()),
        }
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::from(s.as_str())
    }
}

impl From<Token> for String {
    fn from(t: Token) -> Self {
        t.to_string()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(s) => f.write_str(s),
            Token::Placeholder(name) => write!(f, "{{{name}}}"),
        }
    }
}

/// Values available to placeholders of one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandContext(BTreeMap<String, String>);

impl CommandContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl ToString) -> &mut Self {
        self.0.insert(name.into(), value.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(Vec<Token>);

impl CommandTemplate {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }

    /// Parse whitespace-free tokens, e.g. `["{wrapper}", "--flag", "{port}"]`.
    pub fn parse<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            tokens
                .into_iter()
                .map(|t| Token::from(t.as_ref()))
                .collect(),
        )
    }

    /// The run-wrapper invocation: positional arguments in the order the wrapper expects them.
    pub fn planner_chain() -> Self {
        Self::parse([
            "{wrapper}",
            "{server}",
            "{benchmark_dir}",
            "{port}",
            "{num_runs}",
            "{server_seed}",
            "{run_time}",
            "{planner}",
            "{problem}",
            "{ipc2018}",
            "{planner_seed}",
            "{memory_limit_kb}",
            "{descriptor}",
        ])
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|t| match t {
            Token::Placeholder(name) => Some(name.as_str()),
            Token::Literal(_) => None,
        })
    }

    /// Substitute every placeholder; an unknown name is a configuration error.
    pub fn resolve(&self, ctx: &CommandContext) -> Result<Vec<String>, ConfigurationError> {
        self.0
            .iter()
            .map(|t| match t {
                Token::Literal(s) => Ok(s.clone()),
                Token::Placeholder(name) => ctx
                    .get(name)
                    .map(str::to_string)
                    .ok_or_else(|| ConfigurationError::UnresolvedPlaceholder(name.clone())),
            })
            .collect()
    }
}

impl Default for CommandTemplate {
    fn default() -> Self {
        Self::planner_chain()
    }
}
