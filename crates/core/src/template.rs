//! Template expansion
//!
//! Templates use `${NAME}` (or `$NAME`) placeholders with `$$` as an escaped dollar.
//! Each template is bound to a closed record implementing [`TemplateEnv`], and
//! [`Template::validate`] rejects any placeholder the record does not define, so
//! a broken template fails before anything is written.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::LyDroidError;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:(?P<escaped>\$)|\{(?P<braced>[_A-Za-z][_A-Za-z0-9]*)\}|(?P<named>[_A-Za-z][_A-Za-z0-9]*)|(?P<invalid>))")
        .expect("placeholder pattern")
});

/// Template errors
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Template '{template}' references undefined keys: {}", keys.join(", "))]
    UndefinedKeys { template: String, keys: Vec<String> },
    #[error("Template '{template}' has an invalid placeholder on line {line}")]
    InvalidPlaceholder { template: String, line: usize },
    #[error("Template '{template}' has no value for '{key}'")]
    MissingValue { template: String, key: String },
}

impl From<TemplateError> for LyDroidError {
    fn from(err: TemplateError) -> Self {
        LyDroidError::Generic(err.to_string())
    }
}

/// A closed set of named values that templates may reference
pub trait TemplateEnv {
    /// Every key the record defines
    const KEYS: &'static [&'static str];

    fn value(&self, key: &str) -> Option<Cow<'_, str>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Key(String),
}

/// A parsed template
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self, TemplateError> {
        let name = name.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(text) {
            let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((last, last));
            literal.push_str(&text[last..whole.0]);
            last = whole.1;

            if caps.name("escaped").is_some() {
                literal.push('$');
            } else if let Some(key) = caps.name("braced").or_else(|| caps.name("named")) {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Key(key.as_str().to_string()));
            } else {
                let line = text[..whole.0].matches('\n').count() + 1;
                return Err(TemplateError::InvalidPlaceholder { template: name, line });
            }
        }
        literal.push_str(&text[last..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { name, segments })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Placeholder names in order of first appearance
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Key(key) = segment {
                if !keys.contains(&key.as_str()) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Check every placeholder against the record's key set
    pub fn validate<E: TemplateEnv>(&self) -> Result<(), TemplateError> {
        let undefined: Vec<String> = self
            .keys()
            .into_iter()
            .filter(|key| !E::KEYS.contains(key))
            .map(str::to_string)
            .collect();
        if undefined.is_empty() {
            Ok(())
        } else {
            Err(TemplateError::UndefinedKeys { template: self.name.clone(), keys: undefined })
        }
    }

    pub fn render<E: TemplateEnv>(&self, env: &E) -> Result<String, TemplateError> {
        self.validate::<E>()?;
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Key(key) => {
                    let value = env.value(key).ok_or_else(|| TemplateError::MissingValue {
                        template: self.name.clone(),
                        key: key.clone(),
                    })?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }
}

/// Parse and render in one step
pub fn substitute<E: TemplateEnv>(name: &str, text: &str, env: &E) -> Result<String, TemplateError> {
    Template::parse(name, text)?.render(env)
}
