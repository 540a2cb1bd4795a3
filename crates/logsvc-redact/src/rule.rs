//! A single pattern/replacement rule and the on-disk rule file format.
//!
//! Replacement templates use backslash group references (`\1`, `\g<1>`,
//! `\g<name>`), the form rule files have always been written in. They are
//! translated once at load time into the `${..}` syntax the regex crate
//! expands, so substitution itself does no template parsing.

use crate::{RedactionError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Replacement used when a rule file entry omits `replace`.
pub const DEFAULT_REPLACEMENT: &str = "***";

/// A compiled redaction rule.
#[derive(Debug, Clone)]
pub struct RedactionRule {
    pattern: Regex,
    /// Replacement in regex-crate syntax.
    replacement: String,
    /// Replacement as written.
    template: String,
    ignore_case: bool,
}

impl RedactionRule {
    /// Compile a rule. `template` uses backslash group references.
    pub fn new(
        pattern: &str,
        template: &str,
        ignore_case: bool,
    ) -> std::result::Result<Self, regex::Error> {
        let compiled = RegexBuilder::new(pattern)
            .case_insensitive(ignore_case)
            .build()?;
        Ok(Self {
            pattern: compiled,
            replacement: translate_template(template),
            template: template.to_string(),
            ignore_case,
        })
    }

    /// Replace every non-overlapping match in `text`.
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.pattern.replace_all(text, self.replacement.as_str())
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }
}

/// Translate a backslash-style replacement template into regex-crate syntax.
///
/// - `\N` and `\g<N>` become `${N}`
/// - `\g<name>` becomes `${name}`
/// - `\\` is a literal backslash; `\n`, `\t`, `\r` are control characters
/// - `$` is literal and is escaped as `$$`
///
/// Any other backslash sequence is kept verbatim.
pub fn translate_template(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 4);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek().copied() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::new();
                    while let Some(&d) = chars.peek() {
                        if !d.is_ascii_digit() {
                            break;
                        }
                        group.push(d);
                        chars.next();
                    }
                    out.push_str(&format!("${{{}}}", group));
                }
                Some('g') => {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if lookahead.next() == Some('<') {
                        let name: String =
                            lookahead.clone().take_while(|&ch| ch != '>').collect();
                        let name_chars = name.chars().count();
                        let closed = lookahead.clone().nth(name_chars) == Some('>');
                        if closed && !name.is_empty() {
                            out.push_str(&format!("${{{}}}", name));
                            // skip `g<name>`
                            for _ in 0..name_chars + 3 {
                                chars.next();
                            }
                            continue;
                        }
                    }
                    out.push('\\');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('t') => {
                    chars.next();
                    out.push('\t');
                }
                Some('r') => {
                    chars.next();
                    out.push('\r');
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }

    out
}

/// One entry of a rule file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(default)]
    pub pattern: Option<String>,

    #[serde(default = "default_replace")]
    pub replace: String,

    #[serde(default = "default_true")]
    pub ignore_case: bool,
}

fn default_replace() -> String {
    DEFAULT_REPLACEMENT.to_string()
}

fn default_true() -> bool {
    true
}

/// Rule file: `{"patterns": [{"pattern": .., "replace": .., "ignore_case": ..}]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleFile {
    #[serde(default)]
    pub patterns: Vec<RuleSpec>,
}

impl RuleFile {
    /// Compile every entry, failing on the first invalid pattern.
    ///
    /// Entries without a pattern (or with an empty one) are skipped.
    pub fn compile(&self) -> Result<Vec<RedactionRule>> {
        let (rules, errors) = self.compile_lenient();
        match errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(rules),
        }
    }

    /// Compile every valid entry, returning skipped entries' errors alongside.
    pub fn compile_lenient(&self) -> (Vec<RedactionRule>, Vec<RedactionError>) {
        let mut rules = Vec::with_capacity(self.patterns.len());
        let mut errors = Vec::new();
        for (index, spec) in self.patterns.iter().enumerate() {
            let Some(pattern) = spec.pattern.as_deref().filter(|p| !p.is_empty()) else {
                continue;
            };
            match RedactionRule::new(pattern, &spec.replace, spec.ignore_case) {
                Ok(rule) => rules.push(rule),
                Err(e) => errors.push(RedactionError::PatternError {
                    index,
                    message: e.to_string(),
                }),
            }
        }
        (rules, errors)
    }
}
