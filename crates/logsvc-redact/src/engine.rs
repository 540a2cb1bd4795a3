//! The redactor: an ordered, immutable rule list applied to log text.
//!
//! A `Redactor` is cheap to clone and safe to share between request
//! workers; the rule list is never mutated after construction.

use crate::defaults::default_rules;
use crate::rule::{RedactionRule, RuleFile};
use crate::{RedactionError, Result};
use logsvc_common::LogLine;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where the active rule set came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    /// The built-in rules.
    Builtin,
    /// A rule file that supplied at least one valid rule.
    File(PathBuf),
}

impl std::fmt::Display for RuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleSource::Builtin => write!(f, "builtin"),
            RuleSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Ordered redaction rules.
#[derive(Debug, Clone)]
pub struct Redactor {
    rules: Arc<[RedactionRule]>,
    source: RuleSource,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Redactor {
    /// Redactor over an explicit rule list.
    pub fn new(rules: Vec<RedactionRule>) -> Self {
        Self {
            rules: rules.into(),
            source: RuleSource::Builtin,
        }
    }

    /// Redactor over the built-in rules.
    pub fn builtin() -> Self {
        Self::new(default_rules())
    }

    /// Strict load: every error is reported, nothing falls back.
    pub fn try_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut redactor = Self::try_from_json(&content)?;
        redactor.source = RuleSource::File(path.to_path_buf());
        Ok(redactor)
    }

    /// Strict parse of rule file contents.
    pub fn try_from_json(content: &str) -> Result<Self> {
        let file: RuleFile = serde_json::from_str(content)?;
        let rules = file.compile()?;
        if rules.is_empty() {
            return Err(RedactionError::NoValidRules);
        }
        Ok(Self::new(rules))
    }

    /// Load rules from `path`, falling back to the built-in rules.
    ///
    /// A missing file, unreadable or malformed JSON, or a file with no valid
    /// pattern all yield the built-in set. Individual patterns that fail to
    /// compile are skipped. Loading never fails a caller.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no redaction rule file, using builtin rules");
            return Self::builtin();
        }

        let file: RuleFile = match std::fs::read_to_string(path)
            .map_err(RedactionError::from)
            .and_then(|content| serde_json::from_str(&content).map_err(RedactionError::from))
        {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable redaction rule file, using builtin rules");
                return Self::builtin();
            }
        };

        let (rules, errors) = file.compile_lenient();
        for e in &errors {
            warn!(path = %path.display(), error = %e, "skipping redaction rule");
        }
        if rules.is_empty() {
            warn!(path = %path.display(), "redaction rule file has no valid patterns, using builtin rules");
            return Self::builtin();
        }

        debug!(path = %path.display(), rules = rules.len(), "loaded redaction rules");
        Self {
            rules: rules.into(),
            source: RuleSource::File(path.to_path_buf()),
        }
    }

    /// Apply every rule in order.
    pub fn redact_text(&self, text: &str) -> String {
        let mut current = text.to_string();
        for rule in self.rules.iter() {
            let replaced = match rule.apply(&current) {
                Cow::Borrowed(_) => None,
                Cow::Owned(s) => Some(s),
            };
            if let Some(s) = replaced {
                current = s;
            }
        }
        current
    }

    /// Redact one line's text, keeping its timestamp and labels.
    pub fn redact_line(&self, line: &LogLine) -> LogLine {
        line.with_text(self.redact_text(&line.line))
    }

    /// Redact a batch of lines, consuming the input.
    pub fn redact_lines(&self, lines: Vec<LogLine>) -> Vec<LogLine> {
        lines
            .into_iter()
            .map(|mut line| {
                line.line = self.redact_text(&line.line);
                line
            })
            .collect()
    }

    pub fn rules(&self) -> &[RedactionRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn source(&self) -> &RuleSource {
        &self.source
    }
}
