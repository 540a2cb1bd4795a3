//! Redaction rules for retrieved log lines.
//!
//! Every line leaving the service passes through an ordered list of
//! pattern/replacement rules. Each rule replaces all non-overlapping
//! matches, and later rules see the text produced by earlier ones.
//!
//! # Key Features
//!
//! - **Built-in rules**: bearer credentials, JWTs, AWS keys, and generic
//!   `token:`/`password=`-style fields.
//! - **Rule files**: a JSON rule file replaces the built-in set when it
//!   supplies at least one valid rule.
//! - **Back-references**: replacement templates may reference capture groups
//!   (`\1`, `\g<name>`); templates are translated once at load time.
//! - **Never fails a request**: a broken rule file falls back to the
//!   built-in rules.
//!
//! # Example
//!
//! ```
//! use logsvc_redact::Redactor;
//!
//! let redactor = Redactor::builtin();
//! let out = redactor.redact_text("Authorization: Bearer abcdef123456");
//! assert!(!out.contains("abcdef"));
//! ```

pub mod defaults;
pub mod engine;
pub mod error;
pub mod rule;

pub use defaults::{default_rules, BUILTIN_RULES};
pub use engine::{Redactor, RuleSource};
pub use error::{RedactionError, Result};
pub use rule::{translate_template, RedactionRule, RuleFile, RuleSpec};
