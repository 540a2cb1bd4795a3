//! Built-in redaction rules, used when no rule file supplies a valid rule.
//!
//! Order matters: each rule sees the output of the ones before it. The most
//! specific shapes (JWTs, bearer credentials) run before the generic
//! `key: value` rule, which would otherwise consume the key and leave the
//! secret behind.

use crate::RedactionRule;
use once_cell::sync::Lazy;

/// Built-in rule definition.
pub struct BuiltinRule {
    pub name: &'static str,
    pub pattern: &'static str,
    pub replace: &'static str,
    pub ignore_case: bool,
}

pub static BUILTIN_RULES: &[BuiltinRule] = &[
    BuiltinRule {
        name: "jwt",
        pattern: r"eyJ[a-zA-Z0-9_-]{10,}\.[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+",
        replace: "***JWT***",
        ignore_case: false,
    },
    BuiltinRule {
        name: "bearer",
        pattern: r"bearer\s+[A-Za-z0-9\-_.~+/=]+",
        replace: "Bearer ***",
        ignore_case: true,
    },
    BuiltinRule {
        name: "secret_field",
        pattern: r"(authorization|x[-_]?auth[-_]?token|token|api[-_]?key|secret|password)\s*[:=]\s*([A-Za-z0-9\-_.~+/=]+)",
        replace: r"\1=***",
        ignore_case: true,
    },
    BuiltinRule {
        name: "aws_access_key_id",
        pattern: r"AKIA[0-9A-Z]{16}",
        replace: "***AWS_ACCESS_KEY***",
        ignore_case: false,
    },
    BuiltinRule {
        name: "aws_secret_access_key",
        pattern: r"aws_secret_access_key\s*[:=]\s*[A-Za-z0-9/+=]{20,}",
        replace: "aws_secret_access_key=***",
        ignore_case: true,
    },
    BuiltinRule {
        name: "password_field",
        pattern: r"(password|passwd|pwd)\s*[:=]\s*\S+",
        replace: r"\1=***",
        ignore_case: true,
    },
];

static COMPILED: Lazy<Vec<RedactionRule>> = Lazy::new(|| {
    BUILTIN_RULES
        .iter()
        .map(|r| RedactionRule::new(r.pattern, r.replace, r.ignore_case).unwrap())
        .collect()
});

/// The built-in rules, compiled once per process.
pub fn default_rules() -> Vec<RedactionRule> {
    COMPILED.clone()
}
