//! Client-agent gatekeeping.
//!
//! Each policy class (upload, download) has its own list of known-agent
//! patterns. Patterns are compiled once, case-insensitive, and must match the
//! whole `User-Agent` string.
//!
//! An unknown agent is only refused when BOTH `block_unknown_agents` and the
//! class flag (`reject_upload` / `reject_download`) are set. Any other
//! combination lets the request through with a warning.

use crate::config::SecurityConfig;
use pack_types::PolicyClass;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;

/// Gatekeeping decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Known agent.
    Allow,
    /// Unknown agent, request proceeds.
    Warn,
    /// Unknown agent, request refused.
    Reject,
}

/// Compiled agent policy.
#[derive(Debug, Clone)]
pub struct AgentGatekeeper {
    upload: Vec<Regex>,
    download: Vec<Regex>,
    block_unknown: bool,
    reject_upload: bool,
    reject_download: bool,
    blocked_ids: BTreeSet<String>,
}

impl AgentGatekeeper {
    /// Compile the configured patterns.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` for the first pattern that does not compile.
    pub fn new(config: &SecurityConfig) -> Result<Self, GatekeeperError> {
        Ok(Self {
            upload: compile(PolicyClass::Upload, &config.known_agents.upload)?,
            download: compile(PolicyClass::Download, &config.known_agents.download)?,
            block_unknown: config.block_unknown_agents,
            reject_upload: config.reject_upload,
            reject_download: config.reject_download,
            blocked_ids: config.blocked_ids.clone(),
        })
    }

    /// Decide whether `agent` may perform an operation of `class`.
    pub fn evaluate(&self, agent: &str, class: PolicyClass) -> Verdict {
        let (patterns, reject) = match class {
            PolicyClass::Upload => (&self.upload, self.reject_upload),
            PolicyClass::Download => (&self.download, self.reject_download),
        };

        if patterns.iter().any(|p| p.is_match(agent)) {
            Verdict::Allow
        } else if self.block_unknown && reject {
            Verdict::Reject
        } else {
            Verdict::Warn
        }
    }

    /// Whether uploads under `external_id` are refused.
    pub fn is_blocked_id(&self, external_id: &str) -> bool {
        self.blocked_ids.contains(external_id)
    }
}

fn compile(class: PolicyClass, patterns: &[String]) -> Result<Vec<Regex>, GatekeeperError> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(&format!(r"\A(?:{})\z", pattern))
                .case_insensitive(true)
                .build()
                .map_err(|source| GatekeeperError::InvalidPattern {
                    class,
                    pattern: pattern.clone(),
                    source,
                })
        })
        .collect()
}

/// Gatekeeper construction errors.
#[derive(Debug, thiserror::Error)]
pub enum GatekeeperError {
    /// A known-agent pattern failed to compile.
    #[error("invalid {class} agent pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// Policy class the pattern belongs to.
        class: PolicyClass,
        /// The offending pattern.
        pattern: String,
        /// Compiler error.
        source: regex::Error,
    },
}
