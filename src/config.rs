//! Ledger configuration
//!
//! Loaded from JSON, e.g.
//!
//! ```json
//! { "program_id": "b10e1997...c08f", "post_completion": "seal" }
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::identity::Pubkey;
use crate::Result;

/// Identity of the experiment registry program when none is configured.
pub const DEFAULT_PROGRAM_ID: Pubkey = Pubkey::new([
    177, 14, 25, 151, 155, 136, 75, 176, 224, 232, 233, 169, 118, 78, 84, 38, 59, 189, 242, 88,
    59, 44, 118, 92, 92, 81, 70, 177, 23, 248, 192, 143,
]);

/// What `record_event` does once an experiment is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostCompletionPolicy {
    /// The event log is sealed; appends fail with `InvalidState`.
    #[default]
    Seal,
    /// Appends are accepted and flagged `post_completion` in the audit trail.
    Allow,
}

/// Configuration for a [`crate::ledger::Ledger`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// Registry program identity; part of every derived address.
    pub program_id: Option<Pubkey>,
    /// Post-completion append policy.
    pub post_completion: PostCompletionPolicy,
}

impl LedgerConfig {
    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `Json` if the document is malformed or has unknown fields.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, `Json` if it cannot be parsed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&content)?;
        tracing::debug!(path = %path.as_ref().display(), ?config, "loaded ledger config");
        Ok(config)
    }

    /// Set the post-completion policy.
    #[must_use]
    pub const fn with_post_completion(mut self, policy: PostCompletionPolicy) -> Self {
        self.post_completion = policy;
        self
    }

    /// Set the program id.
    #[must_use]
    pub const fn with_program_id(mut self, program_id: Pubkey) -> Self {
        self.program_id = Some(program_id);
        self
    }

    /// Configured program id, or [`DEFAULT_PROGRAM_ID`].
    #[must_use]
    pub fn program_id(&self) -> Pubkey {
        self.program_id.unwrap_or(DEFAULT_PROGRAM_ID)
    }
}
