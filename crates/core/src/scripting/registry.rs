//! Fixed registry of analysis operations and the scripts that serve them.
//!
//! The mapping is compiled in and never changes at runtime. Routing code
//! parses an [`Operation`] from its URL name; the engine turns it into a
//! script id and an [`ExecutionRequest`].

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CoreError;

use super::executor::ExecutionRequest;

/// File extension of every registered script.
pub const SCRIPT_EXTENSION: &str = "py";

/// Maximum accepted symbol length.
const MAX_SYMBOL_LEN: usize = 10;

/// Logical analysis operations exposed by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Technical,
    Fundamental,
    Sentiment,
    Signals,
    Overview,
}

/// Static description of one registered script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptDescriptor {
    pub operation: Operation,
    /// Physical script identifier (file stem).
    pub script_id: &'static str,
    /// Value of the `analysis_type` argument, for scripts that expect one.
    pub analysis_type: Option<&'static str>,
}

/// Every registered script, one entry per [`Operation`].
pub const SCRIPT_REGISTRY: &[ScriptDescriptor] = &[
    ScriptDescriptor {
        operation: Operation::Technical,
        script_id: "technical_analyzer",
        analysis_type: Some("technical"),
    },
    ScriptDescriptor {
        operation: Operation::Fundamental,
        script_id: "fundamental_analyzer",
        analysis_type: Some("fundamental"),
    },
    ScriptDescriptor {
        operation: Operation::Sentiment,
        script_id: "sentiment_analyzer",
        analysis_type: Some("sentiment"),
    },
    ScriptDescriptor {
        operation: Operation::Signals,
        script_id: "signal_generator",
        analysis_type: None,
    },
    ScriptDescriptor {
        operation: Operation::Overview,
        script_id: "stock_overview",
        analysis_type: None,
    },
];

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Technical,
        Operation::Fundamental,
        Operation::Sentiment,
        Operation::Signals,
        Operation::Overview,
    ];

    /// Route-level name of the operation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Fundamental => "fundamental",
            Self::Sentiment => "sentiment",
            Self::Signals => "signals",
            Self::Overview => "overview",
        }
    }

    pub fn descriptor(self) -> &'static ScriptDescriptor {
        // The registry holds exactly one entry per variant, in declaration order.
        &SCRIPT_REGISTRY[self as usize]
    }

    pub fn script_id(self) -> &'static str {
        self.descriptor().script_id
    }

    /// Build the argument payload for this operation.
    pub fn build_request(self, symbol: &str) -> ExecutionRequest {
        let request = ExecutionRequest::for_symbol(symbol);
        match self.descriptor().analysis_type {
            Some(kind) => request.with("analysis_type", kind),
            None => request,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| CoreError::UnknownOperation(s.to_string()))
    }
}

/// File name of a script inside the provisioned scripts directory.
pub fn script_file_name(script_id: &str) -> String {
    format!("{script_id}.{SCRIPT_EXTENSION}")
}

/// Validate a ticker symbol and return its canonical (upper-case) form.
///
/// Accepts 1 to 10 ASCII alphanumerics, `.` or `-`.
pub fn normalize_symbol(symbol: &str) -> Result<String, CoreError> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_SYMBOL_LEN {
        return Err(CoreError::Validation(format!(
            "Symbol must be 1 to {MAX_SYMBOL_LEN} characters"
        )));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(CoreError::Validation(format!(
            "Invalid symbol '{trimmed}'"
        )));
    }
    Ok(trimmed.to_ascii_uppercase())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
