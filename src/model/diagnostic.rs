use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a record was left out of a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OmissionReason {
    InvalidId { value: String },
    InvalidDate { key: String, value: String },
    InvalidMilestone { detail: String },
    /// Same local id as an earlier task in the document (1-based line)
    DuplicateId { id: String, first_line: usize },
}

impl fmt::Display for OmissionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OmissionReason::InvalidId { value } => write!(f, "invalid id '{}'", value),
            OmissionReason::InvalidDate { key, value } => {
                write!(f, "invalid date '{}' for {}::", value, key)
            }
            OmissionReason::InvalidMilestone { detail } => write!(f, "milestone row: {}", detail),
            OmissionReason::DuplicateId { id, first_line } => {
                write!(f, "duplicate id '{}' (first used on line {})", id, first_line)
            }
        }
    }
}

/// A record omitted from a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Omission {
    pub document: String,
    /// 1-based line number
    pub line: usize,
    pub reason: OmissionReason,
}

impl fmt::Display for Omission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.document, self.line, self.reason)
    }
}
