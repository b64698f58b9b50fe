// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// A point-in-time snapshot of the working directory.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    /// The underlying commit's full hex OID.
    pub id: String,
    /// User-facing name, with any `(advice-only)` suffix already stripped.
    pub name: String,
    pub timestamp: DateTime<Utc>,
    /// Paths changed relative to the checkpoint before this one. Empty for
    /// an advice-only checkpoint.
    pub files: Vec<PathBuf>,
    /// True when no file content changed relative to the previous checkpoint.
    pub advice_only: bool,
}
