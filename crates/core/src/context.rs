use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{AppError, AppResult};

/// Principal invoking an operation, as asserted by the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    subject: String,
}

impl CallerIdentity {
    /// Creates a caller identity from a principal identifier.
    pub fn new(subject: impl Into<String>) -> AppResult<Self> {
        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(AppError::NotAuthorized(
                "caller principal must not be empty".to_owned(),
            ));
        }

        Ok(Self { subject })
    }

    /// Returns the stable principal identifier.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }
}

/// Per-invocation transaction boundary data.
///
/// Every core operation reads the clock and the caller from here, never from
/// ambient state, so that one invocation observes a single instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionContext {
    tx_id: String,
    timestamp: DateTime<Utc>,
    caller: CallerIdentity,
}

impl TransactionContext {
    /// Creates a context from explicit values.
    pub fn new(
        tx_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        caller: CallerIdentity,
    ) -> AppResult<Self> {
        let tx_id = tx_id.into();
        if tx_id.trim().is_empty() {
            return Err(AppError::Validation(
                "transaction id must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            tx_id,
            timestamp,
            caller,
        })
    }

    /// Creates a context with a random transaction id at the current instant.
    #[must_use]
    pub fn begin_now(caller: CallerIdentity) -> Self {
        Self {
            tx_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            caller,
        }
    }

    /// Returns the unique transaction identifier.
    #[must_use]
    pub fn tx_id(&self) -> &str {
        self.tx_id.as_str()
    }

    /// Returns the transaction timestamp.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the calling principal.
    #[must_use]
    pub fn caller(&self) -> &CallerIdentity {
        &self.caller
    }

    /// Derives a deterministic identifier unique to this transaction.
    ///
    /// Distinct `(kind, sequence)` pairs within one transaction never collide,
    /// and transaction ids are unique, so derived ids are globally unique.
    #[must_use]
    pub fn derive_id(&self, kind: &str, sequence: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.tx_id.as_bytes());
        hasher.update([0]);
        hasher.update(kind.as_bytes());
        hasher.update([0]);
        hasher.update(sequence.to_be_bytes());
        let digest = hasher.finalize();

        let suffix: String = digest
            .iter()
            .take(12)
            .map(|byte| format!("{byte:02x}"))
            .collect();
        format!("{kind}_{suffix}")
    }
}
