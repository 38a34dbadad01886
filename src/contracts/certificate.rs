use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::contracts::error::StorageError;

/// An issued internship certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: String,
    pub intern_name: String,
    pub internship_title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration: String,
    /// Display identifier, e.g. `2025-INT-042`.
    pub certificate_id: String,
    pub sequence_number: u64,
    pub created_at: DateTime<Utc>,
}

impl Certificate {
    /// Case-insensitive match used by the certificate search.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.intern_name.to_lowercase().contains(&query)
            || self.internship_title.to_lowercase().contains(&query)
            || self.certificate_id.to_lowercase().contains(&query)
            || self.sequence_number.to_string().contains(&query)
    }
}

/// Persistence for issued certificates, keyed by sequence number.
pub trait CertificateStore: Send + Sync {
    /// Stores a new certificate. Fails with `Duplicate` if its sequence
    /// number is already taken.
    fn insert_certificate(&self, certificate: &Certificate) -> Result<(), StorageError>;

    /// Fetches a certificate by its sequence number.
    fn get_certificate(&self, sequence_number: u64) -> Result<Option<Certificate>, StorageError>;

    /// Lists all certificates, highest sequence number first.
    fn list_certificates(&self) -> Result<Vec<Certificate>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Certificate {
        Certificate {
            id: "c1".into(),
            intern_name: "Ada Lovelace".into(),
            internship_title: "Backend Engineering".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 4, 4).unwrap(),
            duration: "3 months".into(),
            certificate_id: "2025-INT-042".into(),
            sequence_number: 42,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let cert = sample();
        assert!(cert.matches("ada"));
        assert!(cert.matches("BACKEND"));
        assert!(cert.matches("int-042"));
        assert!(cert.matches("42"));
        assert!(!cert.matches("frontend"));
    }

    #[test]
    fn blank_query_matches_everything() {
        assert!(sample().matches("   "));
    }
}
