//! Certificate issuance on top of the sequence allocator.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::contracts::{Certificate, CertificateStore, IssuanceError, SequenceAllocator};
use crate::metrics::IssuanceMetrics;
use crate::sequence::{format_identifier, IssuedIdentifier};

/// Counter key certificates are numbered from. Stored certificates are keyed
/// by sequence number alone, so this key is fixed for the life of a store.
pub const CERTIFICATE_COUNTER_KEY: &str = "certificate";

/// Longest accepted text field.
const MAX_FIELD_LEN: usize = 200;

/// Request to issue a certificate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCertificate {
    pub intern_name: String,
    pub internship_title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration: String,
}

impl NewCertificate {
    /// Checks the request before any number is allocated.
    pub fn validate(&self) -> Result<(), IssuanceError> {
        for (field, value) in [
            ("internName", &self.intern_name),
            ("internshipTitle", &self.internship_title),
            ("duration", &self.duration),
        ] {
            let value = value.trim();
            if value.is_empty() {
                return Err(IssuanceError::InvalidRequest(format!(
                    "{} must not be empty",
                    field
                )));
            }
            if value.len() > MAX_FIELD_LEN {
                return Err(IssuanceError::InvalidRequest(format!(
                    "{} must be at most {} bytes",
                    field, MAX_FIELD_LEN
                )));
            }
        }
        if self.end_date < self.start_date {
            return Err(IssuanceError::InvalidRequest(format!(
                "endDate {} is before startDate {}",
                self.end_date, self.start_date
            )));
        }
        Ok(())
    }
}

/// Issues certificates numbered by a [`SequenceAllocator`].
///
/// One allocation per successful validation. A number allocated for a request
/// whose record then fails to persist is consumed, never reissued.
pub struct CertificateIssuer<A: SequenceAllocator, C: CertificateStore> {
    allocator: A,
    store: Arc<C>,
    metrics: Option<Arc<IssuanceMetrics>>,
}

impl<A: SequenceAllocator, C: CertificateStore> CertificateIssuer<A, C> {
    pub fn new(allocator: A, store: Arc<C>) -> Self {
        Self {
            allocator,
            store,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<IssuanceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Issues a certificate stamped with the current local year.
    pub fn issue(&self, request: NewCertificate) -> Result<Certificate, IssuanceError> {
        self.issue_at(request, Utc::now())
    }

    /// Issues a certificate as if at `now`.
    pub fn issue_at(
        &self,
        request: NewCertificate,
        now: DateTime<Utc>,
    ) -> Result<Certificate, IssuanceError> {
        let start = Instant::now();

        if let Err(e) = request.validate() {
            if let Some(metrics) = &self.metrics {
                metrics.record_rejected();
            }
            return Err(e);
        }

        let result = self.allocate_and_store(request, now);
        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(_) => metrics.record_issued(start.elapsed().as_micros() as u64),
                Err(_) => metrics.record_failed(),
            }
        }
        result
    }

    fn allocate_and_store(
        &self,
        request: NewCertificate,
        now: DateTime<Utc>,
    ) -> Result<Certificate, IssuanceError> {
        let sequence_number = self.allocator.next_sequence(CERTIFICATE_COUNTER_KEY)?;
        let year = now.with_timezone(&Local).year();
        let certificate_id = format_identifier(year, sequence_number);

        let certificate = Certificate {
            id: Uuid::new_v4().to_string(),
            intern_name: request.intern_name.trim().to_string(),
            internship_title: request.internship_title.trim().to_string(),
            start_date: request.start_date,
            end_date: request.end_date,
            duration: request.duration.trim().to_string(),
            certificate_id,
            sequence_number,
            created_at: now,
        };

        if let Err(e) = self.store.insert_certificate(&certificate) {
            tracing::error!(
                certificate_id = %certificate.certificate_id,
                sequence_number,
                error = %e,
                "Failed to store certificate; sequence number is consumed"
            );
            return Err(e.into());
        }

        tracing::info!(
            certificate_id = %certificate.certificate_id,
            sequence_number,
            "Issued certificate"
        );
        Ok(certificate)
    }

    /// Lists certificates newest first, optionally filtered by a search query.
    pub fn list(&self, query: Option<&str>) -> Result<Vec<Certificate>, IssuanceError> {
        let certificates = self.store.list_certificates()?;
        Ok(match query {
            Some(q) => certificates.into_iter().filter(|c| c.matches(q)).collect(),
            None => certificates,
        })
    }

    /// Looks a certificate up by its display identifier.
    pub fn get(&self, certificate_id: &str) -> Result<Certificate, IssuanceError> {
        let identifier: IssuedIdentifier = certificate_id
            .parse::<IssuedIdentifier>()
            .map_err(|e| IssuanceError::InvalidRequest(e.to_string()))?;

        match self.store.get_certificate(identifier.sequence)? {
            Some(cert) if cert.certificate_id == certificate_id => Ok(cert),
            _ => Err(IssuanceError::NotFound(certificate_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use chrono::TimeZone;

    use super::*;
    use crate::contracts::{AllocationError, CounterStore, StorageError};
    use crate::sequence::CounterAllocator;
    use crate::storage::InMemoryStorage;

    fn request(name: &str) -> NewCertificate {
        NewCertificate {
            intern_name: name.into(),
            internship_title: "Platform Engineering".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 4, 4).unwrap(),
            duration: "3 months".into(),
        }
    }

    fn mid_2025() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap()
    }

    fn issuer() -> (
        CertificateIssuer<CounterAllocator<InMemoryStorage>, InMemoryStorage>,
        Arc<InMemoryStorage>,
    ) {
        let storage = Arc::new(InMemoryStorage::new());
        let allocator = CounterAllocator::new(Arc::clone(&storage));
        (
            CertificateIssuer::new(allocator, Arc::clone(&storage)),
            storage,
        )
    }

    /// Allocator that always fails, to prove no fallback numbering exists.
    struct DownAllocator;

    impl SequenceAllocator for DownAllocator {
        fn next_sequence(&self, _key: &str) -> Result<u64, AllocationError> {
            Err(AllocationError::Storage(StorageError::Unavailable(
                "store offline".into(),
            )))
        }
    }

    #[test]
    fn issues_sequential_identifiers() {
        let (issuer, _storage) = issuer();

        let first = issuer.issue_at(request("Ada"), mid_2025()).unwrap();
        let second = issuer.issue_at(request("Grace"), mid_2025()).unwrap();

        assert_eq!(first.certificate_id, "2025-INT-001");
        assert_eq!(first.sequence_number, 1);
        assert_eq!(second.certificate_id, "2025-INT-002");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn invalid_request_does_not_consume_a_number() {
        let (issuer, storage) = issuer();

        let mut bad = request("  ");
        assert!(matches!(
            issuer.issue_at(bad.clone(), mid_2025()),
            Err(IssuanceError::InvalidRequest(_))
        ));
        bad.intern_name = "Ada".into();
        bad.end_date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        assert!(matches!(
            issuer.issue_at(bad, mid_2025()),
            Err(IssuanceError::InvalidRequest(_))
        ));

        assert_eq!(storage.current(CERTIFICATE_COUNTER_KEY).unwrap(), None);
        let cert = issuer.issue_at(request("Ada"), mid_2025()).unwrap();
        assert_eq!(cert.sequence_number, 1);
    }

    #[test]
    fn allocation_failure_surfaces_as_issuance_failure() {
        let storage = Arc::new(InMemoryStorage::new());
        let issuer = CertificateIssuer::new(DownAllocator, Arc::clone(&storage));

        assert!(matches!(
            issuer.issue_at(request("Ada"), mid_2025()),
            Err(IssuanceError::Allocation(_))
        ));
        assert!(issuer.list(None).unwrap().is_empty());
    }

    #[test]
    fn fields_are_trimmed() {
        let (issuer, _storage) = issuer();
        let cert = issuer
            .issue_at(request("  Ada Lovelace "), mid_2025())
            .unwrap();
        assert_eq!(cert.intern_name, "Ada Lovelace");
    }

    #[test]
    fn list_and_search() {
        let (issuer, _storage) = issuer();
        issuer.issue_at(request("Ada"), mid_2025()).unwrap();
        issuer.issue_at(request("Grace"), mid_2025()).unwrap();
        issuer.issue_at(request("Alan"), mid_2025()).unwrap();

        let all: Vec<u64> = issuer
            .list(None)
            .unwrap()
            .iter()
            .map(|c| c.sequence_number)
            .collect();
        assert_eq!(all, vec![3, 2, 1]);

        let found = issuer.list(Some("grace")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].certificate_id, "2025-INT-002");
    }

    #[test]
    fn get_by_identifier() {
        let (issuer, _storage) = issuer();
        let issued = issuer.issue_at(request("Ada"), mid_2025()).unwrap();

        assert_eq!(issuer.get("2025-INT-001").unwrap(), issued);
        assert!(matches!(
            issuer.get("2024-INT-001"),
            Err(IssuanceError::NotFound(_))
        ));
        assert!(matches!(
            issuer.get("2025-INT-002"),
            Err(IssuanceError::NotFound(_))
        ));
        assert!(matches!(
            issuer.get("not-an-id"),
            Err(IssuanceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn other_counters_on_the_store_do_not_collide() {
        let storage = Arc::new(InMemoryStorage::new());
        let allocator = CounterAllocator::new(Arc::clone(&storage));
        allocator.next_sequence("interns").unwrap();
        allocator.next_sequence("interns").unwrap();

        let issuer = CertificateIssuer::new(allocator, Arc::clone(&storage));
        let cert = issuer.issue_at(request("Ada"), mid_2025()).unwrap();

        assert_eq!(cert.certificate_id, "2025-INT-001");
        assert_eq!(storage.current(CERTIFICATE_COUNTER_KEY).unwrap(), Some(1));
        assert_eq!(storage.current("interns").unwrap(), Some(2));
    }

    #[test]
    fn new_issuer_over_existing_store_continues_numbering() {
        let (first, storage) = issuer();
        first.issue_at(request("Ada"), mid_2025()).unwrap();
        first.issue_at(request("Grace"), mid_2025()).unwrap();

        let allocator = CounterAllocator::new(Arc::clone(&storage));
        let second = CertificateIssuer::new(allocator, Arc::clone(&storage));
        let cert = second.issue_at(request("Alan"), mid_2025()).unwrap();

        assert_eq!(cert.certificate_id, "2025-INT-003");
        assert_eq!(second.get("2025-INT-001").unwrap().intern_name, "Ada");
        assert_eq!(second.list(None).unwrap().len(), 3);
    }

    #[test]
    fn metrics_track_outcomes() {
        let (issuer, _storage) = issuer();
        let metrics = Arc::new(IssuanceMetrics::default());
        let issuer = issuer.with_metrics(Arc::clone(&metrics));

        issuer.issue_at(request("Ada"), mid_2025()).unwrap();
        let _ = issuer.issue_at(request(""), mid_2025());

        assert_eq!(metrics.issued_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.rejected_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.failed_total.load(Ordering::Relaxed), 0);
    }
}
