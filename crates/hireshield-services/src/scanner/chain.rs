use std::sync::Arc;

use async_trait::async_trait;

use super::{ScanError, ScanResult, Scanner};

const CHAIN_NAME: &str = "chain";

/// Ordered list of scanners; each call is served by the first available one.
///
/// The chain does not fan out or merge verdicts. Once a member is selected
/// its result is returned as-is, including a failure, so a member that
/// passes the liveness probe and then fails mid-scan rejects the upload
/// rather than falling through to the next member.
pub struct ChainScanner {
    scanners: Vec<Arc<dyn Scanner>>,
}

impl ChainScanner {
    pub fn new(scanners: Vec<Arc<dyn Scanner>>) -> Self {
        Self { scanners }
    }

    pub fn len(&self) -> usize {
        self.scanners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }

    async fn first_available(&self) -> Option<&Arc<dyn Scanner>> {
        for scanner in &self.scanners {
            if scanner.available().await {
                return Some(scanner);
            }
            tracing::debug!(scanner = %scanner.name(), "Chain member unavailable, trying next");
        }
        None
    }
}

#[async_trait]
impl Scanner for ChainScanner {
    fn name(&self) -> &str {
        CHAIN_NAME
    }

    async fn available(&self) -> bool {
        self.first_available().await.is_some()
    }

    async fn scan(&self, filename: &str, content: &[u8]) -> ScanResult {
        match self.first_available().await {
            Some(scanner) => {
                tracing::debug!(scanner = %scanner.name(), "Chain selected scanner");
                scanner.scan(filename, content).await
            }
            None => {
                tracing::error!(
                    members = self.scanners.len(),
                    filename = %filename,
                    "No scanner in chain is available"
                );
                ScanResult::failed(CHAIN_NAME, ScanError::NoBackendAvailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hireshield_core::RejectionReason;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubScanner {
        name: &'static str,
        available: bool,
        infected: bool,
        scans: AtomicUsize,
    }

    impl StubScanner {
        fn new(name: &'static str, available: bool, infected: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                available,
                infected,
                scans: AtomicUsize::new(0),
            })
        }

        fn scans(&self) -> usize {
            self.scans.load(Ordering::SeqCst)
        }
    }

    fn members(stubs: &[&Arc<StubScanner>]) -> Vec<Arc<dyn Scanner>> {
        stubs
            .iter()
            .map(|stub| Arc::clone(*stub) as Arc<dyn Scanner>)
            .collect()
    }

    #[async_trait]
    impl Scanner for StubScanner {
        fn name(&self) -> &str {
            self.name
        }

        async fn available(&self) -> bool {
            self.available
        }

        async fn scan(&self, _filename: &str, _content: &[u8]) -> ScanResult {
            self.scans.fetch_add(1, Ordering::SeqCst);
            if self.infected {
                ScanResult::infected(self.name, "Stub-Threat")
            } else {
                ScanResult::clean(self.name)
            }
        }
    }

    #[tokio::test]
    async fn test_first_available_member_serves_scan() {
        let down = StubScanner::new("down", false, false);
        let first = StubScanner::new("first", true, true);
        let second = StubScanner::new("second", true, false);
        let chain = ChainScanner::new(members(&[&down, &first, &second]));

        let result = chain.scan("cv.pdf", b"%PDF").await;

        assert!(result.is_infected());
        assert_eq!(result.scanner_name(), "first");
        assert_eq!(result.threat_name(), Some("Stub-Threat"));
        assert_eq!(down.scans(), 0);
        assert_eq!(first.scans(), 1);
        assert_eq!(second.scans(), 0);
    }

    #[tokio::test]
    async fn test_no_available_member_fails_closed() {
        let chain = ChainScanner::new(members(&[
            &StubScanner::new("a", false, false),
            &StubScanner::new("b", false, false),
        ]));

        assert!(!chain.available().await);
        let result = chain.scan("cv.pdf", b"%PDF").await;
        assert!(result.is_infected());
        assert_eq!(result.scanner_name(), "chain");
        assert!(matches!(result.error(), Some(ScanError::NoBackendAvailable)));
        assert_eq!(
            result.rejection_reason(),
            Some(RejectionReason::NoScannerAvailable)
        );
    }

    #[tokio::test]
    async fn test_empty_chain_fails_closed() {
        let chain = ChainScanner::new(Vec::new());
        assert!(chain.is_empty());
        assert!(!chain.available().await);

        let result = chain.scan("cv.pdf", b"%PDF").await;
        assert!(result.is_infected());
        assert_eq!(result.scanner_name(), "chain");
    }

    #[tokio::test]
    async fn test_available_if_any_member_is() {
        let chain = ChainScanner::new(members(&[
            &StubScanner::new("a", false, false),
            &StubScanner::new("b", true, false),
        ]));
        assert_eq!(chain.len(), 2);
        assert!(chain.available().await);

        let result = chain.scan("cv.pdf", b"%PDF").await;
        assert!(!result.is_infected());
        assert_eq!(result.scanner_name(), "b");
    }
}
