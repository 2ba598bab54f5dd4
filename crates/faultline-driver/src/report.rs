//! Teardown reporting

use core::fmt;

use crate::error::{DriverError, Result};

/// Outcome of closing the session on one host
#[derive(Debug)]
pub struct HostTeardown {
    pub host: String,
    pub outcome: Result<()>,
}

/// Outcome of closing every session of a fault set, ordered by host
#[derive(Debug, Default)]
pub struct TeardownReport {
    hosts: Vec<HostTeardown>,
}

impl TeardownReport {
    pub fn new(mut hosts: Vec<HostTeardown>) -> Self {
        hosts.sort_by(|a, b| a.host.cmp(&b.host));
        Self { hosts }
    }

    pub fn hosts(&self) -> &[HostTeardown] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Whether every host unwound without error
    pub fn is_clean(&self) -> bool {
        self.hosts.iter().all(|h| h.outcome.is_ok())
    }

    /// Hosts that may still carry faults and need manual attention
    pub fn failed_hosts(&self) -> Vec<&str> {
        self.hosts
            .iter()
            .filter(|h| h.outcome.is_err())
            .map(|h| h.host.as_str())
            .collect()
    }

    /// Collapse into a single result naming every failed host
    pub fn into_result(self) -> Result<()> {
        let total = self.hosts.len();
        let failures: Vec<(String, String)> = self
            .hosts
            .into_iter()
            .filter_map(|h| h.outcome.err().map(|e| (h.host, e.to_string())))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DriverError::Teardown { total, failures })
        }
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for host in &self.hosts {
            match &host.outcome {
                Ok(()) => writeln!(f, "{}: clean", host.host)?,
                Err(e) => writeln!(f, "{}: {}", host.host, e)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_core::{ErrorKind, RemoteError};

    fn failed(host: &str) -> HostTeardown {
        HostTeardown {
            host: host.to_string(),
            outcome: Err(DriverError::Unwind {
                host: host.to_string(),
                error: RemoteError {
                    kind: ErrorKind::Unwind,
                    message: "1 of 2 reversals failed".to_string(),
                },
            }),
        }
    }

    fn clean(host: &str) -> HostTeardown {
        HostTeardown {
            host: host.to_string(),
            outcome: Ok(()),
        }
    }

    #[test]
    fn test_report_orders_hosts_and_names_failures() {
        let report = TeardownReport::new(vec![
            clean("10.0.0.3:1666"),
            failed("10.0.0.2:1666"),
            clean("10.0.0.1:1666"),
        ]);

        let hosts: Vec<_> = report.hosts().iter().map(|h| h.host.as_str()).collect();
        assert_eq!(hosts, vec!["10.0.0.1:1666", "10.0.0.2:1666", "10.0.0.3:1666"]);
        assert!(!report.is_clean());
        assert_eq!(report.failed_hosts(), vec!["10.0.0.2:1666"]);
        assert!(report.to_string().contains("10.0.0.1:1666: clean"));

        match report.into_result() {
            Err(DriverError::Teardown { total, failures }) => {
                assert_eq!(total, 3);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "10.0.0.2:1666");
            }
            other => panic!("expected teardown error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_report_is_clean() {
        let report = TeardownReport::default();
        assert!(report.is_clean());
        assert!(report.is_empty());
        assert!(report.into_result().is_ok());
    }
}
