//! Strict default-usage policy
//!
//! The only place a usage value may come from when the caller did not
//! provide one. Every entry names its value, the confidence it
//! carries, and a note recorded as an assumption in the response.
//! A metric with no entry here stays symbolic; the engine never
//! guesses.

use rust_decimal::Decimal;

use super::metrics;

/// One permitted default
#[derive(Debug, Clone)]
pub struct DefaultUsage {
    pub value: Decimal,
    pub confidence: f64,
    pub note: &'static str,
}

/// Lookup table keyed by `(resource_type, metric)` with a
/// metric-level fallback for always-on hours.
#[derive(Debug, Clone)]
pub struct DefaultUsagePolicy {
    entries: Vec<(&'static str, &'static str, DefaultUsage)>,
}

impl DefaultUsagePolicy {
    /// The strict policy: always-on hours are certain, everything
    /// else is a guarded assumption with a confidence cost.
    pub fn strict() -> Self {
        let full_month = DefaultUsage {
            value: Decimal::from(crate::money::HOURS_PER_MONTH),
            confidence: 1.0,
            note: "always-on resource assumed running the full month",
        };

        let entries = vec![
            // Always-on compute and databases run 730 h/mo unless told otherwise.
            ("aws_instance", metrics::MONTHLY_HOURS, full_month.clone()),
            ("aws_db_instance", metrics::MONTHLY_HOURS, full_month.clone()),
            ("aws_lb", metrics::MONTHLY_HOURS, full_month.clone()),
            ("aws_nat_gateway", metrics::MONTHLY_HOURS, full_month.clone()),
            (
                "google_compute_instance",
                metrics::MONTHLY_HOURS,
                full_month.clone(),
            ),
            (
                "google_sql_database_instance",
                metrics::MONTHLY_HOURS,
                full_month.clone(),
            ),
            (
                "azurerm_linux_virtual_machine",
                metrics::MONTHLY_HOURS,
                full_month.clone(),
            ),
            (
                "azurerm_windows_virtual_machine",
                metrics::MONTHLY_HOURS,
                full_month.clone(),
            ),
            ("azurerm_mssql_database", metrics::MONTHLY_HOURS, full_month),
            // Volumes without an explicit size.
            (
                "aws_ebs_volume",
                metrics::STORAGE_GB,
                DefaultUsage {
                    value: Decimal::from(8),
                    confidence: 0.7,
                    note: "volume size not set; provider default of 8 GB assumed",
                },
            ),
            (
                "google_compute_disk",
                metrics::STORAGE_GB,
                DefaultUsage {
                    value: Decimal::from(10),
                    confidence: 0.7,
                    note: "disk size not set; provider default of 10 GB assumed",
                },
            ),
        ];

        Self { entries }
    }

    pub fn lookup(&self, resource_type: &str, metric: &str) -> Option<&DefaultUsage> {
        self.entries
            .iter()
            .find(|(rt, m, _)| *rt == resource_type && *m == metric)
            .map(|(_, _, d)| d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_on_hours_are_certain() {
        let policy = DefaultUsagePolicy::strict();
        let d = policy
            .lookup("aws_instance", metrics::MONTHLY_HOURS)
            .unwrap();
        assert_eq!(d.value, Decimal::from(730));
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn test_no_entry_for_request_metrics() {
        // request volume is never defaulted; it must come from the
        // caller or stay symbolic
        let policy = DefaultUsagePolicy::strict();
        assert!(policy
            .lookup("aws_s3_bucket", metrics::MONTHLY_REQUESTS)
            .is_none());
        assert!(policy
            .lookup("aws_lambda_function", metrics::MONTHLY_REQUESTS)
            .is_none());
    }

    #[test]
    fn test_volume_size_default_costs_confidence() {
        let policy = DefaultUsagePolicy::strict();
        let d = policy.lookup("aws_ebs_volume", metrics::STORAGE_GB).unwrap();
        assert!(d.confidence < 1.0);
    }
}
