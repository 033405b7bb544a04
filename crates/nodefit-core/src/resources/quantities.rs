use crate::error::{CoreError, Result};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

/// CPU quantity conversions
///
/// All values are normalized to millicores (1000 = 1 core).
#[derive(Debug, Clone, Copy)]
pub struct ResourceQuantities;

impl ResourceQuantities {
    /// Parse CPU string (e.g., "2", "1000m", "0.5")
    ///
    /// Negative and non-finite values are rejected so that accumulated
    /// usage can never go below zero.
    pub fn parse_cpu(s: &str) -> Result<i64> {
        let trimmed = s.trim();

        if let Some(m) = trimmed.strip_suffix('m') {
            // Millicores
            let millis = m
                .parse::<i64>()
                .map_err(|e| CoreError::invalid_quantity("cpu", s, e.to_string()))?;
            if millis < 0 {
                return Err(CoreError::invalid_quantity("cpu", s, "negative value"));
            }
            Ok(millis)
        } else {
            // Cores as decimal
            let cores = trimmed
                .parse::<f64>()
                .map_err(|e| CoreError::invalid_quantity("cpu", s, e.to_string()))?;
            if !cores.is_finite() {
                return Err(CoreError::invalid_quantity("cpu", s, "not a finite number"));
            }
            if cores < 0.0 {
                return Err(CoreError::invalid_quantity("cpu", s, "negative value"));
            }
            Ok((cores * 1000.0).round() as i64)
        }
    }

    /// CPU from a k8s-openapi resource map, `None` when no "cpu" key is present
    pub fn cpu_from_map(resources: &BTreeMap<String, Quantity>) -> Result<Option<i64>> {
        resources
            .get("cpu")
            .map(|q| Self::parse_cpu(&q.0))
            .transpose()
    }

    /// Format millicores the way the API server does ("250m")
    pub fn format_cpu(millicores: i64) -> String {
        format!("{}m", millicores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu() {
        assert_eq!(ResourceQuantities::parse_cpu("1").unwrap(), 1000);
        assert_eq!(ResourceQuantities::parse_cpu("0.5").unwrap(), 500);
        assert_eq!(ResourceQuantities::parse_cpu("100m").unwrap(), 100);
        assert_eq!(ResourceQuantities::parse_cpu("2").unwrap(), 2000);
        assert_eq!(ResourceQuantities::parse_cpu("0m").unwrap(), 0);
    }

    #[test]
    fn test_parse_cpu_whole_and_milli_agree() {
        assert_eq!(
            ResourceQuantities::parse_cpu("2").unwrap(),
            ResourceQuantities::parse_cpu("2000m").unwrap()
        );
    }

    #[test]
    fn test_parse_cpu_rounds_fractional_cores() {
        // 0.57 * 1000 is 569.999... in binary floating point
        assert_eq!(ResourceQuantities::parse_cpu("0.57").unwrap(), 570);
    }

    #[test]
    fn test_parse_cpu_rejects_malformed() {
        assert!(ResourceQuantities::parse_cpu("").is_err());
        assert!(ResourceQuantities::parse_cpu("abc").is_err());
        assert!(ResourceQuantities::parse_cpu("1.5m").is_err());
        assert!(ResourceQuantities::parse_cpu("-100m").is_err());
        assert!(ResourceQuantities::parse_cpu("-1").is_err());
        assert!(ResourceQuantities::parse_cpu("NaN").is_err());
        assert!(ResourceQuantities::parse_cpu("inf").is_err());
    }

    #[test]
    fn test_cpu_from_map() {
        let mut map = BTreeMap::new();
        assert_eq!(ResourceQuantities::cpu_from_map(&map).unwrap(), None);

        map.insert("cpu".to_string(), Quantity("250m".to_string()));
        assert_eq!(ResourceQuantities::cpu_from_map(&map).unwrap(), Some(250));

        map.insert("cpu".to_string(), Quantity("lots".to_string()));
        assert!(ResourceQuantities::cpu_from_map(&map).is_err());
    }

    #[test]
    fn test_format_cpu() {
        assert_eq!(ResourceQuantities::format_cpu(1500), "1500m");
    }
}
