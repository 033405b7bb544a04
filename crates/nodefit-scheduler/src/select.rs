use crate::{Result, SchedulerError};
use nodefit_core::{Node, ResourceMeta};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Annotation carrying a node's hourly price as a decimal string
pub const PRICE_ANNOTATION: &str = "nodefit.io/hourly-price";

/// Label used to look a node up in the price table
pub const INSTANCE_TYPE_LABEL: &str = "node.kubernetes.io/instance-type";

/// Picks one node out of the fit candidates
pub trait NodeSelector: Send + Sync {
    /// Choose a node; fails on an empty candidate list
    fn select(&self, candidates: &[Node]) -> Result<Node>;

    /// Selector name
    fn name(&self) -> &str;
}

/// Convert a decimal price to integer micro-units
fn to_micros(price: f64) -> Option<i64> {
    if !price.is_finite() || price < 0.0 {
        return None;
    }
    Some((price * 1_000_000.0).round() as i64)
}

/// Parse a decimal price string ("0.096") into micro-units
pub fn parse_price(s: &str) -> Option<i64> {
    s.trim().parse::<f64>().ok().and_then(to_micros)
}

/// Hourly prices keyed by instance type
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: BTreeMap<String, i64>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a YAML mapping of instance type to hourly price
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| SchedulerError::invalid_price_table(path.display().to_string(), e.to_string()))?;
        Self::from_yaml(&data)
            .map_err(|e| SchedulerError::invalid_price_table(path.display().to_string(), e))
    }

    /// Parse a price table from YAML
    pub fn from_yaml(data: &str) -> std::result::Result<Self, String> {
        let raw: BTreeMap<String, f64> = serde_yaml::from_str(data).map_err(|e| e.to_string())?;

        let mut table = Self::new();
        for (instance_type, price) in raw {
            let micros = to_micros(price)
                .ok_or_else(|| format!("price for '{}' must be a non-negative number", instance_type))?;
            table.prices.insert(instance_type, micros);
        }
        Ok(table)
    }

    pub fn insert(&mut self, instance_type: impl Into<String>, price_micros: i64) {
        self.prices.insert(instance_type.into(), price_micros);
    }

    /// Price in micro-units
    pub fn get(&self, instance_type: &str) -> Option<i64> {
        self.prices.get(instance_type).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

fn no_candidates() -> SchedulerError {
    SchedulerError::selection_failed(
        "no candidate nodes",
        "The fit evaluator returned no nodes; this should have been reported as a fit failure",
    )
}

/// Cheapest node wins
///
/// A node's price comes from its price annotation, or from the price table
/// entry for its instance-type label. Ties go to the earliest candidate.
#[derive(Debug, Clone, Default)]
pub struct LowestPrice {
    table: PriceTable,
}

impl LowestPrice {
    pub fn new(table: PriceTable) -> Self {
        Self { table }
    }

    /// Price of one node in micro-units
    pub fn node_price(&self, node: &Node) -> Result<i64> {
        let name = node.name_or_unknown();

        if let Some(value) = node.annotation(PRICE_ANNOTATION) {
            return parse_price(value).ok_or_else(|| {
                SchedulerError::selection_failed(
                    format!("node {} has a malformed price annotation '{}'", name, value),
                    format!("Set {} to a non-negative decimal such as \"0.096\"", PRICE_ANNOTATION),
                )
            });
        }

        node.label(INSTANCE_TYPE_LABEL)
            .and_then(|t| self.table.get(t))
            .ok_or_else(|| {
                SchedulerError::selection_failed(
                    format!("no price known for node {}", name),
                    format!(
                        "Annotate the node with {} or add its {} to the price table",
                        PRICE_ANNOTATION, INSTANCE_TYPE_LABEL
                    ),
                )
            })
    }
}

impl NodeSelector for LowestPrice {
    fn select(&self, candidates: &[Node]) -> Result<Node> {
        let mut best: Option<(&Node, i64)> = None;

        for node in candidates {
            let price = self.node_price(node)?;
            debug!(node = %node.name_or_unknown(), price_micros = price, "Candidate price");

            match best {
                Some((_, best_price)) if best_price <= price => {}
                _ => best = Some((node, price)),
            }
        }

        best.map(|(node, _)| node.clone()).ok_or_else(no_candidates)
    }

    fn name(&self) -> &str {
        "LowestPrice"
    }
}

/// First candidate wins
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstFit;

impl NodeSelector for FirstFit {
    fn select(&self, candidates: &[Node]) -> Result<Node> {
        candidates.first().cloned().ok_or_else(no_candidates)
    }

    fn name(&self) -> &str {
        "FirstFit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_node, with_instance_type, with_price};
    use tempfile::NamedTempFile;

    fn names(node: &Node) -> &str {
        node.name_or_unknown()
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("0.096"), Some(96_000));
        assert_eq!(parse_price("1"), Some(1_000_000));
        assert_eq!(parse_price("-1"), None);
        assert_eq!(parse_price("cheap"), None);
    }

    #[test]
    fn test_lowest_price_wins() {
        let candidates = vec![
            with_price(create_test_node("a", "4"), "0.20"),
            with_price(create_test_node("b", "4"), "0.096"),
            with_price(create_test_node("c", "4"), "0.10"),
        ];

        let chosen = LowestPrice::default().select(&candidates).unwrap();
        assert_eq!(names(&chosen), "b");
    }

    #[test]
    fn test_tie_goes_to_first_candidate() {
        let candidates = vec![
            with_price(create_test_node("a", "4"), "0.5"),
            with_price(create_test_node("b", "4"), "0.1"),
            with_price(create_test_node("c", "4"), "0.100"),
        ];

        let chosen = LowestPrice::default().select(&candidates).unwrap();
        assert_eq!(names(&chosen), "b");
    }

    #[test]
    fn test_price_table_fallback() {
        let mut table = PriceTable::new();
        table.insert("m5.large", 96_000);
        table.insert("m5.xlarge", 192_000);

        let candidates = vec![
            with_instance_type(create_test_node("big", "4"), "m5.xlarge"),
            with_instance_type(create_test_node("small", "2"), "m5.large"),
        ];

        let chosen = LowestPrice::new(table).select(&candidates).unwrap();
        assert_eq!(names(&chosen), "small");
    }

    #[test]
    fn test_annotation_overrides_table() {
        let mut table = PriceTable::new();
        table.insert("m5.large", 96_000);
        let node = with_price(with_instance_type(create_test_node("a", "4"), "m5.large"), "0.01");

        assert_eq!(LowestPrice::new(table).node_price(&node).unwrap(), 10_000);
    }

    #[test]
    fn test_unpriced_node_is_an_error() {
        let candidates = vec![
            with_price(create_test_node("a", "4"), "0.1"),
            create_test_node("mystery", "4"),
        ];

        let err = LowestPrice::default().select(&candidates).unwrap_err();
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn test_malformed_annotation_is_an_error() {
        let candidates = vec![with_price(create_test_node("a", "4"), "-0.5")];
        assert!(matches!(
            LowestPrice::default().select(&candidates),
            Err(SchedulerError::SelectionFailed { .. })
        ));
    }

    #[test]
    fn test_empty_candidates() {
        assert!(LowestPrice::default().select(&[]).is_err());
        assert!(FirstFit.select(&[]).is_err());
    }

    #[test]
    fn test_first_fit() {
        let candidates = vec![create_test_node("x", "1"), create_test_node("y", "8")];
        assert_eq!(names(&FirstFit.select(&candidates).unwrap()), "x");
        assert_eq!(FirstFit.name(), "FirstFit");
    }

    #[test]
    fn test_price_table_from_yaml() {
        let table = PriceTable::from_yaml("m5.large: 0.096\nc5.xlarge: 0.17\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("m5.large"), Some(96_000));
        assert_eq!(table.get("c5.xlarge"), Some(170_000));

        assert!(PriceTable::from_yaml("m5.large: -1").is_err());
        assert!(PriceTable::from_yaml("m5.large: cheap").is_err());
    }

    #[test]
    fn test_price_table_load() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "t3.micro: 0.0104\n").unwrap();

        let table = PriceTable::load(file.path()).unwrap();
        assert_eq!(table.get("t3.micro"), Some(10_400));

        let missing = PriceTable::load(Path::new("/nonexistent/prices.yaml"));
        assert!(matches!(
            missing,
            Err(SchedulerError::InvalidPriceTable { .. })
        ));
    }
}
