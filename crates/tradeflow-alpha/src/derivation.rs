//! Rules that turn clusters into factor universes.

use serde::{Deserialize, Serialize};
use tradeflow_core::types::TradingUniverse;

/// How factor universes are derived from the trading universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationRule {
    /// Every unordered pair within a cluster, in cluster order
    ClusterPairs,
    /// One universe per instrument
    EachInstrument,
}

impl DerivationRule {
    /// Derive the ordered factor universes.
    ///
    /// Cluster members that are not active instruments are skipped.
    pub fn derive(&self, universe: &TradingUniverse) -> Vec<Vec<String>> {
        match self {
            DerivationRule::ClusterPairs => {
                let mut pairs = Vec::new();
                for members in universe.clusters.values() {
                    let active: Vec<&String> =
                        members.iter().filter(|s| universe.contains(s)).collect();
                    for (i, first) in active.iter().enumerate() {
                        for second in &active[i + 1..] {
                            pairs.push(vec![(*first).clone(), (*second).clone()]);
                        }
                    }
                }
                pairs
            }
            DerivationRule::EachInstrument => {
                universe.symbols().map(|s| vec![s.clone()]).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradeflow_core::types::Instrument;

    fn universe() -> TradingUniverse {
        ["A", "B", "C", "D"]
            .iter()
            .enumerate()
            .fold(TradingUniverse::new(), |u, (i, s)| {
                u.with_instrument(Instrument::new(*s, "USD", i as u64))
            })
            .with_cluster(0, vec!["C".into(), "A".into(), "B".into()])
            .with_cluster(1, vec!["D".into(), "GONE".into()])
    }

    #[test]
    fn test_cluster_pairs_in_cluster_order() {
        let pairs = DerivationRule::ClusterPairs.derive(&universe());

        assert_eq!(
            pairs,
            vec![
                vec!["C".to_string(), "A".to_string()],
                vec!["C".to_string(), "B".to_string()],
                vec!["A".to_string(), "B".to_string()],
            ]
        );
    }

    #[test]
    fn test_each_instrument() {
        let universes = DerivationRule::EachInstrument.derive(&universe());
        assert_eq!(universes.len(), 4);
        assert!(universes.iter().all(|u| u.len() == 1));
    }

    #[test]
    fn test_serde_names() {
        let rule: DerivationRule = serde_json::from_str("\"cluster_pairs\"").unwrap();
        assert_eq!(rule, DerivationRule::ClusterPairs);
    }
}
