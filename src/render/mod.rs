//! JSON rendering of collected snapshots.
//!
//! Document shape:
//!
//! ```text
//! {"timestamp": "...", "du_low": {"upper_phy": [{"pci", "metrics_period_ms", "dl", "ul"}, ...]}}
//! ```

use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::metrics::snapshot::{DlMetrics, DuLowMetrics, UlMetrics, UpperPhyMetrics};

/// Serializes a float, replacing NaN and infinities with `0.0`.
pub fn finite<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(if value.is_finite() { *value } else { 0.0 })
}

/// Sector index to physical cell identifier lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PciTable {
    pcis: Vec<u16>,
}

impl PciTable {
    pub fn new(pcis: Vec<u16>) -> Self {
        Self { pcis }
    }

    /// PCI of `sector`.
    ///
    /// # Panics
    ///
    /// If `sector` has no entry. Reporting a cell that does not exist is a
    /// wiring error with no fallback.
    pub fn pci(&self, sector: usize) -> u16 {
        match self.pcis.get(sector) {
            Some(&pci) => pci,
            None => panic!(
                "sector {sector} is out of range of the PCI table ({} entries)",
                self.pcis.len()
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.pcis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcis.is_empty()
    }
}

#[derive(Serialize)]
struct Document<'a> {
    timestamp: String,
    du_low: DuLowDocument<'a>,
}

#[derive(Serialize)]
struct DuLowDocument<'a> {
    upper_phy: Vec<SectorDocument<'a>>,
}

#[derive(Serialize)]
struct SectorDocument<'a> {
    pci: u16,
    #[serde(serialize_with = "finite")]
    metrics_period_ms: f64,
    dl: &'a DlMetrics,
    ul: &'a UlMetrics,
}

fn document<'a>(metrics: &'a DuLowMetrics, pcis: &PciTable, now: SystemTime) -> Document<'a> {
    Document {
        timestamp: format_timestamp(now),
        du_low: DuLowDocument {
            upper_phy: metrics
                .upper_phy
                .iter()
                .map(|sector| sector_document(sector, pcis))
                .collect(),
        },
    }
}

fn sector_document<'a>(sector: &'a UpperPhyMetrics, pcis: &PciTable) -> SectorDocument<'a> {
    SectorDocument {
        pci: pcis.pci(sector.sector_id),
        metrics_period_ms: sector.metrics_period_ms(),
        dl: &sector.dl,
        ul: &sector.ul,
    }
}

/// Renders `metrics` as a JSON tree.
///
/// # Panics
///
/// If a sector index has no entry in `pcis`.
pub fn generate(
    metrics: &DuLowMetrics,
    pcis: &PciTable,
    now: SystemTime,
) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(document(metrics, pcis, now))
}

/// Renders `metrics` as a single-line JSON string.
pub fn generate_string(
    metrics: &DuLowMetrics,
    pcis: &PciTable,
    now: SystemTime,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&document(metrics, pcis, now))
}

/// Renders `metrics` as an indented JSON string.
pub fn generate_string_pretty(
    metrics: &DuLowMetrics,
    pcis: &PciTable,
    now: SystemTime,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&document(metrics, pcis, now))
}

/// Formats `t` as UTC ISO-8601 with millisecond precision.
pub fn format_timestamp(t: SystemTime) -> String {
    let dt: DateTime<Utc> = t.into();
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use serde_json::json;

    use super::*;
    use crate::metrics::snapshot::{FromTotals, ThroughputMetrics};
    use crate::metrics::aggregate::BlockTotals;

    fn one_sector(sector_id: usize) -> DuLowMetrics {
        DuLowMetrics {
            upper_phy: vec![UpperPhyMetrics {
                sector_id,
                metrics_period: Duration::from_millis(1_000),
                ..UpperPhyMetrics::default()
            }],
        }
    }

    #[test]
    fn test_format_timestamp() {
        let t = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        assert_eq!(format_timestamp(t), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn test_generate_shape() {
        let pcis = PciTable::new(vec![7]);
        let doc = generate(&one_sector(0), &pcis, UNIX_EPOCH).unwrap();

        assert_eq!(doc["timestamp"], json!("1970-01-01T00:00:00.000Z"));
        let sectors = doc["du_low"]["upper_phy"].as_array().unwrap();
        assert_eq!(sectors.len(), 1);
        assert_eq!(sectors[0]["pci"], json!(7));
        assert_eq!(sectors[0]["metrics_period_ms"], json!(1000.0));
        assert!(sectors[0]["dl"]["ldpc_encoder"].is_object());
        assert!(sectors[0]["ul"]["pusch"].is_object());
    }

    #[test]
    fn test_generate_maps_sector_to_pci() {
        let pcis = PciTable::new(vec![1, 500, 1007]);
        let metrics = DuLowMetrics {
            upper_phy: (0..3).map(UpperPhyMetrics::empty).collect(),
        };
        let doc = generate(&metrics, &pcis, UNIX_EPOCH).unwrap();
        let got: Vec<_> = doc["du_low"]["upper_phy"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["pci"].as_u64().unwrap())
            .collect();
        assert_eq!(got, vec![1, 500, 1007]);
    }

    #[test]
    fn test_generate_values_are_finite() {
        let mut metrics = one_sector(0);
        metrics.upper_phy[0].dl.ldpc.ldpc_encoder =
            ThroughputMetrics::from_totals(&BlockTotals::default(), Duration::ZERO);
        metrics.upper_phy[0].dl.ldpc.ldpc_encoder.average_throughput_mbps = f64::NAN;
        metrics.upper_phy[0].ul.channel.equalizer.processing_rate_mres = f64::INFINITY;

        let text = generate_string(&metrics, &PciTable::new(vec![3]), UNIX_EPOCH).unwrap();
        assert!(!text.contains("NaN"));
        assert!(!text.contains("inf"));

        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        let sector = &doc["du_low"]["upper_phy"][0];
        assert_eq!(sector["dl"]["ldpc_encoder"]["average_throughput_mbps"], json!(0.0));
        assert_eq!(sector["ul"]["equalizer"]["processing_rate_mres"], json!(0.0));
    }

    #[test]
    fn test_pretty_and_compact_agree() {
        let pcis = PciTable::new(vec![7]);
        let compact = generate_string(&one_sector(0), &pcis, UNIX_EPOCH).unwrap();
        let pretty = generate_string_pretty(&one_sector(0), &pcis, UNIX_EPOCH).unwrap();
        assert!(!compact.contains('\n'));
        assert!(pretty.contains('\n'));
        let a: serde_json::Value = serde_json::from_str(&compact).unwrap();
        let b: serde_json::Value = serde_json::from_str(&pretty).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "out of range of the PCI table")]
    fn test_out_of_range_sector_panics() {
        let pcis = PciTable::new(vec![7]);
        let _ = generate(&one_sector(1), &pcis, UNIX_EPOCH);
    }
}
