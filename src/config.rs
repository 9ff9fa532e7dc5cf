use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::metrics::packed::MAX_NUMEROLOGY;

/// Largest physical cell identifier.
pub const MAX_PCI: u16 = 1007;

/// Top-level configuration for the phymetrics daemon.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logging verbosity (debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Collection cadence.
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Cells served by this DU, in sector order.
    #[serde(default)]
    pub sectors: Vec<SectorConfig>,

    /// Snapshot destination.
    #[serde(default)]
    pub output: OutputConfig,

    /// Synthetic workload.
    #[serde(default)]
    pub loadgen: LoadgenConfig,
}

/// Collection cadence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    /// Time between two collections. Default: 1s.
    #[serde(default = "default_collection_interval", with = "humantime_serde")]
    pub interval: Duration,
}

/// One sector (cell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SectorConfig {
    /// Physical cell identifier, 0..=1007.
    pub pci: u16,
}

/// Where rendered snapshots go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    #[default]
    Stdout,
    File,
}

/// Snapshot output configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Destination kind. Default: stdout.
    #[serde(default)]
    pub kind: OutputKind,

    /// File to append JSON lines to. Required when kind is file.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Indent the JSON. Default: false.
    #[serde(default)]
    pub pretty: bool,
}

/// Synthetic load generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoadgenConfig {
    /// Enable the load generator. Default: false.
    #[serde(default)]
    pub enabled: bool,

    /// Subcarrier spacing numerology, 0..=4. Default: 1 (30 kHz).
    #[serde(default = "default_numerology")]
    pub numerology: u8,

    /// Producer threads per sector. Default: 2.
    #[serde(default = "default_threads_per_sector")]
    pub threads_per_sector: usize,

    /// Highest number of layers a PDSCH transmission uses, 1..=4. Default: 2.
    #[serde(default = "default_max_layers")]
    pub max_layers: u8,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_collection_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_numerology() -> u8 {
    1
}

fn default_threads_per_sector() -> usize {
    2
}

fn default_max_layers() -> u8 {
    2
}

// --- Default trait impls ---

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            collection: CollectionConfig::default(),
            sectors: Vec::new(),
            output: OutputConfig::default(),
            loadgen: LoadgenConfig::default(),
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: default_collection_interval(),
        }
    }
}

impl Default for LoadgenConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            numerology: default_numerology(),
            threads_per_sector: default_threads_per_sector(),
            max_layers: default_max_layers(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg = Self::from_yaml(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        Ok(cfg)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(data)?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        if self.collection.interval.is_zero() {
            bail!("collection.interval must be positive");
        }

        if self.sectors.is_empty() {
            bail!("at least one sector is required");
        }

        let mut seen = HashSet::with_capacity(self.sectors.len());
        for (i, sector) in self.sectors.iter().enumerate() {
            if sector.pci > MAX_PCI {
                bail!("sectors[{i}].pci must be <= {MAX_PCI}, got {}", sector.pci);
            }

            if !seen.insert(sector.pci) {
                bail!("sectors[{i}].pci {} is used by more than one sector", sector.pci);
            }
        }

        if self.output.kind == OutputKind::File && self.output.path.is_none() {
            bail!("output.path is required when output.kind is file");
        }

        if self.loadgen.enabled {
            if self.loadgen.numerology > MAX_NUMEROLOGY {
                bail!(
                    "loadgen.numerology must be <= {MAX_NUMEROLOGY}, got {}",
                    self.loadgen.numerology
                );
            }

            if self.loadgen.threads_per_sector == 0 {
                bail!("loadgen.threads_per_sector must be positive");
            }

            if !(1..=4).contains(&self.loadgen.max_layers) {
                bail!(
                    "loadgen.max_layers must be between 1 and 4, got {}",
                    self.loadgen.max_layers
                );
            }
        }

        Ok(())
    }

    /// PCIs in sector order.
    pub fn pcis(&self) -> Vec<u16> {
        self.sectors.iter().map(|s| s.pci).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            sectors: vec![SectorConfig { pci: 1 }],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.collection.interval, Duration::from_secs(1));
        assert_eq!(cfg.output.kind, OutputKind::Stdout);
        assert!(!cfg.output.pretty);
        assert!(!cfg.loadgen.enabled);
        assert_eq!(cfg.loadgen.numerology, 1);
        assert_eq!(cfg.loadgen.threads_per_sector, 2);
        assert_eq!(cfg.loadgen.max_layers, 2);
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
log_level: debug
collection:
  interval: 500ms
sectors:
  - pci: 1
  - pci: 500
output:
  kind: file
  path: /tmp/phy.jsonl
  pretty: true
loadgen:
  enabled: true
  numerology: 0
  threads_per_sector: 4
  max_layers: 4
"#;
        let cfg = Config::from_yaml(yaml).expect("valid config");
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.collection.interval, Duration::from_millis(500));
        assert_eq!(cfg.pcis(), vec![1, 500]);
        assert_eq!(cfg.output.kind, OutputKind::File);
        assert_eq!(cfg.output.path, Some(PathBuf::from("/tmp/phy.jsonl")));
        assert!(cfg.output.pretty);
        assert!(cfg.loadgen.enabled);
        assert_eq!(cfg.loadgen.numerology, 0);
        assert_eq!(cfg.loadgen.threads_per_sector, 4);
        assert_eq!(cfg.loadgen.max_layers, 4);
    }

    #[test]
    fn test_parse_minimal_yaml_uses_defaults() {
        let cfg = Config::from_yaml("sectors:\n  - pci: 7\n").expect("valid config");
        assert_eq!(cfg.collection.interval, Duration::from_secs(1));
        assert_eq!(cfg.output.kind, OutputKind::Stdout);
        assert_eq!(cfg.pcis(), vec![7]);
    }

    #[test]
    fn test_parse_rejects_unknown_output_kind() {
        let err = Config::from_yaml("sectors:\n  - pci: 7\noutput:\n  kind: kafka\n").unwrap_err();
        assert!(err.to_string().contains("kafka") || format!("{err:#}").contains("kafka"));
    }

    #[test]
    fn test_validation_zero_interval() {
        let mut cfg = valid_config();
        cfg.collection.interval = Duration::ZERO;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("collection.interval"));
    }

    #[test]
    fn test_validation_no_sectors() {
        let cfg = Config::default();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("sector"));
    }

    #[test]
    fn test_validation_pci_out_of_range() {
        let cfg = Config {
            sectors: vec![SectorConfig { pci: 1008 }],
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("sectors[0].pci"));
    }

    #[test]
    fn test_validation_max_pci_accepted() {
        let cfg = Config {
            sectors: vec![SectorConfig { pci: MAX_PCI }],
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validation_duplicate_pci() {
        let cfg = Config {
            sectors: vec![SectorConfig { pci: 3 }, SectorConfig { pci: 3 }],
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("more than one sector"));
    }

    #[test]
    fn test_validation_file_output_requires_path() {
        let mut cfg = valid_config();
        cfg.output.kind = OutputKind::File;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("output.path"));

        cfg.output.path = Some(PathBuf::from("/tmp/out.jsonl"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validation_loadgen_numerology() {
        let mut cfg = valid_config();
        cfg.loadgen.enabled = true;
        cfg.loadgen.numerology = 5;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("loadgen.numerology"));
    }

    #[test]
    fn test_validation_loadgen_threads() {
        let mut cfg = valid_config();
        cfg.loadgen.enabled = true;
        cfg.loadgen.threads_per_sector = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("threads_per_sector"));
    }

    #[test]
    fn test_validation_loadgen_layers() {
        let mut cfg = valid_config();
        cfg.loadgen.enabled = true;
        for layers in [0, 5] {
            cfg.loadgen.max_layers = layers;
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("max_layers"));
        }
    }

    #[test]
    fn test_validation_ignores_disabled_loadgen() {
        let mut cfg = valid_config();
        cfg.loadgen.numerology = 9;
        assert!(cfg.validate().is_ok());
    }
}
