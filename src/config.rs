//! Configuration loader (spec.md §6 "Configuration inputs"), the one
//! external collaborator the core is specified against rather than
//! implementing internally — promoted into the crate so the binary has
//! somewhere to load it from.
//!
//! serde + toml are not in the teacher's own dependency graph, but are
//! the idiomatic choice the rest of the pack reaches for wherever a
//! struct needs to round-trip through a config file (see DESIGN.md).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::network::NetScheme;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub nchips: u32,
    pub ntiles: u32,
    pub nblocks: u32,
    pub nrows: u32,
    pub ncols: u32,

    #[serde(default = "default_clock_rate")]
    pub clock_rate: f64,

    #[serde(default)]
    pub blockctrl: bool,
    #[serde(default)]
    pub tilectrl: bool,
    #[serde(default)]
    pub chipctrl: bool,

    #[serde(default)]
    pub force_sync: bool,

    #[serde(default = "default_netscheme")]
    pub netscheme: String,

    #[serde(default = "default_rstfile")]
    pub rstfile: String,

    #[serde(default = "default_chip_capacity")]
    pub chip_queue_capacity: usize,
}

fn default_clock_rate() -> f64 {
    1.0e9
}

fn default_netscheme() -> String {
    "ideal".to_string()
}

fn default_rstfile() -> String {
    "result.txt".to_string()
}

fn default_chip_capacity() -> usize {
    8
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(s).context("parsing configuration TOML")?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration file {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// spec.md §6: if all three of `blockctrl/tilectrl/chipctrl` are
    /// false, `blockctrl` is set true. Only one should be true in
    /// practice; not enforced here by design.
    fn normalize(&mut self) {
        if !self.blockctrl && !self.tilectrl && !self.chipctrl {
            self.blockctrl = true;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.nchips == 0 || self.ntiles == 0 || self.nblocks == 0 || self.nrows == 0 || self.ncols == 0 {
            bail!("geometry dimensions must all be positive");
        }
        if self.clock_rate <= 0.0 {
            bail!("clock_rate must be positive, got {}", self.clock_rate);
        }
        Ok(())
    }

    pub fn netscheme(&self) -> NetScheme {
        NetScheme::from_config_str(&self.netscheme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
        nchips = 2
        ntiles = 16
        nblocks = 256
        nrows = 1024
        ncols = 1024
    "#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_toml_str(BASE).unwrap();
        assert_eq!(config.netscheme, "ideal");
        assert_eq!(config.rstfile, "result.txt");
        assert!(config.clock_rate > 0.0);
    }

    #[test]
    fn test_normalize_sets_blockctrl_when_all_false() {
        let config = Config::from_toml_str(BASE).unwrap();
        assert!(config.blockctrl);
        assert!(!config.tilectrl);
        assert!(!config.chipctrl);
    }

    #[test]
    fn test_explicit_tilectrl_not_overridden() {
        let toml = format!("{BASE}\ntilectrl = true\n");
        let config = Config::from_toml_str(&toml).unwrap();
        assert!(!config.blockctrl);
        assert!(config.tilectrl);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let toml = "nchips = 0\nntiles = 1\nnblocks = 1\nnrows = 1\nncols = 1\n";
        assert!(Config::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_netscheme_resolves_to_enum() {
        let toml = format!("{BASE}\nnetscheme = \"mesh\"\n");
        let config = Config::from_toml_str(&toml).unwrap();
        assert_eq!(config.netscheme(), NetScheme::Mesh);
    }
}
