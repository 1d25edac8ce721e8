//! Daemon configuration, loaded from a YAML file.
//!
//! ```yaml
//! poll_interval: 60s
//! cycle_deadline: 45s
//! devices:
//!   - name: boiler-house-1
//!     model: tm3
//!     bridge: 10.178.4.14:951
//!     address: 1
//!   - name: feed-line
//!     model: alfamera
//!     bridge: 10.178.4.15:951
//!     address: 2
//!     systems: 2
//!     timeout: 3s
//! ```

use anyhow::Context;
use heatcol_lib::drivers::DeviceModel;
use serde::Deserialize;
use std::time::Duration;

fn default_poll_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_timeout() -> Duration {
    Duration::from_secs(7)
}

/// One meter to poll.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Name used in logs and output.
    pub name: String,
    pub model: DeviceModel,
    /// Serial-to-TCP bridge address, `host:port`.
    pub bridge: String,
    /// Modbus RTU device address.
    pub address: u8,
    /// Sub-system count for models that cannot report it themselves.
    #[serde(default)]
    pub systems: Option<u8>,
    /// Per round-trip I/O timeout.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    /// Pause between poll cycles.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Optional budget for one whole cycle across all devices; a cycle
    /// exceeding it is aborted between register reads.
    #[serde(default, with = "humantime_serde")]
    pub cycle_deadline: Option<Duration>,
    pub devices: Vec<DeviceConfig>,
}

impl PollConfig {
    pub const DEFAULT_CONFIG_FILE: &'static str = "heatcol.yaml";

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("cannot open configuration file {path}"))?;
        let config: PollConfig = serde_yaml::from_reader(file)
            .with_context(|| format!("cannot parse configuration file {path}"))?;
        if config.devices.is_empty() {
            anyhow::bail!("configuration file {path} lists no devices");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_configuration_parses() {
        let yaml = "\
poll_interval: 30s
cycle_deadline: 20s
devices:
  - name: boiler-house-1
    model: tm3
    bridge: 10.178.4.14:951
    address: 1
  - name: feed-line
    model: alfamera
    bridge: 10.178.4.15:951
    address: 2
    systems: 2
    timeout: 3s
";
        let config: PollConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.cycle_deadline, Some(Duration::from_secs(20)));
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].model, DeviceModel::Tm3);
        assert_eq!(config.devices[0].timeout, Duration::from_secs(7)); // default
        assert_eq!(config.devices[1].systems, Some(2));
        assert_eq!(config.devices[1].timeout, Duration::from_secs(3));
    }

    #[test]
    fn defaults_applied() {
        let yaml = "\
devices:
  - name: only
    model: tm3
    bridge: localhost:951
    address: 5
";
        let config: PollConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.cycle_deadline, None);
    }

    #[test]
    fn unknown_fields_rejected() {
        let yaml = "\
devices: []
retries: 3
";
        assert!(serde_yaml::from_str::<PollConfig>(yaml).is_err());
    }
}
