use crate::config::PollConfig;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use heatcol_lib::drivers::DeviceModel;
use std::time::Duration;

fn parse_device_address(s: &str) -> Result<u8, String> {
    let address =
        clap_num::maybe_hex::<u8>(s).map_err(|e| format!("invalid device address format: {e}"))?;
    if address == 0 {
        return Err("device address 0 is the broadcast address".to_string());
    }
    if address > 247 {
        return Err(format!("device address {address} is above the Modbus maximum 247"));
    }
    Ok(address)
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Initialize one meter and poll a single reading, printed as YAML.
    Read {
        /// Serial-to-TCP bridge the meter sits behind.
        /// Example: "10.178.4.14:951".
        #[arg(short, long)]
        bridge: String,

        /// Meter model to poll.
        #[arg(short, long)]
        model: DeviceModel,

        /// Modbus RTU device address (1 to 247).
        /// Can be specified in decimal or hexadecimal (e.g. "0x0A").
        #[arg(short, long, value_parser = parse_device_address)]
        address: u8,

        /// Number of metering sub-systems, for models that cannot report it
        /// themselves (Alfamera). TM3 learns the count from the device.
        #[arg(short, long)]
        systems: Option<u8>,
    },

    /// Run continuously: poll every device of the configuration file at a
    /// fixed interval and print readings to the standard output.
    /// Faulted sessions are re-initialized on the next cycle.
    #[clap(verbatim_doc_comment)]
    Daemon {
        /// The YAML configuration file listing the devices to poll.
        #[arg(long, default_value_t = PollConfig::DEFAULT_CONFIG_FILE.to_string())]
        config_file: String,
    },
}

const fn about_text() -> &'static str {
    "heatcol - poll Modbus RTU heat/flow meters behind a serial-to-TCP bridge."
}

#[derive(Parser, Debug)]
#[command(name="heatcol", author, version, about=about_text(), long_about = None, propagate_version = true)]
pub struct CliArgs {
    /// Configure verbosity of logging output.
    /// -q for warnings only, -v for debug, -vv for trace.
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    pub command: CliCommands,

    /// Modbus I/O timeout per request/response round-trip.
    /// Examples: "7s", "500ms".
    #[arg(global = true, long, default_value = "7s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_address_parser() {
        assert_eq!(parse_device_address("1"), Ok(1));
        assert_eq!(parse_device_address("0x0A"), Ok(10));
        assert_eq!(parse_device_address("247"), Ok(247));
        assert!(parse_device_address("0").is_err());
        assert!(parse_device_address("300").is_err());
    }
}
