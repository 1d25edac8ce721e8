//! heatcol CLI
//!
//! A command-line polling gateway for heat/flow meters speaking Modbus RTU
//! behind a serial-to-TCP bridge.
//!
//! This tool allows users to:
//! - Initialize a meter and poll one normalized reading (`read`).
//! - Run in a continuous daemon mode that polls every configured device at a
//!   fixed interval and prints readings to the console (`daemon`).
//!
//! The CLI leverages the `heatcol_lib` crate for framing, decoding and the
//! per-model drivers.

use anyhow::{Context, Result};
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use heatcol_lib::drivers::{new_driver, DeviceDriver, DeviceModel};
use heatcol_lib::model::Reading;
use heatcol_lib::transport::{CancelToken, TcpTransport};
use log::*;
use std::{panic, time::Duration};

mod commandline;
mod config;

use config::{DeviceConfig, PollConfig};

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown_file>", 0, 0));

        let cause_str = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            *s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "<unknown_panic_cause>"
        };

        error!(
            target: "panic",
            "Thread '{}' panicked at '{}': {}:{} - Cause: {}",
            std::thread::current().name().unwrap_or("<unnamed>"),
            filename,
            line,
            column,
            cause_str
        );
    }));
    log_handle
}

fn print_reading(name: &str, reading: &Reading) -> Result<()> {
    println!("--- # {name}");
    print!(
        "{}",
        serde_yaml::to_string(reading).context("Cannot render reading")?
    );
    Ok(())
}

/// One init-if-needed plus one read, each on its own scoped connection.
fn poll_device(
    device: &DeviceConfig,
    driver: &mut dyn DeviceDriver,
    cancel: &CancelToken,
) -> Result<Reading> {
    if !driver.is_ready() {
        info!("{}: initializing {} at {}", device.name, device.model, device.bridge);
        let mut link = TcpTransport::connect(&device.bridge, device.timeout)
            .with_context(|| format!("Cannot connect to bridge {}", device.bridge))?;
        driver
            .init(&mut link)
            .with_context(|| format!("Cannot initialize device {}", device.name))?;
    }

    let mut link = TcpTransport::connect(&device.bridge, device.timeout)
        .with_context(|| format!("Cannot connect to bridge {}", device.bridge))?;
    driver
        .read(&mut link, cancel)
        .with_context(|| format!("Cannot read device {}", device.name))
}

fn handle_read(
    bridge: &str,
    model: DeviceModel,
    address: u8,
    systems: Option<u8>,
    timeout: Duration,
) -> Result<()> {
    let device = DeviceConfig {
        name: format!("{model}#{address}"),
        model,
        bridge: bridge.to_string(),
        address,
        systems,
        timeout,
    };
    let mut driver = new_driver(model, address, systems);
    let reading = poll_device(&device, driver.as_mut(), &CancelToken::new())?;
    print_reading(&device.name, &reading)
}

fn handle_daemon(config: PollConfig) -> Result<()> {
    info!(
        "Starting daemon mode: {} devices, interval {:?}",
        config.devices.len(),
        config.poll_interval
    );

    let mut sessions: Vec<(DeviceConfig, Box<dyn DeviceDriver>)> = config
        .devices
        .iter()
        .map(|device| {
            (
                device.clone(),
                new_driver(device.model, device.address, device.systems),
            )
        })
        .collect();

    loop {
        let cancel = CancelToken::new();
        if let Some(deadline) = config.cycle_deadline {
            cancel.cancel_after(deadline);
        }

        for (device, driver) in sessions.iter_mut() {
            // One failed device must not stop the cycle; its session stays
            // faulted and is re-initialized on the next pass.
            match poll_device(device, driver.as_mut(), &cancel) {
                Ok(reading) => print_reading(&device.name, &reading)?,
                Err(error) => warn!("{}: poll failed: {error:#}", device.name),
            }
        }

        std::thread::sleep(config.poll_interval);
    }
}

fn main() -> Result<()> {
    let args = commandline::CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());
    debug!(
        "heatcol started. Log level: {}",
        args.verbose.log_level_filter()
    );

    match &args.command {
        commandline::CliCommands::Read {
            bridge,
            model,
            address,
            systems,
        } => handle_read(bridge, *model, *address, *systems, args.timeout),
        commandline::CliCommands::Daemon { config_file } => {
            let config = PollConfig::load(config_file)?;
            handle_daemon(config)
        }
    }
}
