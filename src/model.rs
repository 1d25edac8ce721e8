//! Normalized reading snapshots handed back to the poll orchestrator.
//!
//! A [`Reading`] is created fresh on every `read` call and never mutated after
//! being returned; the drivers keep only the session state needed to interpret
//! the next poll (unit coefficients, serial number, sub-system count), not any
//! reading history.

use crate::units::EnergyUnit;
use chrono::{DateTime, Utc};

/// Per-pipe measurements of one metering line.
///
/// This is the superset of the fields the supported meter families report;
/// a driver fills the ones its device provides and leaves the rest at zero.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LineReading {
    /// Accumulated heat energy, in the device's energy unit.
    pub energy: f64,
    /// Accumulated mass, tonnes.
    pub mass: f64,
    /// Mass flow rate, t/h.
    pub mass_flow: f32,
    /// Volume flow rate, m³/h.
    pub volume_flow: f32,
    /// Instantaneous heat flow, energy unit per hour.
    pub heat_flow: f32,
    /// Temperature, °C.
    pub temperature: f32,
    /// Pressure, MPa (or the device's native pressure unit when pre-scaled).
    pub pressure: f32,
    /// Differential pressure, kPa.
    pub differential_pressure: f32,
    /// Enthalpy, kcal/kg.
    pub enthalpy: f32,
    /// Density, kg/m³.
    pub density: f32,
}

/// One logical metering sub-system (tube) within a device.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SystemReading {
    /// Liveness flag: true once the sub-system's registers decoded cleanly.
    pub status: bool,
    /// Total accumulated heat energy across the system's lines.
    pub total_energy: f64,
    /// Per-pipe measurements, in the device's line order.
    pub lines: Vec<LineReading>,
    /// Running time of this sub-system, seconds.
    pub time_run_secs: u32,
}

/// One complete poll snapshot of a device.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Reading {
    /// Device serial number as reported during initialization.
    pub serial: String,
    /// Timestamp taken on the gateway when the poll started.
    pub requested_at: DateTime<Utc>,
    /// Device-side clock, when the device exposes one.
    pub device_time: Option<DateTime<Utc>>,
    /// Total running time of the device, seconds.
    pub uptime_secs: u32,
    /// Energy unit the accumulators are expressed in.
    pub energy_unit: EnergyUnit,
    /// One entry per logical sub-system.
    pub systems: Vec<SystemReading>,
}

impl Reading {
    /// Fresh snapshot stamped with the current gateway time.
    pub fn begin(serial: &str, energy_unit: EnergyUnit, system_count: usize) -> Self {
        Reading {
            serial: serial.to_string(),
            requested_at: Utc::now(),
            device_time: None,
            uptime_secs: 0,
            energy_unit,
            systems: vec![SystemReading::default(); system_count],
        }
    }
}
