//! A polling gateway library for industrial heat/flow meters speaking Modbus
//! RTU, typically behind a serial-to-TCP bridge.
//!
//! The crate periodically queries physically distinct meter models, validates
//! the wire-level responses, decodes the vendor-specific register layouts
//! into engineering units and hands back a normalized [`model::Reading`].
//!
//! The layers, bottom up:
//!
//! 1. [`frame`]: Modbus RTU request building and response validation
//!    (CRC-16/Modbus, address and function echo).
//! 2. [`decode`]: register-to-value routines for word-swapped 32-bit floats,
//!    fixed-point accumulators and bit-packed manufacture dates.
//! 3. [`plan`]: register request plans mapping (register, half) fields onto
//!    contiguous read spans and back.
//! 4. [`units`]: resolution of device-reported unit codes into immutable
//!    session coefficients.
//! 5. [`drivers`]: the per-model state machines composing all of the above
//!    behind the [`drivers::DeviceDriver`] trait.
//!
//! The byte transport is abstracted by [`transport::Transport`]; production
//! code uses [`transport::TcpTransport`], tests script the exchange.
//!
//! # Quick start
//!
//! ```no_run
//! use heatcol_lib::drivers::{new_driver, DeviceModel};
//! use heatcol_lib::transport::{CancelToken, TcpTransport};
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut driver = new_driver(DeviceModel::Tm3, 1, None);
//!
//!     // One connection per logical operation.
//!     let mut link = TcpTransport::connect("10.178.4.14:951", Duration::from_secs(7))?;
//!     driver.init(&mut link)?;
//!
//!     let mut link = TcpTransport::connect("10.178.4.14:951", Duration::from_secs(7))?;
//!     let reading = driver.read(&mut link, &CancelToken::new())?;
//!     println!("meter {} reports {} sub-systems", reading.serial, reading.systems.len());
//!     Ok(())
//! }
//! ```

pub mod decode;
pub mod drivers;
pub mod error;
pub mod frame;
pub mod model;
pub mod plan;
pub mod transport;
pub mod units;
