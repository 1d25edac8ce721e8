//! Driver for the Alfamera flow computer, Modbus RTU.
//!
//! Unlike the TM3 this device pre-scales everything on the wire: there are no
//! unit-code registers and no accumulator scaling learned at runtime. Each
//! tube publishes seven word-swapped floats over a non-contiguous register
//! window, so the measurement query is a two-span request plan. Heat flow
//! arrives in kcal/h and is converted to Gcal/h with a fixed coefficient.

use crate::decode;
use crate::error::Error;
use crate::model::{LineReading, Reading, SystemReading};
use crate::plan::{RegisterHalf, RegisterRequestPlan};
use crate::transport::{CancelToken, Transport};
use crate::units::EnergyUnit;
use log::{debug, info, warn};

use super::{run_plan, DeviceDriver, Session};

/// Serial number registers: the high byte of 0xEF04 and the low byte of
/// 0xEF05 form the device number.
const SERIAL_REG_HIGH: u16 = 0xEF04;
const SERIAL_REG_LOW: u16 = 0xEF05;

/// Tube register windows start at 0x1600 and repeat every 0x100 registers.
const TUBE_BASE: u16 = 0x1600;
const TUBE_STRIDE: u16 = 0x0100;

/// Largest tube count the register window layout supports; the flow computer
/// family itself stays far below this.
pub const MAX_TUBES: usize = 16;

/// Offsets of the per-tube floats within the window.
const MASS_FLOW_OFFSET: u16 = 0x00;
const HEAT_FLOW_OFFSET: u16 = 0x02;
const PRESSURE_OFFSET: u16 = 0x04;
const TEMPERATURE_OFFSET: u16 = 0x06;
const DIFF_PRESSURE_OFFSET: u16 = 0x08;
const ENTHALPY_OFFSET: u16 = 0x10;
const DENSITY_OFFSET: u16 = 0x12;

/// kcal/h to Gcal/h.
const HEAT_FLOW_TO_GCAL: f32 = 0.000_000_238_843;

#[derive(Debug, Clone)]
struct AlfameraSession {
    serial: String,
}

/// Polling driver for one Alfamera flow computer.
#[derive(Debug)]
pub struct Alfamera {
    address: u8,
    tubes: usize,
    session: Session<AlfameraSession>,
}

impl Alfamera {
    /// `tubes` fixes the number of metering tubes to poll; the device does
    /// not report the count itself. Counts outside `1..=MAX_TUBES` are
    /// clamped so the tube window arithmetic stays inside the register
    /// address space.
    pub fn new(address: u8, tubes: usize) -> Self {
        if tubes > MAX_TUBES {
            warn!("meter #{address}: tube count {tubes} clamped to {MAX_TUBES}");
        }
        Alfamera {
            address,
            tubes: tubes.clamp(1, MAX_TUBES),
            session: Session::Uninitialized,
        }
    }

    fn tube_plan(tube: usize) -> RegisterRequestPlan {
        let base = TUBE_BASE + TUBE_STRIDE * tube as u16;
        RegisterRequestPlan::builder()
            .float32(base + MASS_FLOW_OFFSET)
            .float32(base + HEAT_FLOW_OFFSET)
            .float32(base + PRESSURE_OFFSET)
            .float32(base + TEMPERATURE_OFFSET)
            .float32(base + DIFF_PRESSURE_OFFSET)
            .float32(base + ENTHALPY_OFFSET)
            .float32(base + DENSITY_OFFSET)
            .build()
    }

    fn run_init(&self, link: &mut dyn Transport) -> Result<AlfameraSession, Error> {
        let cancel = CancelToken::new();
        info!("initializing Alfamera meter #{}", self.address);

        debug!("requesting device number");
        let plan = RegisterRequestPlan::builder()
            .byte(SERIAL_REG_HIGH, RegisterHalf::High)
            .byte(SERIAL_REG_LOW, RegisterHalf::Low)
            .build();
        let fields = run_plan(link, self.address, &plan, &cancel)?;
        let serial = u16::from_be_bytes([fields[0], fields[1]]).to_string();
        debug!("device number {serial}");

        Ok(AlfameraSession { serial })
    }

    fn run_read(
        &self,
        link: &mut dyn Transport,
        cancel: &CancelToken,
        session: &AlfameraSession,
    ) -> Result<Reading, Error> {
        let mut reading = Reading::begin(&session.serial, EnergyUnit::Gigacalorie, self.tubes);

        for tube in 0..self.tubes {
            debug!("requesting measurements of tube {}", tube + 1);
            let fields = run_plan(link, self.address, &Self::tube_plan(tube), cancel)?;
            reading.systems[tube] = decode_tube(&fields);
        }

        Ok(reading)
    }
}

/// Decodes the 28 positional bytes of one tube window.
fn decode_tube(fields: &[u8]) -> SystemReading {
    let float = |index: usize| decode::swapped_f32(&fields[index * 4..index * 4 + 4]);
    SystemReading {
        status: true,
        lines: vec![LineReading {
            mass_flow: float(0),
            heat_flow: float(1) * HEAT_FLOW_TO_GCAL,
            pressure: float(2),
            temperature: float(3),
            differential_pressure: float(4),
            enthalpy: float(5),
            density: float(6),
            ..LineReading::default()
        }],
        ..SystemReading::default()
    }
}

impl DeviceDriver for Alfamera {
    fn init(&mut self, link: &mut dyn Transport) -> Result<(), Error> {
        match self.run_init(link) {
            Ok(session) => {
                self.session = Session::Ready(session);
                Ok(())
            }
            Err(err) => {
                self.session = Session::Faulted;
                Err(err)
            }
        }
    }

    fn read(&mut self, link: &mut dyn Transport, cancel: &CancelToken) -> Result<Reading, Error> {
        let session = match &self.session {
            Session::Ready(session) => session.clone(),
            _ => return Err(Error::NotReady),
        };
        match self.run_read(link, cancel, &session) {
            Ok(reading) => Ok(reading),
            Err(err) => {
                self.session = Session::Faulted;
                Err(err)
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.session.is_ready()
    }
}
