//! Driver for the ISTOK-TM3 multifunction heat meter (NPC Specsystema),
//! Modbus RTU.
//!
//! The TM3 reports its own configuration: sub-system count and the unit codes
//! for energy, pressure and volume are read once during initialization and
//! the resolved coefficients are applied to every subsequent measurement
//! block. Accumulators travel as plain big-endian 64-bit integers with a
//! fixed decimal scale; rates, temperatures and pressures are word-swapped
//! IEEE-754 floats.

use crate::decode;
use crate::error::Error;
use crate::model::{LineReading, Reading, SystemReading};
use crate::plan::RegisterRequestPlan;
use crate::transport::{CancelToken, Transport};
use crate::units::UnitCoefficients;
use log::{debug, info};

use super::{run_plan, DeviceDriver, Session};

/// Serial number block 0xEF04..=0xEF07: batch number in 0xEF05, packed
/// manufacture date (day:5, month:4, year:7) in 0xEF07.
const SERIAL_REG_ADDR: u16 = 0xEF04;
const SERIAL_REG_QUAN: u16 = 4;

const SYSTEM_COUNT_REG_ADDR: u16 = 0x0143;
const PRESSURE_UNIT_REG_ADDR: u16 = 0xED00;
const ENERGY_UNIT_REG_ADDR: u16 = 0xED01;
const VOLUME_UNIT_REG_ADDR: u16 = 0xED02;

/// Device clock, unix seconds, plain big-endian.
const CLOCK_REG_ADDR: u16 = 0xEF50;
const CLOCK_REG_QUAN: u16 = 2;

/// Total device running time, seconds, plain big-endian.
const UPTIME_REG_ADDR: u16 = 0xEF57;
const UPTIME_REG_QUAN: u16 = 2;

/// Measurement block of sub-system `i` starts at 0x7000 + 4·i and spans
/// 0x3A registers (116 payload bytes).
const SYSTEM_BLOCK_BASE: u16 = 0x7000;
const SYSTEM_BLOCK_STRIDE: u16 = 4;
const SYSTEM_BLOCK_QUAN: u16 = 0x3A;

/// The count register is 16 bits wide but the meter family tops out at a
/// handful of sub-systems; anything larger is a corrupted or misread value
/// and must not drive the block register arithmetic.
const MAX_SYSTEM_COUNT: usize = 16;

/// Energy accumulators are reported in millionths of the energy unit.
const ENERGY_DIVISOR: f64 = 1_000_000.0;
/// Mass accumulators are reported in kilograms, scaled to tonnes.
const MASS_DIVISOR: f64 = 1_000.0;
/// Mass flow arrives in kg/h and is scaled to t/h.
const MASS_FLOW_SCALE: f32 = 0.001;

#[derive(Debug, Clone)]
struct Tm3Session {
    serial: String,
    system_count: usize,
    units: UnitCoefficients,
}

/// Polling driver for one TM3 meter.
#[derive(Debug)]
pub struct Tm3 {
    address: u8,
    session: Session<Tm3Session>,
}

impl Tm3 {
    pub fn new(address: u8) -> Self {
        Tm3 {
            address,
            session: Session::Uninitialized,
        }
    }

    fn run_init(&self, link: &mut dyn Transport) -> Result<Tm3Session, Error> {
        let cancel = CancelToken::new();
        info!("initializing TM3 meter #{}", self.address);

        debug!("requesting serial number");
        let plan = RegisterRequestPlan::contiguous(SERIAL_REG_ADDR, SERIAL_REG_QUAN);
        let fields = run_plan(link, self.address, &plan, &cancel)?;
        let batch = decode::to_u16_be(&fields[2..4]);
        let date_word = decode::to_u16_be(&fields[6..8]);
        let (_, month, year) = decode::packed_date(date_word);
        // Factory convention: two-digit year, two-digit month, three-digit
        // batch number, e.g. 1612001 for batch 001 of December 2016.
        let serial = format!("{year}{month:02}{batch:03}");
        debug!("serial number {serial}");

        debug!("requesting sub-system count");
        let plan = RegisterRequestPlan::contiguous(SYSTEM_COUNT_REG_ADDR, 1);
        let fields = run_plan(link, self.address, &plan, &cancel)?;
        let system_count = decode::to_u16_be(&fields) as usize;
        if !(1..=MAX_SYSTEM_COUNT).contains(&system_count) {
            return Err(Error::SystemCount {
                count: system_count,
                max: MAX_SYSTEM_COUNT,
            });
        }
        info!("meter #{} reports {system_count} metering sub-systems", self.address);

        debug!("requesting unit codes");
        let energy_code = self.read_unit_code(link, ENERGY_UNIT_REG_ADDR, &cancel)?;
        let pressure_code = self.read_unit_code(link, PRESSURE_UNIT_REG_ADDR, &cancel)?;
        let volume_code = self.read_unit_code(link, VOLUME_UNIT_REG_ADDR, &cancel)?;
        let units = UnitCoefficients::resolve(energy_code, pressure_code, volume_code)?;
        debug!(
            "resolved units: energy {}, pressure coefficient {}, volume coefficient {}",
            units.energy, units.pressure, units.volume
        );

        Ok(Tm3Session {
            serial,
            system_count,
            units,
        })
    }

    fn read_unit_code(
        &self,
        link: &mut dyn Transport,
        register: u16,
        cancel: &CancelToken,
    ) -> Result<u16, Error> {
        let plan = RegisterRequestPlan::contiguous(register, 1);
        let fields = run_plan(link, self.address, &plan, cancel)?;
        Ok(decode::to_u16_be(&fields))
    }

    fn run_read(
        &self,
        link: &mut dyn Transport,
        cancel: &CancelToken,
        session: &Tm3Session,
    ) -> Result<Reading, Error> {
        let mut reading = Reading::begin(&session.serial, session.units.energy, session.system_count);

        debug!("requesting device clock");
        let plan = RegisterRequestPlan::contiguous(CLOCK_REG_ADDR, CLOCK_REG_QUAN);
        let fields = run_plan(link, self.address, &plan, cancel)?;
        let clock = decode::to_u32_be(&fields);
        reading.device_time = chrono::DateTime::from_timestamp(clock as i64, 0);

        for index in 0..session.system_count {
            debug!("requesting measurement block of sub-system {}", index + 1);
            let start = SYSTEM_BLOCK_BASE + SYSTEM_BLOCK_STRIDE * index as u16;
            let plan = RegisterRequestPlan::contiguous(start, SYSTEM_BLOCK_QUAN);
            let block = run_plan(link, self.address, &plan, cancel)?;
            reading.systems[index] = decode_system_block(&block, &session.units);
        }

        debug!("requesting total running time");
        let plan = RegisterRequestPlan::contiguous(UPTIME_REG_ADDR, UPTIME_REG_QUAN);
        let fields = run_plan(link, self.address, &plan, cancel)?;
        reading.uptime_secs = decode::to_u32_be(&fields);

        Ok(reading)
    }
}

/// Decodes one 116 byte measurement block into a sub-system reading.
///
/// Layout (byte offsets): supply line at 8, return line at 40, makeup line at
/// 72 with only energy, temperature and pressure populated; the block-wide
/// energy total sits at 0 and the sub-system run time at 112.
fn decode_system_block(block: &[u8], units: &UnitCoefficients) -> SystemReading {
    let line = |offset: usize| -> LineReading {
        LineReading {
            energy: decode::scaled_fixed_point(
                decode::to_u64_be(&block[offset..offset + 8]),
                ENERGY_DIVISOR,
            ) as f64,
            mass: decode::scaled_fixed_point(
                decode::to_u64_be(&block[offset + 8..offset + 16]),
                MASS_DIVISOR,
            ) as f64,
            mass_flow: decode::swapped_f32(&block[offset + 16..offset + 20]) * MASS_FLOW_SCALE,
            volume_flow: decode::swapped_f32(&block[offset + 20..offset + 24]) * units.volume,
            temperature: decode::swapped_f32(&block[offset + 24..offset + 28]),
            pressure: decode::swapped_f32(&block[offset + 28..offset + 32]) * units.pressure,
            ..LineReading::default()
        }
    };

    let makeup = LineReading {
        energy: decode::scaled_fixed_point(decode::to_u64_be(&block[72..80]), ENERGY_DIVISOR)
            as f64,
        temperature: decode::swapped_f32(&block[104..108]),
        pressure: decode::swapped_f32(&block[108..112]) * units.pressure,
        ..LineReading::default()
    };

    SystemReading {
        status: true,
        total_energy: decode::scaled_fixed_point(decode::to_u64_be(&block[0..8]), ENERGY_DIVISOR)
            as f64,
        lines: vec![line(8), line(40), makeup],
        time_run_secs: decode::to_u32_be(&block[112..116]),
    }
}

impl DeviceDriver for Tm3 {
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
