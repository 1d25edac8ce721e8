//! Resolution of device-reported unit codes into scale coefficients.
//!
//! A meter reports, once, the units its registers are expressed in. The codes
//! form closed enumerations; anything outside them aborts initialization. A
//! session must never run with a guessed coefficient, because every subsequent
//! reading would be silently scaled wrong.

use crate::error::UnitError;

/// Energy unit a meter accumulates heat in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EnergyUnit {
    Gigajoule,
    Gigacalorie,
}

impl EnergyUnit {
    /// Resolves the device-reported energy unit code.
    pub fn resolve(code: u16) -> Result<Self, UnitError> {
        match code {
            0 => Ok(EnergyUnit::Gigajoule),
            1 => Ok(EnergyUnit::Gigacalorie),
            _ => Err(UnitError::UnknownEnergyCode(code)),
        }
    }
}

impl std::fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EnergyUnit::Gigajoule => write!(f, "GJ"),
            EnergyUnit::Gigacalorie => write!(f, "Gcal"),
        }
    }
}

/// Resolves the pressure unit code into the factor that brings readings to MPa.
pub fn pressure_coefficient(code: u16) -> Result<f32, UnitError> {
    match code {
        0 => Ok(0.001),
        1 => Ok(0.098_066_5),
        2 => Ok(0.1),
        3 => Ok(1.0),
        _ => Err(UnitError::UnknownPressureCode(code)),
    }
}

/// Resolves the volume/mass unit code into the flow scale factor.
pub fn volume_coefficient(code: u16) -> Result<f32, UnitError> {
    match code {
        0 => Ok(1.0),
        1 => Ok(0.001),
        _ => Err(UnitError::UnknownVolumeCode(code)),
    }
}

/// Coefficients resolved during initialization, immutable for the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitCoefficients {
    pub pressure: f32,
    pub volume: f32,
    pub energy: EnergyUnit,
}

impl UnitCoefficients {
    /// Resolves all three codes; any unknown code fails the whole resolution.
    pub fn resolve(
        energy_code: u16,
        pressure_code: u16,
        volume_code: u16,
    ) -> Result<Self, UnitError> {
        Ok(UnitCoefficients {
            pressure: pressure_coefficient(pressure_code)?,
            volume: volume_coefficient(volume_code)?,
            energy: EnergyUnit::resolve(energy_code)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn pressure_codes_map_to_documented_coefficients() {
        assert_eq!(pressure_coefficient(0), Ok(0.001));
        assert_eq!(pressure_coefficient(1), Ok(0.098_066_5));
        assert_eq!(pressure_coefficient(2), Ok(0.1));
        assert_eq!(pressure_coefficient(3), Ok(1.0));
    }

    #[test]
    fn pressure_code_outside_enumeration_is_an_error() {
        for code in [4u16, 5, 0xFF, u16::MAX] {
            assert_matches!(
                pressure_coefficient(code),
                Err(UnitError::UnknownPressureCode(c)) if c == code
            );
        }
    }

    #[test]
    fn volume_codes() {
        assert_eq!(volume_coefficient(0), Ok(1.0));
        assert_eq!(volume_coefficient(1), Ok(0.001));
        assert_matches!(volume_coefficient(2), Err(UnitError::UnknownVolumeCode(2)));
    }

    #[test]
    fn energy_codes() {
        assert_eq!(EnergyUnit::resolve(0), Ok(EnergyUnit::Gigajoule));
        assert_eq!(EnergyUnit::resolve(1), Ok(EnergyUnit::Gigacalorie));
        assert_matches!(EnergyUnit::resolve(2), Err(UnitError::UnknownEnergyCode(2)));
    }

    #[test]
    fn combined_resolution_fails_on_any_unknown_code() {
        assert_matches!(
            UnitCoefficients::resolve(0, 3, 0),
            Ok(UnitCoefficients {
                pressure,
                volume,
                energy: EnergyUnit::Gigajoule,
            }) if pressure == 1.0 && volume == 1.0
        );
        assert_matches!(
            UnitCoefficients::resolve(0, 9, 0),
            Err(UnitError::UnknownPressureCode(9))
        );
        assert_matches!(
            UnitCoefficients::resolve(7, 0, 0),
            Err(UnitError::UnknownEnergyCode(7))
        );
    }
}
