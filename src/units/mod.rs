//! Physical units
//!
//! Parses unit strings attached to parameter quantities and converts magnitudes
//! into the unit system a solver expects. Temperatures are affine (offset) units
//! and are converted separately from the scale-only units.

mod parse;

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use parse::parse_unit;

/// Exponents of the base dimensions: length, mass, time, temperature, current, amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimension(pub [i8; 6]);

impl Dimension {
    pub const LENGTH: usize = 0;
    pub const MASS: usize = 1;
    pub const TIME: usize = 2;
    pub const TEMPERATURE: usize = 3;
    pub const CURRENT: usize = 4;
    pub const AMOUNT: usize = 5;

    pub const fn none() -> Self {
        Dimension([0; 6])
    }

    pub const fn of(exponents: [i8; 6]) -> Self {
        Dimension(exponents)
    }

    pub fn is_dimensionless(&self) -> bool {
        self.0.iter().all(|e| *e == 0)
    }

    pub fn mul(&self, other: &Dimension) -> Dimension {
        let mut out = self.0;
        for (slot, e) in out.iter_mut().zip(other.0.iter()) {
            *slot += *e;
        }
        Dimension(out)
    }

    pub fn powi(&self, n: i32) -> Dimension {
        let mut out = self.0;
        for slot in out.iter_mut() {
            *slot = (*slot as i32 * n) as i8;
        }
        Dimension(out)
    }
}

/// A parsed unit: SI value = magnitude * scale + offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unit {
    pub scale: f64,
    pub offset: f64,
    pub dimension: Dimension,
}

impl Unit {
    pub const fn new(scale: f64, dimension: Dimension) -> Self {
        Self {
            scale,
            offset: 0.0,
            dimension,
        }
    }

    pub const fn affine(scale: f64, offset: f64, dimension: Dimension) -> Self {
        Self {
            scale,
            offset,
            dimension,
        }
    }

    pub fn dimensionless() -> Self {
        Self::new(1.0, Dimension::none())
    }

    /// Product of two units. Offsets only survive on a bare temperature unit.
    pub fn mul(&self, other: &Unit) -> Unit {
        Unit::new(self.scale * other.scale, self.dimension.mul(&other.dimension))
    }

    pub fn powi(&self, n: i32) -> Unit {
        if n == 1 {
            return *self;
        }
        Unit::new(self.scale.powi(n), self.dimension.powi(n))
    }

    /// Whether this unit measures absolute temperature
    pub fn is_temperature(&self) -> bool {
        self.dimension == Dimension::of([0, 0, 0, 1, 0, 0])
    }

    /// Magnitude expressed in SI base units
    pub fn to_si(&self, magnitude: f64) -> f64 {
        magnitude * self.scale + self.offset
    }

    /// Magnitude expressed in the requested unit system's coherent base units
    pub fn to_system(&self, magnitude: f64, system: UnitSystem) -> f64 {
        let si = self.to_si(magnitude);
        match system {
            UnitSystem::Si => si,
            UnitSystem::Cgs => {
                let d = &self.dimension.0;
                let exponent = 3 * d[Dimension::MASS] as i32 + 2 * d[Dimension::LENGTH] as i32;
                si * 10f64.powi(exponent)
            }
        }
    }
}

/// Target unit system for rendering solver inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Si,
    Cgs,
}

impl FromStr for UnitSystem {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "si" => Ok(UnitSystem::Si),
            "cgs" => Ok(UnitSystem::Cgs),
            other => Err(ApiError::ConfigError(format!(
                "Invalid unit system: {} (must be 'si' or 'cgs')",
                other
            ))),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitSystem::Si => write!(f, "si"),
            UnitSystem::Cgs => write!(f, "cgs"),
        }
    }
}

/// Unit that temperature quantities are converted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "K")]
    Kelvin,
    #[serde(rename = "degC")]
    Celsius,
    #[serde(rename = "degF")]
    Fahrenheit,
    #[serde(rename = "degR")]
    Rankine,
}

impl TemperatureUnit {
    fn unit(&self) -> Unit {
        let theta = Dimension::of([0, 0, 0, 1, 0, 0]);
        match self {
            TemperatureUnit::Kelvin => Unit::new(1.0, theta),
            TemperatureUnit::Celsius => Unit::affine(1.0, 273.15, theta),
            TemperatureUnit::Fahrenheit => Unit::affine(5.0 / 9.0, 459.67 * 5.0 / 9.0, theta),
            TemperatureUnit::Rankine => Unit::new(5.0 / 9.0, theta),
        }
    }

    /// Convert an absolute temperature in kelvin into this unit
    pub fn from_kelvin(&self, kelvin: f64) -> f64 {
        let unit = self.unit();
        (kelvin - unit.offset) / unit.scale
    }
}

impl FromStr for TemperatureUnit {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "K" | "kelvin" | "Kelvin" => Ok(TemperatureUnit::Kelvin),
            "degC" | "deg_C" | "C" | "Celsius" | "celsius" => Ok(TemperatureUnit::Celsius),
            "degF" | "deg_F" | "F" | "Fahrenheit" | "fahrenheit" => {
                Ok(TemperatureUnit::Fahrenheit)
            }
            "degR" | "deg_R" | "R" | "Rankine" | "rankine" => Ok(TemperatureUnit::Rankine),
            other => Err(ApiError::ConfigError(format!(
                "Invalid temperature unit: {}",
                other
            ))),
        }
    }
}

/// Convert `magnitude` in `unit` for a solver using `system`/`temperature`
pub fn convert(
    magnitude: f64,
    unit: &Unit,
    system: UnitSystem,
    temperature: TemperatureUnit,
) -> f64 {
    if unit.is_temperature() {
        temperature.from_kelvin(unit.to_si(magnitude))
    } else {
        unit.to_system(magnitude, system)
    }
}
