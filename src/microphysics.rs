//! Microphysics moment engine.
//!
//! Turns one day of drop counts into bulk rainfall quantities via discrete
//! moments of the drop-size distribution. Every quantity is computed per time
//! slot from that slot's counts and its own sampling interval.
//!
//! Missing slots carry NaN counts and a NaN interval; NaN then flows through
//! every formula, so a missing slot never turns into a zero. Valid empty
//! samples (all counts zero) are not errors: zero reflectivity is reported as
//! -99 dBZ and the gamma-fit parameters as zero.

use crate::config::CalibrationVectors;
use crate::constants::{ZERO_REFLECTIVITY_DBZ, fields};
use crate::models::{FieldArray, FieldSet};
use crate::window::DayWindow;
use std::f64::consts::PI;
use tracing::{debug, warn};

/// 6! used by the exponential-distribution fit
const SIX_FACTORIAL: f64 = 720.0;

/// Bulk quantities for one time slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulkMoments {
    /// mm/h
    pub rain_rate: f64,
    /// g/m³
    pub liquid_water: f64,
    /// Reflectivity factor Z, mm⁶/m³
    pub reflectivity_factor: f64,
    pub radar_reflectivity: f64,
    /// J/m²
    pub kinetic_energy: f64,
    /// J/(m² h)
    pub energy_flux: f64,
    /// 1/mm
    pub slope: f64,
    /// 1/(m³ mm)
    pub intercept: f64,
    pub detected_drops: f64,
    pub diam_max: f64,
    pub diam_min: f64,
}

/// Pure moment computations over one instrument's calibration
#[derive(Debug, Clone, Copy)]
pub struct MomentEngine<'a> {
    calibration: &'a CalibrationVectors,
    min_drop_count: f64,
}

impl<'a> MomentEngine<'a> {
    pub fn new(calibration: &'a CalibrationVectors, min_drop_count: f64) -> Self {
        Self {
            calibration,
            min_drop_count,
        }
    }

    fn diameters(&self) -> &[f64] {
        &self.calibration.diameter
    }

    fn velocities(&self) -> &[f64] {
        &self.calibration.fall_velocity
    }

    /// Σ C·D³
    fn third_moment(&self, counts: &[f64]) -> f64 {
        counts
            .iter()
            .zip(self.diameters())
            .map(|(c, d)| c * d.powi(3))
            .sum()
    }

    pub fn rain_rate(&self, counts: &[f64], interval: f64) -> f64 {
        let area = self.calibration.sensor_area;
        (PI / 6.0) * 3.6e-3 / (area * interval) * self.third_moment(counts)
    }

    pub fn liquid_water(&self, counts: &[f64], interval: f64) -> f64 {
        let area = self.calibration.sensor_area;
        let sum: f64 = counts
            .iter()
            .zip(self.diameters())
            .zip(self.velocities())
            .map(|((c, d), v)| c / v * d.powi(3))
            .sum();
        (PI / 6.0) / (area * interval) * sum / 1000.0
    }

    pub fn reflectivity_factor(&self, counts: &[f64], interval: f64) -> f64 {
        let area = self.calibration.sensor_area;
        let sum: f64 = counts
            .iter()
            .zip(self.diameters())
            .zip(self.velocities())
            .map(|((c, d), v)| c / v * d.powi(6))
            .sum();
        sum / (area * interval)
    }

    pub fn kinetic_energy(&self, counts: &[f64]) -> f64 {
        let area = self.calibration.sensor_area;
        let sum: f64 = counts
            .iter()
            .zip(self.diameters())
            .zip(self.velocities())
            .map(|((c, d), v)| c * d.powi(3) * v * v)
            .sum();
        (PI / 12.0) / area * 1e-6 * sum
    }

    /// Drop concentration per bin, 1/(m³ mm).
    ///
    /// Divides by the configured sensor area instead of a fixed 0.005 m²,
    /// which is the RD-80 value.
    pub fn number_density(&self, counts: &[f64], interval: f64) -> Vec<f64> {
        let area = self.calibration.sensor_area;
        counts
            .iter()
            .zip(self.velocities())
            .zip(&self.calibration.delta_diameter)
            .map(|((c, v), dd)| c / (area * interval * v * dd))
            .collect()
    }

    /// Largest and smallest diameter with at least one drop.
    ///
    /// Zero for an empty sample, NaN for a missing one.
    pub fn diameter_extent(&self, counts: &[f64]) -> (f64, f64) {
        if counts.iter().any(|c| c.is_nan()) {
            return (f64::NAN, f64::NAN);
        }
        let occupied = || {
            counts
                .iter()
                .zip(self.diameters())
                .filter(|(c, _)| **c > 0.0)
                .map(|(_, d)| *d)
        };
        match (occupied().last(), occupied().next()) {
            (Some(max), Some(min)) => (max, min),
            _ => (0.0, 0.0),
        }
    }

    /// 1 when some but too few drops were seen; an all-zero sample is not flagged
    pub fn low_count_flag(&self, detected: f64) -> f64 {
        if detected.is_nan() {
            f64::NAN
        } else if detected > 0.0 && detected < self.min_drop_count {
            1.0
        } else {
            0.0
        }
    }

    /// 1 when the sample covered more than the nominal integration time
    pub fn interval_flag(&self, interval: f64) -> f64 {
        if interval.is_nan() {
            f64::NAN
        } else if interval > f64::from(self.calibration.integration_time) {
            1.0
        } else {
            0.0
        }
    }

    /// Every bulk quantity for one slot
    pub fn bulk(&self, counts: &[f64], interval: f64) -> BulkMoments {
        let rain_rate = self.rain_rate(counts, interval);
        let liquid_water = self.liquid_water(counts, interval);
        let z = self.reflectivity_factor(counts, interval);
        let kinetic_energy = self.kinetic_energy(counts);
        let (diam_max, diam_min) = self.diameter_extent(counts);

        BulkMoments {
            rain_rate,
            liquid_water,
            reflectivity_factor: z,
            radar_reflectivity: radar_reflectivity(z),
            kinetic_energy,
            energy_flux: kinetic_energy * 3600.0 / interval,
            slope: slope_parameter(liquid_water, z),
            intercept: distribution_intercept(liquid_water, z),
            detected_drops: counts.iter().sum(),
            diam_max,
            diam_min,
        }
    }

    /// Derive all fields for one day.
    ///
    /// Output keys follow [`crate::constants::fields`]; pass-through raw
    /// columns are added under their column names.
    pub fn derive(&self, window: &DayWindow<'_>) -> FieldSet {
        let bins = self.calibration.bins();
        let rows = window.len();
        let counts = window.counts();
        let intervals = window.intervals();

        let mut series: [Vec<f64>; 13] = Default::default();
        let mut density = Vec::with_capacity(rows * bins);

        for (row, interval) in counts.chunks_exact(bins).zip(&intervals) {
            let bulk = self.bulk(row, *interval);
            let values = [
                bulk.rain_rate,
                bulk.liquid_water,
                bulk.reflectivity_factor,
                bulk.radar_reflectivity,
                bulk.kinetic_energy,
                bulk.energy_flux,
                bulk.slope,
                bulk.intercept,
                bulk.detected_drops,
                bulk.diam_max,
                bulk.diam_min,
                self.low_count_flag(bulk.detected_drops),
                self.interval_flag(*interval),
            ];
            for (column, value) in series.iter_mut().zip(values) {
                column.push(value);
            }
            density.extend(self.number_density(row, *interval));
        }

        let long_intervals = series[12].iter().filter(|f| **f == 1.0).count();
        if long_intervals > 0 {
            warn!(
                "{}: {} samples exceed the {}s integration time",
                window.date(),
                long_intervals,
                self.calibration.integration_time
            );
        }

        let names = [
            fields::RAIN_RATE,
            fields::LIQ_WATER,
            fields::REFLECTIVITY_FACTOR,
            fields::RADAR_REFLECTIVITY,
            fields::KINETIC_ENERGY,
            fields::ENERGY_FLUX,
            fields::SLOPE_PARAMETER,
            fields::DISTRIBUTION_INTERCEPT,
            fields::NUMBER_DETECTED_DROPS,
            fields::DIAM_MAX,
            fields::DIAM_MIN,
            fields::QC_NUMBER_DETECTED_PARTICLES,
            fields::QC_TIME_INTERVAL,
        ];

        let mut set: FieldSet = names
            .iter()
            .zip(series)
            .map(|(name, values)| (name.to_string(), FieldArray::series(values)))
            .collect();
        set.insert(
            fields::NUM_DROP.to_string(),
            FieldArray::matrix(rows, bins, counts),
        );
        set.insert(
            fields::NUM_DROP_DENSITY.to_string(),
            FieldArray::matrix(rows, bins, density),
        );
        set.extend(window.legacy_fields());

        debug!("Derived {} fields for {}", set.len(), window.date());
        set
    }
}

/// 10·log10(Z); -99 for Z == 0
pub fn radar_reflectivity(z: f64) -> f64 {
    if z == 0.0 {
        ZERO_REFLECTIVITY_DBZ
    } else {
        10.0 * z.log10()
    }
}

/// Λ of the exponential distribution fitted from liquid water and Z
pub fn slope_parameter(liquid_water: f64, z: f64) -> f64 {
    if z.is_nan() {
        f64::NAN
    } else if z == 0.0 {
        0.0
    } else {
        (SIX_FACTORIAL / PI * liquid_water / z).cbrt()
    }
}

/// N0 of the exponential distribution fitted from liquid water and Z
pub fn distribution_intercept(liquid_water: f64, z: f64) -> f64 {
    if z.is_nan() {
        f64::NAN
    } else if z == 0.0 {
        0.0
    } else {
        (1.0 / PI) * (SIX_FACTORIAL / PI).powf(4.0 / 3.0) * (liquid_water / z).powf(4.0 / 3.0)
    }
}

/// Calibration vectors as drop-class fields
pub fn calibration_fields(calibration: &CalibrationVectors) -> FieldSet {
    [
        (fields::DROP_AVG_CLASS, &calibration.diameter),
        (fields::DELTA_DIAM, &calibration.delta_diameter),
        (fields::FALL_VELOCITY, &calibration.fall_velocity),
    ]
    .into_iter()
    .map(|(name, values)| (name.to_string(), FieldArray::series(values.clone())))
    .collect()
}
