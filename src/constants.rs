//! Field names and physical constants shared across the pipeline.
//!
//! Field names are the keys under which the moment engine and the serializer
//! exchange arrays; a catalog variable picks up a computed field when its name
//! matches one of these.

/// Seconds in one calendar day
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Sentinel written for missing values when a catalog entry declares none
pub const DEFAULT_MISSING_VALUE: f64 = -9999.0;

/// dBZ reported for a valid sample with zero reflectivity
pub const ZERO_REFLECTIVITY_DBZ: f64 = -99.0;

/// Timestamp layout of the first two raw columns joined by a space
pub const RAW_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date layout accepted on the command line
pub const CLI_DATE_FORMAT: &str = "%d/%m/%Y";

/// Date layout embedded in raw file names
pub const FILE_NAME_DATE_FORMAT: &str = "%Y%m%d";

/// Date/time layout used in output file names
pub const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y%m%d.%H%M%S";

/// Global attribute carrying the platform/datastream identifier
pub const DATASTREAM_ATTRIBUTE: &str = "datastream";

pub mod fields {
    //! Names of computed and calibration fields.

    pub const BASE_TIME: &str = "base_time";
    pub const TIME_OFFSET: &str = "time_offset";
    pub const TIME: &str = "time";

    pub const DROP_AVG_CLASS: &str = "drop_avg_class";
    pub const DELTA_DIAM: &str = "delta_diam";
    pub const FALL_VELOCITY: &str = "fall_velocity";

    pub const NUM_DROP: &str = "num_drop";
    pub const NUMBER_DETECTED_DROPS: &str = "number_detected_drops";
    pub const DIAM_MAX: &str = "diam_max";
    pub const DIAM_MIN: &str = "diam_min";
    pub const NUM_DROP_DENSITY: &str = "num_drop_density";
    pub const RAIN_RATE: &str = "rain_rate";
    pub const LIQ_WATER: &str = "liq_water";
    pub const REFLECTIVITY_FACTOR: &str = "reflectivity_factor";
    pub const RADAR_REFLECTIVITY: &str = "radar_reflectivity";
    pub const KINETIC_ENERGY: &str = "kinetic_energy";
    pub const ENERGY_FLUX: &str = "energy_flux";
    pub const SLOPE_PARAMETER: &str = "slope_parameter";
    pub const DISTRIBUTION_INTERCEPT: &str = "distribution_intercept";

    pub const QC_NUMBER_DETECTED_PARTICLES: &str = "qc_number_detected_particles";
    pub const QC_TIME_INTERVAL: &str = "qc_time_interval";
}
