use serde::Serialize;

/// Standard atmosphere at sea level in hPa.
pub const DEFAULT_SEA_LEVEL_HPA: f32 = 1013.25;

/// One fully committed sample of every attached sensor.
///
/// Fields belonging to an absent or failing sensor hold their default (zero)
/// or the last value that sensor produced. Serializes to the JSON state
/// payload consumed by the Home-Assistant value templates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SensorReading {
    /// Degrees Celsius
    pub temperature: f32,
    /// Relative humidity in percent
    pub humidity: f32,
    /// Hectopascal
    pub pressure: f32,
    /// Meters, derived from pressure
    pub altitude: f32,
    /// Micrograms per cubic meter
    pub pm1: f32,
    #[serde(rename = "pm25")]
    pub pm2_5: f32,
    pub pm10: f32,
    /// Equivalent CO2 in ppm
    pub eco2: u16,
    /// Total volatile organic compounds in ppb
    pub tvoc: u16,
    /// Lux
    pub light: f32,
    /// Millivolts
    pub battery_voltage: u16,
    /// Oxidising gas sensor resistance in ohms
    pub oxidising: f32,
    /// Reducing gas sensor resistance in ohms
    pub reducing: f32,
    /// Ammonia gas sensor resistance in ohms
    pub nh3: f32,
}

/// Barometric altitude estimate in meters.
///
/// International barometric formula. Returns 0 for non-positive inputs.
pub fn altitude_from_pressure(pressure_hpa: f32, sea_level_hpa: f32) -> f32 {
    if pressure_hpa <= 0.0 || sea_level_hpa <= 0.0 {
        return 0.0;
    }
    44330.0 * (1.0 - libm::powf(pressure_hpa / sea_level_hpa, 0.1903))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_altitude_at_sea_level_is_zero() {
        let altitude = altitude_from_pressure(DEFAULT_SEA_LEVEL_HPA, DEFAULT_SEA_LEVEL_HPA);
        assert!(altitude.abs() < 0.01, "got {altitude}");
    }

    #[test]
    fn test_altitude_rises_as_pressure_falls() {
        let low = altitude_from_pressure(1000.0, DEFAULT_SEA_LEVEL_HPA);
        let mid = altitude_from_pressure(900.0, DEFAULT_SEA_LEVEL_HPA);
        let high = altitude_from_pressure(800.0, DEFAULT_SEA_LEVEL_HPA);
        assert!((low - 110.9).abs() < 1.0, "got {low}");
        assert!((mid - 988.7).abs() < 1.0, "got {mid}");
        assert!((high - 1949.3).abs() < 1.0, "got {high}");
    }

    #[test]
    fn test_altitude_rejects_invalid_pressure() {
        assert_eq!(altitude_from_pressure(0.0, DEFAULT_SEA_LEVEL_HPA), 0.0);
    }
}
