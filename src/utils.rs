use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::DEMO_API_KEY;

/// Get database file from environment variable or use default
pub fn get_database_path() -> PathBuf {
    std::env::var("STOCKSYNC_DATABASE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("stocksync.db"))
}

/// Get Alpha Vantage API key, falling back to the public demo key
pub fn get_api_key() -> String {
    std::env::var("ALPHA_VANTAGE_API_KEY")
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .unwrap_or_else(|| DEMO_API_KEY.to_string())
}

/// Read an environment variable and parse it, returning `default` when unset.
/// A set but unparsable value is reported as `Err` with the offending text.
pub fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{}={:?} is not a valid value", name, raw)),
        Err(_) => Ok(default),
    }
}

/// Round to 4 decimal places, the precision stored for derived price fields
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round4() {
        assert_eq!(round4(5.0), 5.0);
        assert_eq!(round4(1.234_56), 1.2346);
        assert_eq!(round4(-0.000_04), -0.0);
    }

    #[test]
    fn test_env_or_default() {
        let value: u64 = env_or("STOCKSYNC_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
