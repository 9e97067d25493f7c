//! Device-type detection from binary file names
//!
//! Detection is a heuristic with no validation:
//! 1. A known device token anywhere in the name (case-insensitive) wins
//! 2. Otherwise the first separator-delimited segment is used
//! 3. Otherwise the configured fallback token

use serde::{Deserialize, Serialize};

/// Device families recognised without configuration
pub const DEFAULT_KNOWN_DEVICES: &[&str] = &["esp32", "esp8266", "arduino", "stm32", "rp2040"];

/// Device type assumed when nothing else matches
pub const DEFAULT_FALLBACK_DEVICE: &str = "esp32";

/// Filename-based device type detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDetector {
    /// Known device tokens, checked in order (lowercase)
    #[serde(default = "default_known_devices")]
    pub known_devices: Vec<String>,
    /// Token returned when no rule matches
    #[serde(default = "default_fallback")]
    pub fallback: String,
    /// Separator splitting the leading segment off a file name
    #[serde(default = "default_separator")]
    pub separator: char,
}

impl Default for DeviceDetector {
    fn default() -> Self {
        Self {
            known_devices: default_known_devices(),
            fallback: default_fallback(),
            separator: default_separator(),
        }
    }
}

fn default_known_devices() -> Vec<String> {
    DEFAULT_KNOWN_DEVICES.iter().map(|d| d.to_string()).collect()
}

fn default_fallback() -> String {
    DEFAULT_FALLBACK_DEVICE.to_string()
}

fn default_separator() -> char {
    '_'
}

impl DeviceDetector {
    /// Guess the device type for a file name
    pub fn detect(&self, filename: &str) -> String {
        let lower = filename.to_lowercase();

        if let Some(device) = self
            .known_devices
            .iter()
            .find(|d| lower.contains(d.to_lowercase().as_str()))
        {
            return device.to_lowercase();
        }

        if filename.contains(self.separator) {
            if let Some(first) = filename.split(self.separator).next().filter(|s| !s.is_empty()) {
                let first_lower = first.to_lowercase();
                if self.is_known(&first_lower) {
                    return first_lower;
                }
                return first.to_string();
            }
        }

        self.fallback.clone()
    }

    fn is_known(&self, token: &str) -> bool {
        self.known_devices.iter().any(|d| d.eq_ignore_ascii_case(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_token_anywhere() {
        let detector = DeviceDetector::default();
        assert_eq!(detector.detect("esp32_test.bin"), "esp32");
        assert_eq!(detector.detect("build-ESP8266-release.bin"), "esp8266");
        assert_eq!(detector.detect("myArduinoSketch.bin"), "arduino");
        assert_eq!(detector.detect("v2_STM32F4.bin"), "stm32");
        assert_eq!(detector.detect("blink.rp2040.bin"), "rp2040");
    }

    #[test]
    fn test_first_segment_when_unknown() {
        let detector = DeviceDetector::default();
        assert_eq!(detector.detect("nrf52_blinky.bin"), "nrf52");
        // Raw segment is kept verbatim
        assert_eq!(detector.detect("NRF52_blinky.bin"), "NRF52");
    }

    #[test]
    fn test_first_segment_known_is_lowered() {
        let detector = DeviceDetector {
            known_devices: vec!["samd21".to_string()],
            fallback: "esp32".to_string(),
            separator: '-',
        };
        // Token matches through the substring rule first
        assert_eq!(detector.detect("SAMD21-app.bin"), "samd21");
        assert_eq!(detector.detect("Feather-app.bin"), "Feather");
    }

    #[test]
    fn test_fallback() {
        let detector = DeviceDetector::default();
        assert_eq!(detector.detect("firmware.bin"), "esp32");
        // Empty leading segment falls through
        assert_eq!(detector.detect("_firmware.bin"), "esp32");
        assert_eq!(detector.detect(""), "esp32");
    }

    #[test]
    fn test_list_order_breaks_ties() {
        let detector = DeviceDetector::default();
        assert_eq!(detector.detect("stm32_esp32_bridge.bin"), "esp32");
    }
}
