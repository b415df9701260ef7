use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Client library version reported in speech.config
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Operating system identification
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub platform: String,
    pub name: String,
    pub version: String,
}

impl PlatformInfo {
    /// Best effort. Kernel details come from procfs where it exists
    pub fn detect() -> Self {
        let read = |path: &str| {
            std::fs::read_to_string(path)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        Self {
            platform: std::env::consts::OS.to_string(),
            name: read("/proc/sys/kernel/version"),
            version: read("/proc/sys/kernel/osrelease"),
        }
    }
}

/// Device identification; empty unless configured
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub version: String,
}

/// JSON body of the speech.config message
pub fn speech_config_body(platform: &PlatformInfo, device: &DeviceInfo) -> Value {
    json!({
        "system": { "version": CLIENT_VERSION },
        "os": {
            "platform": platform.platform,
            "name": platform.name,
            "version": platform.version,
        },
        "device": {
            "manufacturer": device.manufacturer,
            "model": device.model,
            "version": device.version,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_layout() {
        let platform = PlatformInfo {
            platform: "linux".to_string(),
            name: "#1 SMP".to_string(),
            version: "6.1.0".to_string(),
        };
        let device = DeviceInfo {
            manufacturer: "Acme".to_string(),
            ..Default::default()
        };
        let body = speech_config_body(&platform, &device);

        assert_eq!(body["system"]["version"], CLIENT_VERSION);
        assert_eq!(body["os"]["platform"], "linux");
        assert_eq!(body["os"]["version"], "6.1.0");
        assert_eq!(body["device"]["manufacturer"], "Acme");
        assert_eq!(body["device"]["model"], "");
    }

    #[test]
    fn test_detect_reports_os() {
        assert_eq!(PlatformInfo::detect().platform, std::env::consts::OS);
    }
}
