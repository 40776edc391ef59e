//! Parsing of the unauthenticated version endpoint
//!
//! Devices answer the version endpoint with a JSON document such as
//! `{"prov":{"ver":"v1.1","sec_ver":2,"cap":["wifi_scan"]}}`. Capabilities
//! are the strings under `prov.cap`.

use serde::Deserialize;

use crate::error::PlatformError;

/// Request body sent to the version endpoint
pub const VERSION_REQUEST: &[u8] = b"---";

#[derive(Debug, Default, Deserialize)]
struct ProvSection {
    #[serde(default)]
    cap: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VersionDocument {
    #[serde(default)]
    prov: ProvSection,
}

/// Decode a version reply into `(capabilities, raw document)`
pub fn parse_version_reply(reply: &[u8]) -> Result<(Vec<String>, serde_json::Value), PlatformError> {
    let raw: serde_json::Value = serde_json::from_slice(reply)
        .map_err(|e| PlatformError::new(format!("Malformed version info: {}", e)))?;
    let document: VersionDocument = serde_json::from_value(raw.clone())
        .map_err(|e| PlatformError::new(format!("Unexpected version info layout: {}", e)))?;
    Ok((document.prov.cap, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_extracted() {
        let reply = br#"{"prov":{"ver":"v1.1","sec_ver":2,"cap":["wifi_scan","no_pop"]}}"#;
        let (caps, raw) = parse_version_reply(reply).unwrap();
        assert_eq!(caps, vec!["wifi_scan", "no_pop"]);
        assert_eq!(raw["prov"]["sec_ver"], 2);
    }

    #[test]
    fn test_missing_capabilities_are_empty() {
        let (caps, _) = parse_version_reply(br#"{"custom":{"ver":"1"}}"#).unwrap();
        assert!(caps.is_empty());
    }

    #[test]
    fn test_non_json_reply_fails() {
        // Older firmware answers with a bare version string
        assert!(parse_version_reply(b"V0.1").is_err());
    }
}
