//! Best-effort scrape of the account devices page.
//!
//! The page embeds device details as JSON inside a script tag, with quotes
//! usually backslash-escaped. Each field is pulled out independently; a
//! field that cannot be found becomes [`DeviceInfo::UNKNOWN`] instead of
//! failing the whole call.

use regex::Regex;

use crate::models::DeviceInfo;

/// Page keys for the scraped fields, in [`DeviceInfo`] field order.
pub const DEVICE_ID_KEY: &str = "deviceID";
pub const ICCID_KEY: &str = "iccid";
pub const SERIAL_NUMBER_KEY: &str = "deviceSerialNumber";
pub const SKU_KEY: &str = "sku";
pub const COLOR_KEY: &str = "deviceColor";

/// Extracts the string value for `key` from a `"key":"value"` pair.
///
/// Quotes may appear escaped (`\"key\":\"value\"`). Returns the first match.
pub fn extract_value(text: &str, key: &str) -> Option<String> {
    let pattern = format!(r#"\\?"{}\\?"\s*:\s*\\?"([^"\\]+)\\?""#, regex::escape(key));
    let re = Regex::new(&pattern).ok()?;

    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Builds device details from the page body, substituting the sentinel for
/// any absent field.
pub fn parse_device_info(page: &str) -> DeviceInfo {
    let field = |key: &str| {
        extract_value(page, key).unwrap_or_else(|| {
            tracing::debug!("Device page has no '{key}' field");
            DeviceInfo::UNKNOWN.to_string()
        })
    };

    DeviceInfo {
        id: field(DEVICE_ID_KEY),
        iccid: field(ICCID_KEY),
        serial_number: field(SERIAL_NUMBER_KEY),
        sku: field(SKU_KEY),
        color: field(COLOR_KEY),
    }
}
