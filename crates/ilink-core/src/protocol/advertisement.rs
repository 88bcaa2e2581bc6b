//! Advertisement metadata
//!
//! The light advertises a firmware version and a vendor string in its
//! manufacturer data. Both are optional and best-effort.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Company id whose manufacturer data holds the 4-byte version
pub const VERSION_COMPANY_ID: u16 = 5101;

/// Company id whose manufacturer data holds the ASCII manufacturer string
pub const MANUFACTURER_COMPANY_ID: u16 = 1494;

/// Advertisement data as last seen by the host adapter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advertisement {
    /// Advertised local name
    pub local_name: Option<String>,
    /// Manufacturer data keyed by company id
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    /// Advertised service UUIDs
    pub services: Vec<Uuid>,
}

/// Device information reported to the host's device registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    /// Advertised display name
    pub name: Option<String>,
    /// Manufacturer string
    pub manufacturer: Option<String>,
    /// Hardware/firmware version, `a.b.c.d`
    pub hw_version: Option<String>,
}

impl DeviceMetadata {
    /// Extract metadata from an advertisement
    pub fn from_advertisement(advertisement: &Advertisement) -> Self {
        let name = advertisement
            .local_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let hw_version = advertisement
            .manufacturer_data
            .get(&VERSION_COMPANY_ID)
            .filter(|value| value.len() >= 4)
            .map(|v| format!("{}.{}.{}.{}", v[0], v[1], v[2], v[3]));

        let manufacturer = advertisement
            .manufacturer_data
            .get(&MANUFACTURER_COMPANY_ID)
            .and_then(|value| decode_ascii(value));

        Self {
            name,
            manufacturer,
            hw_version,
        }
    }

    /// Whether any field is known
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.manufacturer.is_none() && self.hw_version.is_none()
    }
}

fn decode_ascii(value: &[u8]) -> Option<String> {
    if !value.is_ascii() {
        return None;
    }
    let text: String = value
        .iter()
        .map(|b| *b as char)
        .filter(|c| !c.is_ascii_control())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
