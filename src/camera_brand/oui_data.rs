//! OUI (MAC vendor prefix) table

use std::collections::HashMap;

/// Built-in camera vendor prefixes, "XX:XX:XX" uppercase
const CAMERA_OUIS: &[(&str, &str)] = &[
    ("44:19:B6", "Hikvision"),
    ("4C:BD:8F", "Hikvision"),
    ("BC:AD:28", "Hikvision"),
    ("C0:56:E3", "Hikvision"),
    ("00:12:16", "Dahua"),
    ("A4:14:37", "Dahua"),
    ("08:57:00", "Dahua"),
    ("00:40:8C", "Axis"),
    ("AC:CC:8E", "Axis"),
    ("B8:A4:4F", "Axis"),
    ("50:C7:BF", "TP-Link"),
    ("F4:F2:6D", "TP-Link"),
    ("98:DA:C4", "TP-Link"),
    ("C4:F0:81", "Foscam"),
    ("00:62:6E", "Foscam"),
    ("EC:71:DB", "Reolink"),
    ("9C:8E:CD", "Amcrest"),
    ("FC:EC:DA", "Ubiquiti"),
    ("74:83:C2", "Ubiquiti"),
    ("00:18:61", "CP Plus"),
    ("B4:A5:EF", "CP Plus"),
];

/// Extract OUI prefix from MAC address
/// Returns OUI in format "XX:XX:XX" (uppercase)
pub fn extract_oui_prefix(mac: &str) -> Option<String> {
    let hex = mac.to_uppercase().replace(['-', ':', '.'], "");
    if hex.len() < 6 || !hex[..6].bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("{}:{}:{}", &hex[0..2], &hex[2..4], &hex[4..6]))
}

/// Locally administered: bit 1 of the first octet is set
pub fn is_locally_administered(mac: &str) -> bool {
    let hex = mac.to_uppercase().replace(['-', ':', '.'], "");
    hex.get(0..2)
        .and_then(|b| u8::from_str_radix(b, 16).ok())
        .map_or(false, |first| first & 0x02 != 0)
}

/// Read-only OUI lookup map
#[derive(Debug, Clone)]
pub struct OuiTable {
    map: HashMap<String, String>,
}

impl Default for OuiTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl OuiTable {
    pub fn builtin() -> Self {
        Self {
            map: CAMERA_OUIS
                .iter()
                .map(|(oui, vendor)| (oui.to_string(), vendor.to_string()))
                .collect(),
        }
    }

    /// Add or override entries
    pub fn with_entries<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (oui, vendor) in entries {
            if let Some(key) = extract_oui_prefix(oui.as_ref()) {
                self.map.insert(key, vendor.into());
            }
        }
        self
    }

    /// Vendor for a MAC; randomised (locally administered) MACs never match
    pub fn lookup(&self, mac: &str) -> Option<&str> {
        if is_locally_administered(mac) {
            return None;
        }
        let oui = extract_oui_prefix(mac)?;
        self.map.get(&oui).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_oui_prefix() {
        assert_eq!(extract_oui_prefix("44:19:b6:aa:bb:cc").as_deref(), Some("44:19:B6"));
        assert_eq!(extract_oui_prefix("44-19-B6-AA-BB-CC").as_deref(), Some("44:19:B6"));
        assert_eq!(extract_oui_prefix("4419.b6aa.bbcc").as_deref(), Some("44:19:B6"));
        assert_eq!(extract_oui_prefix("44:19"), None);
        assert_eq!(extract_oui_prefix("zz:zz:zz:00:00:00"), None);
    }

    #[test]
    fn test_locally_administered() {
        assert!(is_locally_administered("02:00:00:00:00:01"));
        assert!(is_locally_administered("DA:A1:19:00:00:00"));
        assert!(!is_locally_administered("44:19:B6:00:00:00"));
        assert!(!is_locally_administered(""));
    }

    #[test]
    fn test_lookup() {
        let table = OuiTable::builtin();
        assert_eq!(table.lookup("44:19:B6:12:34:56"), Some("Hikvision"));
        assert_eq!(table.lookup("ec:71:db:00:00:01"), Some("Reolink"));
        assert_eq!(table.lookup("00:11:22:33:44:55"), None);
        // 0x4E has the local bit set
        assert_eq!(table.lookup("4E:19:B6:12:34:56"), None);
    }

    #[test]
    fn test_with_entries_overrides() {
        let table = OuiTable::builtin().with_entries([("00-11-22", "Acme")]);
        assert_eq!(table.lookup("00:11:22:33:44:55"), Some("Acme"));
        assert!(table.len() > 20);
    }
}
