//! Canonical vendor names

/// Universal fallback vendor key
pub const GENERIC: &str = "Generic";

/// (canonical name, lowercase substrings), checked in order
const VENDORS: &[(&str, &[&str])] = &[
    ("Prama", &["prama"]),
    ("Godrej", &["godrej"]),
    ("CP Plus", &["cp plus", "cp-plus", "cpplus"]),
    ("Hikvision", &["hikvision", "hik"]),
    ("Dahua", &["dahua"]),
    ("Amcrest", &["amcrest"]),
    ("Axis", &["axis"]),
    ("TP-Link", &["tp-link", "tplink", "tapo"]),
    ("Foscam", &["foscam"]),
    ("Reolink", &["reolink"]),
    ("Ubiquiti", &["ubiquiti", "unifi"]),
    ("D-Link", &["d-link", "dlink"]),
    ("Vivotek", &["vivotek"]),
    ("Panasonic", &["panasonic"]),
    ("Sony", &["sony"]),
    ("Bosch", &["bosch"]),
    ("Pelco", &["pelco"]),
    ("Uniview", &["uniview", "unv"]),
    ("Tiandy", &["tiandy"]),
    ("TVT", &["tvt"]),
];

/// Canonical vendor for a free-text string, if one is recognised
pub fn normalize_vendor(raw: &str) -> Option<&'static str> {
    let lower = raw.to_lowercase();
    if lower.trim().is_empty() {
        return None;
    }
    VENDORS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(name, _)| *name)
}

/// Canonical names, for pattern-file section headers and CLI listing
pub fn canonical_vendors() -> impl Iterator<Item = &'static str> {
    VENDORS.iter().map(|(name, _)| *name)
}

/// Canonical name, else the trimmed input (empty input maps to Generic)
pub fn canonical_or_raw(raw: &str) -> String {
    match normalize_vendor(raw) {
        Some(v) => v.to_string(),
        None if raw.trim().is_empty() => GENERIC.to_string(),
        None => raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_vendor() {
        assert_eq!(normalize_vendor("HIKVISION"), Some("Hikvision"));
        assert_eq!(normalize_vendor("Hangzhou Hikvision Digital"), Some("Hikvision"));
        assert_eq!(normalize_vendor("Dahua Technology"), Some("Dahua"));
        assert_eq!(normalize_vendor("CP PLUS"), Some("CP Plus"));
        assert_eq!(normalize_vendor("TP-LINK"), Some("TP-Link"));
        assert_eq!(normalize_vendor("Tapo C200"), Some("TP-Link"));
        assert_eq!(normalize_vendor("UniFi Video"), Some("Ubiquiti"));
        assert_eq!(normalize_vendor("Prama Hikvision India"), Some("Prama"));
        assert_eq!(normalize_vendor("Acme"), None);
        assert_eq!(normalize_vendor("  "), None);
    }

    #[test]
    fn test_canonical_or_raw() {
        assert_eq!(canonical_or_raw("axis communications"), "Axis");
        assert_eq!(canonical_or_raw(" Acme Cam "), "Acme Cam");
        assert_eq!(canonical_or_raw(""), GENERIC);
    }
}
