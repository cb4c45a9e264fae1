use anyhow::{anyhow, Result};

pub fn normalize_log_level(level: &str) -> Option<&'static str> {
    match level.to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>> {
    let h = hex.trim();
    if h.len() % 2 != 0 {
        return Err(anyhow!("invalid hex"));
    }
    let mut out = Vec::with_capacity(h.len() / 2);
    for i in (0..h.len()).step_by(2) {
        let b = u8::from_str_radix(&h[i..i + 2], 16).map_err(|_| anyhow!("invalid hex"))?;
        out.push(b);
    }
    Ok(out)
}

pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::{bytes_to_hex, hex_to_bytes, normalize_log_level};

    #[test]
    fn normalize_log_level_accepts_known_levels() {
        assert_eq!(normalize_log_level("trace"), Some("trace"));
        assert_eq!(normalize_log_level("DEBUG"), Some("debug"));
        assert_eq!(normalize_log_level("warning"), Some("warn"));
        assert_eq!(normalize_log_level("error"), Some("error"));
    }

    #[test]
    fn normalize_log_level_rejects_unknown() {
        assert_eq!(normalize_log_level("nope"), None);
    }

    #[test]
    fn hex_roundtrip() {
        let bytes = vec![0u8, 1, 0xab, 0xff];
        let h = bytes_to_hex(&bytes);
        assert_eq!(h, "0001abff");
        assert_eq!(hex_to_bytes(&h).unwrap(), bytes);
    }

    #[test]
    fn hex_rejects_odd_length_and_garbage() {
        assert!(hex_to_bytes("abc").is_err());
        assert!(hex_to_bytes("zz").is_err());
    }
}
