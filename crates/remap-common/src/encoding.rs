use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Standard (padded) base64, the encoding the Coordinator uses for
/// challenges, solutions and key seeds.
pub fn b64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64, ignoring surrounding whitespace.
pub fn b64_decode(input: &str) -> Result<Vec<u8>, String> {
    STANDARD
        .decode(input.trim())
        .map_err(|e| format!("invalid base64: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_encode_is_lowercase() {
        assert_eq!(hex_encode(&[0xde, 0xad, 0x01]), "dead01");
    }

    #[test]
    fn b64_decodes_challenge() {
        assert_eq!(b64_decode("QUJD").unwrap(), b"ABC");
    }

    #[test]
    fn b64_decode_ignores_trailing_newline() {
        assert_eq!(b64_decode("QUJD\n").unwrap(), b"ABC");
    }

    #[test]
    fn b64_encode_pads() {
        assert_eq!(b64_encode(b"AB"), "QUI=");
    }

    #[test]
    fn b64_decode_rejects_garbage() {
        assert!(b64_decode("not base64!").is_err());
    }
}
