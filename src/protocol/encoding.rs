use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Binary-to-text step used for the artifact field of a reply frame.
///
/// The outer frame never looks inside the encoded text, so any encoding that
/// produces JSON-safe text can be plugged into [`MessageCodec`](super::codec::MessageCodec).
pub trait BinaryEncoding: Send + Sync {
    fn name(&self) -> &'static str;

    fn encode(&self, data: &[u8]) -> String;

    fn decode(&self, text: &str) -> Result<Vec<u8>, String>;
}

/// RFC 4648 radix-64 with padding, as written by the compile service.
#[derive(Clone, Copy, Debug, Default)]
pub struct Base64Encoding;

impl BinaryEncoding for Base64Encoding {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn encode(&self, data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    fn decode(&self, text: &str) -> Result<Vec<u8>, String> {
        STANDARD.decode(text.trim()).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_base64_decode() {
        assert_eq!(Base64Encoding.decode("AAEC").unwrap(), vec![0u8, 1, 2]);
    }

    #[test]
    fn test_base64_decode_invalid() {
        assert!(Base64Encoding.decode("not*base64").is_err());
        // Missing padding
        assert!(Base64Encoding.decode("AAE").is_err());
    }
}
