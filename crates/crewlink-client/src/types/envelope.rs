//! The `{rpta, data, msg}` response envelope used by both backend groups.

use serde::Deserialize;
use serde_json::Value;

/// Response envelope convention used by both backend groups.
///
/// `rpta == 1` signals success; `rpta == 0` signals failure with a
/// human-readable message (some endpoints spell the field `message`).
#[derive(Clone, Debug, Deserialize)]
pub struct Envelope {
    pub rpta: i64,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, alias = "message")]
    pub msg: Option<String>,
}

impl Envelope {
    /// Parse an envelope out of a raw body. Returns `None` for bodies
    /// that are not envelope-shaped JSON.
    pub fn parse(body: &[u8]) -> Option<Envelope> {
        serde_json::from_slice(body).ok()
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.rpta == 1
    }

    /// The failure message, or an empty string when the server sent none.
    pub fn message(&self) -> &str {
        self.msg.as_deref().unwrap_or("")
    }

    /// Deserialize `data` into a concrete type.
    pub fn decode_data<T: serde::de::DeserializeOwned>(&self) -> crate::error::Result<T> {
        let data = self.data.clone().unwrap_or(Value::Null);
        Ok(serde_json::from_value(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success_envelope() {
        let env = Envelope::parse(br#"{"rpta":1,"data":{"token":"abc"}}"#).unwrap();
        assert!(env.is_ok());
        assert_eq!(env.message(), "");
    }

    #[test]
    fn test_parse_failure_with_msg() {
        let env = Envelope::parse(br#"{"rpta":0,"msg":"Token expirado"}"#).unwrap();
        assert!(!env.is_ok());
        assert_eq!(env.message(), "Token expirado");
    }

    #[test]
    fn test_message_alias() {
        let env = Envelope::parse(br#"{"rpta":0,"message":"Usuario no encontrado"}"#).unwrap();
        assert_eq!(env.message(), "Usuario no encontrado");
    }

    #[test]
    fn test_parse_rejects_non_envelope() {
        assert!(Envelope::parse(b"<html>502</html>").is_none());
        assert!(Envelope::parse(br#"{"status":"ok"}"#).is_none());
    }
}
