//! Relay global identifiers
//!
//! A global id is the base64 encoding of `"<TypeName>:<local id>"`, where the
//! type name is the model's output type (e.g. `UserOutputType`).

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::error::GlobalIdError;

/// Encode a type name and local id as a global id
pub fn to_global_id(type_name: &str, id: i64) -> String {
    BASE64.encode(format!("{type_name}:{id}"))
}

/// Decode a global id into its type name and local id
pub fn from_global_id(global_id: &str) -> Result<(String, i64), GlobalIdError> {
    let malformed = || GlobalIdError::Malformed(global_id.to_string());

    let decoded = BASE64.decode(global_id).map_err(|_| malformed())?;
    let text = String::from_utf8(decoded).map_err(|_| malformed())?;
    let (type_name, id) = text.rsplit_once(':').ok_or_else(malformed)?;
    if type_name.is_empty() {
        return Err(malformed());
    }
    let id = id.parse().map_err(|_| malformed())?;
    Ok((type_name.to_string(), id))
}

/// Decode a global id that must refer to `expected_type`
pub fn decode_for(expected_type: &str, global_id: &str) -> Result<i64, GlobalIdError> {
    let (type_name, id) = from_global_id(global_id)?;
    if type_name != expected_type {
        return Err(GlobalIdError::TypeMismatch {
            expected: expected_type.to_string(),
            found: type_name,
        });
    }
    Ok(id)
}

/// Like [`decode_for`], but a plain integer is taken as a local id.
pub fn decode_lenient(expected_type: &str, raw: &str) -> Result<i64, GlobalIdError> {
    match raw.parse::<i64>() {
        Ok(id) => Ok(id),
        Err(_) => decode_for(expected_type, raw),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_known_encoding() {
        assert_eq!(to_global_id("UserOutputType", 1), "VXNlck91dHB1dFR5cGU6MQ==");
        assert_eq!(
            from_global_id("VXNlck91dHB1dFR5cGU6MQ==").unwrap(),
            ("UserOutputType".to_string(), 1)
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert_matches!(from_global_id("not base64!"), Err(GlobalIdError::Malformed(_)));
        assert_matches!(
            from_global_id(&BASE64.encode("NoSeparator")),
            Err(GlobalIdError::Malformed(_))
        );
        assert_matches!(
            from_global_id(&BASE64.encode("User:abc")),
            Err(GlobalIdError::Malformed(_))
        );
    }

    #[test]
    fn test_type_mismatch() {
        let id = to_global_id("RoleOutputType", 4);
        assert_matches!(
            decode_for("UserOutputType", &id),
            Err(GlobalIdError::TypeMismatch { found, .. }) if found == "RoleOutputType"
        );
    }

    #[test]
    fn test_lenient_accepts_local_ids() {
        assert_eq!(decode_lenient("UserOutputType", "17"), Ok(17));
        let id = to_global_id("UserOutputType", 17);
        assert_eq!(decode_lenient("UserOutputType", &id), Ok(17));
    }
}
