use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::error::{GatewayError, Result};

pub const DEFAULT_ACCEPT: &str = "application/fhir+json";

// Default headers overlaid with the caller's JSON object of string values.
// Caller keys win over defaults of the same (case-insensitive) name.
pub fn compose(raw: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));

    let raw = match raw {
        Some(r) if !r.is_empty() => r,
        _ => return Ok(headers),
    };

    let custom = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        // null adds nothing
        Ok(Value::Null) => return Ok(headers),
        _ => return Err(GatewayError::InvalidHeaderJson),
    };

    for (name, value) in custom {
        let Value::String(value) = value else {
            return Err(GatewayError::InvalidHeaderJson);
        };
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| GatewayError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(&value).map_err(|_| GatewayError::InvalidHeader(name))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;

    #[test]
    fn defaults_when_absent() {
        for raw in [None, Some("")] {
            let headers = compose(raw).unwrap();
            assert_eq!(headers.len(), 1);
            assert_eq!(headers[ACCEPT], DEFAULT_ACCEPT);
        }
    }

    #[test]
    fn null_means_no_custom_headers() {
        let headers = compose(Some("null")).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[ACCEPT], DEFAULT_ACCEPT);
    }

    #[test]
    fn custom_headers_overlay_defaults() {
        let headers =
            compose(Some(r#"{"accept":"application/json","Authorization":"Bearer abc"}"#)).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[ACCEPT], "application/json");
        assert_eq!(headers[AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(compose(Some("{not-json}")), Err(GatewayError::InvalidHeaderJson)));
    }

    #[test]
    fn non_object_or_non_string_values_are_rejected() {
        for raw in [
            r#"["a","b"]"#,
            r#""Accept""#,
            r#"{"X-Count":3}"#,
            r#"{"X-Nested":{"a":"b"}}"#,
        ] {
            assert!(matches!(compose(Some(raw)), Err(GatewayError::InvalidHeaderJson)), "{raw}");
        }
    }

    #[test]
    fn illegal_header_tokens_are_rejected() {
        assert!(matches!(
            compose(Some(r#"{"Bad Name":"x"}"#)),
            Err(GatewayError::InvalidHeader(name)) if name == "Bad Name"
        ));
        assert!(matches!(
            compose(Some(r#"{"X-Split":"a\r\nInjected: b"}"#)),
            Err(GatewayError::InvalidHeader(_))
        ));
    }
}
