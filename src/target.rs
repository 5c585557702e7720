use url::Url;

use crate::error::{GatewayError, Result};

// A caller-supplied target that parsed as an absolute http(s) URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget {
    url: Url,
    host: String,
}

impl ParsedTarget {
    // no DNS here; host stays the parser-normalized literal
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let raw = match raw {
            Some(r) if !r.is_empty() => r,
            _ => return Err(GatewayError::MissingParameter),
        };

        let url = Url::parse(raw).map_err(|_| GatewayError::InvalidUrl)?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::UnsupportedScheme);
        }

        let host = url.host_str().ok_or(GatewayError::InvalidUrl)?.to_string();

        Ok(Self { url, host })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(80)
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}
