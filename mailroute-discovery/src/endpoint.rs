//! Submission endpoints and the ports they may use.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A port on which outbound submission is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Port {
    /// 25, plain SMTP relay.
    Relay,
    /// 465, TLS from the first byte (RFC 8314).
    Submissions,
    /// 587, message submission with STARTTLS upgrade (RFC 6409).
    Submission,
}

impl Port {
    /// Order in which the ports of a candidate host are tried.
    pub const SEARCH_ORDER: [Self; 3] = [Self::Submission, Self::Submissions, Self::Relay];

    #[must_use]
    pub const fn number(self) -> u16 {
        match self {
            Self::Relay => 25,
            Self::Submissions => 465,
            Self::Submission => 587,
        }
    }

    /// Returns `true` if TLS is negotiated at connect time.
    #[must_use]
    pub const fn implicit_tls(self) -> bool {
        matches!(self, Self::Submissions)
    }

    /// Returns `true` if the session is upgraded with STARTTLS when offered.
    #[must_use]
    pub const fn explicit_upgrade(self) -> bool {
        matches!(self, Self::Submission)
    }
}

impl TryFrom<u16> for Port {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            25 => Ok(Self::Relay),
            465 => Ok(Self::Submissions),
            587 => Ok(Self::Submission),
            other => Err(format!(
                "unsupported submission port {other}, expected 25, 465 or 587"
            )),
        }
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.number()
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// A host and port accepting outbound submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: Port,
}

impl Endpoint {
    #[must_use]
    pub fn new(host: impl Into<String>, port: Port) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the address as `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Lower-cases a DNS name and strips the trailing root dot.
#[must_use]
pub fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_round_trip_numbers() {
        for port in Port::SEARCH_ORDER {
            assert_eq!(Port::try_from(port.number()), Ok(port));
        }
        assert!(Port::try_from(2525).is_err());
    }

    #[test]
    fn test_search_order() {
        let numbers: Vec<u16> = Port::SEARCH_ORDER.iter().map(|p| p.number()).collect();
        assert_eq!(numbers, vec![587, 465, 25]);
    }

    #[test]
    fn test_tls_modes() {
        assert!(Port::Submissions.implicit_tls());
        assert!(Port::Submission.explicit_upgrade());
        assert!(!Port::Relay.implicit_tls());
        assert!(!Port::Relay.explicit_upgrade());
    }

    #[test]
    fn test_endpoint_address() {
        let endpoint = Endpoint::new("smtp.example.test", Port::Submission);
        assert_eq!(endpoint.address(), "smtp.example.test:587");
        assert_eq!(endpoint.to_string(), "smtp.example.test:587");
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("MX1.Example.TEST."), "mx1.example.test");
        assert_eq!(normalize_host(" mx.example.test "), "mx.example.test");
    }
}
