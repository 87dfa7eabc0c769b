//! Record kind discriminator for stored protocol artifacts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of artifact kinds the store persists.
///
/// Every record carries exactly one kind. The store never interprets the
/// document beyond the handful of documented fields; the kind exists so
/// per-kind lookups and the grant cascade can scope their work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// End-user session.
    Session,
    /// Single-use authorization code.
    AuthorizationCode,
    /// Access token.
    AccessToken,
    /// Refresh token.
    RefreshToken,
    /// Client-credentials grant token.
    ClientCredentials,
    /// Device authorization code (RFC 8628).
    DeviceCode,
    /// A unit of end-user consent from which tokens descend.
    Grant,
    /// Pending user interaction (login/consent prompt).
    Interaction,
    /// Pushed authorization request (RFC 9126).
    PushedAuthorizationRequest,
    /// Client configuration. Permanent: never expires, never part of a
    /// grant cascade.
    Client,
}

impl RecordKind {
    /// All record kinds, in declaration order.
    pub const ALL: [RecordKind; 10] = [
        Self::Session,
        Self::AuthorizationCode,
        Self::AccessToken,
        Self::RefreshToken,
        Self::ClientCredentials,
        Self::DeviceCode,
        Self::Grant,
        Self::Interaction,
        Self::PushedAuthorizationRequest,
        Self::Client,
    ];

    /// Returns the canonical string form used as the storage discriminator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "Session",
            Self::AuthorizationCode => "AuthorizationCode",
            Self::AccessToken => "AccessToken",
            Self::RefreshToken => "RefreshToken",
            Self::ClientCredentials => "ClientCredentials",
            Self::DeviceCode => "DeviceCode",
            Self::Grant => "Grant",
            Self::Interaction => "Interaction",
            Self::PushedAuthorizationRequest => "PushedAuthorizationRequest",
            Self::Client => "Client",
        }
    }

    /// Returns `true` if records of this kind survive grant-cascade
    /// revocation.
    ///
    /// Only `Client` is exempt: client configuration is long-lived and not
    /// descended from any single user consent.
    #[must_use]
    pub fn grant_cascade_exempt(&self) -> bool {
        matches!(self, Self::Client)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown record kind.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown record kind: {0}")]
pub struct UnknownRecordKind(pub String);

impl FromStr for RecordKind {
    type Err = UnknownRecordKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Session" => Ok(Self::Session),
            "AuthorizationCode" => Ok(Self::AuthorizationCode),
            "AccessToken" => Ok(Self::AccessToken),
            "RefreshToken" => Ok(Self::RefreshToken),
            "ClientCredentials" => Ok(Self::ClientCredentials),
            "DeviceCode" => Ok(Self::DeviceCode),
            "Grant" => Ok(Self::Grant),
            "Interaction" => Ok(Self::Interaction),
            "PushedAuthorizationRequest" => Ok(Self::PushedAuthorizationRequest),
            "Client" => Ok(Self::Client),
            other => Err(UnknownRecordKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for kind in RecordKind::ALL {
            assert_eq!(kind.as_str().parse::<RecordKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }

    #[test]
    fn test_unknown_kind() {
        let err = "Widget".parse::<RecordKind>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown record kind: Widget");
    }

    #[test]
    fn test_cascade_exemption() {
        assert!(RecordKind::Client.grant_cascade_exempt());
        for kind in RecordKind::ALL {
            if kind != RecordKind::Client {
                assert!(!kind.grant_cascade_exempt(), "{kind} should cascade");
            }
        }
    }
}
