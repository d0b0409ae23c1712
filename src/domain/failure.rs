use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Standardized machine-readable failure reasons carried in error responses,
/// modeled as a bit set so several reasons can be reported at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureInfo(u32);

impl FailureInfo {
    pub const BAD_ALG: Self = Self(1 << 0);
    pub const BAD_MESSAGE_CHECK: Self = Self(1 << 1);
    pub const BAD_REQUEST: Self = Self(1 << 2);
    pub const BAD_TIME: Self = Self(1 << 3);
    pub const BAD_CERT_ID: Self = Self(1 << 4);
    pub const BAD_DATA_FORMAT: Self = Self(1 << 5);
    pub const WRONG_AUTHORITY: Self = Self(1 << 6);
    pub const INCORRECT_DATA: Self = Self(1 << 7);
    pub const MISSING_TIME_STAMP: Self = Self(1 << 8);
    pub const BAD_POP: Self = Self(1 << 9);
    pub const CERT_REVOKED: Self = Self(1 << 10);
    pub const CERT_CONFIRMED: Self = Self(1 << 11);
    pub const WRONG_INTEGRITY: Self = Self(1 << 12);
    pub const BAD_RECIPIENT_NONCE: Self = Self(1 << 13);
    pub const TIME_NOT_AVAILABLE: Self = Self(1 << 14);
    pub const UNACCEPTED_POLICY: Self = Self(1 << 15);
    pub const UNACCEPTED_EXTENSION: Self = Self(1 << 16);
    pub const ADD_INFO_NOT_AVAILABLE: Self = Self(1 << 17);
    pub const BAD_SENDER_NONCE: Self = Self(1 << 18);
    pub const BAD_CERT_TEMPLATE: Self = Self(1 << 19);
    pub const SIGNER_NOT_TRUSTED: Self = Self(1 << 20);
    pub const TRANSACTION_ID_IN_USE: Self = Self(1 << 21);
    pub const UNSUPPORTED_VERSION: Self = Self(1 << 22);
    pub const NOT_AUTHORIZED: Self = Self(1 << 23);
    pub const SYSTEM_UNAVAIL: Self = Self(1 << 24);
    pub const SYSTEM_FAILURE: Self = Self(1 << 25);
    pub const DUPLICATE_CERT_REQ: Self = Self(1 << 26);

    const NAMES: [(Self, &'static str); 27] = [
        (Self::BAD_ALG, "badAlg"),
        (Self::BAD_MESSAGE_CHECK, "badMessageCheck"),
        (Self::BAD_REQUEST, "badRequest"),
        (Self::BAD_TIME, "badTime"),
        (Self::BAD_CERT_ID, "badCertId"),
        (Self::BAD_DATA_FORMAT, "badDataFormat"),
        (Self::WRONG_AUTHORITY, "wrongAuthority"),
        (Self::INCORRECT_DATA, "incorrectData"),
        (Self::MISSING_TIME_STAMP, "missingTimeStamp"),
        (Self::BAD_POP, "badPOP"),
        (Self::CERT_REVOKED, "certRevoked"),
        (Self::CERT_CONFIRMED, "certConfirmed"),
        (Self::WRONG_INTEGRITY, "wrongIntegrity"),
        (Self::BAD_RECIPIENT_NONCE, "badRecipientNonce"),
        (Self::TIME_NOT_AVAILABLE, "timeNotAvailable"),
        (Self::UNACCEPTED_POLICY, "unacceptedPolicy"),
        (Self::UNACCEPTED_EXTENSION, "unacceptedExtension"),
        (Self::ADD_INFO_NOT_AVAILABLE, "addInfoNotAvailable"),
        (Self::BAD_SENDER_NONCE, "badSenderNonce"),
        (Self::BAD_CERT_TEMPLATE, "badCertTemplate"),
        (Self::SIGNER_NOT_TRUSTED, "signerNotTrusted"),
        (Self::TRANSACTION_ID_IN_USE, "transactionIdInUse"),
        (Self::UNSUPPORTED_VERSION, "unsupportedVersion"),
        (Self::NOT_AUTHORIZED, "notAuthorized"),
        (Self::SYSTEM_UNAVAIL, "systemUnavail"),
        (Self::SYSTEM_FAILURE, "systemFailure"),
        (Self::DUPLICATE_CERT_REQ, "duplicateCertReq"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FailureInfo {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl fmt::Display for FailureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        if first {
            write!(f, "none")?;
        }
        Ok(())
    }
}

/// Payload of an error response: the failure reasons and a human-readable
/// diagnostic string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContent {
    pub failure_info: FailureInfo,
    pub status_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_and_contains() {
        let set = FailureInfo::BAD_REQUEST | FailureInfo::BAD_DATA_FORMAT;
        assert!(set.contains(FailureInfo::BAD_REQUEST));
        assert!(set.contains(FailureInfo::BAD_DATA_FORMAT));
        assert!(!set.contains(FailureInfo::SYSTEM_FAILURE));
    }

    #[test]
    fn test_display_lists_set_bits() {
        let set = FailureInfo::SYSTEM_UNAVAIL | FailureInfo::BAD_TIME;
        assert_eq!(set.to_string(), "badTime|systemUnavail");
        assert_eq!(FailureInfo::empty().to_string(), "none");
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&FailureInfo::SYSTEM_FAILURE).unwrap();
        assert_eq!(json, (1u32 << 25).to_string());
        let parsed: FailureInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, FailureInfo::SYSTEM_FAILURE);
    }
}
