// Copyright (c) 2024 The Trusted Compute Framework Authors

//! Quote-status policy.
//!
//! EPID reports carry a status string chosen by the attestation service;
//! DCAP verdicts carry a collateral status code from the quote
//! verification library. Both are mapped to typed enums here so the
//! acceptance decision is an explicit allow-list rather than string
//! comparisons scattered through the pipeline.

use alloc::collections::BTreeSet;
use alloc::string::String;
use core::fmt::{Display, Formatter};
use core::str::FromStr;

/// Status the attestation service assigned to an EPID quote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuoteStatus {
    /// The quote verified and the platform TCB is current.
    Ok,
    /// The EPID signature on the quote did not verify.
    SignatureInvalid,
    /// The platform's EPID group has been revoked.
    GroupRevoked,
    /// The quote's private key is on the signature revocation list.
    SignatureRevoked,
    /// The quote's private key is on the private-key revocation list.
    KeyRevoked,
    /// The quote was signed against an outdated revocation list.
    SigrlVersionMismatch,
    /// The platform TCB is out of date but the quote verified.
    GroupOutOfDate,
    /// The platform needs a configuration change to reach a current TCB.
    ConfigurationNeeded,
    /// The enclave needs software mitigations to reach a current TCB.
    SwHardeningNeeded,
    /// Both a configuration change and software mitigations are needed.
    ConfigurationAndSwHardeningNeeded,
}

impl QuoteStatus {
    const STRINGS: [(&'static str, QuoteStatus); 10] = [
        ("OK", QuoteStatus::Ok),
        ("SIGNATURE_INVALID", QuoteStatus::SignatureInvalid),
        ("GROUP_REVOKED", QuoteStatus::GroupRevoked),
        ("SIGNATURE_REVOKED", QuoteStatus::SignatureRevoked),
        ("KEY_REVOKED", QuoteStatus::KeyRevoked),
        ("SIGRL_VERSION_MISMATCH", QuoteStatus::SigrlVersionMismatch),
        ("GROUP_OUT_OF_DATE", QuoteStatus::GroupOutOfDate),
        ("CONFIGURATION_NEEDED", QuoteStatus::ConfigurationNeeded),
        ("SW_HARDENING_NEEDED", QuoteStatus::SwHardeningNeeded),
        (
            "CONFIGURATION_AND_SW_HARDENING_NEEDED",
            QuoteStatus::ConfigurationAndSwHardeningNeeded,
        ),
    ];

    /// Whether this status is acceptable under the configured tolerance.
    ///
    /// `OK` is always acceptable. `GROUP_OUT_OF_DATE` is acceptable only
    /// when the caller explicitly opted in. Everything else is rejected,
    /// including statuses this verifier has never seen before.
    pub fn is_acceptable(&self, allow_group_out_of_date: bool) -> bool {
        match self {
            QuoteStatus::Ok => true,
            QuoteStatus::GroupOutOfDate => allow_group_out_of_date,
            _ => false,
        }
    }
}

/// Error for a quote status string this verifier does not recognize.
///
/// Unknown statuses are never accepted, so surfacing the raw string lets an
/// operator see what the service actually said.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl FromStr for QuoteStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::STRINGS
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, status)| *status)
            .ok_or_else(|| UnknownStatus(s.into()))
    }
}

impl Display for QuoteStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let (name, _) = Self::STRINGS
            .iter()
            .find(|(_, status)| status == self)
            .expect("every variant has a wire string");
        write!(f, "{name}")
    }
}

/// Collateral status of a DCAP quote, from the quote verification library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CollateralStatus {
    /// Quote and collateral verified, TCB current.
    Ok,
    /// Verified, but the platform needs a configuration change.
    ConfigNeeded,
    /// Verified, but the platform TCB is out of date.
    OutOfDate,
    /// Out of date and a configuration change is also needed.
    OutOfDateConfigNeeded,
    /// Verified, but the enclave needs software mitigations.
    SwHardeningNeeded,
    /// Software mitigations and a configuration change are both needed.
    ConfigAndSwHardeningNeeded,
    /// The quote signature or its certification data did not verify.
    InvalidSignature,
    /// The attestation key or platform has been revoked.
    Revoked,
    /// The verification library could not produce a verdict.
    Unspecified,
}

impl CollateralStatus {
    /// Statuses that can never be accepted, no matter the policy.
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            CollateralStatus::InvalidSignature
                | CollateralStatus::Revoked
                | CollateralStatus::Unspecified
        )
    }
}

/// Which non-`Ok` collateral statuses a deployment tolerates.
///
/// The default accepts the statuses that mean "verified, but the platform
/// TCB wants attention". Terminal statuses are rejected even if added to
/// the accepted set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollateralPolicy {
    accepted: BTreeSet<CollateralStatus>,
}

impl Default for CollateralPolicy {
    fn default() -> Self {
        Self {
            accepted: BTreeSet::from([
                CollateralStatus::Ok,
                CollateralStatus::ConfigNeeded,
                CollateralStatus::OutOfDate,
                CollateralStatus::OutOfDateConfigNeeded,
                CollateralStatus::SwHardeningNeeded,
                CollateralStatus::ConfigAndSwHardeningNeeded,
            ]),
        }
    }
}

impl CollateralPolicy {
    /// A policy that accepts only a fully up-to-date platform.
    pub fn strict() -> Self {
        Self {
            accepted: BTreeSet::from([CollateralStatus::Ok]),
        }
    }

    /// A policy accepting exactly the given statuses.
    ///
    /// Terminal statuses in the set are ignored at evaluation time.
    pub fn new(accepted: BTreeSet<CollateralStatus>) -> Self {
        Self { accepted }
    }

    /// Whether the given status passes this policy.
    pub fn is_acceptable(&self, status: CollateralStatus) -> bool {
        !status.is_terminal() && self.accepted.contains(&status)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        ok = { "OK", QuoteStatus::Ok },
        group_out_of_date = { "GROUP_OUT_OF_DATE", QuoteStatus::GroupOutOfDate },
        group_revoked = { "GROUP_REVOKED", QuoteStatus::GroupRevoked },
        key_revoked = { "KEY_REVOKED", QuoteStatus::KeyRevoked },
        signature_revoked = { "SIGNATURE_REVOKED", QuoteStatus::SignatureRevoked },
        signature_invalid = { "SIGNATURE_INVALID", QuoteStatus::SignatureInvalid },
        sigrl_mismatch = { "SIGRL_VERSION_MISMATCH", QuoteStatus::SigrlVersionMismatch },
        config_needed = { "CONFIGURATION_NEEDED", QuoteStatus::ConfigurationNeeded },
        sw_hardening = { "SW_HARDENING_NEEDED", QuoteStatus::SwHardeningNeeded },
        both = {
            "CONFIGURATION_AND_SW_HARDENING_NEEDED",
            QuoteStatus::ConfigurationAndSwHardeningNeeded
        },
    )]
    fn status_strings_round_trip(wire: &str, status: QuoteStatus) {
        use alloc::string::ToString;
        assert_eq!(wire.parse::<QuoteStatus>(), Ok(status));
        assert_eq!(status.to_string(), wire);
    }

    #[test]
    fn unknown_status_string_is_an_error() {
        let error = "TOTALLY_NEW_STATUS".parse::<QuoteStatus>().unwrap_err();
        assert_eq!(error.0, "TOTALLY_NEW_STATUS");
    }

    #[test]
    fn status_matching_is_case_sensitive() {
        assert!("ok".parse::<QuoteStatus>().is_err());
    }

    #[test]
    fn only_ok_is_acceptable_by_default() {
        for (_, status) in QuoteStatus::STRINGS {
            assert_eq!(status.is_acceptable(false), status == QuoteStatus::Ok);
        }
    }

    #[test]
    fn group_out_of_date_needs_the_opt_in() {
        assert!(!QuoteStatus::GroupOutOfDate.is_acceptable(false));
        assert!(QuoteStatus::GroupOutOfDate.is_acceptable(true));
    }

    #[test]
    fn opt_in_does_not_loosen_other_statuses() {
        assert!(!QuoteStatus::GroupRevoked.is_acceptable(true));
        assert!(!QuoteStatus::ConfigurationNeeded.is_acceptable(true));
        assert!(!QuoteStatus::SwHardeningNeeded.is_acceptable(true));
    }

    #[test]
    fn default_collateral_policy_accepts_non_terminal_statuses() {
        let policy = CollateralPolicy::default();
        assert!(policy.is_acceptable(CollateralStatus::Ok));
        assert!(policy.is_acceptable(CollateralStatus::OutOfDate));
        assert!(policy.is_acceptable(CollateralStatus::ConfigAndSwHardeningNeeded));
        assert!(!policy.is_acceptable(CollateralStatus::InvalidSignature));
        assert!(!policy.is_acceptable(CollateralStatus::Revoked));
        assert!(!policy.is_acceptable(CollateralStatus::Unspecified));
    }

    #[test]
    fn strict_collateral_policy_accepts_only_ok() {
        let policy = CollateralPolicy::strict();
        assert!(policy.is_acceptable(CollateralStatus::Ok));
        assert!(!policy.is_acceptable(CollateralStatus::OutOfDate));
    }

    #[test]
    fn terminal_statuses_cannot_be_allow_listed() {
        let policy = CollateralPolicy::new(BTreeSet::from([
            CollateralStatus::Ok,
            CollateralStatus::InvalidSignature,
            CollateralStatus::Revoked,
            CollateralStatus::Unspecified,
        ]));
        assert!(policy.is_acceptable(CollateralStatus::Ok));
        assert!(!policy.is_acceptable(CollateralStatus::InvalidSignature));
        assert!(!policy.is_acceptable(CollateralStatus::Revoked));
        assert!(!policy.is_acceptable(CollateralStatus::Unspecified));
    }

    #[test]
    fn narrowed_policy_rejects_unlisted_statuses() {
        let policy = CollateralPolicy::new(BTreeSet::from([
            CollateralStatus::Ok,
            CollateralStatus::SwHardeningNeeded,
        ]));
        assert!(policy.is_acceptable(CollateralStatus::SwHardeningNeeded));
        assert!(!policy.is_acceptable(CollateralStatus::OutOfDate));
    }
}
