// Copyright (c) 2024 The Trusted Compute Framework Authors

//! Errors that can occur during evidence verification

use alloc::string::String;

/// Structural failure while decoding attestation evidence.
///
/// These are all "untrusted input" problems: a prover (or a bug in the
/// transport) handed us bytes that do not have the shape the protocol
/// requires.
#[derive(Debug, displaydoc::Display)]
pub enum DecodeError {
    /// Error parsing the report JSON: {0}
    Json(serde_json::Error),
    /// Report field `{0}` is missing or null
    MissingField(&'static str),
    /// Error decoding base64 evidence: {0}
    Base64(base64::DecodeError),
    /// Quote body is {actual} bytes, expected exactly {expected}
    #[allow(missing_docs)]
    QuoteLength { expected: usize, actual: usize },
    /// Quote signature length field does not match the {0} trailing bytes
    QuoteSignatureLength(usize),
    /// Evidence bundle of {actual} bytes exceeds the {limit} byte cap
    #[allow(missing_docs)]
    EvidenceTooLarge { limit: usize, actual: usize },
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Json(e)
    }
}

impl From<base64::DecodeError> for DecodeError {
    fn from(e: base64::DecodeError) -> Self {
        DecodeError::Base64(e)
    }
}

/// Why a bundle of attestation evidence was rejected.
///
/// Every rejection carries exactly one reason so operational tooling can
/// tell "untrusted code" apart from "replayed quote" apart from "stale
/// platform" without parsing message strings.
#[derive(Debug, displaydoc::Display)]
pub enum RejectionReason {
    /// Evidence could not be decoded: {0}
    Decode(DecodeError),
    /// Report signature or certificate chain failed verification
    UntrustedSignature,
    /// Report carries revocation reason {0}
    Revoked(u64),
    /// Quote status `{0}` is not acceptable under the configured policy
    StaleOrInvalidStatus(String),
    /// Quote report data does not match the expected binding commitment
    BindingMismatch,
    /// No registered measurement policy entry matches the quote
    UnknownMeasurement,
}

impl From<DecodeError> for RejectionReason {
    fn from(e: DecodeError) -> Self {
        RejectionReason::Decode(e)
    }
}

/// Certificate problems never say *which* byte comparison failed, they all
/// collapse into the one signature-trust reason.
impl From<crate::certs::Error> for RejectionReason {
    fn from(_: crate::certs::Error) -> Self {
        RejectionReason::UntrustedSignature
    }
}

/// The pipeline stage a rejection was raised in.
///
/// Stages are ordered: cheap structural checks run before any
/// cryptography, and a revocation marker pre-empts everything else, so a
/// reason's stage also tells how far the evidence got.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerificationStage {
    /// Decoding the evidence envelope and quote structure
    Decode,
    /// Certificate chain and detached report signature verification
    SignatureVerification,
    /// Quote freshness/health status policy
    StatusCheck,
    /// Report-data binding (replay defense)
    BindingCheck,
    /// Measurement allow-list matching
    IdentityMatch,
}

impl RejectionReason {
    /// The stage of the verification pipeline this rejection belongs to.
    pub fn stage(&self) -> VerificationStage {
        match self {
            // A revocation marker is found while decoding the report, before
            // any signature work is spent on it.
            RejectionReason::Decode(_) | RejectionReason::Revoked(_) => VerificationStage::Decode,
            RejectionReason::UntrustedSignature => VerificationStage::SignatureVerification,
            RejectionReason::StaleOrInvalidStatus(_) => VerificationStage::StatusCheck,
            RejectionReason::BindingMismatch => VerificationStage::BindingCheck,
            RejectionReason::UnknownMeasurement => VerificationStage::IdentityMatch,
        }
    }
}
