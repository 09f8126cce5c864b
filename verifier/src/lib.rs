// Copyright (c) 2024 The Trusted Compute Framework Authors

#![doc = include_str!("../README.md")]
#![deny(missing_docs, missing_debug_implementations, unsafe_code)]
#![no_std]

extern crate alloc;

mod binding;
mod certs;
mod error;
mod evidence;
mod policy;
mod quote;
mod report;
mod status;
mod verifier;

pub use binding::BindingCommitment;
pub use certs::{
    CertificateChain, Error as CertificateError, PublicKey, Signature, TrustAnchor,
    UnverifiedCertificate, VerifiedCertificate,
};
pub use error::{DecodeError, RejectionReason, VerificationStage};
pub use evidence::{
    AttestationEvidence, DcapEvidence, EpidEvidence, OracleVerdict, QuoteVerificationOracle,
};
pub use policy::{find_match, MeasurementPolicyEntry};
pub use quote::{Measurement, Quote, ReportData, QUOTE_BODY_SIZE, REPORT_DATA_SIZE};
pub use report::VerificationReport;
pub use status::{CollateralPolicy, CollateralStatus, QuoteStatus, UnknownStatus};
pub use verifier::{
    AcceptedIdentity, AttestationVerifier, VerificationResult, DEFAULT_MAX_EVIDENCE_SIZE,
};
