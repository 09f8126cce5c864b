// Copyright (c) 2024 The Trusted Compute Framework Authors

//! The attestation verification pipeline.
//!
//! [`AttestationVerifier`] holds the relying party's trust configuration
//! and runs evidence through the fixed pipeline: decode, signature
//! verification, status check, binding check, identity match. The first
//! failing stage rejects the evidence; later stages never run.

use crate::binding::BindingCommitment;
use crate::certs::{CertificateChain, TrustAnchor};
use crate::error::{DecodeError, RejectionReason};
use crate::evidence::{AttestationEvidence, DcapEvidence, EpidEvidence, QuoteVerificationOracle};
use crate::policy::{find_match, MeasurementPolicyEntry};
use crate::quote::{Measurement, Quote};
use crate::report::VerificationReport;
use crate::status::{CollateralPolicy, CollateralStatus, QuoteStatus};
use alloc::format;
use alloc::string::ToString;
use alloc::vec::Vec;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use core::fmt::{Debug, Formatter};
use core::time::Duration;

/// Default cap on the total evidence payload size.
pub const DEFAULT_MAX_EVIDENCE_SIZE: usize = 64 * 1024;

/// The identity of an enclave whose evidence passed every stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptedIdentity {
    /// The policy entry the enclave matched.
    pub matched: MeasurementPolicyEntry,
    /// MRENCLAVE from the verified quote.
    pub mr_enclave: Measurement,
    /// MRSIGNER from the verified quote.
    pub mr_signer: Measurement,
    /// Product id from the verified quote.
    pub isv_prod_id: u16,
    /// Security version number from the verified quote.
    pub isv_svn: u16,
}

/// Outcome of verifying one piece of evidence.
pub type VerificationResult = Result<AcceptedIdentity, RejectionReason>;

/// Verifies attestation evidence against a relying party's trust
/// configuration.
///
/// The verifier holds no mutable state; verifying evidence twice gives
/// the same answer both times.
pub struct AttestationVerifier<'a> {
    trust_anchor: TrustAnchor,
    policy: Vec<MeasurementPolicyEntry>,
    unix_time: Duration,
    allow_group_out_of_date: bool,
    collateral_policy: CollateralPolicy,
    max_evidence_size: usize,
    quote_oracle: Option<&'a dyn QuoteVerificationOracle>,
}

impl<'a> AttestationVerifier<'a> {
    /// Create a verifier for the given anchor, allow-list, and evaluation
    /// time. `unix_time` is used for certificate validity windows.
    pub fn new(
        trust_anchor: TrustAnchor,
        policy: Vec<MeasurementPolicyEntry>,
        unix_time: Duration,
    ) -> Self {
        Self {
            trust_anchor,
            policy,
            unix_time,
            allow_group_out_of_date: false,
            collateral_policy: CollateralPolicy::default(),
            max_evidence_size: DEFAULT_MAX_EVIDENCE_SIZE,
            quote_oracle: None,
        }
    }

    /// Tolerate the `GROUP_OUT_OF_DATE` quote status.
    pub fn with_allow_group_out_of_date(mut self, allow: bool) -> Self {
        self.allow_group_out_of_date = allow;
        self
    }

    /// Use a non-default DCAP collateral policy.
    pub fn with_collateral_policy(mut self, policy: CollateralPolicy) -> Self {
        self.collateral_policy = policy;
        self
    }

    /// Cap the evidence payload at `size` bytes.
    pub fn with_max_evidence_size(mut self, size: usize) -> Self {
        self.max_evidence_size = size;
        self
    }

    /// Use `oracle` to verify raw DCAP quotes. Without an oracle, all
    /// DCAP evidence is rejected.
    pub fn with_quote_oracle(mut self, oracle: &'a dyn QuoteVerificationOracle) -> Self {
        self.quote_oracle = Some(oracle);
        self
    }

    /// Run `evidence` through the verification pipeline.
    ///
    /// `commitment` is the session material the enclave is expected to
    /// have bound into its quote.
    pub fn verify(
        &self,
        evidence: &AttestationEvidence,
        commitment: &BindingCommitment,
    ) -> VerificationResult {
        if evidence.size() > self.max_evidence_size {
            return Err(DecodeError::EvidenceTooLarge {
                limit: self.max_evidence_size,
                actual: evidence.size(),
            }
            .into());
        }
        match evidence {
            AttestationEvidence::Epid(epid) => self.verify_epid(epid, commitment),
            AttestationEvidence::Dcap(dcap) => self.verify_dcap(dcap, commitment),
        }
    }

    fn verify_epid(
        &self,
        evidence: &EpidEvidence,
        commitment: &BindingCommitment,
    ) -> VerificationResult {
        let report = VerificationReport::from_json(&evidence.verification_report)
            .map_err(RejectionReason::from)?;

        // A revocation reason pre-empts everything else, including a bad
        // report signature, and rejects even when the status string says
        // OK. Revoked status *strings* are untrusted until the signature
        // verifies and are handled by the status stage below.
        if let Some(reason) = report.revocation_reason {
            return Err(RejectionReason::Revoked(reason));
        }

        let chain = CertificateChain::from_pems(&evidence.signing_certificates)?;
        let signing_key = chain.leaf_key(&self.trust_anchor, self.unix_time)?;
        let signature = STANDARD
            .decode(&evidence.report_signature)
            .map_err(DecodeError::from)?;
        signing_key.verify_raw(evidence.verification_report.as_bytes(), &signature)?;

        // Only now is the report's own content trustworthy.
        let status = report
            .isv_enclave_quote_status
            .parse::<QuoteStatus>()
            .map_err(|unknown| RejectionReason::StaleOrInvalidStatus(unknown.0))?;
        if !status.is_acceptable(self.allow_group_out_of_date) {
            return Err(RejectionReason::StaleOrInvalidStatus(status.to_string()));
        }

        let quote = report.quote().map_err(RejectionReason::from)?;
        self.check_binding_and_identity(&quote, commitment)
    }

    fn verify_dcap(
        &self,
        evidence: &DcapEvidence,
        commitment: &BindingCommitment,
    ) -> VerificationResult {
        let quote = Quote::from_raw_dcap(&evidence.raw_quote).map_err(RejectionReason::from)?;

        // No oracle means the quote signature can never be checked.
        let oracle = self.quote_oracle.ok_or(RejectionReason::UntrustedSignature)?;
        let verdict = oracle
            .verify_quote(&evidence.raw_quote)
            .ok_or_else(|| RejectionReason::StaleOrInvalidStatus("UNSPECIFIED".to_string()))?;

        match verdict.status {
            CollateralStatus::InvalidSignature => {
                return Err(RejectionReason::UntrustedSignature);
            }
            CollateralStatus::Revoked => {
                return Err(RejectionReason::Revoked(0));
            }
            status if !self.collateral_policy.is_acceptable(status) => {
                return Err(RejectionReason::StaleOrInvalidStatus(format!("{status:?}")));
            }
            _ => {}
        }

        self.check_binding_and_identity(&quote, commitment)
    }

    fn check_binding_and_identity(
        &self,
        quote: &Quote,
        commitment: &BindingCommitment,
    ) -> VerificationResult {
        if !commitment.matches(&quote.report_data()) {
            return Err(RejectionReason::BindingMismatch);
        }
        let matched = find_match(&self.policy, quote).ok_or(RejectionReason::UnknownMeasurement)?;
        Ok(AcceptedIdentity {
            matched: matched.clone(),
            mr_enclave: quote.mr_enclave(),
            mr_signer: quote.mr_signer(),
            isv_prod_id: quote.isv_prod_id(),
            isv_svn: quote.isv_svn(),
        })
    }
}

impl<'a> Debug for AttestationVerifier<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AttestationVerifier")
            .field("trust_anchor", &self.trust_anchor)
            .field("policy", &self.policy)
            .field("unix_time", &self.unix_time)
            .field("allow_group_out_of_date", &self.allow_group_out_of_date)
            .field("collateral_policy", &self.collateral_policy)
            .field("max_evidence_size", &self.max_evidence_size)
            .field("quote_oracle", &self.quote_oracle.map(|_| "configured"))
            .finish()
    }
}
