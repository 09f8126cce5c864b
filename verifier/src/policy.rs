// Copyright (c) 2024 The Trusted Compute Framework Authors

//! Measurement allow-list policy.
//!
//! A policy is an ordered list of entries. Each entry constrains some
//! subset of the quote's identity fields; an omitted field is a wildcard.
//! The first entry whose constraints all hold wins, so operators can put
//! specific pins ahead of broader fallbacks.

use crate::quote::{Measurement, Quote};
use serde::{Deserialize, Serialize};
use subtle::{Choice, ConstantTimeEq};

/// One allow-list entry. Every field is optional; an entry with no fields
/// set matches any quote.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementPolicyEntry {
    /// Required MRENCLAVE, or any if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mr_enclave: Option<Measurement>,
    /// Required MRSIGNER, or any if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mr_signer: Option<Measurement>,
    /// Required product id, or any if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isv_prod_id: Option<u16>,
    /// Required security version number, or any if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isv_svn: Option<u16>,
}

impl MeasurementPolicyEntry {
    /// An entry with no constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the entry to an MRENCLAVE.
    pub fn with_mr_enclave(mut self, mr_enclave: Measurement) -> Self {
        self.mr_enclave = Some(mr_enclave);
        self
    }

    /// Pin the entry to an MRSIGNER.
    pub fn with_mr_signer(mut self, mr_signer: Measurement) -> Self {
        self.mr_signer = Some(mr_signer);
        self
    }

    /// Pin the entry to a product id.
    pub fn with_isv_prod_id(mut self, isv_prod_id: u16) -> Self {
        self.isv_prod_id = Some(isv_prod_id);
        self
    }

    /// Pin the entry to an exact security version number.
    pub fn with_isv_svn(mut self, isv_svn: u16) -> Self {
        self.isv_svn = Some(isv_svn);
        self
    }

    /// Whether the quote's identity satisfies every constraint set on this
    /// entry. Measurement comparisons are constant time.
    pub fn matches(&self, quote: &Quote) -> bool {
        let mr_enclave_ok = match &self.mr_enclave {
            Some(required) => required.ct_eq(&quote.mr_enclave()),
            None => Choice::from(1),
        };
        let mr_signer_ok = match &self.mr_signer {
            Some(required) => required.ct_eq(&quote.mr_signer()),
            None => Choice::from(1),
        };
        let prod_id_ok = self
            .isv_prod_id
            .map_or(true, |required| required == quote.isv_prod_id());
        let svn_ok = self
            .isv_svn
            .map_or(true, |required| required == quote.isv_svn());
        bool::from(mr_enclave_ok & mr_signer_ok) && prod_id_ok && svn_ok
    }
}

/// Find the first entry the quote satisfies, if any.
///
/// An empty policy matches nothing.
pub fn find_match<'a>(
    entries: &'a [MeasurementPolicyEntry],
    quote: &Quote,
) -> Option<&'a MeasurementPolicyEntry> {
    entries.iter().find(|entry| entry.matches(quote))
}
