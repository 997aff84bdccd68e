//! Folding ledger outcomes into responses.
//!
//! Every request ends in exactly one of three shapes:
//!
//! | Outcome          | Status          | Body                                  |
//! |------------------|-----------------|---------------------------------------|
//! | read succeeded   | `Ok`            | the payload, parsed as JSON           |
//! | write succeeded  | `Ok`            | [`SUBMIT_ACKNOWLEDGEMENT`]            |
//! | any fault        | `RequestError`  | the fault's message, as a JSON string |
//!
//! A read payload that does not parse as JSON is itself a fault
//! ([`FaultKind::MalformedPayload`](crate::FaultKind::MalformedPayload)).

use bytes::Bytes;
use serde_json::Value;

use crate::{
    error::Fault,
    operation::Mode,
};

/// Body returned for every successful write.
pub const SUBMIT_ACKNOWLEDGEMENT: &str = "Transaction has been submitted";

/// Response status class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// The operation succeeded.
    Ok,
    /// The operation failed for any reason.
    RequestError,
}

/// The single response produced for a request.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedResponse {
    /// A read returned this record set.
    Record(Value),
    /// A write was accepted by the ledger.
    Acknowledged,
    /// The request failed.
    Rejected(Fault),
}

impl NormalizedResponse {
    /// Returns the status class.
    #[must_use]
    pub fn status(&self) -> ResponseStatus {
        match self {
            Self::Record(_) | Self::Acknowledged => ResponseStatus::Ok,
            Self::Rejected(_) => ResponseStatus::RequestError,
        }
    }

    /// Returns whether the request succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status() == ResponseStatus::Ok
    }

    /// Returns the fault, if the request failed.
    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Rejected(fault) => Some(fault),
            Self::Record(_) | Self::Acknowledged => None,
        }
    }

    /// Returns the response body.
    #[must_use]
    pub fn body(&self) -> Value {
        self.clone().into_body()
    }

    /// Consumes the response, returning its body.
    #[must_use]
    pub fn into_body(self) -> Value {
        match self {
            Self::Record(value) => value,
            Self::Acknowledged => Value::String(SUBMIT_ACKNOWLEDGEMENT.to_owned()),
            Self::Rejected(fault) => Value::String(fault.into_message()),
        }
    }
}

/// Folds the outcome of a `mode` operation into a response.
#[must_use]
pub fn normalize(mode: Mode, outcome: Result<Bytes, Fault>) -> NormalizedResponse {
    match (mode, outcome) {
        (Mode::Read, Ok(payload)) => match serde_json::from_slice(&payload) {
            Ok(value) => NormalizedResponse::Record(value),
            Err(e) => NormalizedResponse::Rejected(Fault::malformed_payload(format!(
                "ledger returned a payload that is not valid JSON: {e}"
            ))),
        },
        (Mode::Write, Ok(_)) => NormalizedResponse::Acknowledged,
        (_, Err(fault)) => NormalizedResponse::Rejected(fault),
    }
}
