//! Signature verification and event parsing: turns a raw webhook
//! delivery into a [`payhook_core::event::ParsedEvent`] the convergence
//! engine can act on, rejecting anything that isn't byte-exactly signed by
//! the endpoint secret.

mod parse;
mod verify;

pub use parse::{parse_from_envelope, parse_from_raw_body};
pub use verify::{verify, VerifiedEventHeader, VerifyError, DEFAULT_TOLERANCE};
