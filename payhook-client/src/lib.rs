//! A read-only `reqwest`-backed client against the provider's REST API,
//! implementing [`ObjectLookup`] and feeding the reconciler's event listing. The
//! engine only needs the lookup/listing *contract*, but the contract needs
//! a real implementation somewhere in this repo.

mod client;

pub use client::{HttpProviderClient, ProviderError, SUPPORTED_EVENT_TYPES};
