//! Store interfaces (event dedupe, records, object lookup) and their
//! in-memory reference implementations. Persistent backends implement the
//! same traits against a relational store; a unique constraint on
//! `event_id` and on each provider-id column is the persistence-level
//! primitive enforcing exactly-once admission and index consistency.

pub mod dedupe;
pub mod events;
pub mod lookup;
pub mod records;
