//! The dummy-graphite metrics load generation tool.
//!
//! This library supports the `dummy_graphite` binary found elsewhere in this
//! project. It fabricates Graphite plaintext metrics, see
//! [`dummy_graphite_payload`], and streams them over TCP to a collection
//! endpoint.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod generator;
pub mod signals;
