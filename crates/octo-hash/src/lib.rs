//! Object identity for the octo merge engine.
//!
//! Provides [`ObjectId`], the [`HashAlgorithm`] selector, hex helpers and a
//! streaming [`hasher::Hasher`] that computes git object ids.

mod algorithm;
mod error;
pub mod hasher;
pub mod hex;
mod oid;

pub use algorithm::HashAlgorithm;
pub use error::HashError;
pub use oid::ObjectId;
