//! Protocol generations for the Sidetree pipeline.
//!
//! A protocol generation is an immutable bundle of parameters that applies
//! from a given transaction time onward. This crate holds:
//! - [`ProtocolParameters`] and their validation
//! - [`ProtocolRegistry`] selecting parameters by transaction time
//! - [`ArtifactCodec`] for core index, provisional index, and chunk files
//! - [`OperationParser`] for ingress validation of client requests
//! - [`RequestBuilder`] for building signed requests client-side
//! - [`InitialState`] carried by long-form DIDs
//! - shared signature, commitment, and delta checks used by the resolver

pub mod artifacts;
pub mod client;
pub mod compression;
pub mod error;
pub mod initial_state;
pub mod params;
pub mod parser;
pub mod registry;
pub mod validation;

pub use artifacts::{
    ArtifactCodec, ChunkFile, ChunkReference, CoreIndexFile, CoreOperations, CreateReference,
    ProvisionalIndexFile, ProvisionalOperations, SignedReference,
};
pub use client::{DocumentKeys, RequestBuilder};
pub use compression::CompressionAlgorithm;
pub use error::{ProtocolError, ProtocolResult};
pub use initial_state::InitialState;
pub use params::ProtocolParameters;
pub use parser::{OperationParser, ParsedOperation};
pub use registry::ProtocolRegistry;
pub use validation::{
    check_multihash, delta_hash_matches, open_signed, unique_suffix, validate_delta, verify_signed,
};
