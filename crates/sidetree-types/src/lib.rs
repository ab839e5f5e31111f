//! Foundation types for the Sidetree operation pipeline.
//!
//! Every other crate in the workspace depends on `sidetree-types`. Nothing in
//! here performs I/O or cryptography; the types only describe identifiers,
//! ordering, and the JSON models exchanged between clients, artifacts, and
//! the operation store.
//!
//! # Key Types
//!
//! - [`Namespace`] / [`ChannelId`] / [`Endpoint`]: routing identifiers
//! - [`UniqueSuffix`]: stable document identifier derived from create data
//! - [`CasAddress`]: content address of an artifact
//! - [`TxnPosition`]: `(transaction_time, transaction_number, operation_index)`
//! - [`AnchorString`]: `<cas_address>.<op_count>` ledger payload
//! - [`OperationRequest`] / [`Operation`]: client request and anchored operation
//! - [`Patch`]: document patch actions

pub mod address;
pub mod anchor;
pub mod error;
pub mod hash;
pub mod id;
pub mod operation;
pub mod patch;
pub mod position;

pub use address::CasAddress;
pub use anchor::AnchorString;
pub use error::TypeError;
pub use hash::HashAlgorithm;
pub use id::{ChannelId, Did, Endpoint, Namespace, UniqueSuffix};
pub use operation::{
    DeactivateSignedPayload, Delta, Operation, OperationRequest, OperationType,
    RecoverSignedPayload, SuffixData, UpdateSignedPayload,
};
pub use patch::{JsonPatchOp, Patch, PatchAction, PublicKeyEntry, PublicKeyJwk, ServiceEntry};
pub use position::TxnPosition;
