pub mod error;
pub mod http;
pub mod interface;
pub mod memory;

pub use error::{BackendError, BackendResult};
pub use http::HttpBackend;
pub use interface::{
    AuthProvider, Backend, Bucket, ObjectStorage, ProfileStore, RowChange, VerificationStore,
};
pub use memory::{Fault, MemoryBackend, Operation, ReviewDecision};
