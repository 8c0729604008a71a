/// Typed views of the raw partition values.
pub mod models;
/// Path-addressable remote store abstraction and its backends.
pub mod remote_store;
/// Storage error types shared by every backend.
pub mod storage;
