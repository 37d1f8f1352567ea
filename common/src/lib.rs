pub mod chunk;
pub mod distributor;
pub mod error;
pub mod metadata;
pub mod path;
pub mod rpc;

pub use error::GkfsError;
