//! Kernel control-channel client: sequence-numbered request/response
//! multiplexing over the wire format in the `kctl` crate.

mod client;
mod pending;
mod requests;
mod sequence;

pub use client::KernelClient;
pub use pending::Continuation;
pub use sequence::SequenceAllocator;
