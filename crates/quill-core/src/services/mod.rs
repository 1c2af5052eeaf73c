//! Application services built on the ports.

mod policy;
mod post_writer;

pub use policy::OwnerPolicy;
pub use post_writer::PostWriteCoordinator;
