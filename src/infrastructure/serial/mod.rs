pub mod backend;
pub mod system;
pub mod virt;

pub use backend::{SerialBackend, SerialHandle};
pub use system::SystemBackend;
pub use virt::VirtualBackend;
