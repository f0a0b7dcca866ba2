pub mod engine;
pub mod message;
pub mod peers;
pub mod pending;
pub mod session;

pub use engine::*;
pub use message::*;
pub use peers::*;
pub use pending::*;
pub use session::*;
