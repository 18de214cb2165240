pub mod config;
pub mod error;
pub mod transform;
pub mod types;

pub use error::{SaltpackError, SaltpackResult};
pub use transform::{Pipe, StreamGuard, Transform};
pub use types::{MessageMode, MessageType};
