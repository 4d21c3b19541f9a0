//! CLI commands implementation

pub mod health;
pub mod index;
pub mod init;
pub mod status;
pub mod sync;

pub use health::*;
pub use index::*;
pub use init::*;
pub use status::*;
pub use sync::*;
