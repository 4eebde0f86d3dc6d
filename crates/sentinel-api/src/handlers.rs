//! Request handlers.

pub mod email;
pub mod health;
pub mod index;
pub mod init;
pub mod summarize;
pub mod translations;

pub use email::*;
pub use health::*;
pub use index::*;
pub use init::*;
pub use summarize::*;
pub use translations::*;
