//! 核心层：错误分类、应用装配、优雅关闭

pub mod builder;
pub mod error;
pub mod shutdown;

pub use builder::AppBuilder;
pub use error::{ErrorKind, SageError};
pub use shutdown::{ShutdownManager, ShutdownReason};
