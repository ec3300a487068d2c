pub mod candidate;
pub mod config;
pub mod errors;
pub mod result;

pub use candidate::*;
pub use config::*;
pub use errors::*;
pub use result::*;
