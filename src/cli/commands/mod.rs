pub mod config;
pub mod convert;
pub mod generate;
pub mod outline;
pub mod probe;
pub mod status;
