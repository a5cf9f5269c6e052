pub mod commands;
pub mod ui;
pub mod util;

pub use util::{CommandContext, cancel_on_ctrl_c};
