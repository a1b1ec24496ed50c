mod command;
mod runner;
mod util;

pub use command::Command;
pub use runner::{OutputMode, run_shell, run_with_format};
pub use util::{load_seed, parse_output_mode, render_parse_error};
