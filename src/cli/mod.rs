pub mod commands;
pub mod ui;
pub mod util;

pub use ui::Output;
pub use util::read_text_input;
