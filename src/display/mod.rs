// 终端显示模块

mod manager;
mod renderer;

pub use manager::{run_display_manager, DisplayManager};
pub use renderer::*;
