// 应用核心库

// 模块导出
pub mod app;
pub mod config;
pub mod display;
pub mod error;
pub mod lyrics;
pub mod player;
pub mod spotify;
pub mod translate;
pub mod utils;
