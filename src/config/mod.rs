// 配置模块
// 应用配置与会话凭据

mod credentials;
mod loader;

pub use credentials::{default_credentials_path, Credentials, SP_DC_ENV};
pub use loader::*;
