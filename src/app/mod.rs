mod core;

pub use self::core::{cache_info, clear_cache, is_auth_failure, App};
