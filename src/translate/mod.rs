// 翻译模块

mod google;
mod pool;

use async_trait::async_trait;

use crate::error::TranslationError;

pub use google::GoogleTranslator;
pub use pool::{TranslatedBatch, TranslationPool, DEFAULT_WORKERS};

/// 文本翻译接口，源语言自动检测
#[async_trait]
pub trait Translator: Send + Sync {
    /// 把单个字符串翻译为目标语言
    async fn translate(&self, text: &str, target_language: &str)
        -> Result<String, TranslationError>;
}
