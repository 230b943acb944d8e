mod cache;
mod pipeline;

use serde::{Deserialize, Serialize};

pub use cache::{CacheSnapshot, TranslationCache, DEFAULT_CACHE_CAPACITY};
pub use pipeline::{LyricsPipeline, PipelineEvent, PipelineState};

/// 没有歌词时显示的占位文本
pub const NO_LYRICS_PLACEHOLDER: &str = "(No lyrics available)";

/// 表示单行歌词
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    /// 开始时间（毫秒）
    pub offset_ms: u64,
    /// 原文，空字符串表示间奏
    pub text: String,
    /// 译文，翻译完成前为空
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated: Option<String>,
}

impl LyricLine {
    pub fn new(offset_ms: u64, text: impl Into<String>) -> Self {
        Self {
            offset_ms,
            text: text.into(),
            translated: None,
        }
    }

    /// 译文，未翻译时为空字符串
    pub fn translated_text(&self) -> &str {
        self.translated.as_deref().unwrap_or("")
    }
}

/// 一首歌完整的同步歌词
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricSequence {
    /// 歌词原文语言
    #[serde(default)]
    pub language: Option<String>,
    /// 翻译后的歌名
    #[serde(default)]
    pub translated_title: Option<String>,
    /// 按时间排序的歌词行
    pub lines: Vec<LyricLine>,
}

impl LyricSequence {
    /// 构造歌词序列，按时间稳定排序
    pub fn new(language: Option<String>, mut lines: Vec<LyricLine>) -> Self {
        lines.sort_by_key(|line| line.offset_ms);
        Self {
            language,
            translated_title: None,
            lines,
        }
    }

    /// 无歌词时的单行占位序列
    pub fn placeholder() -> Self {
        Self {
            language: None,
            translated_title: None,
            lines: vec![LyricLine::new(0, NO_LYRICS_PLACEHOLDER)],
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.language.is_none()
            && self.lines.len() == 1
            && self.lines[0].text == NO_LYRICS_PLACEHOLDER
    }

    /// 所有行都有译文
    pub fn is_translated(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(|line| line.translated.is_some())
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sorts_stably_by_offset() {
        let seq = LyricSequence::new(
            Some("ja".to_string()),
            vec![
                LyricLine::new(2000, "c"),
                LyricLine::new(0, "a"),
                LyricLine::new(2000, "d"),
                LyricLine::new(1000, "b"),
            ],
        );

        let texts: Vec<&str> = seq.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_placeholder() {
        let seq = LyricSequence::placeholder();
        assert_eq!(seq.len(), 1);
        assert!(seq.is_placeholder());
        assert!(!seq.is_translated());
        assert_eq!(seq.lines[0].translated_text(), "");
    }
}
