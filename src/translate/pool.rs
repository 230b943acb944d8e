use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::lyrics::LyricLine;
use crate::translate::Translator;

pub const DEFAULT_WORKERS: usize = 4;

/// 一次批量翻译的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedBatch {
    /// 按原始时间顺序排列、已填入译文的歌词行
    pub lines: Vec<LyricLine>,
    /// 翻译后的歌名
    pub title: String,
}

/// 固定并发数的翻译工作池
///
/// 同时在途的请求数不超过 `workers`，完成顺序任意，
/// 但输出始终按输入下标还原为原始顺序。
#[derive(Clone)]
pub struct TranslationPool {
    translator: Arc<dyn Translator>,
    target_language: String,
    workers: usize,
}

impl TranslationPool {
    pub fn new(
        translator: Arc<dyn Translator>,
        target_language: impl Into<String>,
        workers: usize,
    ) -> Self {
        Self {
            translator,
            target_language: target_language.into(),
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// 翻译单个字符串，失败时回退为原文
    async fn translate_or_original(&self, text: &str) -> String {
        match self.translator.translate(text, &self.target_language).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!("翻译 '{}' 失败，使用原文: {}", text, e);
                text.to_string()
            }
        }
    }

    async fn translate_line(&self, mut line: LyricLine) -> LyricLine {
        line.translated = Some(self.translate_or_original(&line.text).await);
        line
    }

    /// 翻译所有歌词行，单行失败不影响其他行
    pub async fn translate_all(&self, lines: Vec<LyricLine>) -> Vec<LyricLine> {
        let total = lines.len();
        let mut slots: Vec<Option<LyricLine>> = vec![None; total];

        let mut completed = stream::iter(lines.into_iter().enumerate())
            .map(|(index, line)| async move { (index, self.translate_line(line).await) })
            .buffer_unordered(self.workers);

        while let Some((index, line)) = completed.next().await {
            slots[index] = Some(line);
        }

        debug!("已完成 {} 行歌词的翻译", total);
        slots.into_iter().flatten().collect()
    }

    pub async fn translate_title(&self, title: &str) -> String {
        self.translate_or_original(title).await
    }

    /// 先翻译歌名，再翻译全部歌词行，在途请求数始终不超过 `workers`
    pub async fn translate_batch(&self, title: &str, lines: Vec<LyricLine>) -> TranslatedBatch {
        let title = self.translate_title(title).await;
        let lines = self.translate_all(lines).await;
        TranslatedBatch { lines, title }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranslationError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 越靠前的行耗时越长，使完成顺序与输入顺序相反
    struct SlowTranslator {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail_on: Option<String>,
    }

    impl SlowTranslator {
        fn new(fail_on: Option<&str>) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                fail_on: fail_on.map(str::to_string),
            }
        }
    }

    #[async_trait]
    impl Translator for SlowTranslator {
        async fn translate(
            &self,
            text: &str,
            target_language: &str,
        ) -> Result<String, TranslationError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = 50u64.saturating_sub(text.len() as u64 * 3);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on.as_deref() == Some(text) {
                return Err(TranslationError::Status(429));
            }
            Ok(format!("{}:{}", target_language, text))
        }
    }

    fn five_lines() -> Vec<LyricLine> {
        (0..5)
            .map(|i| LyricLine::new(i * 1000, "x".repeat(i as usize + 1)))
            .collect()
    }

    #[tokio::test]
    async fn test_output_keeps_offset_order() {
        let translator = Arc::new(SlowTranslator::new(None));
        let pool = TranslationPool::new(translator.clone(), "en", 4);

        let lines = pool.translate_all(five_lines()).await;

        let offsets: Vec<u64> = lines.iter().map(|l| l.offset_ms).collect();
        assert_eq!(offsets, vec![0, 1000, 2000, 3000, 4000]);
        for line in &lines {
            assert_eq!(line.translated_text(), format!("en:{}", line.text));
        }
        assert!(translator.max_in_flight.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_single_line_failure_falls_back_to_original() {
        let translator = Arc::new(SlowTranslator::new(Some("xxx")));
        let pool = TranslationPool::new(translator, "en", 4);

        let lines = pool.translate_all(five_lines()).await;

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[2].offset_ms, 2000);
        assert_eq!(lines[2].translated_text(), "xxx");
        for (i, line) in lines.iter().enumerate().filter(|(i, _)| *i != 2) {
            assert_eq!(line.translated_text(), format!("en:{}", line.text), "line {}", i);
        }
    }

    #[tokio::test]
    async fn test_pool_size_bounds_concurrency() {
        let translator = Arc::new(SlowTranslator::new(None));
        let pool = TranslationPool::new(translator.clone(), "en", 2);

        let lines: Vec<LyricLine> = (0..10).map(|i| LyricLine::new(i, "a")).collect();
        pool.translate_all(lines).await;

        assert_eq!(translator.max_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_batch_stays_within_pool_size() {
        let translator = Arc::new(SlowTranslator::new(None));
        let pool = TranslationPool::new(translator.clone(), "en", 4);

        let lines: Vec<LyricLine> = (0..10).map(|i| LyricLine::new(i, "a")).collect();
        let batch = pool.translate_batch("title", lines).await;

        assert_eq!(batch.title, "en:title");
        assert_eq!(batch.lines.len(), 10);
        assert!(translator.max_in_flight.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_batch_translates_title() {
        let translator = Arc::new(SlowTranslator::new(Some("Title")));
        let pool = TranslationPool::new(translator, "de", 0);
        assert_eq!(pool.workers(), 1);

        let batch = pool
            .translate_batch("Title", vec![LyricLine::new(0, "a")])
            .await;

        assert_eq!(batch.title, "Title");
        assert_eq!(batch.lines[0].translated_text(), "de:a");
    }
}
