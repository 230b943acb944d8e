use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::TranslationError;
use crate::translate::Translator;

const REQWEST_TIMEOUT: u64 = 10;
const TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";

/// Google 翻译（免费网页接口）
pub struct GoogleTranslator {
    client: reqwest::Client,
}

impl GoogleTranslator {
    pub fn new() -> Result<Self, TranslationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQWEST_TIMEOUT))
            .build()?;

        Ok(Self { client })
    }
}

/// 拼接响应中 `[0][i][0]` 的所有译文片段
fn parse_translation(json: &Value) -> Result<String, TranslationError> {
    let segments = json
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslationError::Malformed("缺少译文片段".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    if translated.is_empty() {
        return Err(TranslationError::Malformed("译文为空".to_string()));
    }
    Ok(translated)
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> Result<String, TranslationError> {
        // 间奏等空行无需请求
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let resp = self
            .client
            .get(TRANSLATE_URL)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target_language),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TranslationError::Status(status.as_u16()));
        }

        let json: Value = resp.json().await?;
        let translated = parse_translation(&json)?;
        debug!("翻译: '{}' -> '{}'", text, translated);
        Ok(translated)
    }
}
