use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::lyrics::DEFAULT_CACHE_CAPACITY;
use crate::player::DEFAULT_POLL_INTERVAL;
use crate::translate::DEFAULT_WORKERS;

pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// 播放状态轮询设置
    pub playback: PlaybackConfig,

    /// 翻译设置
    pub translation: TranslationConfig,

    /// 翻译缓存设置
    pub cache: CacheConfig,

    /// 歌词显示设置
    pub display: DisplayConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PlaybackConfig {
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TranslationConfig {
    /// 目标语言代码
    pub target_language: String,

    /// 并发翻译的工作者数量
    pub workers: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// 最多缓存多少首歌的翻译
    pub capacity: usize,

    /// 缓存文件路径
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    /// 是否显示时间戳
    pub show_timestamp: bool,

    /// 是否显示译文
    pub show_translation: bool,

    /// 是否显示当前播放进度
    pub show_progress: bool,

    /// 是否启用简单输出模式（适用于waybar等外部集成）
    pub simple_output: bool,

    /// 歌词前后显示的行数
    pub context_lines: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_language: "en".to_string(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        let path = dirs::data_dir()
            .map(|p| p.join(PKG_NAME).join("lyrics_cache.json"))
            .unwrap_or_else(|| PathBuf::from("lyrics_cache.json"));

        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            path: path.to_string_lossy().to_string(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_timestamp: true,
            show_translation: true,
            show_progress: true,
            simple_output: false,
            context_lines: 2,
        }
    }
}

/// 默认配置文件路径
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join(PKG_NAME).join("config.toml"))
        .unwrap_or_else(|| PathBuf::from(format!("{}-config.toml", PKG_NAME)))
}

impl Config {
    /// 加载配置，支持从指定路径或默认路径加载
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(default_config_path);

        debug!("尝试从 {:?} 加载配置文件", config_path);

        if !config_path.exists() {
            debug!("配置文件 {:?} 不存在，将创建默认配置", config_path);
            let default_config = Config::default();
            let toml = toml::to_string_pretty(&default_config)?;

            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("创建配置目录 {:?} 失败", parent))?;
                debug!("已确保目录 {:?} 存在", parent);
            }

            fs::write(&config_path, toml)
                .with_context(|| format!("写入默认配置 {:?} 失败", config_path))?;
            info!("已创建默认配置文件: {:?}", config_path);
            return Ok(default_config);
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("读取配置文件 {:?} 失败", config_path))?;
        let config: Config = match toml::from_str(&content) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("解析配置文件 {:?} 失败: {}", config_path, e);
                warn!("由于解析错误，将加载默认配置");
                Config::default()
            }
        };

        debug!("已成功加载配置文件");
        Ok(config.validated())
    }

    /// 把非法的 0 值替换成默认值
    fn validated(mut self) -> Self {
        if self.playback.poll_interval_ms == 0 {
            warn!("playback.poll_interval_ms 不能为 0，使用默认值");
            self.playback.poll_interval_ms = PlaybackConfig::default().poll_interval_ms;
        }
        if self.translation.workers == 0 {
            warn!("translation.workers 不能为 0，使用默认值");
            self.translation.workers = TranslationConfig::default().workers;
        }
        if self.cache.capacity == 0 {
            warn!("cache.capacity 不能为 0，使用默认值");
            self.cache.capacity = CacheConfig::default().capacity;
        }
        if self.translation.target_language.trim().is_empty() {
            self.translation.target_language = TranslationConfig::default().target_language;
        }
        self
    }

    pub fn cache_path(&self) -> PathBuf {
        PathBuf::from(&self.cache.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load(Some(path.clone())).unwrap();

        assert!(path.exists());
        assert_eq!(config.playback.poll_interval_ms, 500);
        assert_eq!(config.translation.workers, 4);
        assert_eq!(config.cache.capacity, 1000);
        assert_eq!(config.translation.target_language, "en");
    }

    #[test]
    fn test_defaults_follow_component_constants() {
        let config = Config::default();
        assert_eq!(
            config.playback.poll_interval_ms,
            DEFAULT_POLL_INTERVAL.as_millis() as u64
        );
        assert_eq!(config.translation.workers, DEFAULT_WORKERS);
        assert_eq!(config.cache.capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[translation]\ntarget_language = \"de\"\n").unwrap();

        let config = Config::load(Some(path)).unwrap();

        assert_eq!(config.translation.target_language, "de");
        assert_eq!(config.translation.workers, 4);
        assert!(config.display.show_translation);
    }

    #[test]
    fn test_broken_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let config = Config::load(Some(path)).unwrap();

        assert_eq!(config.cache.capacity, 1000);
    }

    #[test]
    fn test_zero_values_are_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[playback]\npoll_interval_ms = 0\n[translation]\nworkers = 0\n[cache]\ncapacity = 0\n",
        )
        .unwrap();

        let config = Config::load(Some(path)).unwrap();

        assert_eq!(config.playback.poll_interval_ms, 500);
        assert_eq!(config.translation.workers, 4);
        assert_eq!(config.cache.capacity, 1000);
    }
}
