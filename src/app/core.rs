use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::{Config, Credentials};
use crate::display;
use crate::error::SpotifyError;
use crate::lyrics::{LyricsPipeline, TranslationCache};
use crate::player::PlaybackTracker;
use crate::spotify::SpotifyClient;
use crate::translate::{GoogleTranslator, TranslationPool};

pub struct App {
    config: Arc<Config>,
    credentials: Credentials,
}

impl App {
    /// 创建新应用实例
    pub fn new(config: Arc<Config>, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
        }
    }

    /// 组装各组件
    fn build_tracker(&self) -> Result<PlaybackTracker> {
        let spotify = Arc::new(
            SpotifyClient::new(self.credentials.sp_dc.clone()).context("创建 Spotify 客户端失败")?,
        );
        debug!("Spotify 客户端创建完成");

        let translator = Arc::new(GoogleTranslator::new().context("创建翻译客户端失败")?);
        let pool = TranslationPool::new(
            translator,
            self.config.translation.target_language.clone(),
            self.config.translation.workers,
        );
        debug!(
            "翻译工作池创建完成: 目标语言 {}, {} 个工作者",
            pool.target_language(),
            pool.workers()
        );

        let cache = TranslationCache::load(self.config.cache_path(), self.config.cache.capacity);
        info!("已加载 {} 首歌的翻译缓存", cache.len());

        let pipeline = LyricsPipeline::new(spotify.clone(), pool, Arc::new(Mutex::new(cache)));
        Ok(PlaybackTracker::new(
            spotify,
            pipeline,
            Duration::from_millis(self.config.playback.poll_interval_ms),
        ))
    }

    /// 运行应用，直到收到 Ctrl-C
    ///
    /// 会话失效时返回包装了 `SpotifyError::Auth` 的错误。
    pub async fn run(&mut self) -> Result<()> {
        debug!("开始运行应用...");

        let tracker = self.build_tracker()?;
        let snapshots = tracker.subscribe();

        let mut tracker_handle = tokio::spawn(tracker.run());

        let config = Arc::clone(&self.config);
        let display_handle = tokio::spawn(async move {
            if let Err(e) = display::run_display_manager(config, snapshots).await {
                error!("显示管理器运行失败: {}", e);
            }
        });

        debug!("所有组件已启动，等待运行...");
        let outcome = tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("收到退出信号"),
                    Err(e) => error!("监听退出信号失败: {}", e),
                }
                Ok(())
            }
            result = &mut tracker_handle => {
                match result {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.into()),
                    Err(e) => Err(anyhow::anyhow!("播放跟踪器任务出错: {}", e)),
                }
            }
            result = display_handle => {
                if let Err(e) = result {
                    error!("显示管理器任务出错: {}", e);
                }
                Ok(())
            }
        };

        tracker_handle.abort();
        debug!("应用执行完毕");
        outcome
    }
}

/// 错误链中是否含有会话失效
pub fn is_auth_failure(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<SpotifyError>())
        .any(SpotifyError::is_auth)
}

/// 缓存概况
pub fn cache_info(config: &Config) -> String {
    let path = config.cache_path();
    let cache = TranslationCache::load(&path, config.cache.capacity);
    format!(
        "Cache file: {}\nEntries: {} / {}",
        path.display(),
        cache.len(),
        cache.capacity()
    )
}

/// 清空缓存并写回磁盘
pub fn clear_cache(config: &Config) -> Result<usize> {
    let mut cache = TranslationCache::load(config.cache_path(), config.cache.capacity);
    let removed = cache.len();
    cache.clear();
    cache.save()?;
    info!("已清除 {} 条翻译缓存", removed);
    Ok(removed)
}
