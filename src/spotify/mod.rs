// Spotify 交互模块
// 播放状态查询与同步歌词获取

mod client;

use async_trait::async_trait;

use crate::error::SpotifyError;
use crate::lyrics::LyricLine;

pub use client::SpotifyClient;

/// 曲目信息，按 ID 比较判断是否切歌
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Track {
    /// 唯一ID
    pub id: String,
    /// 歌曲标题
    pub title: String,
    /// 艺术家
    pub artist: String,
    /// 专辑
    pub album: String,
    /// 歌曲时长（毫秒）
    pub duration_ms: u64,
}

/// 某一时刻的播放状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackState {
    pub track: Track,
    /// 已播放时长（毫秒），不超过曲目时长
    pub position_ms: u64,
    pub is_playing: bool,
}

/// 歌词源返回的原始同步歌词
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLyrics {
    /// 检测到的原文语言
    pub language: String,
    pub lines: Vec<LyricLine>,
}

/// 播放状态查询接口
#[async_trait]
pub trait PlaybackClient: Send + Sync {
    /// 当前播放状态，没有播放内容时返回 `None`
    async fn current_playback(&self) -> Result<Option<PlaybackState>, SpotifyError>;
}

/// 同步歌词获取接口
#[async_trait]
pub trait LyricsSource: Send + Sync {
    /// 获取曲目的同步歌词，没有歌词时返回 `SpotifyError::NotFound`
    async fn lyrics(&self, track_id: &str) -> Result<RemoteLyrics, SpotifyError>;
}
