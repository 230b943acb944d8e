use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::SpotifyError;
use crate::lyrics::{LyricLine, LyricSequence, LyricsPipeline, PipelineEvent, PipelineState};
use crate::spotify::{PlaybackClient, PlaybackState, Track};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 当前可展示的播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    /// 没有正在播放的内容（或本次轮询失败）
    NoTrack,
    Playing,
    Paused,
    /// 会话失效，需要重新登录
    AuthRequired,
}

/// 每次轮询后发布给界面的只读快照
#[derive(Debug, Clone)]
pub struct TrackerSnapshot {
    pub track: Option<Track>,
    pub position_ms: u64,
    pub is_playing: bool,
    pub status: TrackerStatus,
    pub pipeline_state: PipelineState,
    /// 当前曲目的歌词，整体替换，不做逐行修改
    pub lyrics: Arc<LyricSequence>,
    pub current_line: Option<usize>,
}

impl Default for TrackerSnapshot {
    fn default() -> Self {
        Self {
            track: None,
            position_ms: 0,
            is_playing: false,
            status: TrackerStatus::NoTrack,
            pipeline_state: PipelineState::Idle,
            lyrics: Arc::new(LyricSequence::default()),
            current_line: None,
        }
    }
}

impl TrackerSnapshot {
    /// 播放进度百分比
    pub fn progress_percent(&self) -> f64 {
        match &self.track {
            Some(track) if track.duration_ms > 0 => {
                self.position_ms as f64 / track.duration_ms as f64 * 100.0
            }
            _ => 0.0,
        }
    }

    pub fn current(&self) -> Option<&LyricLine> {
        self.current_line.and_then(|i| self.lyrics.lines.get(i))
    }
}

/// 找出当前播放位置对应的歌词行
///
/// 取最后一个开始时间不晚于 `position_ms` 的行；时间相同时取序列中靠后的一行。
/// 未播放（`None`）或位置早于第一行时没有当前行。
pub fn resolve_current_line(lines: &[LyricLine], position_ms: Option<u64>) -> Option<usize> {
    let position = position_ms?;
    let count = lines.partition_point(|line| line.offset_ms <= position);
    count.checked_sub(1)
}

/// 播放跟踪器：周期轮询播放状态，检测切歌并驱动歌词流水线
pub struct PlaybackTracker {
    client: Arc<dyn PlaybackClient>,
    pipeline: LyricsPipeline,
    poll_interval: Duration,
    /// 最近一次识别到的曲目，用于判断是否切歌
    current_track: Option<Track>,
    /// 本次轮询的播放状态，没有播放时为空
    playback: Option<PlaybackState>,
    lyrics: Arc<LyricSequence>,
    current_line: Option<usize>,
    status: TrackerStatus,
    snapshot_tx: watch::Sender<TrackerSnapshot>,
}

impl PlaybackTracker {
    pub fn new(
        client: Arc<dyn PlaybackClient>,
        pipeline: LyricsPipeline,
        poll_interval: Duration,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(TrackerSnapshot::default());
        Self {
            client,
            pipeline,
            poll_interval,
            current_track: None,
            playback: None,
            lyrics: Arc::new(LyricSequence::default()),
            current_line: None,
            status: TrackerStatus::NoTrack,
            snapshot_tx,
        }
    }

    /// 订阅快照更新
    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn pipeline(&self) -> &LyricsPipeline {
        &self.pipeline
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    pub fn lyrics(&self) -> &LyricSequence {
        &self.lyrics
    }

    pub fn current_line(&self) -> Option<usize> {
        self.current_line
    }

    pub fn status(&self) -> TrackerStatus {
        self.status
    }

    /// 启动轮询循环。翻译结果在两次轮询之间到达时立即应用
    ///
    /// 会话失效后不再轮询，返回 `SpotifyError::Auth` 交由调用方重新获取凭据。
    pub async fn run(mut self) -> Result<(), SpotifyError> {
        info!("播放跟踪器启动，轮询间隔 {:?}", self.poll_interval);

        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await?;
                }
                Some(event) = self.pipeline.next_event() => {
                    if self.apply_pipeline_event(event) {
                        self.publish();
                    }
                }
            }
        }
    }

    /// 执行一次轮询。临时错误被吸收，只有会话失效会返回错误
    pub async fn tick(&mut self) -> Result<(), SpotifyError> {
        let result = match self.client.current_playback().await {
            Ok(Some(state)) => {
                self.on_playback(state);
                Ok(())
            }
            Ok(None) => {
                self.on_idle(TrackerStatus::NoTrack);
                Ok(())
            }
            Err(e) if e.is_auth() => {
                error!("获取播放状态失败，需要重新登录: {}", e);
                self.on_idle(TrackerStatus::AuthRequired);
                Err(e)
            }
            Err(e) => {
                warn!("获取播放状态失败: {}", e);
                self.on_idle(TrackerStatus::NoTrack);
                Ok(())
            }
        };

        self.publish();
        result
    }

    fn on_idle(&mut self, status: TrackerStatus) {
        self.playback = None;
        self.current_line = None;
        self.status = status;
    }

    fn on_playback(&mut self, state: PlaybackState) {
        let changed = self
            .current_track
            .as_ref()
            .map_or(true, |track| track.id != state.track.id);

        if changed {
            info!(
                "当前播放: {} - {} ({})",
                state.track.title, state.track.artist, state.track.id
            );
            self.current_line = None;
            self.lyrics = Arc::new(LyricSequence::default());
            self.pipeline.request(&state.track);
            self.current_track = Some(state.track.clone());
        }

        self.current_line = resolve_current_line(&self.lyrics.lines, Some(state.position_ms));
        self.status = if state.is_playing {
            TrackerStatus::Playing
        } else {
            TrackerStatus::Paused
        };
        self.playback = Some(state);
    }

    /// 应用流水线结果。结果不属于当前曲目时丢弃并返回 false
    pub fn apply_pipeline_event(&mut self, event: PipelineEvent) -> bool {
        let current_id = self.current_track.as_ref().map(|t| t.id.as_str());
        if current_id != Some(event.track_id()) {
            debug!(
                "丢弃过期的歌词结果: {} (当前: {:?})",
                event.track_id(),
                current_id
            );
            return false;
        }

        let lyrics = match event {
            PipelineEvent::Fetched { lyrics, .. } => lyrics,
            PipelineEvent::Ready {
                track_id,
                lyrics,
                from_cache,
            } => {
                if from_cache {
                    info!("使用缓存的翻译: {}", track_id);
                }
                lyrics
            }
            PipelineEvent::Unavailable { .. } => LyricSequence::placeholder(),
        };
        self.lyrics = Arc::new(lyrics);

        let position = self.playback.as_ref().map(|p| p.position_ms);
        self.current_line = resolve_current_line(&self.lyrics.lines, position);
        true
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            track: self.playback.as_ref().map(|p| p.track.clone()),
            position_ms: self.playback.as_ref().map_or(0, |p| p.position_ms),
            is_playing: self.playback.as_ref().is_some_and(|p| p.is_playing),
            status: self.status,
            pipeline_state: self.pipeline.state(),
            lyrics: Arc::clone(&self.lyrics),
            current_line: self.current_line,
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}
