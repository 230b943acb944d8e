use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::error::SpotifyError;
use crate::lyrics::{LyricSequence, TranslationCache};
use crate::spotify::{LyricsSource, Track};
use crate::translate::TranslationPool;

/// 单首歌的歌词处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Fetching,
    Translating,
    Ready,
    /// 没有歌词，本次会话内不再重试
    Unavailable,
}

/// 歌词处理结果，均带有所属曲目 ID
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// 已获取原文，翻译进行中
    Fetched {
        track_id: String,
        lyrics: LyricSequence,
    },
    /// 翻译完成或命中缓存
    Ready {
        track_id: String,
        lyrics: LyricSequence,
        from_cache: bool,
    },
    /// 没有可用歌词。`permanent` 为 false 表示获取时出现临时错误
    Unavailable { track_id: String, permanent: bool },
}

impl PipelineEvent {
    pub fn track_id(&self) -> &str {
        match self {
            PipelineEvent::Fetched { track_id, .. }
            | PipelineEvent::Ready { track_id, .. }
            | PipelineEvent::Unavailable { track_id, .. } => track_id,
        }
    }

    /// 事件到达后该曲目所处的状态
    pub fn state(&self) -> PipelineState {
        match self {
            PipelineEvent::Fetched { .. } => PipelineState::Translating,
            PipelineEvent::Ready { .. } => PipelineState::Ready,
            PipelineEvent::Unavailable { .. } => PipelineState::Unavailable,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 歌词获取与翻译流水线
///
/// `request` 只负责派发，不会阻塞调用方；结果通过 `next_event` 依次取回。
/// 切歌时不会取消旧曲目的翻译任务，旧结果照常写入缓存，
/// 是否应用到界面由调用方比较曲目 ID 决定。
pub struct LyricsPipeline {
    source: Arc<dyn LyricsSource>,
    pool: TranslationPool,
    cache: Arc<Mutex<TranslationCache>>,
    /// 串行化缓存写盘，保证后写入的内容最后落盘
    writer: Arc<Mutex<()>>,
    /// 本次会话内确认没有歌词的曲目
    unavailable: HashSet<String>,
    /// 处理中的曲目，以及已获取但尚未翻译完成的原文
    in_flight: HashMap<String, Option<LyricSequence>>,
    current_track: Option<String>,
    state: PipelineState,
    events_tx: UnboundedSender<PipelineEvent>,
    events_rx: UnboundedReceiver<PipelineEvent>,
}

impl LyricsPipeline {
    pub fn new(
        source: Arc<dyn LyricsSource>,
        pool: TranslationPool,
        cache: Arc<Mutex<TranslationCache>>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            source,
            pool,
            cache,
            writer: Arc::new(Mutex::new(())),
            unavailable: HashSet::new(),
            in_flight: HashMap::new(),
            current_track: None,
            state: PipelineState::Idle,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn current_track(&self) -> Option<&str> {
        self.current_track.as_deref()
    }

    pub fn cache(&self) -> Arc<Mutex<TranslationCache>> {
        Arc::clone(&self.cache)
    }

    /// 为新曲目获取并翻译歌词，之前曲目的在途任务不受影响
    pub fn request(&mut self, track: &Track) {
        self.current_track = Some(track.id.clone());

        if self.unavailable.contains(&track.id) {
            debug!("{} 已知没有歌词，跳过获取", track.id);
            self.state = PipelineState::Unavailable;
            self.emit(PipelineEvent::Unavailable {
                track_id: track.id.clone(),
                permanent: true,
            });
            return;
        }

        if let Some(fetched) = self.in_flight.get(&track.id) {
            debug!("{} 仍在处理中，不重复获取", track.id);
            match fetched.clone() {
                Some(lyrics) => {
                    self.state = PipelineState::Translating;
                    self.emit(PipelineEvent::Fetched {
                        track_id: track.id.clone(),
                        lyrics,
                    });
                }
                None => self.state = PipelineState::Fetching,
            }
            return;
        }

        self.state = PipelineState::Fetching;
        self.in_flight.insert(track.id.clone(), None);
        debug!("开始获取歌词: {} - {} ({})", track.title, track.artist, track.id);

        let source = Arc::clone(&self.source);
        let pool = self.pool.clone();
        let cache = Arc::clone(&self.cache);
        let writer = Arc::clone(&self.writer);
        let events = self.events_tx.clone();
        let track = track.clone();
        tokio::spawn(async move {
            process_track(source, pool, cache, writer, track, events).await;
        });
    }

    /// 等待下一个处理结果，同时推进状态机
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        loop {
            let event = self.events_rx.recv().await?;
            if self.observe(&event) {
                return Some(event);
            }
            debug!("丢弃已完成曲目的重复原文: {}", event.track_id());
        }
    }

    /// 更新处理状态。已完成曲目的原文事件返回 false
    fn observe(&mut self, event: &PipelineEvent) -> bool {
        match event {
            PipelineEvent::Fetched { track_id, lyrics } => match self.in_flight.get_mut(track_id) {
                Some(slot) => *slot = Some(lyrics.clone()),
                None => return false,
            },
            PipelineEvent::Ready { track_id, .. } => {
                self.in_flight.remove(track_id);
            }
            PipelineEvent::Unavailable {
                track_id,
                permanent,
            } => {
                self.in_flight.remove(track_id);
                if *permanent {
                    self.unavailable.insert(track_id.clone());
                }
            }
        }

        if self.current_track.as_deref() == Some(event.track_id()) {
            self.state = event.state();
        }
        true
    }

    fn emit(&self, event: PipelineEvent) {
        // 接收端与发送端同属本结构体，发送不会失败
        let _ = self.events_tx.send(event);
    }
}

fn send(events: &UnboundedSender<PipelineEvent>, event: PipelineEvent) {
    if events.send(event).is_err() {
        debug!("歌词流水线已关闭，丢弃结果");
    }
}

/// 单首歌的完整处理：获取 -> 查缓存 -> 翻译 -> 写缓存
async fn process_track(
    source: Arc<dyn LyricsSource>,
    pool: TranslationPool,
    cache: Arc<Mutex<TranslationCache>>,
    writer: Arc<Mutex<()>>,
    track: Track,
    events: UnboundedSender<PipelineEvent>,
) {
    let remote = match source.lyrics(&track.id).await {
        Ok(remote) => remote,
        Err(SpotifyError::NotFound(reason)) => {
            info!("未找到歌词: {} - {} ({})", track.title, track.artist, reason);
            send(
                &events,
                PipelineEvent::Unavailable {
                    track_id: track.id,
                    permanent: true,
                },
            );
            return;
        }
        Err(e) => {
            warn!("获取歌词失败: {} - {}, 错误: {}", track.title, track.artist, e);
            send(
                &events,
                PipelineEvent::Unavailable {
                    track_id: track.id,
                    permanent: false,
                },
            );
            return;
        }
    };

    let lyrics = LyricSequence::new(Some(remote.language), remote.lines);

    let cached = lock(&cache).get(&track.id).cloned();
    if let Some(cached) = cached {
        debug!("命中翻译缓存: {}", track.id);
        send(
            &events,
            PipelineEvent::Ready {
                track_id: track.id,
                lyrics: cached,
                from_cache: true,
            },
        );
        return;
    }

    info!(
        "成功获取歌词: {} - {}, 语言: {}, 共{}行",
        track.title,
        track.artist,
        lyrics.language.as_deref().unwrap_or("?"),
        lyrics.len()
    );
    send(
        &events,
        PipelineEvent::Fetched {
            track_id: track.id.clone(),
            lyrics: lyrics.clone(),
        },
    );

    let batch = pool.translate_batch(&track.title, lyrics.lines).await;
    let translated = LyricSequence {
        language: lyrics.language,
        translated_title: Some(batch.title),
        lines: batch.lines,
    };

    // 缓存锁只覆盖写入与序列化，磁盘 IO 在锁外的阻塞线程中进行
    let track_id = track.id.clone();
    let to_store = translated.clone();
    let stored = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let _writer = lock(&writer);
        let snapshot = {
            let mut cache = lock(&cache);
            cache.put(track_id, to_store);
            cache.snapshot()?
        };
        match snapshot {
            Some(snapshot) => snapshot.write(),
            None => Ok(()),
        }
    })
    .await;
    match stored {
        Ok(Ok(())) => debug!("已缓存 {} 的翻译", track.id),
        Ok(Err(e)) => error!("保存翻译缓存失败: {:#}", e),
        Err(e) => error!("缓存写入任务异常: {}", e),
    }

    info!("翻译完成: {} - {}", track.title, track.artist);
    send(
        &events,
        PipelineEvent::Ready {
            track_id: track.id,
            lyrics: translated,
            from_cache: false,
        },
    );
}
