use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::SpotifyError;
use crate::lyrics::LyricLine;
use crate::spotify::{LyricsSource, PlaybackClient, PlaybackState, RemoteLyrics, Track};

// 常量
const REQWEST_TIMEOUT: u64 = 10;
const TOKEN_URL: &str =
    "https://open.spotify.com/get_access_token?reason=transport&productType=web_player";
const CURRENTLY_PLAYING_URL: &str = "https://api.spotify.com/v1/me/player/currently-playing";
const LYRICS_URL: &str = "https://spclient.wg.spotify.com/color-lyrics/v2/track";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 11_1_0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/88.0.4324.87 Safari/537.36";
/// 令牌到期前提前刷新的余量
const TOKEN_REFRESH_MARGIN_MS: u64 = 5_000;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    access_token_expiration_timestamp_ms: u64,
    #[serde(default)]
    is_anonymous: bool,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at_ms: u64,
}

#[derive(Deserialize, Debug)]
struct CurrentlyPlaying {
    progress_ms: Option<u64>,
    #[serde(default)]
    is_playing: bool,
    item: Option<PlayingItem>,
}

#[derive(Deserialize, Debug)]
struct PlayingItem {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<Named>,
    album: Option<Named>,
    duration_ms: u64,
}

#[derive(Deserialize, Debug)]
struct Named {
    name: String,
}

#[derive(Deserialize, Debug)]
struct ColorLyrics {
    lyrics: Option<LyricsBody>,
}

#[derive(Deserialize, Debug)]
struct LyricsBody {
    language: Option<String>,
    lines: Option<Vec<RawLyricLine>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawLyricLine {
    start_time_ms: String,
    #[serde(default)]
    words: String,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// 把非 2xx 的 HTTP 状态映射到错误分类
fn classify_status(status: StatusCode, what: &str) -> SpotifyError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SpotifyError::Auth(format!("{}: HTTP {}", what, status))
        }
        StatusCode::NOT_FOUND => SpotifyError::NotFound(format!("{}: HTTP {}", what, status)),
        _ => SpotifyError::Transient(format!("{}: HTTP {}", what, status)),
    }
}

/// 解析 currently-playing 响应
fn parse_currently_playing(body: &str) -> Result<Option<PlaybackState>, SpotifyError> {
    let playing: CurrentlyPlaying = serde_json::from_str(body)
        .map_err(|e| SpotifyError::Transient(format!("播放状态解析失败: {}", e)))?;

    // 广告、播客或本地文件没有可用的曲目
    let Some(item) = playing.item else {
        return Ok(None);
    };
    let Some(id) = item.id.filter(|id| !id.is_empty()) else {
        debug!("当前播放内容没有曲目 ID: {}", item.name);
        return Ok(None);
    };

    let track = Track {
        id,
        title: item.name,
        artist: item
            .artists
            .into_iter()
            .next()
            .map(|a| a.name)
            .unwrap_or_default(),
        album: item.album.map(|a| a.name).unwrap_or_default(),
        duration_ms: item.duration_ms,
    };

    let position_ms = playing.progress_ms.unwrap_or(0).min(track.duration_ms);

    Ok(Some(PlaybackState {
        track,
        position_ms,
        is_playing: playing.is_playing,
    }))
}

/// 解析 color-lyrics 响应，缺少行或语言都视为没有歌词
fn parse_color_lyrics(track_id: &str, body: &str) -> Result<RemoteLyrics, SpotifyError> {
    let parsed: ColorLyrics = serde_json::from_str(body)
        .map_err(|e| SpotifyError::NotFound(format!("{}: 歌词格式异常: {}", track_id, e)))?;

    let body = parsed
        .lyrics
        .ok_or_else(|| SpotifyError::NotFound(format!("{}: 响应中没有 lyrics", track_id)))?;
    let language = body
        .language
        .filter(|l| !l.is_empty())
        .ok_or_else(|| SpotifyError::NotFound(format!("{}: 缺少语言", track_id)))?;
    let raw_lines = body
        .lines
        .filter(|lines| !lines.is_empty())
        .ok_or_else(|| SpotifyError::NotFound(format!("{}: 缺少歌词行", track_id)))?;

    let mut lines = Vec::with_capacity(raw_lines.len());
    for raw in raw_lines {
        let offset_ms = raw.start_time_ms.trim().parse::<u64>().map_err(|_| {
            SpotifyError::NotFound(format!(
                "{}: 非法的时间戳 '{}'",
                track_id, raw.start_time_ms
            ))
        })?;
        lines.push(LyricLine::new(offset_ms, raw.words));
    }
    lines.sort_by_key(|line| line.offset_ms);

    Ok(RemoteLyrics { language, lines })
}

/// Spotify 网页版客户端，使用 sp_dc cookie 换取访问令牌
pub struct SpotifyClient {
    client: reqwest::Client,
    sp_dc: String,
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyClient {
    pub fn new(sp_dc: impl Into<String>) -> Result<Self, SpotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQWEST_TIMEOUT))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            sp_dc: sp_dc.into(),
            token: Mutex::new(None),
        })
    }

    /// 检查凭据是否可用
    pub async fn verify(&self) -> Result<(), SpotifyError> {
        self.access_token().await.map(|_| ())
    }

    /// 获取访问令牌，过期时自动刷新
    async fn access_token(&self) -> Result<String, SpotifyError> {
        let mut guard = self.token.lock().await;

        if let Some(token) = guard.as_ref() {
            if token.expires_at_ms > now_ms() + TOKEN_REFRESH_MARGIN_MS {
                return Ok(token.value.clone());
            }
            debug!("访问令牌即将过期，重新获取");
        }

        let resp = self
            .client
            .get(TOKEN_URL)
            .header("Cookie", format!("sp_dc={}", self.sp_dc))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(classify_status(status, "获取访问令牌"));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| SpotifyError::Transient(format!("访问令牌解析失败: {}", e)))?;

        if token.is_anonymous {
            return Err(SpotifyError::Auth("sp_dc 无效，获取到的是匿名令牌".to_string()));
        }

        info!("已获取新的 Spotify 访问令牌");
        let value = token.access_token.clone();
        *guard = Some(AccessToken {
            value: token.access_token,
            expires_at_ms: token.access_token_expiration_timestamp_ms,
        });

        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// 带令牌的 GET 请求，401 时刷新令牌重试一次
    async fn authorized_get(
        &self,
        url: &str,
        extra_headers: &[(&str, &str)],
    ) -> Result<reqwest::Response, SpotifyError> {
        let mut retried = false;
        loop {
            let token = self.access_token().await?;
            let mut request = self.client.get(url).bearer_auth(&token);
            for (name, value) in extra_headers {
                request = request.header(*name, *value);
            }

            let resp = request.send().await?;
            if resp.status() == StatusCode::UNAUTHORIZED && !retried {
                warn!("访问令牌被拒绝，刷新后重试");
                self.invalidate_token().await;
                retried = true;
                continue;
            }
            return Ok(resp);
        }
    }
}

#[async_trait]
impl PlaybackClient for SpotifyClient {
    async fn current_playback(&self) -> Result<Option<PlaybackState>, SpotifyError> {
        let resp = self.authorized_get(CURRENTLY_PLAYING_URL, &[]).await?;

        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(classify_status(status, "获取播放状态"));
        }

        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        parse_currently_playing(&body)
    }
}

#[async_trait]
impl LyricsSource for SpotifyClient {
    async fn lyrics(&self, track_id: &str) -> Result<RemoteLyrics, SpotifyError> {
        let url = format!("{}/{}?format=json&market=from_token", LYRICS_URL, track_id);
        debug!("获取歌词: {}", track_id);

        let resp = self
            .authorized_get(&url, &[("app-platform", "WebPlayer")])
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(classify_status(status, &format!("获取歌词 {}", track_id)));
        }

        let body = resp.text().await?;
        parse_color_lyrics(track_id, &body)
    }
}
