use crate::config::DisplayConfig;
use crate::lyrics::{LyricLine, PipelineState};
use crate::player::{TrackerSnapshot, TrackerStatus};
use crate::utils::format_time;

pub const NO_SONG_TEXT: &str = "No song playing";
pub const AUTH_REQUIRED_TEXT: &str =
    "Spotify session expired. Run `spotify-lyrics-translator login <sp_dc>` again.";
const PROGRESS_WIDTH: usize = 40;

/// 渲染进度条
pub fn render_progress_bar(current_ms: u64, total_ms: u64) -> String {
    if total_ms == 0 {
        return String::new();
    }

    let percent = (current_ms as f64 / total_ms as f64).clamp(0.0, 1.0);
    let filled_width = (percent * PROGRESS_WIDTH as f64) as usize;

    let mut bar = String::with_capacity(PROGRESS_WIDTH + 16);
    bar.push('[');
    for i in 0..PROGRESS_WIDTH {
        if i < filled_width {
            bar.push('=');
        } else if i == filled_width {
            bar.push('>');
        } else {
            bar.push(' ');
        }
    }
    bar.push_str(&format!("] {:.1}%", percent * 100.0));
    bar
}

/// 渲染一行歌词：`[m:ss] 原文 | 译文`
pub fn render_line(line: &LyricLine, config: &DisplayConfig) -> String {
    let mut out = String::new();
    if config.show_timestamp {
        out.push_str(&format!("[{}] ", format_time(line.offset_ms)));
    }
    out.push_str(&line.text);
    if config.show_translation {
        if let Some(translated) = line.translated.as_deref().filter(|t| *t != line.text) {
            out.push_str(" | ");
            out.push_str(translated);
        }
    }
    out
}

/// 简单输出模式：只输出当前行
pub fn render_simple(snapshot: &TrackerSnapshot, config: &DisplayConfig) -> String {
    match snapshot.status {
        TrackerStatus::AuthRequired => return AUTH_REQUIRED_TEXT.to_string(),
        TrackerStatus::NoTrack => return NO_SONG_TEXT.to_string(),
        TrackerStatus::Playing | TrackerStatus::Paused => {}
    }

    match snapshot.current() {
        Some(line) => {
            let simple = DisplayConfig {
                show_timestamp: false,
                ..config.clone()
            };
            render_line(line, &simple)
        }
        None => snapshot
            .track
            .as_ref()
            .map(|t| format!("{} - {}", t.title, t.artist))
            .unwrap_or_default(),
    }
}

/// 完整模式：曲目信息、进度与当前行前后若干行
pub fn render_full(snapshot: &TrackerSnapshot, config: &DisplayConfig) -> String {
    let mut out: Vec<String> = Vec::new();

    let track = match (snapshot.status, &snapshot.track) {
        (TrackerStatus::AuthRequired, _) => return AUTH_REQUIRED_TEXT.to_string(),
        (_, None) => {
            out.push(NO_SONG_TEXT.to_string());
            out.push("0:00 / 0:00".to_string());
            return out.join("\n");
        }
        (_, Some(track)) => track,
    };

    let lyrics = &snapshot.lyrics;
    match lyrics.translated_title.as_deref() {
        Some(title) if title != track.title => {
            out.push(format!("{} ({}) - {}", track.title, title, track.artist))
        }
        _ => out.push(format!("{} - {}", track.title, track.artist)),
    }

    let mut info = track.album.clone();
    if let Some(language) = &lyrics.language {
        info.push_str(&format!("  ·  Original Lyrics ({})", language));
    }
    out.push(info);

    let mut time = format!(
        "{} / {}",
        format_time(snapshot.position_ms),
        format_time(track.duration_ms)
    );
    if !snapshot.is_playing {
        time.push_str("  (paused)");
    }
    out.push(time);
    if config.show_progress {
        out.push(render_progress_bar(snapshot.position_ms, track.duration_ms));
    }

    match snapshot.pipeline_state {
        PipelineState::Fetching => out.push("Loading lyrics...".to_string()),
        PipelineState::Translating => out.push("Translating...".to_string()),
        _ => {}
    }

    out.push(String::new());

    if !lyrics.lines.is_empty() {
        let current = snapshot.current_line;
        let anchor = current.unwrap_or(0);
        let start = anchor.saturating_sub(config.context_lines);
        let end = (anchor + config.context_lines + 1).min(lyrics.lines.len());

        for (i, line) in lyrics.lines.iter().enumerate().take(end).skip(start) {
            let marker = if Some(i) == current { "> " } else { "  " };
            out.push(format!("{}{}", marker, render_line(line, config)));
        }
    }

    out.join("\n")
}
