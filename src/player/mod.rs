// 播放跟踪模块

mod tracker;

pub use tracker::{
    resolve_current_line, PlaybackTracker, TrackerSnapshot, TrackerStatus, DEFAULT_POLL_INTERVAL,
};
