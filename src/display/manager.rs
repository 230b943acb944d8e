use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::debug;

use crate::config::Config;
use crate::display::renderer;
use crate::player::TrackerSnapshot;

/// 显示管理器，负责在终端中显示歌词
pub struct DisplayManager {
    /// 配置 (共享)
    config: Arc<Config>,
    /// 上次输出的内容（用于避免重复输出）
    last_output: String,
}

impl DisplayManager {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            last_output: String::new(),
        }
    }

    /// 跟随快照刷新显示，直到跟踪器退出
    pub async fn run(&mut self, mut snapshots: watch::Receiver<TrackerSnapshot>) -> Result<()> {
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            self.refresh_display(&snapshot)?;

            if snapshots.changed().await.is_err() {
                debug!("快照通道已关闭，显示管理器退出");
                return Ok(());
            }
        }
    }

    /// 渲染快照，内容未变化时不输出
    pub fn render(&self, snapshot: &TrackerSnapshot) -> String {
        if self.config.display.simple_output {
            renderer::render_simple(snapshot, &self.config.display)
        } else {
            renderer::render_full(snapshot, &self.config.display)
        }
    }

    fn refresh_display(&mut self, snapshot: &TrackerSnapshot) -> Result<()> {
        let output = self.render(snapshot);
        if output == self.last_output {
            return Ok(());
        }

        let mut stdout = io::stdout().lock();
        if self.config.display.simple_output {
            writeln!(stdout, "{}", output)?;
        } else {
            // 清屏
            write!(stdout, "\x1B[2J\x1B[1;1H")?;
            writeln!(stdout, "{}", output)?;
        }
        stdout.flush()?;

        self.last_output = output;
        Ok(())
    }
}

/// 运行显示管理器
pub async fn run_display_manager(
    config: Arc<Config>,
    snapshots: watch::Receiver<TrackerSnapshot>,
) -> Result<()> {
    let mut display_manager = DisplayManager::new(config);
    display_manager.run(snapshots).await
}
