use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::loader::PKG_NAME;

pub const SP_DC_ENV: &str = "SPOTIFY_SP_DC";

/// 持久化的会话凭据（Spotify 网页版的 sp_dc cookie）
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub sp_dc: String,
}

pub fn default_credentials_path() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join(PKG_NAME).join("credentials.json"))
        .unwrap_or_else(|| PathBuf::from("credentials.json"))
}

impl Credentials {
    /// 读取凭据文件，文件缺失或损坏都视为没有凭据
    pub fn load(path: &Path) -> Option<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                debug!("凭据文件 {:?} 不存在", path);
                return None;
            }
        };

        match serde_json::from_str::<Credentials>(&content) {
            Ok(creds) if !creds.sp_dc.trim().is_empty() => Some(creds),
            Ok(_) => {
                warn!("凭据文件 {:?} 中的 sp_dc 为空", path);
                None
            }
            Err(e) => {
                warn!("解析凭据文件 {:?} 失败: {}", path, e);
                None
            }
        }
    }

    /// 按 命令行参数 > 环境变量 > 凭据文件 的顺序解析
    pub fn resolve(cli_value: Option<&str>, path: &Path) -> Option<Self> {
        if let Some(value) = cli_value.map(str::trim).filter(|v| !v.is_empty()) {
            debug!("使用命令行提供的 sp_dc");
            return Some(Self {
                sp_dc: value.to_string(),
            });
        }

        if let Ok(value) = std::env::var(SP_DC_ENV) {
            if !value.trim().is_empty() {
                debug!("使用环境变量 {} 提供的 sp_dc", SP_DC_ENV);
                return Some(Self {
                    sp_dc: value.trim().to_string(),
                });
            }
        }

        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("创建目录 {:?} 失败", parent))?;
        }
        let json = serde_json::to_string(self)?;
        write_private(path, json.as_bytes())
            .with_context(|| format!("写入凭据文件 {:?} 失败", path))?;
        info!("已保存凭据到 {:?}", path);
        Ok(())
    }
}

/// 写入仅当前用户可读写的文件
#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // 已存在的文件不受 mode 影响
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("credentials.json");
        let creds = Credentials {
            sp_dc: "cookie-value".to_string(),
        };

        creds.save(&path).unwrap();

        assert_eq!(Credentials::load(&path), Some(creds));
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        Credentials {
            sp_dc: "cookie-value".to_string(),
        }
        .save(&path)
        .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(Credentials::load(&path).is_some());
    }

    #[test]
    fn test_missing_or_corrupt_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        assert_eq!(Credentials::load(&path), None);

        fs::write(&path, "{not json").unwrap();
        assert_eq!(Credentials::load(&path), None);

        fs::write(&path, r#"{"sp_dc": "  "}"#).unwrap();
        assert_eq!(Credentials::load(&path), None);
    }

    #[test]
    fn test_cli_value_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        Credentials {
            sp_dc: "from-file".to_string(),
        }
        .save(&path)
        .unwrap();

        let creds = Credentials::resolve(Some(" from-cli "), &path).unwrap();
        assert_eq!(creds.sp_dc, "from-cli");
    }
}
