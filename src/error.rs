use thiserror::Error;

/// Spotify 相关调用的错误分类
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// 会话凭据无效或已过期，需要重新登录
    #[error("Spotify 认证失败: {0}")]
    Auth(String),

    /// 网络抖动等临时错误，下一次轮询自动重试
    #[error("Spotify 请求失败: {0}")]
    Transient(String),

    /// 该曲目没有同步歌词
    #[error("未找到歌词: {0}")]
    NotFound(String),
}

impl SpotifyError {
    pub fn is_auth(&self) -> bool {
        matches!(self, SpotifyError::Auth(_))
    }
}

impl From<reqwest::Error> for SpotifyError {
    fn from(e: reqwest::Error) -> Self {
        SpotifyError::Transient(e.to_string())
    }
}

/// 单行翻译失败
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("翻译请求失败: {0}")]
    Request(#[from] reqwest::Error),

    #[error("翻译服务返回 HTTP {0}")]
    Status(u16),

    #[error("翻译结果格式异常: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_classification() {
        assert!(SpotifyError::Auth("expired".into()).is_auth());
        assert!(!SpotifyError::Transient("timeout".into()).is_auth());
        assert!(!SpotifyError::NotFound("abc".into()).is_auth());
    }
}
