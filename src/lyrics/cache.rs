use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::lyrics::LyricSequence;

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// 翻译缓存：曲目 ID -> 已翻译的歌词
///
/// 按首次插入顺序淘汰（FIFO），读取不会提升顺序，覆盖已有键也不会改变其位置。
/// 顺序由 `IndexMap` 保证，持久化时同样保持插入顺序。
#[derive(Debug)]
pub struct TranslationCache {
    capacity: usize,
    entries: IndexMap<String, LyricSequence>,
    path: Option<PathBuf>,
}

impl TranslationCache {
    /// 创建仅存在于内存中的缓存
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: IndexMap::new(),
            path: None,
        }
    }

    /// 从文件加载缓存，文件缺失或损坏时返回空缓存
    pub fn load(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let mut cache = Self::new(capacity);

        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<IndexMap<String, LyricSequence>>(&content) {
                Ok(entries) => {
                    cache.entries = entries;
                    info!("已加载 {} 条翻译缓存: {:?}", cache.entries.len(), path);
                }
                Err(e) => {
                    warn!("翻译缓存 {:?} 已损坏，将使用空缓存: {}", path, e);
                }
            },
            Err(e) => {
                debug!("翻译缓存 {:?} 不可读，将使用空缓存: {}", path, e);
            }
        }

        // 配置的容量可能比上次小
        let overflow = cache.entries.len().saturating_sub(cache.capacity);
        if overflow > 0 {
            debug!("缓存超出容量，移除最早的 {} 条", overflow);
            cache.entries.drain(..overflow);
        }

        cache.path = Some(path);
        cache
    }

    pub fn get(&self, track_id: &str) -> Option<&LyricSequence> {
        self.entries.get(track_id)
    }

    /// 写入缓存。新键超出容量时先淘汰最早插入的一条
    pub fn put(&mut self, track_id: impl Into<String>, lyrics: LyricSequence) {
        let track_id = track_id.into();

        if let Some(existing) = self.entries.get_mut(&track_id) {
            *existing = lyrics;
            return;
        }

        if self.entries.len() >= self.capacity {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                debug!("翻译缓存已满，淘汰最早的条目: {}", evicted);
            }
        }

        self.entries.insert(track_id, lyrics);
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.entries.contains_key(track_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 按插入顺序返回所有键
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 持久化到文件（先写临时文件再重命名）。内存缓存直接返回
    pub fn save(&self) -> Result<()> {
        match self.snapshot()? {
            Some(snapshot) => snapshot.write(),
            None => Ok(()),
        }
    }

    /// 序列化当前内容，写盘可以在释放锁之后进行
    pub fn snapshot(&self) -> Result<Option<CacheSnapshot>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };

        Ok(Some(CacheSnapshot {
            path: path.clone(),
            json: serde_json::to_string(&self.entries)?,
            len: self.entries.len(),
        }))
    }
}

/// 已序列化、待写入磁盘的缓存内容
pub struct CacheSnapshot {
    path: PathBuf,
    json: String,
    len: usize,
}

impl CacheSnapshot {
    pub fn write(&self) -> Result<()> {
        let path = &self.path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("创建缓存目录 {:?} 失败", parent))?;
            }
        }

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &self.json).with_context(|| format!("写入 {:?} 失败", tmp_path))?;
        fs::rename(&tmp_path, path).with_context(|| format!("重命名到 {:?} 失败", path))?;

        debug!("已保存 {} 条翻译缓存", self.len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lyrics::LyricLine;

    fn seq(text: &str) -> LyricSequence {
        LyricSequence::new(Some("ja".to_string()), vec![LyricLine::new(0, text)])
    }

    #[test]
    fn test_fifo_eviction() {
        let mut cache = TranslationCache::new(2);
        cache.put("A", seq("a"));
        cache.put("B", seq("b"));
        cache.put("C", seq("c"));

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("A"));
        assert!(cache.contains("B"));
        assert!(cache.contains("C"));
    }

    #[test]
    fn test_overwrite_keeps_insertion_order() {
        let mut cache = TranslationCache::new(2);
        cache.put("A", seq("a"));
        cache.put("B", seq("b"));
        cache.put("A", seq("a2"));
        cache.put("C", seq("c"));

        assert!(!cache.contains("A"));
        assert!(cache.contains("B"));
        assert!(cache.contains("C"));
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let mut cache = TranslationCache::new(2);
        cache.put("A", seq("a"));
        cache.put("A", seq("a2"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("A").unwrap().lines[0].text, "a2");
    }

    #[test]
    fn test_read_does_not_promote() {
        let mut cache = TranslationCache::new(2);
        cache.put("A", seq("a"));
        cache.put("B", seq("b"));
        assert!(cache.get("A").is_some());
        cache.put("C", seq("c"));

        assert!(!cache.contains("A"));
    }

    #[test]
    fn test_capacity_plus_one_keeps_latest() {
        let capacity = 5;
        let mut cache = TranslationCache::new(capacity);
        for i in 0..=capacity {
            cache.put(format!("track-{}", i), seq("x"));
        }

        let keys: Vec<&str> = cache.keys().collect();
        assert_eq!(
            keys,
            vec!["track-1", "track-2", "track-3", "track-4", "track-5"]
        );
    }

    #[test]
    fn test_save_and_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("lyrics_cache.json");

        let mut cache = TranslationCache::load(&path, 3);
        cache.put("B", seq("b"));
        cache.put("A", seq("a"));
        cache.save().unwrap();

        let loaded = TranslationCache::load(&path, 3);
        let keys: Vec<&str> = loaded.keys().collect();
        assert_eq!(keys, vec!["B", "A"]);
        assert_eq!(loaded.get("A"), Some(&seq("a")));
    }

    #[test]
    fn test_corrupt_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lyrics_cache.json");
        fs::write(&path, "\u{0}garbage").unwrap();

        let cache = TranslationCache::load(&path, 10);
        assert!(cache.is_empty());
        assert_eq!(cache.path(), Some(path.as_path()));
    }

    #[test]
    fn test_missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TranslationCache::load(dir.path().join("nope.json"), 10);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_load_trims_to_smaller_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lyrics_cache.json");

        let mut cache = TranslationCache::load(&path, 4);
        for key in ["A", "B", "C", "D"] {
            cache.put(key, seq(key));
        }
        cache.save().unwrap();

        let trimmed = TranslationCache::load(&path, 2);
        let keys: Vec<&str> = trimmed.keys().collect();
        assert_eq!(keys, vec!["C", "D"]);
    }
}
