use std::num::NonZeroUsize;
use std::time::SystemTime;

use bytes::Bytes;
use lru::LruCache;

use crate::key::CacheKey;

#[derive(Clone)]
struct CacheEntry {
    content: Bytes,
    modified_time: SystemTime,
}

// 以派生键索引的响应内容缓存。
// 键是散列键而非唯一标识：不同输入可能映射到同一条目，
// 条目内的修改时间比对负责把过期或错配的内容判定为未命中。
pub struct ResponseCache {
    cache: LruCache<CacheKey, CacheEntry>,
}

impl ResponseCache {
    // 根据容量构造
    pub fn from_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            panic!("调用from_capacity时指定的大小是0。如果需要自动设置大小，请在调用处进行处理，而不是传入0");
        }
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap()),
        }
    }
    // 放入
    pub fn push(&mut self, key: CacheKey, bytes: Bytes, modified_time: SystemTime) {
        let entry = CacheEntry {
            content: bytes,
            modified_time,
        };
        self.cache.put(key, entry);
    }

    // 检查文件大小是否适合缓存
    pub fn should_cache(file_size: u64, threshold: u64) -> bool {
        file_size <= threshold
    }
    // 查询有效缓存
    pub fn find(&mut self, key: &CacheKey, current_modified_time: SystemTime) -> Option<&Bytes> {
        match self.cache.get(key) {
            Some(entry) => {
                if entry.modified_time == current_modified_time {
                    Some(&entry.content)
                } else {
                    None
                }
            }
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}
