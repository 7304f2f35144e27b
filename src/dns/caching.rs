use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::RecordType;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::debug;

use super::{min_answer_ttl, set_answer_ttls, Request, Resolver, Response, ResponseType};
use crate::config::CachingConfig;

const INFLIGHT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);
/// NXDOMAIN 应答没有可用的答案 TTL，未配置上限时按 30 分钟缓存
const NEGATIVE_DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Hash, PartialEq, Eq, Clone)]
struct CacheKey {
    name: String,
    qtype: RecordType,
}

struct CacheEntry {
    message: Message,
    expires_at: Instant,
}

/// 带正/负缓存的解析器
///
/// 只缓存 A/AAAA；存入时按配置的分钟数钳制 TTL，命中时按剩余秒数改写
/// 答案区 TTL。同一 key 的并发未命中折叠为一次上游调用。
pub struct CachingResolver {
    next: Box<dyn Resolver>,
    min_ttl: Option<Duration>,
    max_ttl: Option<Duration>,
    disabled: bool,
    cache: RwLock<HashMap<CacheKey, CacheEntry>>,
    /// 并发去重：同 key 只让一个请求打到上游
    inflight: Mutex<HashMap<CacheKey, Arc<Notify>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachingResolver {
    pub fn new(config: &CachingConfig, next: Box<dyn Resolver>) -> Self {
        Self {
            next,
            min_ttl: (config.min_caching_time > 0)
                .then(|| Duration::from_secs(config.min_caching_time as u64 * 60)),
            max_ttl: (config.max_caching_time > 0)
                .then(|| Duration::from_secs(config.max_caching_time as u64 * 60)),
            disabled: config.max_caching_time < 0,
            cache: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn cacheable(qtype: Option<RecordType>) -> bool {
        matches!(qtype, Some(RecordType::A) | Some(RecordType::AAAA))
    }

    async fn read_cache(&self, key: &CacheKey, request: &Request) -> Option<Response> {
        let cache = self.cache.read().await;
        let entry = cache.get(key)?;

        let remaining = entry.expires_at.saturating_duration_since(Instant::now());
        let remaining_secs = remaining.as_secs() as u32;
        if remaining_secs == 0 {
            // 过期条目对读者不可见，清理留给下一次写入
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);

        let mut message = entry.message.clone();
        message.set_id(request.message.id());
        set_answer_ttls(&mut message, remaining_secs);

        let reason = if message.response_code() == ResponseCode::NXDomain {
            "CACHED NEGATIVE".to_string()
        } else {
            String::new()
        };

        debug!(
            name = key.name.as_str(),
            remaining = remaining_secs,
            "cache hit"
        );

        Some(Response {
            message,
            rtype: ResponseType::Cached,
            reason,
        })
    }

    // 存入的 TTL:答案区最小 TTL 经 min/max 钳制；NXDOMAIN 没有答案，
    // 用配置的上限(或默认 30 分钟)作为基准
    fn stored_ttl(&self, message: &Message) -> Duration {
        let base = match min_answer_ttl(message) {
            Some(ttl) if message.response_code() == ResponseCode::NoError => {
                Duration::from_secs(ttl as u64)
            }
            _ => self.max_ttl.unwrap_or(NEGATIVE_DEFAULT_TTL),
        };

        let mut ttl = base;
        if let Some(min) = self.min_ttl {
            ttl = ttl.max(min);
        }
        if let Some(max) = self.max_ttl {
            ttl = ttl.min(max);
        }
        ttl
    }

    async fn store(&self, key: CacheKey, response: &mut Response) {
        let ttl = self.stored_ttl(&response.message);
        set_answer_ttls(&mut response.message, ttl.as_secs() as u32);

        let mut cache = self.cache.write().await;
        cache.insert(
            key,
            CacheEntry {
                message: response.message.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[async_trait]
impl Resolver for CachingResolver {
    async fn resolve(&self, request: &Request) -> Result<Response> {
        if self.disabled || !Self::cacheable(request.question_type()) {
            return self.next.resolve(request).await;
        }

        let key = CacheKey {
            name: request.question_name(),
            qtype: request.question_type().unwrap_or(RecordType::A),
        };

        if let Some(response) = self.read_cache(&key, request).await {
            return Ok(response);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        // 领导者选举:第一个插入 inflight 的请求负责上游调用
        let (notify, is_leader) = {
            let mut inflight = self.inflight.lock().await;
            if let Some(n) = inflight.get(&key) {
                (n.clone(), false)
            } else {
                let n = Arc::new(Notify::new());
                inflight.insert(key.clone(), n.clone());
                (n, true)
            }
        };

        if !is_leader {
            let waited = tokio::time::timeout(INFLIGHT_WAIT_TIMEOUT, notify.notified()).await;

            if let Some(response) = self.read_cache(&key, request).await {
                return Ok(response);
            }

            // 等待超时(领导者被取消等场景)时清理残留的 inflight 条目
            if waited.is_err() {
                let mut inflight = self.inflight.lock().await;
                if let Some(current) = inflight.get(&key) {
                    if Arc::ptr_eq(current, &notify) {
                        inflight.remove(&key);
                    }
                }
            }

            // 领导者失败或超时时兜底直接解析，避免无限等待
            return self.next.resolve(request).await;
        }

        let result = match self.next.resolve(request).await {
            Ok(mut response) => {
                let rcode = response.message.response_code();
                if rcode == ResponseCode::NoError || rcode == ResponseCode::NXDomain {
                    // response 是我们自己的拷贝，改写 TTL 后存入并原样返回
                    self.store(key.clone(), &mut response).await;
                }
                Ok(response)
            }
            // 上游错误不存储，原样上抛
            Err(e) => Err(e),
        };

        let mut inflight = self.inflight.lock().await;
        inflight.remove(&key);
        drop(inflight);
        notify.notify_waiters();

        result
    }

    fn configuration(&self) -> Vec<String> {
        if self.disabled {
            return vec!["deactivated".to_string()];
        }

        let mut result = Vec::new();
        match self.min_ttl {
            Some(min) => result.push(format!("minCachingTime: {} minutes", min.as_secs() / 60)),
            None => result.push("minCachingTime: no limit".to_string()),
        }
        match self.max_ttl {
            Some(max) => result.push(format!("maxCachingTime: {} minutes", max.as_secs() / 60)),
            None => result.push("maxCachingTime: no limit".to_string()),
        }
        let entries = self
            .cache
            .try_read()
            .map(|cache| cache.len())
            .unwrap_or(0);
        result.push(format!("cache entries: {}", entries));
        result.push(format!(
            "cache hits: {}, misses: {}",
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed)
        ));
        result
    }
}
