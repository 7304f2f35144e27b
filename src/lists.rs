use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(4 * 60 * 60);

/// 列表用途：拦截名单或放行名单
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Blacklist,
    Whitelist,
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ListKind::Blacklist => "blacklist",
            ListKind::Whitelist => "whitelist",
        };
        f.write_str(s)
    }
}

/// 分组列表缓存
///
/// 每个分组由若干来源（http(s) 链接或本地文件）合并而成，去重、小写化并
/// 排序后整体换入共享表；查询方持读锁做二分查找。刷新任务在请求路径之外
/// 周期性重建各分组。
pub struct ListCache {
    kind: ListKind,
    group_sources: Vec<(String, Vec<String>)>,
    groups: RwLock<HashMap<String, Vec<String>>>,
    refresh_period: Option<Duration>,
    client: reqwest::Client,
}

impl ListCache {
    /// 创建缓存并完成首次加载；refresh_minutes 为 0 时用默认 4 小时，
    /// 负数关闭周期刷新
    pub async fn new(
        kind: ListKind,
        sources: &HashMap<String, Vec<String>>,
        refresh_minutes: i64,
    ) -> Result<Arc<Self>> {
        let refresh_period = if refresh_minutes < 0 {
            None
        } else if refresh_minutes == 0 {
            Some(DEFAULT_REFRESH_PERIOD)
        } else {
            Some(Duration::from_secs(refresh_minutes as u64 * 60))
        };

        let mut group_sources: Vec<(String, Vec<String>)> = sources
            .iter()
            .map(|(group, links)| (group.clone(), links.clone()))
            .collect();
        group_sources.sort_by(|a, b| a.0.cmp(&b.0));

        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build list download client: {}", e))?;

        let cache = Arc::new(Self {
            kind,
            group_sources,
            groups: RwLock::new(HashMap::new()),
            refresh_period,
            client,
        });

        cache.refresh().await;

        if let Some(period) = cache.refresh_period {
            let cache = cache.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                // 第一个 tick 立即返回，首次加载已经做过了
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    cache.refresh().await;
                }
            });
        }

        Ok(cache)
    }

    /// 重建所有分组并换入共享表
    pub async fn refresh(&self) {
        for (group, links) in &self.group_sources {
            let entries = self.create_group_cache(links).await;
            let count = entries.len();

            if let Ok(mut groups) = self.groups.write() {
                groups.insert(group.clone(), entries);
            }

            info!(
                kind = %self.kind,
                group = group.as_str(),
                total_count = count,
                "group import finished"
            );
        }
    }

    // 每个来源一个任务并行拉取，汇总后去重排序
    async fn create_group_cache(&self, links: &[String]) -> Vec<String> {
        let (tx, mut rx) = tokio::sync::mpsc::channel(links.len().max(1));

        for link in links {
            let tx = tx.clone();
            let link = link.clone();
            let client = self.client.clone();
            tokio::spawn(async move {
                let entries = match fetch_source(&client, &link).await {
                    Ok(content) => parse_source(&content),
                    Err(e) => {
                        warn!(source = link.as_str(), error = %e, "list source failed, skipping");
                        Vec::new()
                    }
                };
                let _ = tx.send(entries).await;
            });
        }
        drop(tx);

        let mut merged = BTreeSet::new();
        while let Some(batch) = rx.recv().await {
            merged.extend(batch);
        }
        merged.into_iter().collect()
    }

    /// 在给定分组中查找条目，返回第一个命中的分组名
    pub fn find_group(&self, entry: &str, groups_to_check: &[String]) -> Option<String> {
        let groups = self.groups.read().ok()?;
        for group in groups_to_check {
            if let Some(cache) = groups.get(group) {
                if contains(cache, entry) {
                    return Some(group.clone());
                }
            }
        }
        None
    }

    /// 配置里是否为给定分组之一定义了来源
    pub fn has_definition_for(&self, groups_to_check: &[String]) -> bool {
        self.group_sources
            .iter()
            .any(|(group, _)| groups_to_check.iter().any(|g| g == group))
    }

    pub fn is_empty(&self) -> bool {
        self.group_sources.is_empty()
    }

    pub fn configuration(&self) -> Vec<String> {
        let mut result = Vec::new();
        match self.refresh_period {
            Some(period) => {
                result.push(format!("refresh period: {} minutes", period.as_secs() / 60))
            }
            None => result.push("refresh: disabled".to_string()),
        }

        result.push("group links:".to_string());
        for (group, links) in &self.group_sources {
            result.push(format!("  {}:", group));
            for link in links {
                result.push(format!("   - {}", link));
            }
        }

        result.push("group caches:".to_string());
        let mut total = 0;
        if let Ok(groups) = self.groups.read() {
            for (group, _) in &self.group_sources {
                let count = groups.get(group).map(|c| c.len()).unwrap_or(0);
                result.push(format!("  {}: {} entries", group, count));
                total += count;
            }
        }
        result.push(format!("  TOTAL: {} entries", total));

        result
    }
}

/// 在排序后的条目表中查找：先精确二分，未命中则逐级剥掉最左标签重试，
/// 因此条目 `example.com` 同时覆盖所有 `*.example.com`
pub fn contains(entries: &[String], name: &str) -> bool {
    let mut current = name;
    loop {
        if entries
            .binary_search_by(|entry| entry.as_str().cmp(current))
            .is_ok()
        {
            return true;
        }
        match current.split_once('.') {
            Some((_, rest)) if !rest.is_empty() => current = rest,
            _ => return false,
        }
    }
}

async fn fetch_source(client: &reqwest::Client, link: &str) -> Result<String> {
    if link.starts_with("http://") || link.starts_with("https://") {
        let response = client
            .get(link)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("download failed: {}", e))?
            .error_for_status()
            .map_err(|e| anyhow::anyhow!("download failed: {}", e))?;
        Ok(response
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("failed to read body: {}", e))?)
    } else {
        let path = link.strip_prefix("file://").unwrap_or(link);
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

fn parse_source(content: &str) -> Vec<String> {
    content.lines().filter_map(parse_line).collect()
}

// hosts 文件兼容：取一行的最后一个字段；IP 字面量存为标准文本形式
fn parse_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let host = line.split_whitespace().next_back()?;
    match host.parse::<IpAddr>() {
        Ok(ip) => Some(ip.to_string()),
        Err(_) => Some(host.to_ascii_lowercase()),
    }
}
