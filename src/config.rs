use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::dns::blocking::BlockType;
use crate::error::ConfigError;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    /// UDP 监听地址
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub caching: CachingConfig,
    #[serde(default)]
    pub blocking: BlockingConfig,
    #[serde(default)]
    pub api: Option<ApiConfig>,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !self.blocking.black_lists.is_empty() {
            self.blocking.block_type.parse::<BlockType>()?;
        }

        // 带 "/" 的选择器必须是合法 CIDR，其余的当作客户端名或精确 IP
        for selector in self.blocking.client_groups_block.keys() {
            if selector.contains('/') {
                selector.parse::<ipnet::IpNet>().map_err(|e| {
                    ConfigError::InvalidClientSelector(selector.clone(), e.to_string())
                })?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:53".to_string()
}

#[derive(Debug, Deserialize)]
pub struct UpstreamConfig {
    /// 上游地址：`ip[:port]`、`tls://ip[:port]` 或 `https://host/dns-query`
    #[serde(default = "default_upstream")]
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: default_upstream(),
        }
    }
}

fn default_upstream() -> String {
    "1.1.1.1".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct CachingConfig {
    /// 分钟；0 表示不设下限
    #[serde(default)]
    pub min_caching_time: i64,
    /// 分钟；0 表示不设上限，负数关闭缓存
    #[serde(default)]
    pub max_caching_time: i64,
}

#[derive(Debug, Deserialize)]
pub struct BlockingConfig {
    #[serde(default)]
    pub black_lists: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub white_lists: HashMap<String, Vec<String>>,
    /// 客户端选择器（名字、精确 IP 或 CIDR）到分组名的映射；
    /// `default` 对所有客户端生效
    #[serde(default)]
    pub client_groups_block: HashMap<String, Vec<String>>,
    #[serde(default = "default_block_type")]
    pub block_type: String,
    /// 分钟；0 用默认 4 小时，负数只做初始加载
    #[serde(default)]
    pub refresh_period: i64,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            black_lists: HashMap::new(),
            white_lists: HashMap::new(),
            client_groups_block: HashMap::new(),
            block_type: default_block_type(),
            refresh_period: 0,
        }
    }
}

fn default_block_type() -> String {
    "ZeroIP".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_listen")]
    pub listen: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    4000
}

pub fn load_config(path: &str) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path))?;
    let config: Config = serde_yml::from_str(&content)
        .with_context(|| format!("failed to parse config file '{}'", path))?;
    config.validate()?;
    Ok(config)
}
