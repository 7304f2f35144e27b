use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api;
use crate::config::Config;
use crate::dns::blocking::BlockingResolver;
use crate::dns::caching::CachingResolver;
use crate::dns::upstream::UpstreamResolver;
use crate::dns::Resolver;
use crate::server;

/// 组装解析链（缓存 → 拦截 → 上游）并启动 UDP 前端与控制接口
pub struct App {
    handles: Vec<JoinHandle<()>>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let upstream = UpstreamResolver::new(&config.upstream.address)?;
        log_configuration("upstream", &upstream);

        let blocking = BlockingResolver::new(&config.blocking, Box::new(upstream)).await?;
        let control = blocking.control();
        log_configuration("blocking", &blocking);

        let caching = CachingResolver::new(&config.caching, Box::new(blocking));
        log_configuration("caching", &caching);

        let chain: Arc<dyn Resolver> = Arc::new(caching);

        let mut handles = Vec::new();
        if let Some(api_config) = &config.api {
            handles.push(api::start(api_config, control)?);
        }

        let (_, server_handle) = server::start(&config.listen, chain).await?;
        handles.push(server_handle);

        Ok(Self { handles })
    }

    pub async fn run(mut self) -> Result<()> {
        for handle in self.handles.drain(..) {
            handle.await?;
        }
        Ok(())
    }
}

fn log_configuration(name: &str, resolver: &dyn Resolver) {
    for line in resolver.configuration() {
        info!(resolver = name, "{}", line);
    }
}
