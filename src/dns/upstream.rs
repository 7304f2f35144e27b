use std::net::{IpAddr, SocketAddr};

use anyhow::Result;
use async_trait::async_trait;
use hickory_resolver::config::{
    NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts,
};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use tracing::{debug, info};

use super::{reply_template, Request, Resolver, Response, ResponseType};

/// 链尾的上游解析器
///
/// 把问题区原样转给配置的上游（UDP、DoT 或 DoH），答案 TTL 不做改写，
/// NXDOMAIN 按正常应答返回，其余失败作为错误上抛。
pub struct UpstreamResolver {
    resolver: TokioAsyncResolver,
    address: String,
}

impl UpstreamResolver {
    pub fn new(address: &str) -> Result<Self> {
        let (config, opts) = parse_upstream_address(address)?;
        let resolver = TokioAsyncResolver::tokio(config, opts);
        info!(address = address, "upstream resolver created");
        Ok(Self {
            resolver,
            address: address.to_string(),
        })
    }
}

#[async_trait]
impl Resolver for UpstreamResolver {
    async fn resolve(&self, request: &Request) -> Result<Response> {
        let Some(query) = request.message.queries().first() else {
            anyhow::bail!("request without question section");
        };
        let name = query.name().clone();
        let qtype = query.query_type();

        let mut message = reply_template(&request.message);
        match self.resolver.lookup(name, qtype).await {
            Ok(lookup) => {
                for record in lookup.record_iter() {
                    message.add_answer(record.clone());
                }
            }
            Err(e) => match e.kind() {
                // NXDOMAIN/NODATA 是正常应答，不是错误
                ResolveErrorKind::NoRecordsFound { response_code, .. } => {
                    message.set_response_code(*response_code);
                }
                _ => anyhow::bail!("upstream resolution failed: {}", e),
            },
        }

        debug!(
            name = request.question_name().as_str(),
            answers = message.answers().len(),
            "upstream resolved"
        );

        Ok(Response {
            message,
            rtype: ResponseType::Resolved,
            reason: format!("RESOLVED ({})", self.address),
        })
    }

    fn configuration(&self) -> Vec<String> {
        vec![format!("upstream: {}", self.address)]
    }
}

/// 解析上游地址：`ip[:port]`、`tls://ip[:port]`、`https://host/dns-query`
fn parse_upstream_address(address: &str) -> Result<(ResolverConfig, ResolverOpts)> {
    let mut opts = ResolverOpts::default();
    opts.use_hosts_file = false;
    // 缓存由链上的缓存节点负责，上游自身不再缓存
    opts.cache_size = 0;

    if let Some(tls_addr) = address.strip_prefix("tls://") {
        let (ip, port) = parse_ip_port(tls_addr, 853)?;
        let ns = NameServerConfig {
            socket_addr: SocketAddr::new(ip, port),
            protocol: Protocol::Tls,
            tls_dns_name: Some(ip.to_string()),
            trust_negative_responses: true,
            tls_config: None,
            bind_addr: None,
        };
        let config =
            ResolverConfig::from_parts(None, vec![], NameServerConfigGroup::from(vec![ns]));
        Ok((config, opts))
    } else if address.starts_with("https://") {
        let url = reqwest::Url::parse(address)
            .map_err(|e| anyhow::anyhow!("invalid DoH URL '{}': {}", address, e))?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("DoH URL missing host: {}", address))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url.port().unwrap_or(443);

        let ip: IpAddr = match host.parse() {
            Ok(ip) => ip,
            Err(_) => match host.as_str() {
                "dns.google" => "8.8.8.8".parse().unwrap(),
                "cloudflare-dns.com" => "1.1.1.1".parse().unwrap(),
                _ => anyhow::bail!(
                    "DoH host '{}' is not a known provider; use an IP address instead",
                    host
                ),
            },
        };
        let tls_name = if host.parse::<IpAddr>().is_ok() {
            ip.to_string()
        } else {
            host
        };

        let ns = NameServerConfig {
            socket_addr: SocketAddr::new(ip, port),
            protocol: Protocol::Https,
            tls_dns_name: Some(tls_name),
            trust_negative_responses: true,
            tls_config: None,
            bind_addr: None,
        };
        let config =
            ResolverConfig::from_parts(None, vec![], NameServerConfigGroup::from(vec![ns]));
        Ok((config, opts))
    } else {
        let (ip, port) = parse_ip_port(address, 53)?;
        let group = NameServerConfigGroup::from_ips_clear(&[ip], port, true);
        Ok((ResolverConfig::from_parts(None, vec![], group), opts))
    }
}

/// 解析 "ip"、"ip:port"、"[ipv6]" 或 "[ipv6]:port"
fn parse_ip_port(s: &str, default_port: u16) -> Result<(IpAddr, u16)> {
    if let Ok(ip) = s.parse::<IpAddr>() {
        return Ok((ip, default_port));
    }
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok((addr.ip(), addr.port()));
    }
    let stripped = s.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = stripped.parse::<IpAddr>() {
        return Ok((ip, default_port));
    }
    anyhow::bail!("invalid upstream address: {}", s)
}
