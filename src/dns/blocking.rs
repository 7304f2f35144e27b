use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{RData, Record, RecordType};
use tracing::info;

use super::{normalize_name, reply_template, Request, Resolver, Response, ResponseType};
use crate::config::BlockingConfig;
use crate::error::ConfigError;
use crate::lists::{ListCache, ListKind};

/// 合成拦截应答的固定 TTL
const BLOCK_TTL: u32 = 21600;

/// 拦截应答的形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// A 记录回 0.0.0.0，AAAA 回 ::，Rcode NOERROR
    ZeroIp,
    /// 空答案区，Rcode NXDOMAIN
    NxDomain,
}

impl FromStr for BlockType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ZeroIP" => Ok(BlockType::ZeroIp),
            "NxDomain" => Ok(BlockType::NxDomain),
            other => Err(ConfigError::UnknownBlockType(other.to_string())),
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BlockType::ZeroIp => "ZeroIP",
            BlockType::NxDomain => "NxDomain",
        };
        f.write_str(s)
    }
}

/// 客户端选择器：显示名、精确 IP 或 CIDR
enum ClientSelector {
    Name(String),
    Ip(IpAddr),
    Cidr(ipnet::IpNet),
}

impl ClientSelector {
    fn parse(s: &str) -> Result<Self, ConfigError> {
        if s.contains('/') {
            let net = s
                .parse::<ipnet::IpNet>()
                .map_err(|e| ConfigError::InvalidClientSelector(s.to_string(), e.to_string()))?;
            return Ok(ClientSelector::Cidr(net));
        }
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(ClientSelector::Ip(ip));
        }
        Ok(ClientSelector::Name(s.to_string()))
    }

    fn matches(&self, request: &Request) -> bool {
        match self {
            ClientSelector::Name(name) => request
                .client_names
                .iter()
                .any(|c| c.eq_ignore_ascii_case(name)),
            ClientSelector::Ip(ip) => request.client_ip == *ip,
            ClientSelector::Cidr(net) => net.contains(&request.client_ip),
        }
    }
}

impl std::fmt::Display for ClientSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientSelector::Name(name) => f.write_str(name),
            ClientSelector::Ip(ip) => write!(f, "{}", ip),
            ClientSelector::Cidr(net) => write!(f, "{}", net),
        }
    }
}

/// 拦截开关的运行时状态
///
/// 控制接口是唯一写入方；请求路径只做原子读，到期后的重新启用由
/// 下一个请求顺带完成，不依赖后台定时器。
pub struct BlockingControl {
    enabled: AtomicBool,
    reenable_at: RwLock<Option<Instant>>,
}

impl BlockingControl {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            reenable_at: RwLock::new(None),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
        if let Ok(mut guard) = self.reenable_at.write() {
            *guard = None;
        }
        info!("blocking enabled");
    }

    /// 停用拦截；带时长时到期自动恢复
    pub fn disable(&self, duration: Option<Duration>) {
        if let Ok(mut guard) = self.reenable_at.write() {
            *guard = duration.map(|d| Instant::now() + d);
        }
        self.enabled.store(false, Ordering::Release);
        match duration {
            Some(d) => info!(duration = ?d, "blocking disabled temporarily"),
            None => info!("blocking disabled"),
        }
    }

    /// 请求路径上的权威检查：到期即恢复启用
    pub fn is_enabled(&self) -> bool {
        if self.enabled.load(Ordering::Acquire) {
            return true;
        }
        let deadline = self.reenable_at.read().ok().and_then(|guard| *guard);
        match deadline {
            Some(at) if Instant::now() >= at => {
                self.enable();
                true
            }
            _ => false,
        }
    }
}

impl Default for BlockingControl {
    fn default() -> Self {
        Self::new()
    }
}

/// 按客户端分组拦截域名的解析器
///
/// 解析前先查黑白名单（白名单优先），放过的请求转发后再检查答案区里的
/// IP 与 CNAME 目标。命中时按配置的 BlockType 合成应答。
pub struct BlockingResolver {
    next: Box<dyn Resolver>,
    blacklists: Arc<ListCache>,
    whitelists: Arc<ListCache>,
    client_groups: Vec<(ClientSelector, Vec<String>)>,
    default_groups: Vec<String>,
    block_type: BlockType,
    control: Arc<BlockingControl>,
    deactivated: bool,
}

impl BlockingResolver {
    pub async fn new(config: &BlockingConfig, next: Box<dyn Resolver>) -> Result<Self> {
        let block_type = config.block_type.parse::<BlockType>()?;

        let blacklists =
            ListCache::new(ListKind::Blacklist, &config.black_lists, config.refresh_period).await?;
        let whitelists =
            ListCache::new(ListKind::Whitelist, &config.white_lists, config.refresh_period).await?;

        let mut selectors: Vec<&String> = config.client_groups_block.keys().collect();
        selectors.sort();

        let mut client_groups = Vec::new();
        let mut default_groups = Vec::new();
        for selector in selectors {
            let groups = config.client_groups_block[selector].clone();
            if selector == "default" {
                default_groups = groups;
            } else {
                client_groups.push((ClientSelector::parse(selector)?, groups));
            }
        }

        let deactivated = config.black_lists.is_empty()
            && config.white_lists.is_empty()
            && config.client_groups_block.is_empty();

        Ok(Self {
            next,
            blacklists,
            whitelists,
            client_groups,
            default_groups,
            block_type,
            control: Arc::new(BlockingControl::new()),
            deactivated,
        })
    }

    /// 控制接口共享的运行时开关
    pub fn control(&self) -> Arc<BlockingControl> {
        self.control.clone()
    }

    // 并集:命中的每个选择器贡献其分组，default 分组永远在内
    fn groups_for(&self, request: &Request) -> Vec<String> {
        let mut groups = BTreeSet::new();
        for (selector, names) in &self.client_groups {
            if selector.matches(request) {
                groups.extend(names.iter().cloned());
            }
        }
        groups.extend(self.default_groups.iter().cloned());
        groups.into_iter().collect()
    }

    fn blocked_response(&self, request: &Request, reason: String) -> Response {
        let mut message = reply_template(&request.message);

        match self.block_type {
            BlockType::ZeroIp => {
                if let Some(query) = request.message.queries().first() {
                    let rdata = match query.query_type() {
                        RecordType::AAAA => RData::AAAA(AAAA(Ipv6Addr::UNSPECIFIED)),
                        _ => RData::A(A(Ipv4Addr::UNSPECIFIED)),
                    };
                    message.add_answer(Record::from_rdata(query.name().clone(), BLOCK_TTL, rdata));
                }
            }
            BlockType::NxDomain => {
                message.set_response_code(ResponseCode::NXDomain);
            }
        }

        Response {
            message,
            rtype: ResponseType::Blocked,
            reason,
        }
    }

    // 解析后的答案区检查:放行 IP 短路，拦截 IP 与 CNAME 目标改写整个应答
    fn inspect_answers(
        &self,
        request: &Request,
        groups: &[String],
        response: Response,
    ) -> Response {
        for record in response.message.answers() {
            if let Some(ip) = record_ip(record) {
                if self.whitelists.find_group(&ip, groups).is_some() {
                    return response;
                }
            }
        }

        for record in response.message.answers() {
            match record.data() {
                Some(RData::A(_)) | Some(RData::AAAA(_)) => {
                    let ip = record_ip(record).unwrap_or_default();
                    if let Some(group) = self.blacklists.find_group(&ip, groups) {
                        return self.blocked_response(request, format!("BLOCKED IP ({})", group));
                    }
                }
                Some(RData::CNAME(target)) => {
                    let target = normalize_name(&target.0.to_utf8());
                    if let Some(group) = self.blacklists.find_group(&target, groups) {
                        return self
                            .blocked_response(request, format!("BLOCKED CNAME ({})", group));
                    }
                }
                _ => {}
            }
        }

        response
    }
}

fn record_ip(record: &Record) -> Option<String> {
    match record.data() {
        Some(RData::A(a)) => Some(a.0.to_string()),
        Some(RData::AAAA(aaaa)) => Some(aaaa.0.to_string()),
        _ => None,
    }
}

#[async_trait]
impl Resolver for BlockingResolver {
    async fn resolve(&self, request: &Request) -> Result<Response> {
        if !self.control.is_enabled() {
            return self.next.resolve(request).await;
        }

        if !matches!(
            request.question_type(),
            Some(RecordType::A) | Some(RecordType::AAAA)
        ) {
            return self.next.resolve(request).await;
        }

        let groups = self.groups_for(request);
        if groups.is_empty() {
            return self.next.resolve(request).await;
        }

        let qname = request.question_name();

        // 白名单优先于黑名单
        if self.whitelists.find_group(&qname, &groups).is_some() {
            return self.next.resolve(request).await;
        }

        if let Some(group) = self.blacklists.find_group(&qname, &groups) {
            return Ok(self.blocked_response(request, format!("BLOCKED ({})", group)));
        }

        // 只配置了白名单的分组反转语义:不在白名单上的域名一律拦截
        if !self.blacklists.has_definition_for(&groups)
            && self.whitelists.has_definition_for(&groups)
        {
            return Ok(self.blocked_response(request, "BLOCKED (WHITELIST ONLY)".to_string()));
        }

        let response = self.next.resolve(request).await?;
        Ok(self.inspect_answers(request, &groups, response))
    }

    fn configuration(&self) -> Vec<String> {
        if self.deactivated {
            return vec!["deactivated".to_string()];
        }

        let mut result = vec![format!("blockType: {}", self.block_type)];

        result.push("clientGroupsBlock:".to_string());
        for (selector, groups) in &self.client_groups {
            result.push(format!("  {} = {}", selector, groups.join(", ")));
        }
        if !self.default_groups.is_empty() {
            result.push(format!("  default = {}", self.default_groups.join(", ")));
        }

        result.push("blacklist:".to_string());
        for line in self.blacklists.configuration() {
            result.push(format!("  {}", line));
        }
        result.push("whitelist:".to_string());
        for line in self.whitelists.configuration() {
            result.push(format!("  {}", line));
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{message_with_answer, new_query};
    use hickory_proto::op::Message;
    use hickory_proto::rr::rdata::CNAME;
    use hickory_proto::rr::Name;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::atomic::AtomicUsize;

    struct MockResolver {
        calls: Arc<AtomicUsize>,
        answer: Message,
    }

    #[async_trait]
    impl Resolver for MockResolver {
        async fn resolve(&self, _request: &Request) -> Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Response {
                message: self.answer.clone(),
                rtype: ResponseType::Resolved,
                reason: "RESOLVED (upstream)".to_string(),
            })
        }
    }

    fn temp_list(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn path_of(file: &tempfile::NamedTempFile) -> String {
        file.path().to_str().unwrap().to_string()
    }

    fn lists(entries: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(group, path)| (group.to_string(), vec![path.to_string()]))
            .collect()
    }

    fn client_groups(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(selector, groups)| {
                (
                    selector.to_string(),
                    groups.iter().map(|g| g.to_string()).collect(),
                )
            })
            .collect()
    }

    async fn sut(
        config: BlockingConfig,
        answer: Message,
    ) -> (BlockingResolver, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = BlockingResolver::new(
            &config,
            Box::new(MockResolver {
                calls: calls.clone(),
                answer,
            }),
        )
        .await
        .unwrap();
        (resolver, calls)
    }

    fn request(name: &str, qtype: RecordType, client_ip: &str, names: &[&str]) -> Request {
        Request::with_client_names(
            new_query(name, qtype).unwrap(),
            client_ip.parse().unwrap(),
            names.iter().map(|n| n.to_string()).collect(),
        )
    }

    fn assert_zero_ip_answer(response: &Response, qtype: RecordType) {
        assert_eq!(response.rtype, ResponseType::Blocked);
        assert_eq!(response.message.response_code(), ResponseCode::NoError);
        let answers = response.message.answers();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].ttl(), 21600);
        match qtype {
            RecordType::A => assert_eq!(
                answers[0].data(),
                Some(&RData::A(A(Ipv4Addr::UNSPECIFIED)))
            ),
            RecordType::AAAA => assert_eq!(
                answers[0].data(),
                Some(&RData::AAAA(AAAA(Ipv6Addr::UNSPECIFIED)))
            ),
            _ => panic!("unexpected qtype"),
        }
    }

    // 对应三个分组的标准测试配置
    struct Fixture {
        config: BlockingConfig,
        _files: Vec<tempfile::NamedTempFile>,
    }

    fn standard_fixture() -> Fixture {
        let group1 = temp_list("DOMAIN1.com");
        let group2 = temp_list("blocked2.com");
        let default_group = temp_list(
            "blocked3.com\n123.145.123.145\n2001:db8:85a3:8d3::370:7344\nbadcnamedomain.com",
        );

        let config = BlockingConfig {
            black_lists: lists(&[
                ("gr1", &path_of(&group1)),
                ("gr2", &path_of(&group2)),
                ("defaultGroup", &path_of(&default_group)),
            ]),
            client_groups_block: client_groups(&[
                ("client1", &["gr1"]),
                ("192.168.178.55", &["gr1"]),
                ("altName", &["gr2"]),
                ("10.43.8.67/28", &["gr1"]),
                ("default", &["defaultGroup"]),
            ]),
            refresh_period: -1,
            ..Default::default()
        };

        Fixture {
            config,
            _files: vec![group1, group2, default_group],
        }
    }

    #[tokio::test]
    async fn blocks_a_query_for_client_name() {
        let fixture = standard_fixture();
        let (resolver, _) = sut(fixture.config, Message::new()).await;

        let resp = resolver
            .resolve(&request("domain1.com.", RecordType::A, "1.2.1.2", &["client1"]))
            .await
            .unwrap();
        assert_eq!(resp.reason, "BLOCKED (gr1)");
        assert_zero_ip_answer(&resp, RecordType::A);
    }

    #[tokio::test]
    async fn blocks_aaaa_query_for_client_name() {
        let fixture = standard_fixture();
        let (resolver, _) = sut(fixture.config, Message::new()).await;

        let resp = resolver
            .resolve(&request("domain1.com.", RecordType::AAAA, "1.2.1.2", &["client1"]))
            .await
            .unwrap();
        assert_zero_ip_answer(&resp, RecordType::AAAA);
    }

    #[tokio::test]
    async fn blocked_response_survives_wire_roundtrip() {
        let fixture = standard_fixture();
        let (resolver, _) = sut(fixture.config, Message::new()).await;

        let resp = resolver
            .resolve(&request("domain1.com.", RecordType::A, "1.2.1.2", &["client1"]))
            .await
            .unwrap();

        let bytes = resp.message.to_vec().unwrap();
        let parsed = Message::from_vec(&bytes).unwrap();
        assert_eq!(parsed.response_code(), ResponseCode::NoError);
        assert_eq!(parsed.answers().len(), 1);
        assert_eq!(parsed.answers()[0].ttl(), 21600);
        assert_eq!(
            parsed.answers()[0].data(),
            Some(&RData::A(A(Ipv4Addr::UNSPECIFIED)))
        );
    }

    #[tokio::test]
    async fn blocks_query_for_client_ip() {
        let fixture = standard_fixture();
        let (resolver, _) = sut(fixture.config, Message::new()).await;

        let resp = resolver
            .resolve(&request(
                "domain1.com.",
                RecordType::A,
                "192.168.178.55",
                &["unknown"],
            ))
            .await
            .unwrap();
        assert_eq!(resp.reason, "BLOCKED (gr1)");
        assert_zero_ip_answer(&resp, RecordType::A);
    }

    #[tokio::test]
    async fn blocks_query_for_client_in_cidr_range() {
        let fixture = standard_fixture();
        let (resolver, _) = sut(fixture.config, Message::new()).await;

        let resp = resolver
            .resolve(&request("domain1.com.", RecordType::A, "10.43.8.70", &[]))
            .await
            .unwrap();
        assert_eq!(resp.reason, "BLOCKED (gr1)");
    }

    #[tokio::test]
    async fn unions_groups_over_all_client_names() {
        let fixture = standard_fixture();
        let (resolver, _) = sut(fixture.config, Message::new()).await;

        let resp = resolver
            .resolve(&request(
                "domain1.com.",
                RecordType::A,
                "1.2.1.2",
                &["client1", "altName"],
            ))
            .await
            .unwrap();
        assert_eq!(resp.reason, "BLOCKED (gr1)");

        let resp = resolver
            .resolve(&request(
                "blocked2.com.",
                RecordType::A,
                "1.2.1.2",
                &["client1", "altName"],
            ))
            .await
            .unwrap();
        assert_eq!(resp.reason, "BLOCKED (gr2)");
    }

    #[tokio::test]
    async fn default_group_applies_to_every_client() {
        let fixture = standard_fixture();
        let (resolver, _) = sut(fixture.config, Message::new()).await;

        let resp = resolver
            .resolve(&request("blocked3.com.", RecordType::A, "1.2.1.2", &["unknown"]))
            .await
            .unwrap();
        assert_eq!(resp.reason, "BLOCKED (defaultGroup)");
        assert_zero_ip_answer(&resp, RecordType::A);
    }

    #[tokio::test]
    async fn blocks_subdomains_of_listed_entries() {
        let fixture = standard_fixture();
        let (resolver, _) = sut(fixture.config, Message::new()).await;

        let resp = resolver
            .resolve(&request(
                "sub.tracker.blocked3.com.",
                RecordType::A,
                "1.2.1.2",
                &[],
            ))
            .await
            .unwrap();
        assert_eq!(resp.reason, "BLOCKED (defaultGroup)");
    }

    #[tokio::test]
    async fn nxdomain_block_type_returns_name_error() {
        let mut fixture = standard_fixture();
        fixture.config.block_type = "NxDomain".to_string();
        let (resolver, _) = sut(fixture.config, Message::new()).await;

        let resp = resolver
            .resolve(&request("blocked3.com.", RecordType::A, "1.2.1.2", &["unknown"]))
            .await
            .unwrap();
        assert_eq!(resp.reason, "BLOCKED (defaultGroup)");
        assert_eq!(resp.rtype, ResponseType::Blocked);
        assert_eq!(resp.message.response_code(), ResponseCode::NXDomain);
        assert!(resp.message.answers().is_empty());
    }

    #[tokio::test]
    async fn blocks_if_answer_contains_blacklisted_ipv4() {
        let fixture = standard_fixture();
        let answer =
            message_with_answer("example.com.", 300, RecordType::A, "123.145.123.145").unwrap();
        let (resolver, calls) = sut(fixture.config, answer).await;

        let resp = resolver
            .resolve(&request("example.com.", RecordType::A, "1.2.1.2", &["unknown"]))
            .await
            .unwrap();
        assert_eq!(resp.reason, "BLOCKED IP (defaultGroup)");
        assert_zero_ip_answer(&resp, RecordType::A);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blocks_if_answer_contains_blacklisted_ipv6() {
        let fixture = standard_fixture();
        let answer = message_with_answer(
            "example.com.",
            300,
            RecordType::AAAA,
            "2001:0db8:85a3:08d3::0370:7344",
        )
        .unwrap();
        let (resolver, _) = sut(fixture.config, answer).await;

        let resp = resolver
            .resolve(&request("example.com.", RecordType::AAAA, "1.2.1.2", &["unknown"]))
            .await
            .unwrap();
        assert_eq!(resp.reason, "BLOCKED IP (defaultGroup)");
        assert_zero_ip_answer(&resp, RecordType::AAAA);
    }

    #[tokio::test]
    async fn blocks_if_answer_contains_blacklisted_cname_target() {
        let fixture = standard_fixture();

        let mut answer =
            message_with_answer("example.com.", 300, RecordType::CNAME, "domain.com.").unwrap();
        answer.add_answer(Record::from_rdata(
            Name::from_utf8("domain.com.").unwrap(),
            300,
            RData::CNAME(CNAME(Name::from_utf8("badcnamedomain.com.").unwrap())),
        ));
        answer.add_answer(Record::from_rdata(
            Name::from_utf8("badcnamedomain.com.").unwrap(),
            300,
            RData::A(A("125.125.125.125".parse().unwrap())),
        ));

        let (resolver, _) = sut(fixture.config, answer).await;

        let resp = resolver
            .resolve(&request("example.com.", RecordType::A, "1.2.1.2", &["unknown"]))
            .await
            .unwrap();
        assert_eq!(resp.reason, "BLOCKED CNAME (defaultGroup)");
        assert_zero_ip_answer(&resp, RecordType::A);
    }

    #[tokio::test]
    async fn whitelist_wins_over_blacklist() {
        let file = temp_list("domain1.com");
        let config = BlockingConfig {
            black_lists: lists(&[("gr1", &path_of(&file))]),
            white_lists: lists(&[("gr1", &path_of(&file))]),
            client_groups_block: client_groups(&[("default", &["gr1"])]),
            refresh_period: -1,
            ..Default::default()
        };
        let (resolver, calls) = sut(config, Message::new()).await;

        let resp = resolver
            .resolve(&request("domain1.com.", RecordType::A, "1.2.1.2", &["unknown"]))
            .await
            .unwrap();
        assert_eq!(resp.rtype, ResponseType::Resolved);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn whitelist_only_blocks_everything_else() {
        let file = temp_list("domain1.com");
        let config = BlockingConfig {
            white_lists: lists(&[("gr1", &path_of(&file))]),
            client_groups_block: client_groups(&[("default", &["gr1"])]),
            refresh_period: -1,
            ..Default::default()
        };
        let (resolver, calls) = sut(config, Message::new()).await;

        let resp = resolver
            .resolve(&request("domain1.com.", RecordType::A, "1.2.1.2", &["unknown"]))
            .await
            .unwrap();
        assert_eq!(resp.rtype, ResponseType::Resolved);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let resp = resolver
            .resolve(&request("google.com.", RecordType::A, "1.2.1.2", &["unknown"]))
            .await
            .unwrap();
        assert_eq!(resp.reason, "BLOCKED (WHITELIST ONLY)");
        assert_eq!(resp.rtype, ResponseType::Blocked);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn whitelisted_answer_ip_passes_through() {
        let blacklist = temp_list("domain1.com");
        let whitelist =
            temp_list("blocked3.com\n123.145.123.145\n2001:db8:85a3:8d3::370:7344");
        let config = BlockingConfig {
            black_lists: lists(&[("gr1", &path_of(&blacklist))]),
            white_lists: lists(&[("gr1", &path_of(&whitelist))]),
            client_groups_block: client_groups(&[("default", &["gr1"])]),
            refresh_period: -1,
            ..Default::default()
        };
        let answer =
            message_with_answer("example.com.", 300, RecordType::A, "123.145.123.145").unwrap();
        let (resolver, calls) = sut(config, answer).await;

        let resp = resolver
            .resolve(&request("example.com.", RecordType::A, "1.2.1.2", &["unknown"]))
            .await
            .unwrap();
        assert_eq!(resp.rtype, ResponseType::Resolved);
        assert_eq!(
            resp.message.answers()[0].data(),
            Some(&RData::A(A("123.145.123.145".parse().unwrap())))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delegates_unlisted_domains() {
        let fixture = standard_fixture();
        let (resolver, calls) = sut(fixture.config, Message::new()).await;

        let resp = resolver
            .resolve(&request("example.com.", RecordType::A, "1.2.1.2", &["unknown"]))
            .await
            .unwrap();
        assert_eq!(resp.rtype, ResponseType::Resolved);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delegates_non_address_queries() {
        let fixture = standard_fixture();
        let (resolver, calls) = sut(fixture.config, Message::new()).await;

        let resp = resolver
            .resolve(&request("domain1.com.", RecordType::MX, "1.2.1.2", &["client1"]))
            .await
            .unwrap();
        assert_eq!(resp.rtype, ResponseType::Resolved);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delegates_when_no_lists_are_defined() {
        let (resolver, calls) = sut(BlockingConfig::default(), Message::new()).await;

        let resp = resolver
            .resolve(&request("example.com.", RecordType::A, "1.2.1.2", &["unknown"]))
            .await
            .unwrap();
        assert_eq!(resp.rtype, ResponseType::Resolved);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disable_and_reenable_via_control() {
        let fixture = standard_fixture();
        let (resolver, calls) = sut(fixture.config, Message::new()).await;
        let control = resolver.control();

        let resp = resolver
            .resolve(&request("blocked3.com.", RecordType::A, "1.2.1.2", &[]))
            .await
            .unwrap();
        assert_eq!(resp.rtype, ResponseType::Blocked);

        control.disable(None);
        let resp = resolver
            .resolve(&request("blocked3.com.", RecordType::A, "1.2.1.2", &[]))
            .await
            .unwrap();
        assert_eq!(resp.rtype, ResponseType::Resolved);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        control.enable();
        let resp = resolver
            .resolve(&request("blocked3.com.", RecordType::A, "1.2.1.2", &[]))
            .await
            .unwrap();
        assert_eq!(resp.rtype, ResponseType::Blocked);
    }

    #[tokio::test]
    async fn disable_with_duration_expires() {
        let fixture = standard_fixture();
        let (resolver, _) = sut(fixture.config, Message::new()).await;
        let control = resolver.control();

        control.disable(Some(Duration::from_millis(500)));
        let resp = resolver
            .resolve(&request("blocked3.com.", RecordType::A, "1.2.1.2", &[]))
            .await
            .unwrap();
        assert_eq!(resp.rtype, ResponseType::Resolved);

        tokio::time::sleep(Duration::from_secs(1)).await;

        let resp = resolver
            .resolve(&request("blocked3.com.", RecordType::A, "1.2.1.2", &[]))
            .await
            .unwrap();
        assert_eq!(resp.rtype, ResponseType::Blocked);
    }

    #[tokio::test]
    async fn unknown_block_type_fails_construction() {
        let calls = Arc::new(AtomicUsize::new(0));
        let result = BlockingResolver::new(
            &BlockingConfig {
                block_type: "wrong".to_string(),
                ..Default::default()
            },
            Box::new(MockResolver {
                calls,
                answer: Message::new(),
            }),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn configuration_reports_deactivated_without_config() {
        let (resolver, _) = sut(BlockingConfig::default(), Message::new()).await;
        assert_eq!(resolver.configuration(), vec!["deactivated".to_string()]);
    }

    #[tokio::test]
    async fn configuration_reports_lists_and_groups() {
        let fixture = standard_fixture();
        let (resolver, _) = sut(fixture.config, Message::new()).await;
        let lines = resolver.configuration();
        assert!(lines.len() > 1);
        assert!(lines.contains(&"blockType: ZeroIP".to_string()));
    }
}
