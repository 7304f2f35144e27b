pub mod blocking;
pub mod caching;
pub mod upstream;

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, CNAME};
use hickory_proto::rr::{Name, RData, Record, RecordType};

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 解析结果的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Resolved,
    Cached,
    Blocked,
}

impl std::fmt::Display for ResponseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResponseType::Resolved => "RESOLVED",
            ResponseType::Cached => "CACHED",
            ResponseType::Blocked => "BLOCKED",
        };
        f.write_str(s)
    }
}

/// 一次 DNS 查询请求
///
/// 对链中下游节点只读；需要改写报文的节点先拷贝再操作。
pub struct Request {
    pub message: Message,
    pub client_ip: IpAddr,
    pub client_names: Vec<String>,
    pub id: u64,
    pub received_at: Instant,
}

impl Request {
    pub fn new(message: Message, client_ip: IpAddr) -> Self {
        Self::with_client_names(message, client_ip, Vec::new())
    }

    pub fn with_client_names(
        message: Message,
        client_ip: IpAddr,
        client_names: Vec<String>,
    ) -> Self {
        Self {
            message,
            client_ip,
            client_names,
            id: REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed),
            received_at: Instant::now(),
        }
    }

    /// 问题区的域名（小写、去尾部点）
    pub fn question_name(&self) -> String {
        self.message
            .queries()
            .first()
            .map(|q| normalize_name(&q.name().to_utf8()))
            .unwrap_or_default()
    }

    pub fn question_type(&self) -> Option<RecordType> {
        self.message.queries().first().map(|q| q.query_type())
    }
}

/// 链产出的应答
pub struct Response {
    pub message: Message,
    pub rtype: ResponseType,
    pub reason: String,
}

/// 解析器链中的一个节点
///
/// 自己无法决定的请求转发给后继节点；后继在构造时注入，之后不再变更。
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, request: &Request) -> Result<Response>;

    /// 当前配置的多行描述；被停用的节点只返回 "deactivated"
    fn configuration(&self) -> Vec<String> {
        Vec::new()
    }
}

/// 小写并去掉尾部的根点
pub fn normalize_name(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

/// 构建一条查询报文
pub fn new_query(name: &str, qtype: RecordType) -> Result<Message> {
    let name = Name::from_utf8(name)
        .map_err(|e| anyhow::anyhow!("invalid domain name '{}': {}", name, e))?;
    let mut message = Message::new();
    message
        .set_id(next_query_id())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(name, qtype));
    Ok(message)
}

/// 以请求报文为模板构建应答（拷贝 id 与问题区）
pub fn reply_template(request: &Message) -> Message {
    let mut message = Message::new();
    message
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(request.recursion_desired())
        .set_recursion_available(true)
        .set_response_code(ResponseCode::NoError);
    for q in request.queries() {
        message.add_query(q.clone());
    }
    message
}

/// 构建带单条答案的应答报文，value 按记录类型解析
pub fn message_with_answer(
    name: &str,
    ttl: u32,
    rtype: RecordType,
    value: &str,
) -> Result<Message> {
    let owner = Name::from_utf8(name)
        .map_err(|e| anyhow::anyhow!("invalid domain name '{}': {}", name, e))?;
    let rdata = match rtype {
        RecordType::A => RData::A(A(value
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid IPv4 address '{}': {}", value, e))?)),
        RecordType::AAAA => RData::AAAA(AAAA(value
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid IPv6 address '{}': {}", value, e))?)),
        RecordType::CNAME => RData::CNAME(CNAME(
            Name::from_utf8(value)
                .map_err(|e| anyhow::anyhow!("invalid CNAME target '{}': {}", value, e))?,
        )),
        other => anyhow::bail!("unsupported record type for answer: {}", other),
    };

    let mut message = Message::new();
    message
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_response_code(ResponseCode::NoError)
        .add_query(Query::query(owner.clone(), rtype))
        .add_answer(Record::from_rdata(owner, ttl, rdata));
    Ok(message)
}

/// 答案区所有 RR 的最小 TTL
pub fn min_answer_ttl(message: &Message) -> Option<u32> {
    message.answers().iter().map(|r| r.ttl()).min()
}

/// 把答案区所有 RR 的 TTL 改写为同一个值
pub fn set_answer_ttls(message: &mut Message, ttl: u32) {
    let mut answers = message.take_answers();
    for record in &mut answers {
        record.set_ttl(ttl);
    }
    message.insert_answers(answers);
}

fn next_query_id() -> u16 {
    // 查询 id 只需要对同一客户端的在途请求唯一，取计数器低 16 位即可
    REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed) as u16
}
