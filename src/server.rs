use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hickory_proto::op::Message;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dns::{Request, Resolver};

const MAX_UDP_PACKET: usize = 4096;

/// UDP 前端：每个查询一个任务，收包、跑链、回包
pub async fn start(
    listen: &str,
    chain: Arc<dyn Resolver>,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let socket = UdpSocket::bind(listen)
        .await
        .with_context(|| format!("failed to bind DNS listener on '{}'", listen))?;
    let addr = socket.local_addr()?;
    info!(addr = %addr, "DNS server listening");

    let socket = Arc::new(socket);
    let handle = tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_UDP_PACKET];
        loop {
            let (len, peer) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "udp receive failed");
                    continue;
                }
            };
            let data = buf[..len].to_vec();
            let socket = socket.clone();
            let chain = chain.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_packet(&socket, chain.as_ref(), data, peer).await {
                    debug!(peer = %peer, error = %e, "query handling failed");
                }
            });
        }
    });

    Ok((addr, handle))
}

async fn handle_packet(
    socket: &UdpSocket,
    chain: &dyn Resolver,
    data: Vec<u8>,
    peer: SocketAddr,
) -> Result<()> {
    let message = Message::from_vec(&data)?;
    let request = Request::new(message, peer.ip());

    let response = chain.resolve(&request).await?;
    debug!(
        id = request.id,
        client = %peer.ip(),
        rtype = %response.rtype,
        reason = response.reason.as_str(),
        "query answered"
    );

    let bytes = response.message.to_vec()?;
    socket.send_to(&bytes, peer).await?;
    Ok(())
}
