use serde::{Deserialize, Serialize};

/// `GET /api/blocking/status` 的应答体
#[derive(Debug, Serialize, Deserialize)]
pub struct BlockingStatus {
    pub enabled: bool,
}
