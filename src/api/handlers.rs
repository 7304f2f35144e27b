use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::dns::blocking::BlockingControl;

use super::models::BlockingStatus;

/// 共享应用状态
#[derive(Clone)]
pub struct AppState {
    pub blocking: Arc<BlockingControl>,
}

/// GET /api/blocking/enable
pub async fn blocking_enable(State(state): State<AppState>) -> StatusCode {
    state.blocking.enable();
    StatusCode::OK
}

/// GET /api/blocking/disable?duration=500ms
pub async fn blocking_disable(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> StatusCode {
    match params.get("duration") {
        Some(raw) => match parse_duration(raw) {
            Ok(duration) => {
                state.blocking.disable(Some(duration));
                StatusCode::OK
            }
            // 解析失败不改变任何状态
            Err(_) => StatusCode::BAD_REQUEST,
        },
        None => {
            state.blocking.disable(None);
            StatusCode::OK
        }
    }
}

/// GET /api/blocking/status
pub async fn blocking_status(State(state): State<AppState>) -> Json<BlockingStatus> {
    Json(BlockingStatus {
        enabled: state.blocking.is_enabled(),
    })
}

/// 解析 "500ms"、"30s"、"1h30m" 这类时长字面量
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("empty duration");
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits_end == 0 {
            anyhow::bail!("invalid duration '{}'", s);
        }
        let value: u64 = rest[..digits_end].parse()?;
        rest = &rest[digits_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];

        total += match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            _ => anyhow::bail!("invalid duration unit '{}' in '{}'", unit, s),
        };
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_durations() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn parse_compound_duration() {
        assert_eq!(
            parse_duration("1h30m").unwrap(),
            Duration::from_secs(3600 + 1800)
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_duration("xyz").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("ms").is_err());
    }
}
