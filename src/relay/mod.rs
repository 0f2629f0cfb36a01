//! # 流式转发模块
//!
//! 服务商解析 → 凭据解析 → 上游流式调用 → 逐片段转发给调用方。

pub mod adapter;
pub mod event_stream;
pub mod service;
pub mod types;
pub mod upstream;

pub use service::{RelayInterrupted, RelayStream, StreamingRelay};
pub use types::{Fragment, RelayRequest, Turn, TurnRole, parse_turns};
pub use upstream::{ByteStream, HttpUpstream, UpstreamClient, UpstreamError};
