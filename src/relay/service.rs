//! # 流式转发
//!
//! 上游读取由独立任务完成，经有界通道逐片段交给调用方：
//! - 通道满时暂停读取上游（背压）
//! - 接收端被丢弃（客户端断开）时立即停止并丢弃上游连接
//! - 开始流式输出后上游出错：发送中断标记并结束，状态码已无法更改

use std::sync::Arc;

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::codec::Decoder;

use super::adapter::{build_request, endpoint, extract_text};
use super::event_stream::SseDecoder;
use super::types::{Fragment, RelayRequest};
use super::upstream::{ByteStream, UpstreamClient};
use crate::config::UpstreamConfig;
use crate::error::{GatewayError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::provider::{ProviderDirectory, ProviderKind};
use crate::vault::{CredentialVault, Owner};
use crate::{ldebug, lerror, linfo, lwarn};

/// 流式输出开始后的上游故障
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("upstream stream interrupted")]
pub struct RelayInterrupted;

/// 通道中的一项
pub type RelayItem = std::result::Result<Bytes, RelayInterrupted>;

/// 转发给调用方的流
#[derive(Debug)]
pub struct RelayStream {
    receiver: mpsc::Receiver<RelayItem>,
}

impl RelayStream {
    /// 下一个片段；`None` 表示流结束
    pub async fn recv(&mut self) -> Option<RelayItem> {
        self.receiver.recv().await
    }

    /// 转换为 HTTP 响应体；中断项会使响应提前终止
    #[must_use]
    pub fn into_body(self) -> Body {
        Body::from_stream(ReceiverStream::new(self.receiver))
    }
}

/// 转发结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Disconnected,
    Failed,
}

/// 流式转发服务。请求之间不共享可变状态。
pub struct StreamingRelay {
    providers: Arc<dyn ProviderDirectory>,
    vault: Arc<CredentialVault>,
    upstream: Arc<dyn UpstreamClient>,
    config: Arc<UpstreamConfig>,
}

impl StreamingRelay {
    #[must_use]
    pub fn new(
        providers: Arc<dyn ProviderDirectory>,
        vault: Arc<CredentialVault>,
        upstream: Arc<dyn UpstreamClient>,
        config: Arc<UpstreamConfig>,
    ) -> Self {
        Self {
            providers,
            vault,
            upstream,
            config,
        }
    }

    /// 解析服务商与凭据并打开上游流。
    ///
    /// 返回 `Err` 时尚未向调用方输出任何内容。
    pub async fn open(&self, request: RelayRequest, request_id: &str) -> Result<RelayStream> {
        let provider = self
            .providers
            .find_by_name(&request.provider)
            .await?
            .ok_or_else(|| GatewayError::not_found("provider", request.provider.trim()))?;

        let secret = self
            .vault
            .resolve_secret(
                &Owner::user(request.caller_id.as_str()),
                provider.id,
                &provider.name,
                request_id,
            )
            .await?;

        let upstream_request = build_request(
            provider.kind,
            endpoint(&self.config, provider.kind),
            secret,
            &request.turns,
        );
        linfo!(
            request_id,
            LogStage::UpstreamRequest,
            LogComponent::Upstream,
            "open",
            format!(
                "🚀 发起上游请求 provider={} url={} turns={}",
                provider.name,
                upstream_request.url,
                request.turns.len()
            )
        );

        let upstream = self.upstream.open(upstream_request).await.map_err(|err| {
            lerror!(
                request_id,
                LogStage::UpstreamRequest,
                LogComponent::Upstream,
                "open",
                format!("上游请求失败 provider={}: {err}", provider.name)
            );
            GatewayError::upstream_with_source(err.to_string(), provider.name.clone(), err)
        })?;

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let request_id = request_id.to_string();
        tokio::spawn(async move {
            let outcome = forward(upstream, provider.kind, &tx, &request_id).await;
            match outcome {
                Outcome::Completed => linfo!(
                    request_id,
                    LogStage::Streaming,
                    LogComponent::Relay,
                    "forward",
                    format!("✅ 流式转发完成 provider={}", provider.name)
                ),
                Outcome::Disconnected => lwarn!(
                    request_id,
                    LogStage::Streaming,
                    LogComponent::Relay,
                    "forward",
                    format!("客户端已断开，停止读取上游 provider={}", provider.name)
                ),
                Outcome::Failed => {
                    let _ = tx.send(Err(RelayInterrupted)).await;
                }
            }
        });

        Ok(RelayStream { receiver: rx })
    }
}

/// 把事件中的文本逐条发送；返回 `false` 表示接收端已关闭
async fn emit(
    event: &serde_json::Value,
    kind: ProviderKind,
    tx: &mpsc::Sender<RelayItem>,
) -> bool {
    for text in extract_text(kind, event) {
        if tx.send(Ok(Fragment::new(text).to_ndjson())).await.is_err() {
            return false;
        }
    }
    true
}

/// 从已缓冲的字节中解出所有完整事件并发送
async fn drain(
    decoder: &mut SseDecoder,
    buffer: &mut BytesMut,
    at_eof: bool,
    kind: ProviderKind,
    tx: &mpsc::Sender<RelayItem>,
    request_id: &str,
) -> Option<Outcome> {
    loop {
        let decoded = if at_eof {
            decoder.decode_eof(buffer)
        } else {
            decoder.decode(buffer)
        };
        let event = match decoded {
            Ok(Some(event)) => event,
            Ok(None) => return None,
            Err(err) => {
                lerror!(
                    request_id,
                    LogStage::Streaming,
                    LogComponent::Relay,
                    "decode",
                    format!("上游事件解码失败: {err}")
                );
                return Some(Outcome::Failed);
            }
        };

        if event.is_done() {
            return Some(Outcome::Completed);
        }
        if let Some(json) = event.json()
            && !emit(&json, kind, tx).await
        {
            return Some(Outcome::Disconnected);
        }
    }
}

async fn forward(
    mut upstream: ByteStream,
    kind: ProviderKind,
    tx: &mpsc::Sender<RelayItem>,
    request_id: &str,
) -> Outcome {
    let mut decoder = SseDecoder::new();
    let mut buffer = BytesMut::new();

    loop {
        let next = tokio::select! {
            biased;
            () = tx.closed() => return Outcome::Disconnected,
            next = upstream.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                ldebug!(
                    request_id,
                    LogStage::Streaming,
                    LogComponent::Relay,
                    "chunk",
                    format!("收到上游数据块 {} 字节", chunk.len())
                );
                buffer.extend_from_slice(&chunk);
                if let Some(outcome) =
                    drain(&mut decoder, &mut buffer, false, kind, tx, request_id).await
                {
                    return outcome;
                }
            }
            Some(Err(err)) => {
                lerror!(
                    request_id,
                    LogStage::Streaming,
                    LogComponent::Upstream,
                    "read",
                    format!("流式输出中上游出错，提前结束: {err}")
                );
                return Outcome::Failed;
            }
            None => {
                return drain(&mut decoder, &mut buffer, true, kind, tx, request_id)
                    .await
                    .unwrap_or(Outcome::Completed);
            }
        }
    }
}
