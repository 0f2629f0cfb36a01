//! 上游 HTTP 调用

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use thiserror::Error;

use super::adapter::UpstreamRequest;
use crate::error::{GatewayError, Result};

/// 上游响应体字节流
pub type ByteStream = BoxStream<'static, std::result::Result<Bytes, UpstreamError>>;

/// 错误响应体最多保留的字节数
const ERROR_BODY_LIMIT: usize = 512;

/// 上游传输错误。消息中不包含请求 URL（其中可能带有密钥）。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("failed to reach upstream: {0}")]
    Connect(String),
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream body read failed: {0}")]
    Read(String),
}

/// 打开流式上游调用
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// 发送请求；非 2xx 状态在开始流式读取前即返回错误
    async fn open(&self, request: UpstreamRequest) -> std::result::Result<ByteStream, UpstreamError>;
}

/// 基于 reqwest 的上游客户端
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    /// 只限制建连时间；流读取不设截止时间
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| GatewayError::config_with_source("failed to build HTTP client", e))?;
        Ok(Self { client })
    }
}

fn truncate(mut text: String) -> String {
    if text.len() > ERROR_BODY_LIMIT {
        let mut end = ERROR_BODY_LIMIT;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

/// 只读取错误响应体的前 [`ERROR_BODY_LIMIT`] 字节，其余部分随连接丢弃
async fn read_error_body(response: reqwest::Response) -> String {
    let mut body = std::pin::pin!(response.bytes_stream());
    let mut head = Vec::with_capacity(ERROR_BODY_LIMIT);
    while head.len() < ERROR_BODY_LIMIT {
        match body.next().await {
            Some(Ok(chunk)) => {
                let take = chunk.len().min(ERROR_BODY_LIMIT - head.len());
                head.extend_from_slice(&chunk[..take]);
            }
            Some(Err(_)) | None => break,
        }
    }
    truncate(String::from_utf8_lossy(&head).into_owned())
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn open(&self, request: UpstreamRequest) -> std::result::Result<ByteStream, UpstreamError> {
        let mut builder = self
            .client
            .post(&request.url)
            .query(&request.query)
            .json(&request.body);
        if let Some(key) = &request.query_key {
            builder = builder.query(&[("key", key.expose())]);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| UpstreamError::Connect(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: read_error_body(response).await,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| UpstreamError::Read(e.without_url().to_string())))
            .boxed())
    }
}
