//! SSE 解码器：按行缓冲，跨块拼接，兼容 CRLF 与注释行。

use bytes::BytesMut;
use serde_json::Value;
use std::io;
use tokio_util::codec::Decoder;

/// 流结束标记
pub const DONE_MARKER: &str = "[DONE]";

/// 单个 SSE 事件，`data` 为多行拼接后的原始文本
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
    pub retry: Option<u64>,
}

impl SseEvent {
    /// `data: [DONE]`
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.data.trim() == DONE_MARKER
    }

    /// 将 data 解析为 JSON；空数据、`[DONE]` 与非 JSON 返回 `None`
    #[must_use]
    pub fn json(&self) -> Option<Value> {
        let payload = self.data.trim();
        if payload.is_empty() || self.is_done() {
            return None;
        }
        serde_json::from_str(payload).ok()
    }
}

/// 单行或单个事件（多行 data 累计）的默认上限
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct SseDecoder {
    current: SseEvent,
    has_any: bool,
    /// 缓冲区中已确认不含 `\n` 的前缀长度，下次从这里继续扫描
    next_index: usize,
    max_length: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_length(MAX_EVENT_BYTES)
    }
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 超过 `max_length` 字节的行或事件会以 `InvalidData` 报错
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            current: SseEvent::default(),
            has_any: false,
            next_index: 0,
            max_length,
        }
    }

    fn too_long(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("SSE event exceeds {} bytes", self.max_length),
        )
    }

    fn take_line(&mut self, line: BytesMut) -> io::Result<Option<SseEvent>> {
        let line = Self::to_line(line)?;
        let event = self.process_line(&line);
        if self.current.data.len() > self.max_length {
            return Err(self.too_long());
        }
        Ok(event)
    }

    fn finish_event(&mut self) -> Option<SseEvent> {
        if !self.has_any {
            return None;
        }
        self.has_any = false;
        Some(std::mem::take(&mut self.current))
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.finish_event();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                if !self.current.data.is_empty() {
                    self.current.data.push('\n');
                }
                self.current.data.push_str(value);
                self.has_any = true;
            }
            "event" => {
                self.current.event = Some(value.to_string());
                self.has_any = true;
            }
            "id" => {
                self.current.id = Some(value.to_string());
                self.has_any = true;
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.current.retry = Some(ms);
                }
                self.has_any = true;
            }
            _ => {}
        }
        None
    }

    fn to_line(mut bytes: BytesMut) -> io::Result<String> {
        if bytes.ends_with(b"\n") {
            bytes.truncate(bytes.len() - 1);
        }
        if bytes.ends_with(b"\r") {
            bytes.truncate(bytes.len() - 1);
        }
        String::from_utf8(bytes.to_vec()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl Decoder for SseDecoder {
    type Item = SseEvent;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Self::Item>> {
        loop {
            let scanned = self.next_index.min(src.len());
            let Some(offset) = src[scanned..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_length {
                    return Err(self.too_long());
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let end = scanned + offset;
            self.next_index = 0;
            if end > self.max_length {
                return Err(self.too_long());
            }
            if let Some(event) = self.take_line(src.split_to(end + 1))? {
                return Ok(Some(event));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<Self::Item>> {
        if let Some(event) = self.decode(src)? {
            return Ok(Some(event));
        }
        if !src.is_empty() {
            self.next_index = 0;
            if let Some(event) = self.take_line(src.split_to(src.len()))? {
                return Ok(Some(event));
            }
        }
        Ok(self.finish_event())
    }
}
