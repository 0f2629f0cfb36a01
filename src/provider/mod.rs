//! Provider directory module。
//!
//! - `types`：服务商协议类型与描述
//! - `registry`：按名称/ID 查找服务商的目录（内存与数据库实现）
//! - `service`：注册服务商并保存其默认密钥

mod registry;
mod service;
mod types;

pub use registry::{DatabaseProviderDirectory, MemoryProviderDirectory, ProviderDirectory};
pub use service::ProviderService;
pub use types::{ProviderDescriptor, ProviderKind, canonical_name};
