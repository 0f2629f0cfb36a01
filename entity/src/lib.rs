//! # Entity 模块
//!
//! 包含所有 Sea-ORM 实体定义

pub mod credentials;
pub mod providers;
pub mod users;

pub use credentials::Entity as Credentials;
pub use providers::Entity as Providers;
pub use users::Entity as Users;

#[cfg(test)]
mod tests;
