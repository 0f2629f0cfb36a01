//! # 会话 Cookie
//!
//! 访问令牌与刷新令牌分别通过 `access` / `refresh` Cookie 下发，
//! 均为 `HttpOnly; SameSite=Strict; Path=/`。解析与序列化交给 `CookieJar`。

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration;

/// 访问令牌 Cookie 名称
pub const ACCESS_COOKIE: &str = "access";
/// 刷新令牌 Cookie 名称
pub const REFRESH_COOKIE: &str = "refresh";

/// 读取 jar 中指定 Cookie 的值；空值视为缺失
#[must_use]
pub fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|cookie| cookie.value().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// 从请求头读取指定 Cookie 的值
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    cookie_value(&CookieJar::from_headers(headers), name)
}

fn build(name: &str, value: String, max_age: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(Duration::seconds(max_age))
        .secure(secure)
        .build()
}

/// 构造会话 Cookie
#[must_use]
pub fn session_cookie(name: &str, token: &str, max_age: i64, secure: bool) -> Cookie<'static> {
    build(name, token.to_string(), max_age, secure)
}

/// 构造清除 Cookie（`Max-Age=0`）
#[must_use]
pub fn clear_cookie(name: &str, secure: bool) -> Cookie<'static> {
    build(name, String::new(), 0, secure)
}
