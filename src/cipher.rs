//! # 密钥加密模块
//!
//! 使用 AES-256-GCM 对服务商密钥进行静态加密。
//!
//! IV 由 4 字节随机前缀（每个加密器实例生成一次）加 8 字节单调递增计数器组成，
//! 同一进程、同一密钥下不会重复。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use aes_gcm::{
    Aes256Gcm,
    aead::{Aead, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// AES-GCM IV 长度（字节）
pub const IV_LEN: usize = 12;
/// AES-GCM 认证标签长度（字节）
const TAG_LEN: usize = 16;
/// 密钥长度（字节）
pub const KEY_LEN: usize = 32;

/// 加密器错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),
    #[error("invalid iv length: expected {expected}, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },
    #[error("malformed encrypted value: {0}")]
    Malformed(String),
    #[error("ciphertext is truncated")]
    Truncated,
    #[error("ciphertext failed authentication")]
    Authentication,
    #[error("decrypted secret is not valid utf-8")]
    NotUtf8,
    #[error("encryption failed")]
    Encryption,
    #[error("iv counter exhausted")]
    IvExhausted,
}

/// 加密后的值（Base64 编码）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    /// Base64编码的密文（含认证标签）
    pub ciphertext: String,
    /// Base64编码的 IV
    pub iv: String,
}

/// 服务商密钥加密器
pub struct SecretCipher {
    cipher: Aes256Gcm,
    iv_prefix: [u8; 4],
    counter: AtomicU64,
}

impl fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretCipher")
            .field("key", &"<redacted>")
            .field("sealed", &self.counter.load(Ordering::Relaxed))
            .finish()
    }
}

impl SecretCipher {
    /// 使用32字节密钥创建加密器
    #[must_use]
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        let key: [u8; KEY_LEN] = *key;
        let cipher = Aes256Gcm::new(&key.into());
        let mut iv_prefix = [0u8; 4];
        OsRng.fill_bytes(&mut iv_prefix);
        Self {
            cipher,
            iv_prefix,
            counter: AtomicU64::new(0),
        }
    }

    /// 从64个字符的十六进制字符串创建加密器
    pub fn from_hex(key_hex: &str) -> Result<Self, CipherError> {
        let key_hex = key_hex.trim();
        if key_hex.len() != KEY_LEN * 2 {
            return Err(CipherError::InvalidKey(format!(
                "expected {} hex characters, got {}",
                KEY_LEN * 2,
                key_hex.len()
            )));
        }

        let bytes = hex::decode(key_hex).map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CipherError::InvalidKey("key must be 32 bytes".to_string()))?;
        Ok(Self::new(&key))
    }

    /// 生成新的十六进制密钥
    #[must_use]
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        hex::encode(key)
    }

    fn next_iv(&self) -> Result<[u8; IV_LEN], CipherError> {
        let count = self
            .counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_add(1))
            .map_err(|_| CipherError::IvExhausted)?;

        let mut iv = [0u8; IV_LEN];
        iv[..4].copy_from_slice(&self.iv_prefix);
        iv[4..].copy_from_slice(&count.to_be_bytes());
        Ok(iv)
    }

    /// 加密明文，返回原始字节形式的 (密文, IV)
    pub fn seal_raw(&self, plaintext: &str) -> Result<(Vec<u8>, [u8; IV_LEN]), CipherError> {
        let iv = self.next_iv()?;
        let ciphertext = self
            .cipher
            .encrypt(&iv.into(), plaintext.as_bytes())
            .map_err(|_| CipherError::Encryption)?;
        Ok((ciphertext, iv))
    }

    /// 解密原始字节形式的密文
    pub fn open_raw(&self, ciphertext: &[u8], iv: &[u8]) -> Result<String, CipherError> {
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| CipherError::InvalidIvLength {
            expected: IV_LEN,
            actual: iv.len(),
        })?;
        if ciphertext.len() < TAG_LEN {
            return Err(CipherError::Truncated);
        }

        let plaintext = self
            .cipher
            .decrypt(&iv.into(), ciphertext)
            .map_err(|_| CipherError::Authentication)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::NotUtf8)
    }

    /// 加密字符串
    pub fn seal(&self, plaintext: &str) -> Result<EncryptedValue, CipherError> {
        let (ciphertext, iv) = self.seal_raw(plaintext)?;
        Ok(EncryptedValue {
            ciphertext: general_purpose::STANDARD.encode(ciphertext),
            iv: general_purpose::STANDARD.encode(iv),
        })
    }

    /// 解密字符串
    pub fn open(&self, encrypted: &EncryptedValue) -> Result<String, CipherError> {
        let ciphertext = general_purpose::STANDARD
            .decode(&encrypted.ciphertext)
            .map_err(|e| CipherError::Malformed(format!("ciphertext: {e}")))?;
        let iv = general_purpose::STANDARD
            .decode(&encrypted.iv)
            .map_err(|e| CipherError::Malformed(format!("iv: {e}")))?;
        self.open_raw(&ciphertext, &iv)
    }
}
