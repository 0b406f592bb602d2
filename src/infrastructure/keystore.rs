//! 加密密钥材料（keystore JSON）
//!
//! 格式沿用 Web3 Secret Storage v3 的结构，算法为 PBKDF2-HMAC-SHA256 + AES-256-GCM：
//! - 派生 64 字节 dk：前 32 字节作为 AES 密钥，后 32 字节参与 MAC
//! - mac = keccak256(dk[32..64] ‖ ciphertext)，先于解密做常量时间比较
//! - ciphertext 为 GCM 输出（含 16 字节认证标签）

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use ethers::types::Address;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sha3::{Digest, Keccak256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::domain::{CustodyError, CustodyResult, Passphrase};

pub const DEFAULT_ITERATIONS: u32 = 100_000;
/// 解密时接受的迭代次数上限；记录中的 `c` 不可信
pub const MAX_ITERATIONS: u32 = DEFAULT_ITERATIONS * 10;
const SALT_LENGTH: usize = 16;
const DERIVED_KEY_LENGTH: usize = 64;
const NONCE_LENGTH: usize = 12;
const SECRET_LENGTH: usize = 32;

const CIPHER: &str = "aes-256-gcm";
const KDF: &str = "pbkdf2";
const PRF: &str = "hmac-sha256";

#[derive(Debug, Serialize, Deserialize)]
pub struct KeystoreFile {
    pub version: u32,
    pub id: String,
    /// 小写十六进制地址，不带 0x
    pub address: String,
    pub crypto: CryptoSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CryptoSection {
    pub cipher: String,
    pub cipherparams: CipherParams,
    pub ciphertext: String,
    pub kdf: String,
    pub kdfparams: KdfParams,
    pub mac: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KdfParams {
    pub c: u32,
    pub dklen: usize,
    pub prf: String,
    pub salt: String,
}

fn derive_key(passphrase: &Passphrase, salt: &[u8], iterations: u32) -> Zeroizing<[u8; DERIVED_KEY_LENGTH]> {
    let mut dk = Zeroizing::new([0u8; DERIVED_KEY_LENGTH]);
    pbkdf2_hmac::<Sha256>(passphrase.expose().as_bytes(), salt, iterations, &mut dk[..]);
    dk
}

fn compute_mac(mac_key: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(mac_key);
    hasher.update(ciphertext);
    hasher.finalize().into()
}

/// 用口令加密私钥，返回 keystore JSON 文本
pub fn encrypt_key(
    secret: &[u8],
    address: &Address,
    passphrase: &Passphrase,
    iterations: u32,
) -> CustodyResult<String> {
    if secret.len() != SECRET_LENGTH {
        return Err(CustodyError::InvalidInput(format!(
            "secret key must be {} bytes",
            SECRET_LENGTH
        )));
    }
    if iterations == 0 {
        return Err(CustodyError::InvalidInput("kdf iterations must be positive".into()));
    }

    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    let dk = derive_key(passphrase, &salt, iterations);

    let cipher = Aes256Gcm::new_from_slice(&dk[..32])
        .map_err(|e| CustodyError::Storage(format!("invalid cipher key: {}", e)))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, secret)
        .map_err(|e| CustodyError::Storage(format!("encryption failed: {}", e)))?;
    let mac = compute_mac(&dk[32..], &ciphertext);

    let file = KeystoreFile {
        version: 3,
        id: uuid::Uuid::new_v4().to_string(),
        address: hex::encode(address.as_bytes()),
        crypto: CryptoSection {
            cipher: CIPHER.to_string(),
            cipherparams: CipherParams {
                iv: hex::encode(nonce),
            },
            ciphertext: hex::encode(&ciphertext),
            kdf: KDF.to_string(),
            kdfparams: KdfParams {
                c: iterations,
                dklen: DERIVED_KEY_LENGTH,
                prf: PRF.to_string(),
                salt: hex::encode(salt),
            },
            mac: hex::encode(mac),
        },
    };

    serde_json::to_string(&file).map_err(CustodyError::storage)
}

/// 解析 keystore JSON（不解密）
pub fn parse(json: &str) -> CustodyResult<KeystoreFile> {
    serde_json::from_str(json)
        .map_err(|e| CustodyError::DecryptionFailed(format!("malformed keystore: {}", e)))
}

/// 用口令解密，返回 32 字节私钥（释放时清零）
pub fn decrypt_key(json: &str, passphrase: &Passphrase) -> CustodyResult<Zeroizing<Vec<u8>>> {
    let file = parse(json)?;
    let crypto = &file.crypto;
    let corrupt = |what: &str| CustodyError::DecryptionFailed(format!("corrupt keystore: {}", what));

    if crypto.cipher != CIPHER || crypto.kdf != KDF || crypto.kdfparams.prf != PRF {
        return Err(CustodyError::DecryptionFailed(format!(
            "unsupported keystore scheme {}/{}/{}",
            crypto.kdf, crypto.kdfparams.prf, crypto.cipher
        )));
    }
    if crypto.kdfparams.dklen != DERIVED_KEY_LENGTH
        || crypto.kdfparams.c == 0
        || crypto.kdfparams.c > MAX_ITERATIONS
    {
        return Err(corrupt("kdf parameters"));
    }

    let salt = hex::decode(&crypto.kdfparams.salt).map_err(|_| corrupt("salt"))?;
    let iv = hex::decode(&crypto.cipherparams.iv).map_err(|_| corrupt("iv"))?;
    let ciphertext = hex::decode(&crypto.ciphertext).map_err(|_| corrupt("ciphertext"))?;
    let expected_mac = hex::decode(&crypto.mac).map_err(|_| corrupt("mac"))?;
    if iv.len() != NONCE_LENGTH {
        return Err(corrupt("iv length"));
    }

    let dk = derive_key(passphrase, &salt, crypto.kdfparams.c);
    let mac = compute_mac(&dk[32..], &ciphertext);
    if !bool::from(mac.as_slice().ct_eq(expected_mac.as_slice())) {
        return Err(CustodyError::DecryptionFailed("incorrect passphrase".into()));
    }

    let cipher = Aes256Gcm::new_from_slice(&dk[..32]).map_err(|_| corrupt("cipher key"))?;
    let secret = cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| corrupt("authentication tag"))?;

    if secret.len() != SECRET_LENGTH {
        return Err(corrupt("secret length"));
    }
    Ok(secret)
}
