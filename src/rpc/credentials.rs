//! Credential files the daemon writes during start-up.
//!
//! Both files appear some time after the process starts and may be observed half
//! written. Reads that find a missing, empty or truncated file return
//! [`RpcError::CredentialPending`], which callers treat as transient.

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::RpcError;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Serialized macaroon.
#[derive(Clone, PartialEq, Eq)]
pub struct Macaroon(Vec<u8>);

impl Macaroon {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hex form sent in the `macaroon` metadata header.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Macaroon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Macaroon({} bytes)", self.0.len())
    }
}

/// Reads a macaroon file.
pub async fn read_macaroon(path: &Path) -> Result<Macaroon, RpcError> {
    let bytes = read_pending(path).await?;
    if bytes.is_empty() {
        return Err(RpcError::CredentialPending(format!("{} is empty", path.display())));
    }
    Ok(Macaroon(bytes))
}

/// Reads the PEM certificate, requiring a complete BEGIN/END block.
pub async fn read_tls_cert(path: &Path) -> Result<Vec<u8>, RpcError> {
    let bytes = read_pending(path).await?;
    let text = String::from_utf8_lossy(&bytes);
    match (text.find(PEM_BEGIN), text.rfind(PEM_END)) {
        (Some(begin), Some(end)) if begin < end => Ok(bytes),
        _ => Err(RpcError::CredentialPending(format!(
            "{} is not a complete PEM certificate",
            path.display()
        ))),
    }
}

async fn read_pending(path: &Path) -> Result<Vec<u8>, RpcError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            Err(RpcError::CredentialPending(format!("{} not written yet", path.display())))
        }
        Err(err) => Err(RpcError::CredentialPending(format!("{}: {err}", path.display()))),
    }
}
