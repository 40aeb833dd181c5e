//! Post-transfer content verification

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::traits::ObjectStore;

/// Hex-encoded SHA-256 of a byte slice
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Download an object in full and digest its bytes
pub async fn object_digest(store: &dyn ObjectStore, bucket: &str, key: &str) -> Result<String> {
    let data = store.get_object(bucket, key).await?;
    Ok(sha256_hex(&data.body))
}

/// Compare digests of the source and destination copies of an object
///
/// Both sides are read and hashed independently. `Ok(false)` means the
/// bytes differ; read failures are returned as errors for the caller to
/// classify.
pub async fn compare_objects(
    source: &dyn ObjectStore,
    src_bucket: &str,
    src_key: &str,
    dest: &dyn ObjectStore,
    dest_bucket: &str,
    dest_key: &str,
) -> Result<bool> {
    let (src_digest, dest_digest) = futures::try_join!(
        object_digest(source, src_bucket, src_key),
        object_digest(dest, dest_bucket, dest_key),
    )?;

    tracing::debug!(
        key = src_key,
        source = %src_digest,
        destination = %dest_digest,
        "Computed checksums"
    );

    Ok(src_digest == dest_digest)
}
