//! Byte movement between the two endpoints

use std::fmt;

use crate::endpoint::EndpointIdentity;
use crate::error::{Error, Result};
use crate::traits::ObjectStore;

/// How objects travel from source to destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Both buckets live on one endpoint; the endpoint copies the bytes
    ServerSideCopy,
    /// Read the object into memory from the source, write it to the destination
    DownloadUpload,
}

impl TransferMode {
    /// Pick the mode from the canonical identities of both endpoints
    pub fn select(source: &EndpointIdentity, dest: &EndpointIdentity) -> Self {
        if source == dest {
            TransferMode::ServerSideCopy
        } else {
            TransferMode::DownloadUpload
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::ServerSideCopy => write!(f, "server-side copy"),
            TransferMode::DownloadUpload => write!(f, "download and upload"),
        }
    }
}

/// Executes transfers for one job in a fixed mode
pub struct Transferrer<'a> {
    source: &'a dyn ObjectStore,
    dest: &'a dyn ObjectStore,
    mode: TransferMode,
}

impl<'a> Transferrer<'a> {
    pub fn new(source: &'a dyn ObjectStore, dest: &'a dyn ObjectStore, mode: TransferMode) -> Self {
        Self { source, dest, mode }
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Move one object, returning the destination entity tag
    ///
    /// Any backend error is reported as `Error::Transfer` so the retry
    /// coordinator treats every failure alike.
    pub async fn transfer(&self, key: &str, src_bucket: &str, dest_bucket: &str) -> Result<String> {
        let result = match self.mode {
            TransferMode::ServerSideCopy => {
                self.dest
                    .copy_object(src_bucket, key, dest_bucket, key)
                    .await
            }
            TransferMode::DownloadUpload => match self.source.get_object(src_bucket, key).await {
                Ok(data) => self.dest.put_object(dest_bucket, key, data).await,
                Err(e) => Err(e),
            },
        };

        result.map_err(|e| match e {
            Error::Transfer(msg) => Error::Transfer(msg),
            other => Error::Transfer(format!("{key}: {other}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockObjectStore, ObjectData};
    use bytes::Bytes;
    use std::collections::HashMap;

    #[test]
    fn test_mode_selection_uses_canonical_identity() {
        let a = EndpointIdentity::parse("https://s3.example.com/").unwrap();
        let b = EndpointIdentity::parse("https://S3.EXAMPLE.com:443").unwrap();
        let c = EndpointIdentity::parse("https://other.example.com").unwrap();
        assert_eq!(TransferMode::select(&a, &b), TransferMode::ServerSideCopy);
        assert_eq!(TransferMode::select(&a, &c), TransferMode::DownloadUpload);
    }

    #[tokio::test]
    async fn test_server_side_copy_uses_destination_client() {
        let source = MockObjectStore::new();
        let mut dest = MockObjectStore::new();
        dest.expect_copy_object()
            .withf(|sb, sk, db, dk| sb == "src" && sk == "k" && db == "dst" && dk == "k")
            .times(1)
            .returning(|_, _, _, _| Ok("etag".into()));

        let t = Transferrer::new(&source, &dest, TransferMode::ServerSideCopy);
        assert_eq!(t.transfer("k", "src", "dst").await.unwrap(), "etag");
    }

    #[tokio::test]
    async fn test_download_upload_preserves_headers() {
        let mut source = MockObjectStore::new();
        source.expect_get_object().times(1).returning(|_, _| {
            Ok(ObjectData {
                body: Bytes::from_static(b"payload"),
                content_type: Some("image/png".into()),
                metadata: HashMap::from([("owner".to_string(), "ops".to_string())]),
            })
        });

        let mut dest = MockObjectStore::new();
        dest.expect_put_object()
            .withf(|bucket, key, data| {
                bucket == "dst"
                    && key == "k"
                    && data.body.as_ref() == b"payload"
                    && data.content_type.as_deref() == Some("image/png")
                    && data.metadata.get("owner").map(String::as_str) == Some("ops")
            })
            .times(1)
            .returning(|_, _, _| Ok("etag".into()));

        let t = Transferrer::new(&source, &dest, TransferMode::DownloadUpload);
        t.transfer("k", "src", "dst").await.unwrap();
    }

    #[tokio::test]
    async fn test_failures_become_transfer_errors() {
        let mut source = MockObjectStore::new();
        source
            .expect_get_object()
            .returning(|_, _| Err(Error::Connection("reset".into())));
        let dest = MockObjectStore::new();

        let t = Transferrer::new(&source, &dest, TransferMode::DownloadUpload);
        let err = t.transfer("k", "src", "dst").await.unwrap_err();
        assert!(matches!(err, Error::Transfer(_)));
    }
}
