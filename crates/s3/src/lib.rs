//! ms-s3: S3 backend for the mirrorsync engine
//!
//! Implements [`ms_core::ObjectStore`] on top of `aws-sdk-s3`, so the engine
//! can talk to AWS and any S3-compatible provider.

pub mod client;

pub use client::S3Client;
