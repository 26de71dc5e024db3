//! seg-s3: S3 SDK adapter for s3-segregator
//!
//! Implements the `ObjectStore` trait from seg-core on top of aws-sdk-s3.

mod client;

pub use client::S3Client;
