//! S3 (and S3-compatible Glacier/Deep Archive) storage backend.

use super::StorageBackend;
use crate::error::{Error, ErrorKind, Result};
use crate::path::validate_archive_id;
use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{GlacierJobParameters, RestoreRequest, StorageClass, Tier};
use aws_sdk_s3::Client;
use exn::ResultExt;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::Semaphore;
use tracing::instrument;

/// Caps the number of concurrent requests this backend will issue against
/// S3, so a large `serac archive` run doesn't open hundreds of sockets at
/// once.
const MAX_CONCURRENT_REQUESTS: usize = 16;

/// Number of days a restored Glacier object stays in the Hot tier before
/// S3 moves it back to Frozen (§4.2 default).
const RESTORE_DAYS: i32 = 1;

/// Stores objects as keys in an S3 (or S3-compatible) bucket, optionally
/// under a key prefix.
///
/// Handles the Glacier/Deep Archive cold-storage tiers: an object stored
/// with one of those storage classes isn't immediately readable, and
/// `retrieve` must first request (and wait out) a restore.
pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    semaphore: Semaphore,
    /// archive ids already confirmed Hot/Thawed. Never records a failure,
    /// only a prior success, so a later `start_thaw` is always re-checked.
    known_available: Mutex<HashSet<String>>,
}

impl S3Backend {
    /// Builds a backend for `bucket`, authenticating with the given static
    /// credentials and talking to `region`. `prefix`, if set, is prepended
    /// to every archive id to form the object key.
    pub fn new(bucket: impl Into<String>, region: impl Into<String>, access_key_id: impl Into<String>, secret_access_key: impl Into<String>, prefix: Option<String>) -> Self {
        let credentials = Credentials::new(access_key_id.into(), secret_access_key.into(), None, None, "serac");
        let config = aws_sdk_s3::Config::builder()
            .region(Region::new(region.into()))
            .credentials_provider(credentials)
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .build();
        Self {
            client: Client::from_conf(config),
            bucket: bucket.into(),
            prefix,
            semaphore: Semaphore::new(MAX_CONCURRENT_REQUESTS),
            known_available: Mutex::new(HashSet::new()),
        }
    }

    fn object_key(&self, archive_id: &str) -> Result<String> {
        validate_archive_id(archive_id)?;
        Ok(match &self.prefix {
            Some(prefix) => format!("{prefix}/{archive_id}"),
            None => archive_id.to_string(),
        })
    }

    async fn acquire_permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.semaphore.acquire().await.or_raise(|| ErrorKind::BackendError("semaphore closed".into()))
    }

    fn mark_available(&self, archive_id: &str) {
        self.known_available.lock().expect("poisoned mutex").insert(archive_id.to_string());
    }

    fn is_known_available(&self, archive_id: &str) -> bool {
        self.known_available.lock().expect("poisoned mutex").contains(archive_id)
    }
}

fn map_head_error(archive_id: &str, err: SdkError<HeadObjectError>) -> Error {
    if let SdkError::ServiceError(service_err) = &err {
        if service_err.err().is_not_found() {
            return Error::from(ErrorKind::NotFound(archive_id.to_string()));
        }
    }
    Error::from(ErrorKind::Network(err.to_string()))
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        "s3"
    }

    async fn exists(&self, archive_id: &str) -> Result<bool> {
        let key = self.object_key(archive_id)?;
        let _permit = self.acquire_permit().await?;
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                if let SdkError::ServiceError(service_err) = &err {
                    if service_err.err().is_not_found() {
                        return Ok(false);
                    }
                }
                Err(map_head_error(archive_id, err))
            }
        }
    }

    async fn get_size(&self, archive_id: &str) -> Result<u64> {
        let key = self.object_key(archive_id)?;
        let _permit = self.acquire_permit().await?;
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| map_head_error(archive_id, e))?;
        Ok(head.content_length().unwrap_or_default().max(0) as u64)
    }

    async fn store(&self, local_path: &Path, archive_id: &str, password: &str) -> Result<()> {
        let key = self.object_key(archive_id)?;
        let plaintext = tokio::fs::read(local_path).await.or_raise(|| ErrorKind::Io)?;
        let password = password.to_string();

        let ciphertext = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut ciphertext = Vec::new();
            serac_crypto::encrypt(&mut std::io::Cursor::new(plaintext), &mut ciphertext, &password).or_raise(|| ErrorKind::Crypto)?;
            Ok(ciphertext)
        })
        .await
        .or_raise(|| ErrorKind::Io)??;

        let _permit = self.acquire_permit().await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(ciphertext))
            .send()
            .await
            .or_raise(|| ErrorKind::Network(format!("put_object failed for {archive_id}")))?;
        self.mark_available(archive_id);
        Ok(())
    }

    async fn retrieve(&self, local_path: &Path, archive_id: &str, password: &str) -> Result<()> {
        if tokio::fs::try_exists(local_path).await.or_raise(|| ErrorKind::Io)? {
            exn::bail!(ErrorKind::AlreadyExists(local_path.to_path_buf()));
        }

        if let Err(err) = self.check_is_available(archive_id).await {
            if matches!(&*err, ErrorKind::ObjectFrozen) {
                // Best-effort: kick off the restore even though we're about
                // to report failure, so the next attempt has a chance of
                // succeeding.
                let _ = self.start_thaw(archive_id).await;
            }
            return Err(err);
        }

        let key = self.object_key(archive_id)?;
        let object = {
            let _permit = self.acquire_permit().await?;
            self.client
                .get_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .or_raise(|| ErrorKind::Network(format!("get_object failed for {archive_id}")))?
        };
        let ciphertext = object
            .body
            .collect()
            .await
            .or_raise(|| ErrorKind::Network(format!("failed reading body for {archive_id}")))?
            .into_bytes()
            .to_vec();
        let size = ciphertext.len() as u64;

        let local_path = local_path.to_path_buf();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut dst = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&local_path)
                .or_raise(|| ErrorKind::Io)?;
            serac_crypto::decrypt(&mut std::io::Cursor::new(ciphertext), &mut dst, &password, size).or_raise(|| ErrorKind::Crypto)
        })
        .await
        .or_raise(|| ErrorKind::Io)??;
        self.mark_available(archive_id);
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn check_is_available(&self, archive_id: &str) -> Result<()> {
        if self.is_known_available(archive_id) {
            return Ok(());
        }
        let key = self.object_key(archive_id)?;
        let head = {
            let _permit = self.acquire_permit().await?;
            self.client
                .head_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| map_head_error(archive_id, e))?
        };

        let is_cold = matches!(head.storage_class(), Some(StorageClass::Glacier) | Some(StorageClass::DeepArchive));
        if !is_cold {
            self.mark_available(archive_id);
            return Ok(());
        }

        match head.restore() {
            None => {
                tracing::debug!(archive_id, "object is frozen, no restore in progress");
                exn::bail!(ErrorKind::ObjectFrozen)
            }
            Some(restore_header) if restore_header.contains("ongoing-request=\"true\"") => {
                exn::bail!(ErrorKind::ObjectRetrieving)
            }
            Some(_) => {
                self.mark_available(archive_id);
                Ok(())
            }
        }
    }

    #[instrument(skip(self), fields(backend = "s3", days = RESTORE_DAYS))]
    async fn start_thaw(&self, archive_id: &str) -> Result<()> {
        let key = self.object_key(archive_id)?;
        let restore_request = RestoreRequest::builder()
            .days(RESTORE_DAYS)
            .glacier_job_parameters(GlacierJobParameters::builder().tier(Tier::Standard).build())
            .build();
        let _permit = self.acquire_permit().await?;
        let result = self
            .client
            .restore_object()
            .bucket(&self.bucket)
            .key(&key)
            .restore_request(restore_request)
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                // A restore already in progress (409 RestoreAlreadyInProgress)
                // is not a failure from serac's point of view.
                let message = err.to_string();
                if message.contains("RestoreAlreadyInProgress") {
                    Ok(())
                } else {
                    Err(Error::from(ErrorKind::Network(format!("restore_object failed for {archive_id}: {message}"))))
                }
            }
        }
    }
}
