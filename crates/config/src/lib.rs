//! Configuration file parsing (§6).
//!
//! Three mandatory INI sections: `[source]` (include/exclude globs),
//! `[archive]` (storage backend + password), `[index]` (database path).
//! Section name validation happens before `figment` extraction so a
//! misnamed or missing section produces the named
//! [`error::ErrorKind::InvalidSection`] rather than a generic parse error.

pub mod error;
mod ini;

use crate::error::{ErrorKind, Result};
use crate::ini::IniProvider;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
struct RawSource {
    #[serde(default)]
    include: Option<String>,
    #[serde(default)]
    exclude: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawArchive {
    #[serde(default)]
    storage: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    secret: Option<String>,
    #[serde(default)]
    bucket: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawIndex {
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    source: RawSource,
    archive: RawArchive,
    index: RawIndex,
}

/// `[source]`: include/exclude glob patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSection {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// The storage backend named by `archive.storage`, with its
/// backend-specific required keys (§9: a tagged variant replaces the
/// original's dynamic storage-subclass registry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Local { path: PathBuf },
    S3 { key: String, secret: String, bucket: String, path: String },
}

/// `[archive]`: storage backend plus the password used for every
/// `encrypt`/`decrypt` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSection {
    pub backend: Backend,
    pub password: String,
}

/// `[index]`: path to the index database file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSection {
    pub path: PathBuf,
}

/// A fully parsed and validated config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub source: SourceSection,
    pub archive: ArchiveSection,
    pub index: IndexSection,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl Config {
    /// Parses and validates the config file at `path` (§6).
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let provider = IniProvider::file(path);

        let mut found: Vec<String> = provider.sections()?.keys().cloned().collect();
        found.sort();
        if found != ["archive", "index", "source"] {
            exn::bail!(ErrorKind::InvalidSection(found));
        }

        let raw: RawConfig = Figment::new().merge(provider).extract().or_raise(|| ErrorKind::Parse)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let include: Vec<String> =
            raw.source.include.unwrap_or_default().split_whitespace().map(String::from).collect();
        let exclude: Vec<String> =
            raw.source.exclude.unwrap_or_default().split_whitespace().map(String::from).collect();
        if include.is_empty() {
            exn::bail!(ErrorKind::MissingField("source.include"));
        }

        let storage = non_empty(raw.archive.storage).ok_or_raise(|| ErrorKind::MissingField("archive.storage"))?;
        let password = raw.archive.password.unwrap_or_default();
        let backend = match storage.as_str() {
            "local" => {
                let path = non_empty(raw.archive.path).ok_or_raise(|| ErrorKind::MissingField("archive.path"))?;
                Backend::Local { path: PathBuf::from(path) }
            }
            "s3" => {
                let key = non_empty(raw.archive.key).ok_or_raise(|| ErrorKind::MissingField("archive.key"))?;
                let secret = non_empty(raw.archive.secret).ok_or_raise(|| ErrorKind::MissingField("archive.secret"))?;
                let bucket = non_empty(raw.archive.bucket).ok_or_raise(|| ErrorKind::MissingField("archive.bucket"))?;
                let path = raw.archive.path.unwrap_or_default();
                Backend::S3 { key, secret, bucket, path }
            }
            other => exn::bail!(ErrorKind::UnknownStorage(other.to_string())),
        };

        let index_path = PathBuf::from(non_empty(raw.index.path).ok_or_raise(|| ErrorKind::MissingField("index.path"))?);
        if let Some(parent) = index_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                exn::bail!(ErrorKind::IndexParentMissing(parent.to_path_buf()));
            }
        }

        Ok(Self {
            source: SourceSection { include, exclude },
            archive: ArchiveSection { backend, password },
            index: IndexSection { path: index_path },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("serac.conf");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_a_valid_local_config() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("index.sqlite");
        let config_path = dir.path().join("serac.conf");
        std::fs::write(
            &config_path,
            format!(
                "[source]\n\
                 include = /src/one /src/two\n\
                 exclude = /src/two/.git\n\
                 [archive]\n\
                 storage = local\n\
                 password = hunter2\n\
                 path = /backups\n\
                 [index]\n\
                 path = {}\n",
                index_path.display()
            ),
        )
        .unwrap();
        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.source.include, vec!["/src/one", "/src/two"]);
        assert_eq!(config.source.exclude, vec!["/src/two/.git"]);
        assert_eq!(config.archive.backend, Backend::Local { path: PathBuf::from("/backups") });
    }

    #[test]
    fn rejects_wrong_section_names() {
        let (_dir, path) = write_config("[source]\ninclude = /a\n[destination]\nstorage = local\n");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidSection(_)));
    }

    #[test]
    fn rejects_empty_include() {
        let (_dir, path) = write_config(
            "[source]\ninclude =\n[archive]\nstorage = local\npath = /backups\n[index]\npath = /tmp/idx.sqlite\n",
        );
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingField("source.include")));
    }

    #[test]
    fn rejects_unknown_storage() {
        let (_dir, path) =
            write_config("[source]\ninclude = /a\n[archive]\nstorage = ftp\n[index]\npath = /tmp/idx.sqlite\n");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownStorage(_)));
    }

    #[test]
    fn s3_backend_requires_key_secret_bucket() {
        let (_dir, path) = write_config(
            "[source]\ninclude = /a\n[archive]\nstorage = s3\nbucket = my-bucket\n[index]\npath = /tmp/idx.sqlite\n",
        );
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingField("archive.key")));
    }

    #[test]
    fn rejects_index_path_with_missing_parent() {
        let (_dir, path) = write_config(
            "[source]\ninclude = /a\n[archive]\nstorage = local\npath = /backups\n[index]\npath = /does/not/exist/idx.sqlite\n",
        );
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(&*err, ErrorKind::IndexParentMissing(_)));
    }
}
