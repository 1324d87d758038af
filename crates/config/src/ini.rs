//! A hand-written `figment` [`Provider`] for serac's INI-style config
//! format.
//!
//! `figment` ships providers for JSON/TOML/YAML/env but not INI; this is a
//! small, deliberately narrow parser: `[section]` headers, `key = value`
//! lines, `;`/`#` comment lines, blank lines ignored.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use figment::value::{Dict, Map, Value};
use figment::{Error as FigmentError, Metadata, Profile, Provider};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Parses `contents` into a map of section name to key/value pairs.
fn parse_ini(contents: &str) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
    let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut current: Option<String> = None;
    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') {
            let name = line.strip_suffix(']').ok_or_raise(|| ErrorKind::Parse)?.trim_start_matches('[').trim();
            sections.entry(name.to_string()).or_default();
            current = Some(name.to_string());
            continue;
        }
        let section = current.as_ref().ok_or_raise(|| ErrorKind::Parse)?;
        let (key, value) = line.split_once('=').ok_or_raise(|| ErrorKind::Parse)?;
        sections.get_mut(section).expect("section was just inserted").insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(sections)
}

/// A `figment::Provider` that reads an INI-style file from disk.
pub struct IniProvider {
    path: PathBuf,
}

impl IniProvider {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads and parses the file, without going through `figment`'s error
    /// type — used by [`crate::Config::load`] to validate the section set
    /// with our own named error before extraction.
    pub(crate) fn sections(&self) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
        let contents = std::fs::read_to_string(&self.path).or_raise(|| ErrorKind::Io)?;
        parse_ini(&contents)
    }
}

impl Provider for IniProvider {
    fn metadata(&self) -> Metadata {
        Metadata::named("INI config file")
    }

    fn data(&self) -> std::result::Result<Map<Profile, Dict>, FigmentError> {
        let sections = self.sections().map_err(|e| FigmentError::from(e.to_string()))?;
        let value = Value::serialize(&sections).map_err(|e| FigmentError::from(e.to_string()))?;
        let dict = value.into_dict().ok_or_else(|| FigmentError::from("expected a table of sections".to_string()))?;
        Ok(Profile::Default.collect(dict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_and_comments() {
        let ini = "\
            ; comment\n\
            [source]\n\
            include = /a /b\n\
            # another comment\n\
            [index]\n\
            path = /var/serac.db\n";
        let sections = parse_ini(ini).unwrap();
        assert_eq!(sections.get("source").unwrap().get("include").unwrap(), "/a /b");
        assert_eq!(sections.get("index").unwrap().get("path").unwrap(), "/var/serac.db");
    }

    #[test]
    fn rejects_key_before_any_section() {
        assert!(parse_ini("include = /a\n").is_err());
    }

    #[test]
    fn rejects_malformed_line() {
        let ini = "[source]\nnotakeyvalue\n";
        assert!(parse_ini(ini).is_err());
    }

    #[test]
    fn empty_section_is_retained() {
        let ini = "[archive]\n";
        let sections = parse_ini(ini).unwrap();
        assert!(sections.contains_key("archive"));
        assert!(sections["archive"].is_empty());
    }
}
