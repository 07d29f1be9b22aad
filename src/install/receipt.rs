// src/install/receipt.rs

//! Install receipts
//!
//! The receipt is the only durable record the orchestrator emits, written
//! into the keg once linking completes. Everything in it is re-derivable
//! from the keg's own contents for diagnostics, so a missing or corrupt
//! receipt degrades to a derived one instead of failing reads.

use crate::error::{Error, Result};
use crate::keg::Keg;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;

/// File name of the receipt inside a keg
pub const RECEIPT_FILE: &str = "INSTALL_RECEIPT.json";

const SCHEMA_VERSION: u32 = 1;

/// Identity of the source spec an install used
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceIdentity {
    /// `stable`, `devel`, or `head`
    pub spec: String,
    /// Version string of that spec at install time
    pub version: String,
}

/// A resolved runtime dependency recorded at install time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeDependency {
    pub name: String,
    pub version: String,
}

/// Durable record of how one keg was installed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub schema: u32,
    /// Option flags used for this install
    pub used_options: Vec<String>,
    /// True if the keg contents were compiled here into bottle form
    pub built_as_bottle: bool,
    /// True if the keg contents came from a poured bottle
    pub poured_from_bottle: bool,
    /// Wall-clock build time in seconds; zero for poured kegs
    pub build_time_seconds: u64,
    /// Which source spec was installed
    pub source: SourceIdentity,
    /// Runtime dependencies resolved for this install
    pub runtime_dependencies: Vec<RuntimeDependency>,
    /// True when some dependent pulled this in rather than the user
    pub installed_as_dependency: bool,
    /// True when the user asked for this formula by name
    pub installed_on_request: bool,
    pub installed_at: DateTime<Utc>,
}

impl InstallReceipt {
    /// A receipt derived from nothing but the keg path itself
    ///
    /// Used when the written receipt is missing; fields the keg cannot
    /// answer default to the conservative value.
    pub fn derive_from(keg: &Keg) -> Self {
        let spec = if keg.version() == "HEAD" { "head" } else { "stable" };
        Self {
            schema: SCHEMA_VERSION,
            used_options: Vec::new(),
            built_as_bottle: false,
            poured_from_bottle: false,
            build_time_seconds: 0,
            source: SourceIdentity {
                spec: spec.to_string(),
                version: keg.version().to_string(),
            },
            runtime_dependencies: Vec::new(),
            installed_as_dependency: false,
            installed_on_request: true,
            installed_at: Utc::now(),
        }
    }

    /// Write the receipt into the keg
    pub fn write(&self, keg: &Keg) -> Result<()> {
        let path = keg.path().join(RECEIPT_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|e| Error::Receipt {
            keg: keg.spec(),
            reason: e.to_string(),
        })
    }

    /// Read the receipt written into a keg
    pub fn read(keg: &Keg) -> Result<Self> {
        let path = keg.path().join(RECEIPT_FILE);
        let data = fs::read_to_string(&path).map_err(|e| Error::Receipt {
            keg: keg.spec(),
            reason: e.to_string(),
        })?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Read the receipt, degrading to a derived one when unreadable
    pub fn read_or_derive(keg: &Keg) -> Result<Self> {
        match Self::read(keg) {
            Ok(receipt) => Ok(receipt),
            Err(Error::Json(_)) | Err(Error::Receipt { .. }) => Ok(Self::derive_from(keg)),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Layout;
    use tempfile::TempDir;

    fn keg() -> (TempDir, Keg) {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path().join("prefix"));
        let keg = Keg::new(&layout, "jq", "1.7.1");
        fs::create_dir_all(keg.path()).unwrap();
        (tmp, keg)
    }

    #[test]
    fn test_round_trip() {
        let (_tmp, keg) = keg();
        let receipt = InstallReceipt {
            schema: SCHEMA_VERSION,
            used_options: vec!["with-docs".to_string()],
            built_as_bottle: false,
            poured_from_bottle: true,
            build_time_seconds: 0,
            source: SourceIdentity {
                spec: "stable".to_string(),
                version: "1.7.1".to_string(),
            },
            runtime_dependencies: vec![RuntimeDependency {
                name: "oniguruma".to_string(),
                version: "6.9.9".to_string(),
            }],
            installed_as_dependency: false,
            installed_on_request: true,
            installed_at: Utc::now(),
        };
        receipt.write(&keg).unwrap();

        let read = InstallReceipt::read(&keg).unwrap();
        assert!(read.poured_from_bottle);
        assert_eq!(read.used_options, ["with-docs"]);
        assert_eq!(read.runtime_dependencies.len(), 1);
        assert_eq!(read.source.version, "1.7.1");
    }

    #[test]
    fn test_missing_receipt_derives_from_keg() {
        let (_tmp, keg) = keg();
        let derived = InstallReceipt::read_or_derive(&keg).unwrap();
        assert_eq!(derived.source.version, "1.7.1");
        assert_eq!(derived.source.spec, "stable");
        assert!(!derived.poured_from_bottle);
    }

    #[test]
    fn test_corrupt_receipt_derives_from_keg() {
        let (_tmp, keg) = keg();
        fs::write(keg.path().join(RECEIPT_FILE), b"{not json").unwrap();
        let derived = InstallReceipt::read_or_derive(&keg).unwrap();
        assert_eq!(derived.source.version, "1.7.1");
    }
}
