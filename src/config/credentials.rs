//! Account credentials, kept in a small JSON file next to the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

const ACCOUNT_NOTE: &str = "account can be 'email' or 'phone number'";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
struct Template<'a> {
    account: &'a str,
    password: &'a str,
    #[serde(rename = "Note")]
    note: &'a str,
}

impl Credentials {
    /// Read credentials from `path`.
    ///
    /// A missing or unparsable file is replaced by an empty template and the
    /// run continues with empty credentials; login reports the problem later.
    pub fn load_or_template(path: &Path) -> Self {
        match Self::read(path) {
            Ok(creds) => creds,
            Err(e) => {
                warn!("Credentials unavailable ({:#}), writing template to {:?}", e, path);
                if let Err(e) = write_template(path) {
                    warn!("Could not write credentials template: {:#}", e);
                }
                Self::default()
            }
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        serde_json::from_str(&raw).with_context(|| format!("Malformed JSON in {:?}", path))
    }

    pub fn is_empty(&self) -> bool {
        self.account.is_empty()
    }
}

/// Write the empty template. Overwrites whatever is at `path`.
pub fn write_template(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create dir {:?}", parent))?;
    }
    let template = Template {
        account: "",
        password: "",
        note: ACCOUNT_NOTE,
    };
    let json = serde_json::to_string_pretty(&template)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    info!("Wrote credentials template to {:?}", path);
    Ok(())
}
