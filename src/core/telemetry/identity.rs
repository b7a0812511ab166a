//! Virtual IP to client name mapping, read from peer-config artifacts.
//!
//! PiVPN keeps one `<client>.conf` per peer; the `Address` line of each
//! holds the tunnel address that shows up in the daemon's allowed-IPs.

use std::collections::HashMap;
use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

use super::models::ClientIdentity;

const ARTIFACT_EXTENSION: &str = "conf";

static ADDRESS_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)address\s*[=:]\s*(\S+)").expect("address pattern is a valid regex")
});

/// Result of one directory scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    by_ip: HashMap<String, String>,
    artifact_count: usize,
}

impl IdentityMap {
    pub fn name_for(&self, virtual_ip: &str) -> Option<&str> {
        self.by_ip.get(virtual_ip).map(String::as_str)
    }

    /// Number of `.conf` artifacts seen, usable address or not
    pub fn total_clients(&self) -> usize {
        self.artifact_count
    }

    pub fn len(&self) -> usize {
        self.by_ip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ip.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = ClientIdentity> + '_ {
        self.by_ip.iter().map(|(ip, name)| ClientIdentity {
            virtual_ip: ip.clone(),
            name: name.clone(),
        })
    }
}

/// Scans a directory of peer-config artifacts.
///
/// Construct one per cycle; nothing is cached between scans.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    dir: PathBuf,
}

impl IdentityResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Map every readable artifact's address to its file stem.
    ///
    /// A missing directory yields an empty map. Artifacts are visited in
    /// file-name order and a later artifact claiming the same address
    /// replaces the earlier one.
    pub fn resolve(&self) -> IdentityMap {
        let mut map = IdentityMap::default();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("Config directory {:?} not readable: {}", self.dir, e);
                return map;
            }
        };

        let mut artifacts: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(ARTIFACT_EXTENSION)
            })
            .collect();
        artifacts.sort();

        map.artifact_count = artifacts.len();

        for path in artifacts {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    log::debug!("Skipping unreadable artifact {:?}: {}", path, e);
                    continue;
                }
            };

            match extract_address(&text) {
                Some(ip) => {
                    if let Some(previous) = map.by_ip.insert(ip.clone(), name.to_string()) {
                        log::debug!("Address {} claimed by both {} and {}", ip, previous, name);
                    }
                }
                None => log::debug!("No IPv4 address in artifact {:?}", path),
            }
        }

        map
    }
}

/// First `Address = a.b.c.d/nn` (or `Address: ...`) line of an artifact
pub fn extract_address(text: &str) -> Option<String> {
    let value = text
        .lines()
        .find_map(|line| ADDRESS_LINE.captures(line.trim()))
        .map(|caps| caps[1].to_string())?;

    let candidate = value.split(',').next()?.split('/').next()?.trim();
    candidate.parse::<Ipv4Addr>().ok()?;

    Some(candidate.to_string())
}
