//! Hosts-file entry for the production identity provider.
//!
//! Operator machines outside the corporate DNS need a static mapping for the
//! Keycloak host before the prod token endpoint resolves. Writing the file
//! usually needs administrator rights.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_ENTRY: &str = "193.232.108.20 kc-omni.x5.ru";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostsUpdate {
    AlreadyPresent,
    Added,
}

pub fn default_hosts_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Windows\System32\drivers\etc\hosts")
    } else {
        PathBuf::from("/etc/hosts")
    }
}

/// Whether any line of the hosts file already contains `entry`.
pub fn has_entry(path: &Path, entry: &str) -> io::Result<bool> {
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().any(|line| line.contains(entry)))
}

/// Append `entry` to the hosts file unless a line already contains it.
pub fn ensure_hosts_entry(path: &Path, entry: &str) -> io::Result<HostsUpdate> {
    if has_entry(path, entry)? {
        return Ok(HostsUpdate::AlreadyPresent);
    }

    let mut file = OpenOptions::new().append(true).open(path)?;
    write!(file, "\n{}\n", entry)?;
    tracing::info!(path = %path.display(), entry, "hosts entry added");
    Ok(HostsUpdate::Added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_is_appended_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "127.0.0.1 localhost").unwrap();

        assert_eq!(
            ensure_hosts_entry(&path, DEFAULT_ENTRY).unwrap(),
            HostsUpdate::Added
        );
        assert_eq!(
            ensure_hosts_entry(&path, DEFAULT_ENTRY).unwrap(),
            HostsUpdate::AlreadyPresent
        );

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            format!("127.0.0.1 localhost\n{}\n", DEFAULT_ENTRY)
        );
    }

    #[test]
    fn test_entry_inside_longer_line_counts_as_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        let original = format!("# managed\n{}   # keycloak\n", DEFAULT_ENTRY);
        std::fs::write(&path, &original).unwrap();

        assert_eq!(
            ensure_hosts_entry(&path, DEFAULT_ENTRY).unwrap(),
            HostsUpdate::AlreadyPresent
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist");
        assert!(ensure_hosts_entry(&path, DEFAULT_ENTRY).is_err());
    }
}
