//! Ensures only one rescal-server instance serves a given address.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

/// Holds the address lock until dropped
pub struct LockGuard {
    _file: File,
}

/// Acquire the lock for `listen` under the user's runtime directory.
pub fn acquire_lock(listen: &str) -> Result<LockGuard> {
    let runtime_dir = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .ok_or_else(|| anyhow::anyhow!("Could not determine runtime directory"))?;

    lock_in(&runtime_dir.join("rescal"), listen)
}

fn lock_path(dir: &Path, listen: &str) -> PathBuf {
    let name: String = listen
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    dir.join(format!("server-{}.lock", name))
}

/// Lock `listen` in `dir`, recording our pid; fails naming the holder's pid.
fn lock_in(dir: &Path, listen: &str) -> Result<LockGuard> {
    fs::create_dir_all(dir)?;
    let path = lock_path(dir, listen);

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .context("Failed to open lock file")?;

    if file.try_lock_exclusive().is_err() {
        let mut holder = String::new();
        file.read_to_string(&mut holder).ok();
        let holder = holder.trim();
        anyhow::bail!(
            "Another rescal-server{} is already listening on {}.\n\
            If you believe this is an error, remove: {}",
            if holder.is_empty() { String::new() } else { format!(" (pid {})", holder) },
            listen,
            path.display()
        );
    }

    file.set_len(0)?;
    file.rewind()?;
    write!(file, "{}", std::process::id())?;
    file.flush()?;

    tracing::debug!(path = %path.display(), listen, "acquired server lock");
    Ok(LockGuard { _file: file })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_on_same_address_fails() {
        let dir = tempfile::tempdir().unwrap();

        let _held = lock_in(dir.path(), "127.0.0.1:4096").unwrap();
        let err = lock_in(dir.path(), "127.0.0.1:4096").err().unwrap();
        assert!(err.to_string().contains(&format!("pid {}", std::process::id())));

        // Other addresses are independent
        assert!(lock_in(dir.path(), "127.0.0.1:4097").is_ok());
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();

        drop(lock_in(dir.path(), "[::1]:8080").unwrap());
        assert!(lock_in(dir.path(), "[::1]:8080").is_ok());
        assert!(lock_path(dir.path(), "[::1]:8080").ends_with("server-___1__8080.lock"));
    }
}
