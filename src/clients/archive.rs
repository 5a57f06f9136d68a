//! Download and extraction shared by the tar and zip clients

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::process::remove_path;

const TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_PERIOD: Duration = Duration::from_secs(1);
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(TIMEOUT).build()
}

/// Only "service unavailable" answers and transport I/O errors such as timeouts are retried
fn is_transient(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::Status(code, _) => *code == 503,
        ureq::Error::Transport(transport) => matches!(transport.kind(), ureq::ErrorKind::Io),
    }
}

/// Repeat `request` after a fixed pause while it fails transiently, at most `retry` more times
pub fn with_http_retry<T, F>(
    retry: u32,
    period: Duration,
    mut request: F,
) -> Result<T, ureq::Error>
where
    F: FnMut() -> Result<T, ureq::Error>,
{
    let mut remaining = retry;
    loop {
        match request() {
            Err(e) if remaining > 0 && is_transient(&e) => {
                debug!("retrying after transient http error: {}", e);
                remaining -= 1;
                std::thread::sleep(period);
            }
            result => return result,
        }
    }
}

/// Download the body behind `url`
pub fn fetch(url: &str, retry: u32) -> Result<Vec<u8>> {
    let agent = agent();
    let response = with_http_retry(retry, RETRY_PERIOD, || agent.get(url).call())?;
    let mut data = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut data)
        .with_context(|| format!("Failed to read response body ({url})"))?;
    debug!("fetched {} bytes from {}", data.len(), url);
    Ok(data)
}

/// Check that `url` answers a HEAD request
pub fn check_url(url: &str, retry: u32) -> Result<()> {
    let agent = agent();
    with_http_retry(retry, RETRY_PERIOD, || agent.head(url).call())?;
    Ok(())
}

/// Remove everything inside `path`, keeping the directory itself
pub fn clear_directory(path: &Path) -> Result<()> {
    let entries =
        fs::read_dir(path).with_context(|| format!("Failed to list '{}'", path.display()))?;
    for entry in entries {
        remove_path(&entry?.path())?;
    }
    Ok(())
}

/// Archive member path relative to the destination, `None` when it is
/// outside `prefix`, is the prefix itself or would escape the destination
fn member_target(name: &Path, prefix: Option<&str>) -> Option<PathBuf> {
    let relative = match prefix {
        Some(prefix) => name.strip_prefix(prefix).ok()?,
        None => name,
    };
    let relative: PathBuf = relative
        .components()
        .filter(|component| *component != Component::CurDir)
        .collect();
    let contained = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    (contained && !relative.as_os_str().is_empty()).then_some(relative)
}

/// Unpack a plain or gzip compressed tarball, keeping only members below `version/`
pub fn unpack_tarball(data: &[u8], version: &str, dest: &Path) -> Result<usize> {
    let reader: Box<dyn Read + '_> = if data.starts_with(&GZIP_MAGIC) {
        Box::new(GzDecoder::new(data))
    } else {
        Box::new(data)
    };
    let mut archive = tar::Archive::new(reader);
    let mut unpacked = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.into_owned();
        let Some(relative) = member_target(&name, Some(version)) else {
            debug!("skipping tar member '{}'", name.display());
            continue;
        };
        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        entry
            .unpack(&target)
            .with_context(|| format!("Failed to unpack '{}'", name.display()))?;
        unpacked += 1;
    }
    Ok(unpacked)
}

/// Open zip data, failing early on anything that is not a zip archive
pub fn open_zip(data: Vec<u8>) -> Result<zip::ZipArchive<Cursor<Vec<u8>>>> {
    Ok(zip::ZipArchive::new(Cursor::new(data))?)
}

/// Unpack a zip archive, keeping only members below `version/` when given
pub fn unpack_zip(
    archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>,
    version: Option<&str>,
    dest: &Path,
) -> Result<usize> {
    let mut unpacked = 0;
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        let Some(name) = file.enclosed_name() else {
            debug!("skipping unsafe zip member '{}'", file.name());
            continue;
        };
        let Some(relative) = member_target(&name, version) else {
            continue;
        };
        let target = dest.join(relative);
        if file.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)
                .with_context(|| format!("Could not create '{}'", target.display()))?;
            io::copy(&mut file, &mut out)?;
        }
        unpacked += 1;
    }
    Ok(unpacked)
}
