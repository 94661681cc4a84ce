//! Assembly of a complete session's parts into the final object.
//!
//! The fast path is a single atomic [`ObjectStore::compose`]. Backends that
//! refuse to compose too few or too small sources report
//! [`StoreError::ComposeUnsupported`], in which case the parts are read back
//! in index order, each under its listed fingerprint, appended to a spool
//! file on local disk and written with [`ObjectStore::put_file`]. At most one
//! part is held in memory at a time.

use std::path::Path;

use ferry_store::{ComposeSource, Fingerprint, ObjectStore, StoreError};
use ferry_types::{sort_parts_by_index, Location};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{UploadError, UploadResult};

/// One source part, as observed in the authoritative listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyPart {
    pub index: u32,
    pub name: String,
    pub fingerprint: Fingerprint,
    pub size: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblyStrategy {
    Compose,
    Streamed,
}

/// A successfully assembled object.
#[derive(Clone, Debug)]
pub struct Assembled {
    pub location: Location,
    pub fingerprint: Fingerprint,
    pub size: u64,
    pub strategy: AssemblyStrategy,
}

/// Concatenate `parts` in ascending index order into `target`.
///
/// `spool_dir` holds the spool file of a streamed assembly, `None` meaning
/// the system temp directory. Parts are never deleted here; the caller
/// discards them once the result has been recorded.
pub async fn assemble(
    store: &dyn ObjectStore,
    target: &Location,
    mut parts: Vec<AssemblyPart>,
    spool_dir: Option<&Path>,
) -> UploadResult<Assembled> {
    if parts.is_empty() {
        return Err(UploadError::AssemblyFailed("no parts to assemble".into()));
    }
    sort_parts_by_index(&mut parts, |p| p.index);
    let size = parts.iter().map(|p| p.size).sum();

    let sources: Vec<ComposeSource> = parts
        .iter()
        .map(|p| ComposeSource::new(p.name.clone(), p.fingerprint.clone()))
        .collect();

    let (fingerprint, strategy) = match store
        .compose(&target.container, &target.name, &sources)
        .await
    {
        Ok(fingerprint) => (fingerprint, AssemblyStrategy::Compose),
        Err(StoreError::ComposeUnsupported(reason)) => {
            info!(location = %target, reason = %reason, "compose unsupported, streaming parts");
            (stream(store, target, &parts, spool_dir).await?, AssemblyStrategy::Streamed)
        }
        Err(e) => return Err(classify(e, &parts)),
    };

    debug!(location = %target, size, ?strategy, "assembled");
    Ok(Assembled {
        location: target.clone(),
        fingerprint,
        size,
        strategy,
    })
}

async fn stream(
    store: &dyn ObjectStore,
    target: &Location,
    parts: &[AssemblyPart],
    spool_dir: Option<&Path>,
) -> UploadResult<Fingerprint> {
    let spool = match spool_dir {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new(),
    }
    .map_err(spool_failed)?;
    let mut file = tokio::fs::File::from_std(spool.reopen().map_err(spool_failed)?);

    for part in parts {
        let data = store
            .get_if_match(&target.container, &part.name, &part.fingerprint)
            .await
            .map_err(|e| classify(e, parts))?;
        file.write_all(&data).await.map_err(spool_failed)?;
    }
    file.flush().await.map_err(spool_failed)?;
    drop(file);

    debug!(spool = %spool.path().display(), "parts spooled");
    store
        .put_file(&target.container, &target.name, spool.path())
        .await
        .map_err(|e| UploadError::AssemblyFailed(e.to_string()))
}

fn spool_failed(err: std::io::Error) -> UploadError {
    UploadError::AssemblyFailed(format!("spooling parts: {err}"))
}

/// A precondition failure or a vanished source means a part changed under
/// us; everything else is a plain assembly failure.
fn classify(err: StoreError, parts: &[AssemblyPart]) -> UploadError {
    let changed = match &err {
        StoreError::PreconditionFailed { name, .. } => Some(name.as_str()),
        StoreError::NotFound { name, .. } => Some(name.as_str()),
        _ => None,
    };
    match changed.and_then(|name| parts.iter().find(|p| p.name == name)) {
        Some(part) => UploadError::MergeConflict {
            index: part.index,
            name: part.name.clone(),
        },
        None => UploadError::AssemblyFailed(err.to_string()),
    }
}
