//! Local filesystem object store.
//!
//! Layout: `{root}/{container}/{name}`, where `/` in object names maps to
//! sub-directories. Writes go to `{root}/.ferry-tmp/` first and are renamed
//! into place, so readers never observe a half-written object.
//!
//! Fingerprints are derived from file metadata (size and modification time
//! in nanoseconds) instead of hashing content on every listing; a rewrite
//! always produces a new file and therefore a new fingerprint.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ferry_types::{validate_container_name, validate_object_name};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::{
    check_compose_limits, ComposeSource, ContainerInfo, Fingerprint, ObjectInfo, ObjectStore,
};

const TMP_DIR: &str = ".ferry-tmp";

/// Object store rooted at a local directory.
#[derive(Debug)]
pub struct FilesystemObjectStore {
    root: PathBuf,
}

impl FilesystemObjectStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(TMP_DIR)).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_path(&self, container: &str) -> StoreResult<PathBuf> {
        validate_container_name(container).map_err(|e| StoreError::InvalidKey(e.to_string()))?;
        Ok(self.root.join(container))
    }

    /// Resolve an object path, requiring the container to exist.
    async fn object_path(&self, container: &str, name: &str) -> StoreResult<PathBuf> {
        let dir = self.container_path(container)?;
        validate_object_name(name).map_err(|e| StoreError::InvalidKey(e.to_string()))?;
        if !fs::try_exists(&dir).await? {
            return Err(StoreError::ContainerNotFound(container.to_string()));
        }
        Ok(name.split('/').fold(dir, |path, part| path.join(part)))
    }

    fn tmp_path(&self) -> PathBuf {
        self.root.join(TMP_DIR).join(Uuid::now_v7().to_string())
    }

    /// Move a finished temp file into place and report its fingerprint.
    async fn promote(&self, tmp: &Path, dest: &Path) -> StoreResult<Fingerprint> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        if let Err(e) = fs::rename(tmp, dest).await {
            let _ = fs::remove_file(tmp).await;
            return Err(e.into());
        }
        let meta = fs::metadata(dest).await?;
        Ok(metadata_fingerprint(&meta))
    }

    /// Remove now-empty directories between `path` and the container root.
    async fn prune_empty_dirs(&self, container_dir: &Path, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == container_dir || !dir.starts_with(container_dir) {
                break;
            }
            // remove_dir fails on non-empty directories, which ends the walk.
            if fs::remove_dir(dir).await.is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

fn metadata_fingerprint(meta: &std::fs::Metadata) -> Fingerprint {
    let nanos = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    Fingerprint::from_raw(format!("{:x}-{:x}", meta.len(), nanos))
}

fn modified_at(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now())
}

fn object_info(name: String, meta: &std::fs::Metadata) -> ObjectInfo {
    ObjectInfo {
        name,
        fingerprint: metadata_fingerprint(meta),
        size: meta.len(),
        last_modified: modified_at(meta),
    }
}

/// Deepest directory that can hold names starting with `prefix`: everything
/// up to the prefix's last `/`.
fn walk_root(container_dir: &Path, prefix: &str) -> StoreResult<PathBuf> {
    let Some((dirs, _)) = prefix.rsplit_once('/') else {
        return Ok(container_dir.to_path_buf());
    };
    let mut root = container_dir.to_path_buf();
    for component in dirs.split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return Err(StoreError::InvalidKey(format!("invalid list prefix {prefix:?}")));
        }
        root.push(component);
    }
    Ok(root)
}

fn io_not_found(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::NotFound
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self))]
    async fn create_container(&self, container: &str) -> StoreResult<()> {
        let dir = self.container_path(container)?;
        match fs::create_dir(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StoreError::ContainerExists(container.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn delete_container(&self, container: &str) -> StoreResult<()> {
        let dir = self.container_path(container)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if io_not_found(&e) => {
                return Err(StoreError::ContainerNotFound(container.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if entries.next_entry().await?.is_some() {
            return Err(StoreError::ContainerNotEmpty(container.to_string()));
        }
        fs::remove_dir(&dir).await?;
        Ok(())
    }

    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        let dir = self.container_path(container)?;
        Ok(fs::try_exists(&dir).await?)
    }

    async fn list_containers(&self) -> StoreResult<Vec<ContainerInfo>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut containers = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type().await?.is_dir() {
                continue;
            }
            let meta = entry.metadata().await?;
            let created_at = meta
                .created()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| modified_at(&meta));
            containers.push(ContainerInfo { name, created_at });
        }
        containers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(containers)
    }

    #[instrument(skip(self, data), fields(len = data.len()))]
    async fn put(&self, container: &str, name: &str, data: Bytes) -> StoreResult<Fingerprint> {
        let dest = self.object_path(container, name).await?;
        let tmp = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        self.promote(&tmp, &dest).await
    }

    #[instrument(skip(self, source))]
    async fn put_file(&self, container: &str, name: &str, source: &Path) -> StoreResult<Fingerprint> {
        let dest = self.object_path(container, name).await?;
        let tmp = self.tmp_path();
        let copied = async {
            fs::copy(source, &tmp).await?;
            fs::OpenOptions::new().write(true).open(&tmp).await?.sync_all().await
        }
        .await;
        if let Err(e) = copied {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        self.promote(&tmp, &dest).await
    }

    async fn get(&self, container: &str, name: &str) -> StoreResult<Bytes> {
        let path = self.object_path(container, name).await?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if io_not_found(&e) => Err(StoreError::not_found(container, name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn stat(&self, container: &str, name: &str) -> StoreResult<Option<ObjectInfo>> {
        let path = self.object_path(container, name).await?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(object_info(name.to_string(), &meta))),
            Ok(_) => Ok(None),
            Err(e) if io_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, container: &str, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
        let dir = self.container_path(container)?;
        if !fs::try_exists(&dir).await? {
            return Err(StoreError::ContainerNotFound(container.to_string()));
        }
        let start = walk_root(&dir, prefix)?;
        let prefix = prefix.to_string();
        let mut objects = tokio::task::spawn_blocking(move || -> StoreResult<Vec<ObjectInfo>> {
            let mut found = Vec::new();
            if !start.is_dir() {
                return Ok(found);
            }
            for entry in walkdir::WalkDir::new(&start).min_depth(1) {
                let entry = entry.map_err(|e| StoreError::Backend(e.to_string()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&dir) else {
                    continue;
                };
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if !name.starts_with(&prefix) {
                    continue;
                }
                let meta = entry
                    .metadata()
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                found.push(object_info(name, &meta));
            }
            Ok(found)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("listing task failed: {e}")))??;
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    #[instrument(skip(self, sources), fields(sources = sources.len()))]
    async fn compose(
        &self,
        container: &str,
        dest: &str,
        sources: &[ComposeSource],
    ) -> StoreResult<Fingerprint> {
        let dest_path = self.object_path(container, dest).await?;

        let mut paths = Vec::with_capacity(sources.len());
        let mut sizes = Vec::with_capacity(sources.len());
        for source in sources {
            let path = self.object_path(container, &source.name).await?;
            let actual = match fs::metadata(&path).await {
                Ok(meta) => {
                    sizes.push(meta.len());
                    Some(metadata_fingerprint(&meta))
                }
                Err(e) if io_not_found(&e) => None,
                Err(e) => return Err(e.into()),
            };
            if actual.as_ref() != Some(&source.fingerprint) {
                return Err(StoreError::PreconditionFailed {
                    name: source.name.clone(),
                    expected: source.fingerprint.clone(),
                    actual,
                });
            }
            paths.push(path);
        }
        check_compose_limits(&sizes, 1, 0)?;

        let tmp = self.tmp_path();
        let result = async {
            let mut out = fs::File::create(&tmp).await?;
            for path in &paths {
                let mut input = fs::File::open(path).await?;
                tokio::io::copy(&mut input, &mut out).await?;
            }
            out.sync_all().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(dest, "composed object");
        self.promote(&tmp, &dest_path).await
    }

    async fn delete(&self, container: &str, names: &[String]) -> StoreResult<()> {
        let dir = self.container_path(container)?;
        for name in names {
            let path = self.object_path(container, name).await?;
            match fs::remove_file(&path).await {
                Ok(()) => self.prune_empty_dirs(&dir, &path).await,
                Err(e) if io_not_found(&e) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, FilesystemObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path()).await.unwrap();
        store.create_container("photos").await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_get_stat_round_trip() {
        let (_dir, store) = store().await;
        let fp = store
            .put("photos", "2024/cat.jpg", Bytes::from_static(b"meow"))
            .await
            .unwrap();
        assert_eq!(store.get("photos", "2024/cat.jpg").await.unwrap(), "meow");
        let info = store.stat("photos", "2024/cat.jpg").await.unwrap().unwrap();
        assert_eq!(info.size, 4);
        assert_eq!(info.fingerprint, fp);
    }

    #[tokio::test]
    async fn put_file_copies_from_disk() {
        let (dir, store) = store().await;
        let source = dir.path().join("spool.bin");
        std::fs::write(&source, b"spooled bytes").unwrap();

        let fp = store.put_file("photos", "big/out.bin", &source).await.unwrap();
        assert_eq!(store.get("photos", "big/out.bin").await.unwrap(), "spooled bytes");
        assert_eq!(store.stat("photos", "big/out.bin").await.unwrap().unwrap().fingerprint, fp);
        // The source is left in place for its owner to remove.
        assert!(source.exists());

        let missing = dir.path().join("absent.bin");
        assert!(store.put_file("photos", "x.bin", &missing).await.is_err());
        assert!(store.stat("photos", "x.bin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_skips_other_prefixes_and_tmp() {
        let (_dir, store) = store().await;
        for name in ["s_1/1.part", "s_1/2.part", "s_10/1.part", "other"] {
            store.put("photos", name, Bytes::from_static(b"x")).await.unwrap();
        }
        let names: Vec<_> = store
            .list("photos", "s_1/")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["s_1/1.part", "s_1/2.part"]);

        let containers = store.list_containers().await.unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, "photos");
    }

    #[tokio::test]
    async fn list_walks_only_the_prefix_directory() {
        let (_dir, store) = store().await;
        store.put("photos", "s_1/1.part", Bytes::from_static(b"x")).await.unwrap();
        store.put("photos", "s_1/nested/2.part", Bytes::from_static(b"x")).await.unwrap();
        store.put("photos", "s_10/1.part", Bytes::from_static(b"x")).await.unwrap();

        let names: Vec<_> = store
            .list("photos", "s_1/")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["s_1/1.part", "s_1/nested/2.part"]);

        let names: Vec<_> = store
            .list("photos", "s_1/nested/2")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["s_1/nested/2.part"]);

        assert!(store.list("photos", "absent/").await.unwrap().is_empty());
        assert_eq!(store.list("photos", "s_").await.unwrap().len(), 3);
    }

    #[test]
    fn walk_root_starts_at_prefix_directory() {
        let container = Path::new("/data/photos");
        assert_eq!(walk_root(container, "").unwrap(), container);
        assert_eq!(walk_root(container, "s_1").unwrap(), container);
        assert_eq!(walk_root(container, "abc_4/").unwrap(), container.join("abc_4"));
        assert_eq!(walk_root(container, "a/b/c.p").unwrap(), container.join("a").join("b"));
    }

    #[tokio::test]
    async fn list_rejects_traversal_prefix() {
        let (_dir, store) = store().await;
        for prefix in ["../", "a/../b", "/abs", "a//b"] {
            assert!(
                matches!(store.list("photos", prefix).await, Err(StoreError::InvalidKey(_))),
                "{prefix}"
            );
        }
    }

    #[tokio::test]
    async fn rejects_traversal() {
        let (_dir, store) = store().await;
        let err = store
            .put("photos", "../escape", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
        assert!(matches!(
            store.container_exists("../etc").await,
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn compose_and_precondition() {
        let (_dir, store) = store().await;
        let a = store.put("photos", "s/1.part", Bytes::from_static(b"ab")).await.unwrap();
        let b = store.put("photos", "s/2.part", Bytes::from_static(b"cd")).await.unwrap();
        store
            .compose(
                "photos",
                "out.bin",
                &[
                    ComposeSource::new("s/1.part", a),
                    ComposeSource::new("s/2.part", b),
                ],
            )
            .await
            .unwrap();
        assert_eq!(store.get("photos", "out.bin").await.unwrap(), "abcd");

        let err = store
            .compose(
                "photos",
                "out2.bin",
                &[ComposeSource::new("s/1.part", Fingerprint::from_raw("bogus"))],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn delete_prunes_session_directory() {
        let (dir, store) = store().await;
        store.put("photos", "s/1.part", Bytes::from_static(b"x")).await.unwrap();
        store
            .delete("photos", &["s/1.part".to_string(), "s/2.part".to_string()])
            .await
            .unwrap();
        assert!(!dir.path().join("photos").join("s").exists());
        store.delete_container("photos").await.unwrap();
        assert!(!store.container_exists("photos").await.unwrap());
    }

    #[tokio::test]
    async fn missing_container_reported() {
        let (_dir, store) = store().await;
        let err = store.get("absent", "a").await.unwrap_err();
        assert!(matches!(err, StoreError::ContainerNotFound(_)));
        let err = store.list("absent", "").await.unwrap_err();
        assert!(matches!(err, StoreError::ContainerNotFound(_)));
    }
}
