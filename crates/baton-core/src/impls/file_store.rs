//! FileClaimStore - 共有ディレクトリ上のストア（単一ホスト）
//!
//! # レイアウト
//! ```text
//! <root>/
//!   .lock                      delete_if と index 更新を直列化する advisory lock
//!   claims/<task>.json         lease レコード（1 task_id = 1 ファイル）
//!   agents/<owner>.tasks       owner ごとの task_id ログ（先頭行 `@<owner>`、以降 1 行 1 エントリ、claim 順）
//! ```
//!
//! # アトミック性
//! - create_if_absent: 同じディレクトリに一時ファイルを書き切ってから
//!   `persist_noclobber`（link + unlink）で公開する。既にあれば AlreadyExists で失敗するので
//!   勝者はちょうど 1 つ、読み手が書きかけのレコードを見ることもない
//! - delete_if: `.lock` を排他ロックしてから read → 判定 → remove。
//!   レコードが存在する間は create が成功しないので、削除側同士だけ直列化すればよい
//! - ファイル名は task_id / owner_id をエスケープしたもの（`encode_key`）。
//!   長すぎる場合は先頭だけ残して SHA-256 を付ける（`file_stem`）。元の id はファイルの中身にある

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::warn;

use crate::domain::{Lease, OwnerId, StoreError, TaskKey};
use crate::ports::{AgentIndex, ClaimStore, CreateOutcome, DeleteOutcome};

const CLAIMS_DIR: &str = "claims";
const AGENTS_DIR: &str = "agents";
const LOCK_FILE: &str = ".lock";
const LEASE_EXT: &str = "json";
const INDEX_EXT: &str = "tasks";
/// Marks the header line of an index file; `encode_key` never emits it.
const OWNER_HEADER: char = '@';

/// Longest escaped key used verbatim as a file stem (NAME_MAX is 255 on common filesystems).
const MAX_STEM_BYTES: usize = 200;
/// Readable part kept in front of the digest when a key is too long.
const HASHED_PREFIX_BYTES: usize = 64;

/// Claim store backed by a directory every worker can reach.
#[derive(Debug, Clone)]
pub struct FileClaimStore {
    root: PathBuf,
}

impl FileClaimStore {
    /// Opens (and creates, if needed) the store layout under `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { root: root.into() };
        for dir in [store.claims_dir(), store.agents_dir()] {
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn claims_dir(&self) -> PathBuf {
        self.root.join(CLAIMS_DIR)
    }

    fn agents_dir(&self) -> PathBuf {
        self.root.join(AGENTS_DIR)
    }

    fn lease_path(&self, task: &TaskKey) -> PathBuf {
        self.claims_dir()
            .join(format!("{}.{LEASE_EXT}", file_stem(task.as_str())))
    }

    fn index_path(&self, owner: &OwnerId) -> PathBuf {
        self.agents_dir()
            .join(format!("{}.{INDEX_EXT}", file_stem(owner.as_str())))
    }

    /// Runs `operation` while holding the store-wide exclusive lock.
    fn with_lock<T>(
        &self,
        operation: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let lock_path = self.root.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StoreError::io(&lock_path, e))?;
        FileExt::lock_exclusive(&lock_file)
            .map_err(|e| StoreError::Lock(format!("{}: {e}", lock_path.display())))?;
        // the lock is released when `lock_file` is closed
        operation()
    }

    fn read_lease(path: &Path) -> Result<Option<Lease>, StoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            })
    }

    fn read_index(path: &Path) -> Result<Vec<TaskKey>, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        let mut entries = Vec::new();
        for line in index_lines(&content) {
            match decode_key(line).and_then(|raw| TaskKey::new(raw).ok()) {
                Some(task) => entries.push(task),
                None => warn!(path = %path.display(), line, "skipping unreadable index entry"),
            }
        }
        Ok(entries)
    }

    /// Atomically replaces `path` with `content`.
    fn replace_file(dir: &Path, path: &Path, content: &[u8]) -> Result<(), StoreError> {
        let mut temp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
        temp.write_all(content).map_err(|e| StoreError::io(temp.path(), e))?;
        temp.persist(path)
            .map_err(|e| StoreError::io(path, e.error))?;
        Ok(())
    }
}

impl ClaimStore for FileClaimStore {
    fn create_if_absent(&self, lease: &Lease) -> Result<CreateOutcome, StoreError> {
        let dir = self.claims_dir();
        let path = self.lease_path(&lease.task_id);
        let payload = serde_json::to_vec_pretty(lease).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;

        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        temp.write_all(&payload)
            .map_err(|e| StoreError::io(temp.path(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io(temp.path(), e))?;

        match temp.persist_noclobber(&path) {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                Ok(CreateOutcome::Exists(Self::read_lease(&path)?))
            }
            Err(e) => Err(StoreError::io(&path, e.error)),
        }
    }

    fn get(&self, task: &TaskKey) -> Result<Option<Lease>, StoreError> {
        Self::read_lease(&self.lease_path(task))
    }

    fn delete_if(
        &self,
        task: &TaskKey,
        predicate: &dyn Fn(&Lease) -> bool,
    ) -> Result<DeleteOutcome, StoreError> {
        let path = self.lease_path(task);
        self.with_lock(|| {
            let Some(existing) = Self::read_lease(&path)? else {
                return Ok(DeleteOutcome::Absent);
            };
            if !predicate(&existing) {
                return Ok(DeleteOutcome::Kept(existing));
            }
            match fs::remove_file(&path) {
                Ok(()) => Ok(DeleteOutcome::Deleted(existing)),
                // already gone: the record we judged no longer exists either way
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(DeleteOutcome::Deleted(existing)),
                Err(e) => Err(StoreError::io(&path, e)),
            }
        })
    }

    fn leases(&self) -> Result<Vec<Lease>, StoreError> {
        let dir = self.claims_dir();
        let reader = fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;
        let mut leases = Vec::new();
        for entry in reader {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let path = entry.path();
            // in-flight temp files have no extension
            if path.extension().and_then(|ext| ext.to_str()) != Some(LEASE_EXT) {
                continue;
            }
            match Self::read_lease(&path) {
                Ok(Some(lease)) => leases.push(lease),
                Ok(None) => {}
                Err(StoreError::Corrupt { path, source }) => {
                    warn!(path = %path.display(), error = %source, "skipping corrupt lease record");
                }
                Err(e) => return Err(e),
            }
        }
        leases.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        Ok(leases)
    }
}

impl AgentIndex for FileClaimStore {
    fn append(&self, owner: &OwnerId, task: &TaskKey) -> Result<(), StoreError> {
        let path = self.index_path(owner);
        let line = format!("{}\n", encode_key(task.as_str()));
        self.with_lock(|| {
            let mut file: File = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| StoreError::io(&path, e))?;
            let fresh = file.metadata().map_err(|e| StoreError::io(&path, e))?.len() == 0;
            let mut record = String::new();
            if fresh {
                record.push_str(&index_header(owner));
            }
            record.push_str(&line);
            file.write_all(record.as_bytes())
                .map_err(|e| StoreError::io(&path, e))
        })
    }

    fn prune(&self, owner: &OwnerId, task: &TaskKey) -> Result<bool, StoreError> {
        let path = self.index_path(owner);
        let encoded = encode_key(task.as_str());
        self.with_lock(|| {
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(StoreError::io(&path, e)),
            };
            let mut kept: Vec<&str> = index_lines(&content).collect();
            let Some(position) = kept.iter().position(|line| *line == encoded) else {
                return Ok(false);
            };
            kept.remove(position);

            if kept.is_empty() {
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(StoreError::io(&path, e)),
                }
            } else {
                let mut rewritten = index_header(owner);
                for line in kept {
                    rewritten.push_str(line);
                    rewritten.push('\n');
                }
                Self::replace_file(&self.agents_dir(), &path, rewritten.as_bytes())?;
            }
            Ok(true)
        })
    }

    fn entries(&self, owner: &OwnerId) -> Result<Vec<TaskKey>, StoreError> {
        let path = self.index_path(owner);
        self.with_lock(|| Self::read_index(&path))
    }

    fn owners(&self) -> Result<Vec<OwnerId>, StoreError> {
        let dir = self.agents_dir();
        let reader = fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))?;
        let mut owners = Vec::new();
        for entry in reader {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(INDEX_EXT) {
                continue;
            }
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                // pruned to empty between read_dir and here
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io(&path, e)),
            };
            if index_lines(&content).next().is_none() {
                continue;
            }
            let owner = content
                .lines()
                .next()
                .and_then(|header| header.strip_prefix(OWNER_HEADER))
                .and_then(decode_key)
                .and_then(|raw| OwnerId::new(raw).ok());
            match owner {
                Some(owner) => owners.push(owner),
                None => warn!(path = %path.display(), "skipping index file without owner header"),
            }
        }
        owners.sort();
        Ok(owners)
    }
}

/// File stem for `raw`: the escaped key, or a prefix of it plus a SHA-256 of
/// the key when the escaped form would be too long for one path component.
///
/// Hashed stems contain `~`, which `encode_key` never emits, so they cannot
/// collide with a verbatim stem.
fn file_stem(raw: &str) -> String {
    let encoded = encode_key(raw);
    if encoded.len() <= MAX_STEM_BYTES {
        return encoded;
    }
    let digest = hex::encode(Sha256::digest(raw.as_bytes()));
    // escaped keys are ASCII, so any byte offset is a char boundary
    format!("{}~{digest}", &encoded[..HASHED_PREFIX_BYTES])
}

fn index_header(owner: &OwnerId) -> String {
    format!("{OWNER_HEADER}{}\n", encode_key(owner.as_str()))
}

/// Entry lines of an index file, header excluded.
fn index_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with(OWNER_HEADER))
}

/// Maps an arbitrary key onto one safe file name component.
///
/// `[A-Za-z0-9_-]` pass through; every other byte becomes `%XX`.
fn encode_key(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}
