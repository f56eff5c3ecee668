//! BLAKE3 Merkle integrity over a shard's `content/` tree (spec §4.4).
//!
//! Leaves are `BLAKE3(relpath_utf8 || 0x00 || file_bytes)` over POSIX-style
//! relative paths sorted by UTF-8 byte order; the tree folds pairwise,
//! duplicating the final node on an odd level, up to a single root. The
//! walk excludes `manifest.json` and everything under `sig/`, follows no
//! symlinks, and is bounded by [`MerkleLimits`](crate::config::MerkleLimits).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use walkdir::WalkDir;

use crate::config::MerkleLimits;
use crate::errors::{AxmError, AxmResult};

/// One leaf: a POSIX-style relative path and its file hash input.
struct LeafFile {
    relpath: String,
    abspath: std::path::PathBuf,
}

/// Walk `root`, collecting every regular file to be Merkle-hashed, applying
/// the exclusion rules and hardening limits.
fn collect_leaf_files(root: &Path, limits: &MerkleLimits) -> AxmResult<Vec<LeafFile>> {
    let mut files = Vec::new();
    let mut total_bytes: u64 = 0;
    let mut count: u64 = 0;

    for entry in WalkDir::new(root).follow_links(false).into_iter() {
        let entry = entry.map_err(|e| AxmError::invariant(format!("walk error: {e}")))?;

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            return Err(AxmError::invariant(format!(
                "symlink not permitted in shard tree: {}",
                entry.path().display()
            )));
        }
        if !file_type.is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| AxmError::invariant(e.to_string()))?;
        let relpath = posix_relpath(rel);

        if relpath == "manifest.json" || relpath.starts_with("sig/") {
            continue;
        }

        let metadata = entry
            .metadata()
            .map_err(|e| AxmError::invariant(format!("metadata error: {e}")))?;
        let size = metadata.len();

        if size > limits.max_file_bytes {
            return Err(AxmError::limit_exceeded(format!(
                "file {relpath} exceeds max_file_bytes ({size} > {})",
                limits.max_file_bytes
            )));
        }

        total_bytes = total_bytes
            .checked_add(size)
            .ok_or_else(|| AxmError::limit_exceeded("total byte count overflow"))?;
        count += 1;

        if count > limits.max_files {
            return Err(AxmError::limit_exceeded(format!(
                "file count exceeds max_files ({})",
                limits.max_files
            )));
        }
        if total_bytes > limits.max_total_bytes {
            return Err(AxmError::limit_exceeded(format!(
                "total content size exceeds max_total_bytes ({})",
                limits.max_total_bytes
            )));
        }

        files.push(LeafFile {
            relpath,
            abspath: entry.path().to_path_buf(),
        });
    }

    files.sort_by(|a, b| a.relpath.as_bytes().cmp(b.relpath.as_bytes()));
    Ok(files)
}

fn posix_relpath(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn hash_leaf(relpath: &str, abspath: &Path, chunk_bytes: usize) -> AxmResult<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(relpath.as_bytes());
    hasher.update(&[0u8]);

    let mut file = File::open(abspath)?;
    let mut buf = vec![0u8; chunk_bytes];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize())
}

/// Fold a list of leaf hashes pairwise into a single Merkle root,
/// duplicating the last node of an odd-length level.
fn fold(mut level: Vec<blake3::Hash>) -> blake3::Hash {
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks(2) {
            let mut hasher = blake3::Hasher::new();
            hasher.update(pair[0].as_bytes());
            hasher.update(pair[1].as_bytes());
            next.push(hasher.finalize());
        }
        level = next;
    }
    level[0]
}

/// Compute the Merkle root over `root`'s content tree, returning its
/// lowercase hex digest. An empty tree's root is `BLAKE3("")`, matching the
/// reference behavior rather than treating emptiness as undefined.
pub fn compute_merkle_root(root: &Path, limits: &MerkleLimits) -> AxmResult<String> {
    let files = collect_leaf_files(root, limits)?;
    if files.is_empty() {
        return Ok(blake3::hash(b"").to_hex().to_string());
    }

    let mut leaves = Vec::with_capacity(files.len());
    for f in &files {
        leaves.push(hash_leaf(&f.relpath, &f.abspath, limits.hash_chunk_bytes)?);
    }

    Ok(fold(leaves).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn empty_tree_hashes_empty_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let root = compute_merkle_root(dir.path(), &MerkleLimits::default()).unwrap();
        assert_eq!(root, blake3::hash(b"").to_hex().to_string());
    }

    #[test]
    fn root_is_stable_and_order_independent_of_creation() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("content/a")).unwrap();
        fs::write(dir.path().join("content/a/two.txt"), b"two").unwrap();
        fs::write(dir.path().join("content/one.txt"), b"one").unwrap();

        let r1 = compute_merkle_root(dir.path(), &MerkleLimits::default()).unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        fs::write(dir2.path().join("content_one.txt"), b"unused").unwrap();
        fs::remove_file(dir2.path().join("content_one.txt")).unwrap();
        fs::create_dir_all(dir2.path().join("content/a")).unwrap();
        fs::write(dir2.path().join("content/one.txt"), b"one").unwrap();
        fs::write(dir2.path().join("content/a/two.txt"), b"two").unwrap();
        let r2 = compute_merkle_root(dir2.path(), &MerkleLimits::default()).unwrap();

        assert_eq!(r1, r2);
        assert_eq!(r1.len(), 64);
    }

    #[test]
    fn manifest_and_sig_are_excluded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("manifest.json"), b"{}").unwrap();
        fs::create_dir_all(dir.path().join("sig")).unwrap();
        fs::write(dir.path().join("sig/manifest.sig"), b"sig").unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        fs::write(dir.path().join("content/a.txt"), b"a").unwrap();

        let with_extra = compute_merkle_root(dir.path(), &MerkleLimits::default()).unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir2.path().join("content")).unwrap();
        fs::write(dir2.path().join("content/a.txt"), b"a").unwrap();
        let without_extra = compute_merkle_root(dir2.path(), &MerkleLimits::default()).unwrap();

        assert_eq!(with_extra, without_extra);
    }

    #[test]
    fn tamper_changes_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        fs::write(dir.path().join("content/a.txt"), b"a").unwrap();
        let before = compute_merkle_root(dir.path(), &MerkleLimits::default()).unwrap();

        fs::write(dir.path().join("content/a.txt"), b"b").unwrap();
        let after = compute_merkle_root(dir.path(), &MerkleLimits::default()).unwrap();

        assert_ne!(before, after);
    }
}
