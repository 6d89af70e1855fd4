//! File system abstraction used by the archive creator
//!
//! The archive creator never touches `std::fs` directly; it goes through a
//! [`FileSystem`] so the whole materialize/rewrite/package pipeline can run
//! against [`MemoryFileSystem`] in tests.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

/// A file opened for streaming writes
pub trait WriteSeek: Write + Seek + Send {}

impl<T: Write + Seek + Send> WriteSeek for T {}

/// File operations needed to assemble and package an archive
pub trait FileSystem: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Writes a file, creating missing parent directories
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Creates or truncates a file for streaming writes, creating missing
    /// parent directories
    fn create(&self, path: &Path) -> io::Result<Box<dyn WriteSeek>>;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn is_writable(&self, path: &Path) -> bool;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Copies a single file, creating missing parent directories
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Lists every file below `root`, recursively, in a stable order
    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>>;

    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The real, on-disk file system
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn WriteSeek>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Box::new(std::fs::File::create(path)?))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_writable(&self, path: &Path) -> bool {
        std::fs::metadata(path)
            .map(|m| !m.permissions().readonly())
            .unwrap_or(false)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(from, to).map(|_| ())
    }

    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}

/// An in-memory file system for tests
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
    read_only: Mutex<BTreeSet<PathBuf>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes writes below `path` fail with `PermissionDenied`
    pub fn set_read_only(&self, path: &Path) {
        self.read_only
            .lock()
            .expect("read-only set lock poisoned")
            .insert(path.to_path_buf());
    }

    /// Returns the contents of a file as UTF-8, for assertions
    pub fn read_to_string(&self, path: &Path) -> Option<String> {
        self.files
            .lock()
            .expect("file map lock poisoned")
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    fn check_writable(&self, path: &Path) -> io::Result<()> {
        let read_only = self.read_only.lock().expect("read-only set lock poisoned");
        if read_only.iter().any(|ro| path.starts_with(ro)) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("read-only: {}", path.display()),
            ));
        }
        Ok(())
    }

    fn add_dirs(&self, path: &Path) {
        let mut dirs = self.dirs.lock().expect("dir set lock poisoned");
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }
}

/// A file being written to a [`MemoryFileSystem`]
///
/// The buffer is stored on every flush and when the handle is dropped.
struct MemoryFile {
    path: PathBuf,
    buffer: Cursor<Vec<u8>>,
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl MemoryFile {
    fn commit(&self) {
        self.files
            .lock()
            .expect("file map lock poisoned")
            .insert(self.path.clone(), self.buffer.get_ref().clone());
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        Ok(())
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(pos)
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        self.commit();
    }
}

impl FileSystem for MemoryFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .lock()
            .expect("file map lock poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.check_writable(path)?;
        if let Some(parent) = path.parent() {
            self.add_dirs(parent);
        }
        self.files
            .lock()
            .expect("file map lock poisoned")
            .insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn WriteSeek>> {
        self.write(path, &[])?;
        Ok(Box::new(MemoryFile {
            path: path.to_path_buf(),
            buffer: Cursor::new(Vec::new()),
            files: Arc::clone(&self.files),
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_dir(path)
            || self
                .files
                .lock()
                .expect("file map lock poisoned")
                .contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs
            .lock()
            .expect("dir set lock poisoned")
            .contains(path)
    }

    fn is_writable(&self, path: &Path) -> bool {
        self.exists(path) && self.check_writable(path).is_ok()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.check_writable(path)?;
        self.add_dirs(path);
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        let contents = self.read(from)?;
        self.write(to, &contents)
    }

    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let files = self.files.lock().expect("file map lock poisoned");
        if files.contains_key(root) {
            return Ok(vec![root.to_path_buf()]);
        }
        if !self.is_dir(root) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                root.display().to_string(),
            ));
        }
        Ok(files
            .keys()
            .filter(|p| p.starts_with(root))
            .cloned()
            .collect())
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        self.check_writable(path)?;
        self.files
            .lock()
            .expect("file map lock poisoned")
            .retain(|p, _| !p.starts_with(path));
        self.dirs
            .lock()
            .expect("dir set lock poisoned")
            .retain(|p| !p.starts_with(path));
        Ok(())
    }
}
