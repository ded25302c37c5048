//! The content root: a file tree confined to one directory.
//!
//! Every path handed to a ContentRoot is relative to the content
//! directory and uses `/` as separator. Absolute paths and `..`
//! components are rejected before touching the filesystem.

use crate::error::{ContentError, Result};
use crate::page::{candidates_for, page_candidates, page_to_file, Page};
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Hook applied to the raw bytes of every page right after reading.
pub type PageTransform = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// Handle to the content directory.
///
/// Cheap to clone; clones share the transform hook.
#[derive(Clone)]
pub struct ContentRoot {
    dir: PathBuf,
    transform: Option<PageTransform>,
    read_only: bool,
}

impl fmt::Debug for ContentRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentRoot")
            .field("dir", &self.dir)
            .field("transform", &self.transform.is_some())
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl ContentRoot {
    /// Opens an existing content directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let meta = fs::metadata(&dir).map_err(|e| ContentError::io(&dir, e))?;
        if !meta.is_dir() {
            return Err(ContentError::io(
                &dir,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }
        Ok(Self {
            dir,
            transform: None,
            read_only: false,
        })
    }

    /// Registers a hook that rewrites page content after every read.
    ///
    /// The raw content is kept on the page; the hook's output is stored
    /// as the transformed variant.
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&[u8]) -> Vec<u8> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Disables [`ContentRoot::save_page`].
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// The content directory on disk.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Maps a content-relative path to a filesystem path.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let rel_path = Path::new(rel);
        let confined = rel_path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !confined {
            return Err(ContentError::OutsideRoot(rel_path.to_path_buf()));
        }
        Ok(self.dir.join(rel_path))
    }

    /// Lists the entries of a directory.
    pub fn list_dir(&self, rel: &str) -> Result<Vec<fs::DirEntry>> {
        let path = self.resolve(rel)?;
        let entries = fs::read_dir(&path).map_err(|e| ContentError::io(&path, e))?;
        entries
            .map(|entry| entry.map_err(|e| ContentError::io(&path, e)))
            .collect()
    }

    /// Returns size, timestamps and type of a file.
    pub fn metadata(&self, rel: &str) -> Result<fs::Metadata> {
        let path = self.resolve(rel)?;
        fs::metadata(&path).map_err(|e| ContentError::io(&path, e))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.metadata(rel).is_ok()
    }

    /// Reads a page from its backing file.
    pub fn read_page(&self, file_name: &str) -> Result<Page> {
        let path = self.resolve(file_name)?;
        let mut file = File::open(&path).map_err(|e| ContentError::io(&path, e))?;
        // Size and mtime come from the handle the bytes are read through.
        let meta = file.metadata().map_err(|e| ContentError::io(&path, e))?;
        let mut bytes = Vec::with_capacity(meta.len() as usize);
        file.read_to_end(&mut bytes).map_err(|e| ContentError::io(&path, e))?;

        let transformed = self.transform.as_ref().map(|transform| transform(&bytes));
        let mut page = Page::unread(file_name).with_raw(bytes);
        if let Ok(mod_time) = meta.modified() {
            page = page.with_mod_time(mod_time);
        }
        if let Some(transformed) = transformed {
            page = page.with_transformed(String::from_utf8_lossy(&transformed));
        }
        Ok(page)
    }

    /// Reads the first file in `candidates` that can be read.
    ///
    /// If none can, the error of the first candidate is returned.
    pub fn read_first(&self, candidates: &[String]) -> Result<Page> {
        let mut first_err = None;
        for file_name in candidates {
            match self.read_page(file_name) {
                Ok(page) => return Ok(page),
                Err(e) => {
                    debug!("candidate {} not readable: {}", file_name, e);
                    first_err.get_or_insert(e);
                }
            }
        }
        Err(first_err.unwrap_or_else(|| ContentError::PageNotFound(String::new())))
    }

    /// Reads a page given either its page name or its file name.
    pub fn find_page(&self, name: &str) -> Result<Page> {
        if name.is_empty() {
            return Err(ContentError::InvalidPageName(name.to_string()));
        }
        self.read_first(&candidates_for(name)).map_err(|e| {
            if e.is_not_found() {
                ContentError::PageNotFound(name.to_string())
            } else {
                e
            }
        })
    }

    /// Writes `bytes` to a file, truncating any previous content.
    pub fn write_file(&self, rel: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(rel)?;
        fs::write(&path, bytes).map_err(|e| ContentError::io(&path, e))
    }

    /// Creates a directory and all missing parents.
    pub fn create_dir_all(&self, rel: &str) -> Result<()> {
        let path = self.resolve(rel)?;
        fs::create_dir_all(&path).map_err(|e| ContentError::io(&path, e))
    }

    /// Creates the parent directories of a content-relative file path.
    pub fn create_parent_dirs(&self, rel: &str) -> Result<()> {
        match Path::new(rel).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                self.create_dir_all(&parent.to_string_lossy())
            }
            _ => Ok(()),
        }
    }

    /// Renames a file inside the content tree.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let old_path = self.resolve(from)?;
        let new_path = self.resolve(to)?;
        fs::rename(&old_path, &new_path).map_err(|e| ContentError::io(&old_path, e))
    }

    /// Saves new content for a page and returns the file it was written to.
    ///
    /// Line endings are normalized to `\n`. An existing backing file is
    /// overwritten in place; otherwise the canonical file is created.
    pub fn save_page(&self, page_name: &str, content: &str) -> Result<String> {
        if self.read_only {
            return Err(ContentError::ReadOnly);
        }
        if page_name.is_empty() {
            return Err(ContentError::InvalidPageName(page_name.to_string()));
        }
        if content.is_empty() {
            return Err(ContentError::EmptyContent);
        }
        let content = content.replace("\r\n", "\n");

        let file_name = page_candidates(page_name)
            .into_iter()
            .find(|candidate| self.exists(candidate))
            .unwrap_or_else(|| page_to_file(page_name));

        self.create_parent_dirs(&file_name)?;
        self.write_file(&file_name, content.as_bytes())?;
        debug!("saved {} ({} bytes)", file_name, content.len());
        Ok(file_name)
    }
}
