//! File-backed secure item store.
//!
//! Items are stored one per file under a root directory:
//!
//! ```text
//! {root}/private/{base64url(alias)}
//! {root}/public/{base64url(alias)}
//! ```
//!
//! Aliases are base64url-encoded so any alias maps to a single safe file
//! name. On Unix, item files are created with mode `0600`.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

use super::{ItemClass, ItemQuery, ItemResult, ItemStatus, SecureItem, SecureItemStore};

/// Raw code reported for I/O failures that carry no OS error code.
pub const STATUS_IO_FAILURE: i32 = -1;

/// [`SecureItemStore`] persisting items as files under a directory.
#[derive(Debug, Clone)]
pub struct FileSecureItemStore {
    root: PathBuf,
}

impl FileSecureItemStore {
    /// Opens (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the class directories cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        for class in [ItemClass::PrivateKey, ItemClass::PublicKey] {
            fs::create_dir_all(root.join(class.as_str()))?;
        }
        Ok(Self { root })
    }

    /// Returns the store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn item_path(&self, query: &ItemQuery) -> PathBuf {
        self.root.join(query.class.as_str()).join(URL_SAFE_NO_PAD.encode(query.account.as_bytes()))
    }
}

fn io_status(err: &io::Error) -> ItemStatus {
    match err.kind() {
        io::ErrorKind::AlreadyExists => ItemStatus::DuplicateItem,
        io::ErrorKind::NotFound => ItemStatus::ItemNotFound,
        _ => ItemStatus::Other(err.raw_os_error().unwrap_or(STATUS_IO_FAILURE)),
    }
}

fn create_new(path: &Path) -> io::Result<fs::File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

impl SecureItemStore for FileSecureItemStore {
    fn insert(&self, item: SecureItem) -> ItemResult<()> {
        let path = self.item_path(&item.query());
        let mut file = create_new(&path).map_err(|e| io_status(&e))?;

        if let Err(err) = file.write_all(&item.data).and_then(|()| file.sync_all()) {
            tracing::warn!(path = %path.display(), error = %err, "failed to write secure item");
            // Leave no truncated item behind
            let _cleanup = fs::remove_file(&path);
            return Err(io_status(&err));
        }
        Ok(())
    }

    fn delete(&self, query: &ItemQuery) -> ItemResult<()> {
        fs::remove_file(self.item_path(query)).map_err(|e| io_status(&e))
    }

    fn query(&self, query: &ItemQuery) -> ItemResult<SecureItem> {
        let data = fs::read(self.item_path(query)).map_err(|e| io_status(&e))?;
        Ok(SecureItem::new(query.account.clone(), query.class, data))
    }
}
