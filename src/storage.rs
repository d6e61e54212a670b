use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use svdface_vision::Descriptor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub name: String,
    pub descriptor: Descriptor,
}

/// Identity name → descriptor, in enrollment order.
///
/// Re-enrolling a name replaces its descriptor but keeps its position, so the
/// earliest enrolled identity still wins exact score ties in the matcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gallery {
    records: Vec<IdentityRecord>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Returns the descriptor that was replaced, if any.
    pub fn insert(&mut self, name: impl Into<String>, descriptor: Descriptor) -> Option<Descriptor> {
        let name = name.into();
        match self.records.iter_mut().find(|r| r.name == name) {
            Some(existing) => Some(std::mem::replace(&mut existing.descriptor, descriptor)),
            None => {
                self.records.push(IdentityRecord { name, descriptor });
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Descriptor> {
        self.records
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.descriptor)
    }

    pub fn remove(&mut self, name: &str) -> Option<Descriptor> {
        let idx = self.records.iter().position(|r| r.name == name)?;
        Some(self.records.remove(idx).descriptor)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Descriptor)> {
        self.records.iter().map(|r| (r.name.as_str(), &r.descriptor))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Whole-gallery persistence. A store with nothing saved yet loads as empty.
pub trait IdentityStore {
    fn load(&self) -> Result<Gallery>;
    fn save(&self, gallery: &Gallery) -> Result<()>;

    /// Load, mutate, save. Nothing is saved when `f` fails. Stores shared
    /// between threads override this to run the whole cycle under one lock.
    fn update<T>(&self, f: impl FnOnce(&mut Gallery) -> Result<T>) -> Result<T> {
        let mut gallery = self.load()?;
        let out = f(&mut gallery)?;
        self.save(&gallery)?;
        Ok(out)
    }
}

impl<S: IdentityStore> IdentityStore for &S {
    fn load(&self) -> Result<Gallery> {
        (**self).load()
    }

    fn save(&self, gallery: &Gallery) -> Result<()> {
        (**self).save(gallery)
    }

    fn update<T>(&self, f: impl FnOnce(&mut Gallery) -> Result<T>) -> Result<T> {
        (**self).update(f)
    }
}

/// postcard-encoded gallery in a single file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> Error {
        Error::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}

impl IdentityStore for FileStore {
    fn load(&self) -> Result<Gallery> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no identity store at {}, starting empty", self.path.display());
                return Ok(Gallery::new());
            }
            Err(e) => return Err(self.io_err(e)),
        };
        postcard::from_bytes(&data).map_err(|source| Error::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, gallery: &Gallery) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let data = postcard::to_allocvec(gallery).map_err(|source| Error::Encode {
            path: self.path.clone(),
            source,
        })?;

        // Write beside the target and rename so readers never see a partial file.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, data).map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            self.io_err(e)
        })?;
        log::debug!("saved {} identities to {}", gallery.len(), self.path.display());
        Ok(())
    }
}

/// In-process store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    gallery: Mutex<Gallery>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryStore {
    fn load(&self) -> Result<Gallery> {
        Ok(self
            .gallery
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn save(&self, gallery: &Gallery) -> Result<()> {
        *self
            .gallery
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = gallery.clone();
        Ok(())
    }

    fn update<T>(&self, f: impl FnOnce(&mut Gallery) -> Result<T>) -> Result<T> {
        let mut guard = self
            .gallery
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut gallery = guard.clone();
        let out = f(&mut gallery)?;
        *guard = gallery;
        Ok(out)
    }
}

/// One writer or many readers over an inner store.
///
/// `update` holds the write lock across the whole load → mutate → save cycle
/// so concurrent enrollments in this process cannot drop each other. Plain
/// `load`/`save` calls only hold the lock for their own step.
#[derive(Debug, Default)]
pub struct SharedStore<S> {
    inner: RwLock<S>,
}

impl<S: IdentityStore> SharedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner: RwLock::new(inner),
        }
    }
}

impl<S: IdentityStore> IdentityStore for SharedStore<S> {
    fn load(&self) -> Result<Gallery> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .load()
    }

    fn save(&self, gallery: &Gallery) -> Result<()> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .save(gallery)
    }

    fn update<T>(&self, f: impl FnOnce(&mut Gallery) -> Result<T>) -> Result<T> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .update(f)
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("identity name must not be empty".into()));
    }
    Ok(())
}

/// Store `descriptor` under `name`, replacing any previous descriptor.
pub fn enroll<S: IdentityStore>(store: &S, name: &str, descriptor: Descriptor) -> Result<()> {
    check_name(name)?;
    let replaced = store.update(|gallery| Ok(gallery.insert(name, descriptor).is_some()))?;
    if replaced {
        log::info!("replaced descriptor for {}", name);
    } else {
        log::info!("enrolled new identity {}", name);
    }
    Ok(())
}

/// Drop an identity. Returns whether it existed.
pub fn remove<S: IdentityStore>(store: &S, name: &str) -> Result<bool> {
    let removed = store.update(|gallery| Ok(gallery.remove(name).is_some()))?;
    if removed {
        log::info!("removed identity {}", name);
    }
    Ok(removed)
}
