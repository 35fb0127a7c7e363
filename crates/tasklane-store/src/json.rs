//! Single-file JSON store.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tasklane_core::{
    Category, CategoryId, CategoryPatch, NewCategory, NewTask, Recurrence, ReorderUpdate, Task, TaskId,
    TaskPatch, UserId,
};
use tempfile::NamedTempFile;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::tables::Tables;

/// Store persisting every table to one JSON document.
///
/// Each write loads the document, applies the change and atomically replaces
/// the file, so a failed write leaves the previous contents intact. Clones
/// share the same file and in-process lock.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl JsonStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// # Errors
    /// Fails when the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        info!(file = %path.display(), "opened json store");
        Ok(Self {
            path: Arc::new(path),
            lock: Arc::new(Mutex::new(())),
        })
    }

    /// Location of the data file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Tables> {
        let raw = match fs::read(self.path.as_path()) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Tables::default()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_slice(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.to_path_buf(),
            source,
        })
    }

    fn save(&self, tables: &Tables) -> Result<()> {
        let io = |source| StoreError::Io {
            path: self.path.to_path_buf(),
            source,
        };
        let body = serde_json::to_vec_pretty(tables).map_err(StoreError::Serialize)?;
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir).map_err(io)?;
        temp.write_all(&body).map_err(io)?;
        temp.flush().map_err(io)?;
        temp.persist(self.path.as_path()).map_err(|source| StoreError::Persist {
            path: self.path.to_path_buf(),
            source,
        })?;
        debug!(file = %self.path.display(), tasks = tables.tasks.len(), "saved tables");
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T> {
        let _lock = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&self.load()?))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let _lock = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut tables = self.load()?;
        let out = f(&mut tables)?;
        self.save(&tables)?;
        Ok(out)
    }

    /// Tasks of `user` with their joins.
    ///
    /// # Errors
    /// Fails when the file cannot be read.
    pub fn list_tasks(&self, user: UserId) -> Result<Vec<Task>> {
        self.read(|tables| tables.list_tasks(user))
    }

    /// Completed tasks of `user`.
    ///
    /// # Errors
    /// Fails when the file cannot be read.
    pub fn list_completed_tasks(&self, user: UserId) -> Result<Vec<Task>> {
        self.read(|tables| tables.list_completed_tasks(user))
    }

    /// Categories of `user`.
    ///
    /// # Errors
    /// Fails when the file cannot be read.
    pub fn list_categories(&self, user: UserId) -> Result<Vec<Category>> {
        self.read(|tables| tables.list_categories(user))
    }

    /// Insert a task.
    ///
    /// # Errors
    /// Fails on I/O errors or a missing category.
    pub fn insert_task(&self, row: NewTask) -> Result<Task> {
        self.write(|tables| tables.insert_task(row, OffsetDateTime::now_utc()))
    }

    /// Patch tasks; returns the number changed.
    ///
    /// # Errors
    /// Fails on I/O errors or a missing category.
    pub fn update_tasks(&self, ids: &[TaskId], patch: &TaskPatch) -> Result<usize> {
        self.write(|tables| tables.update_tasks(ids, patch))
    }

    /// Delete tasks; returns the number removed.
    ///
    /// # Errors
    /// Fails on I/O errors.
    pub fn delete_tasks(&self, ids: &[TaskId]) -> Result<usize> {
        self.write(|tables| Ok(tables.delete_tasks(ids)))
    }

    /// Attach a recurrence.
    ///
    /// # Errors
    /// Fails on I/O errors or a row conflict.
    pub fn insert_recurrence(&self, task: TaskId, recurrence: Recurrence) -> Result<()> {
        self.write(|tables| tables.insert_recurrence(task, recurrence))
    }

    /// Replace a recurrence.
    ///
    /// # Errors
    /// Fails on I/O errors or a missing row.
    pub fn update_recurrence(&self, task: TaskId, recurrence: Recurrence) -> Result<()> {
        self.write(|tables| tables.update_recurrence(task, recurrence))
    }

    /// Apply a reorder batch atomically.
    ///
    /// # Errors
    /// Fails on I/O errors or unknown rows; the file is left untouched then.
    pub fn batch_reorder(&self, updates: &[ReorderUpdate]) -> Result<()> {
        self.write(|tables| tables.batch_reorder(updates))
    }

    /// Insert a category.
    ///
    /// # Errors
    /// Fails on I/O errors.
    pub fn insert_category(&self, row: NewCategory) -> Result<Category> {
        self.write(|tables| Ok(tables.insert_category(row, OffsetDateTime::now_utc())))
    }

    /// Update a category.
    ///
    /// # Errors
    /// Fails on I/O errors or a missing category.
    pub fn update_category(&self, id: CategoryId, patch: &CategoryPatch) -> Result<Category> {
        self.write(|tables| tables.update_category(id, patch))
    }

    /// Delete a category, detaching its tasks.
    ///
    /// # Errors
    /// Fails on I/O errors or a missing category.
    pub fn delete_category(&self, id: CategoryId) -> Result<Vec<TaskId>> {
        self.write(|tables| tables.delete_category(id))
    }
}
