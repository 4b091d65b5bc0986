// SPDX-License-Identifier: MPL-2.0

//! Absolute path resolution.

use crate::{
    dir::DirEntry,
    fs::Ext2,
    inode::{MAX_FNAME_LEN, ROOT_INO},
    prelude::*,
};

/// Splits an absolute path into its non-empty components.
fn components(path: &str) -> Result<Vec<&str>> {
    if !path.starts_with('/') {
        return Err(Ext2Error::InvalidPath(path.to_string()));
    }
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    if let Some(long) = components.iter().find(|c| c.len() > MAX_FNAME_LEN) {
        return Err(Ext2Error::NameTooLong(long.to_string()));
    }
    Ok(components)
}

impl Ext2 {
    /// Resolves the directory holding the last component of `path`.
    ///
    /// Returns the inode number of that directory and the last component.
    pub fn resolve_parent(&self, path: &str) -> Result<(u32, String)> {
        let mut components = components(path)?;
        let name = components
            .pop()
            .ok_or_else(|| Ext2Error::InvalidPath(path.to_string()))?;
        let parent = self.walk(ROOT_INO, &components, path)?;
        Ok((parent, name.to_string()))
    }

    /// Like [`Ext2::resolve_parent`], but `path` must name an entry rather
    /// than a directory, so a trailing `/` is refused.
    pub(crate) fn resolve_entry(&self, path: &str) -> Result<(u32, String)> {
        if path.ends_with('/') {
            return Err(Ext2Error::InvalidPath(path.to_string()));
        }
        self.resolve_parent(path)
    }

    /// Resolves `path` to the inode it names.
    pub fn lookup(&self, path: &str) -> Result<u32> {
        let components = components(path)?;
        let Some((last, dirs)) = components.split_last() else {
            return Ok(ROOT_INO);
        };
        let parent = self.walk(ROOT_INO, dirs, path)?;
        if *last == "." {
            return Ok(parent);
        }
        self.lookup_entry(parent, last, false)
            .map_err(|err| not_found_as(err, path))
    }

    /// Lists the live entries of the directory at `path`.
    pub fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let dir = self.read_inode(self.lookup(path)?)?;
        if !dir.is_dir() {
            return Err(Ext2Error::NotADirectory(path.to_string()));
        }
        Ok(self
            .dir_entries(&dir)?
            .into_iter()
            .map(|(_, _, entry)| entry)
            .collect())
    }

    /// Fails with `AlreadyExists` if `name` is taken in the directory `dir_ino`.
    pub(crate) fn ensure_absent(&self, dir_ino: u32, name: &str, path: &str) -> Result<()> {
        match self.lookup_entry(dir_ino, name, false) {
            Ok(_) => Err(Ext2Error::AlreadyExists(path.to_string())),
            Err(Ext2Error::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Follows directory entries, skipping ".", from `start`.
    fn walk(&self, start: u32, components: &[&str], path: &str) -> Result<u32> {
        let mut ino = start;
        for component in components.iter().filter(|c| **c != ".") {
            ino = self
                .lookup_entry(ino, component, true)
                .map_err(|err| not_found_as(err, path))?;
        }
        Ok(ino)
    }
}

/// Reports a missing component with the whole path.
fn not_found_as(err: Ext2Error, path: &str) -> Ext2Error {
    match err {
        Ext2Error::NotFound(_) => Ext2Error::NotFound(path.to_string()),
        err => err,
    }
}
