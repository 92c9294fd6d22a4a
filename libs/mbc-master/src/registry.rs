//! Descriptor registry
//!
//! Holds the application's descriptor table behind a shared pointer. The
//! table is never copied: lookups hand out a [`DescriptorRef`] that points
//! into the same allocation and keeps it alive, so a transaction that
//! captured a descriptor is unaffected when the table is swapped.

use std::ops::Deref;
use std::sync::Arc;

use errors::{MbcError, Result};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::descriptor::{ParameterDescriptor, Permissions};

/// Direction of an access check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Shared handle to one descriptor of a bound table
#[derive(Debug, Clone)]
pub struct DescriptorRef {
    table: Arc<[ParameterDescriptor]>,
    index: usize,
}

impl DescriptorRef {
    /// Position of the descriptor in its table
    pub fn index(&self) -> usize {
        self.index
    }

    /// The table this descriptor belongs to
    pub fn table(&self) -> &Arc<[ParameterDescriptor]> {
        &self.table
    }
}

impl Deref for DescriptorRef {
    type Target = ParameterDescriptor;

    fn deref(&self) -> &ParameterDescriptor {
        &self.table[self.index]
    }
}

#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    table: RwLock<Option<Arc<[ParameterDescriptor]>>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a new table, replacing the current one atomically
    ///
    /// Duplicate CIDs or names are accepted; lookups resolve to the first
    /// matching entry.
    pub fn set_descriptor(&self, table: Arc<[ParameterDescriptor]>) -> Result<()> {
        if table.is_empty() {
            return Err(MbcError::invalid_arg("descriptor table is empty"));
        }
        for desc in table.iter() {
            desc.validate()?;
        }
        let duplicates = table
            .iter()
            .enumerate()
            .filter(|(i, d)| table[..*i].iter().any(|p| p.cid == d.cid))
            .count();
        if duplicates > 0 {
            warn!("Descriptor table has {} duplicate cid(s), first match wins", duplicates);
        }

        debug!("Descriptor table bound: {} entries", table.len());
        *self.table.write() = Some(table);
        Ok(())
    }

    /// Drop the bound table
    pub fn clear(&self) {
        *self.table.write() = None;
    }

    /// Currently bound table
    pub fn table(&self) -> Option<Arc<[ParameterDescriptor]>> {
        self.table.read().clone()
    }

    pub fn len(&self) -> usize {
        self.table.read().as_ref().map_or(0, |t| t.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First descriptor with the given CID
    pub fn get_cid_info(&self, cid: u16) -> Result<DescriptorRef> {
        self.find(|d| d.cid == cid)?
            .ok_or_else(|| MbcError::not_found(format!("cid {cid}")))
    }

    /// First descriptor matching both CID and name
    pub fn lookup(&self, cid: u16, name: &str) -> Result<DescriptorRef> {
        self.find(|d| d.cid == cid && d.name == name)?
            .ok_or_else(|| MbcError::not_found(format!("cid {cid} '{name}'")))
    }

    fn find(&self, pred: impl Fn(&ParameterDescriptor) -> bool) -> Result<Option<DescriptorRef>> {
        let table = self
            .table
            .read()
            .clone()
            .ok_or_else(|| MbcError::invalid_arg("descriptor table is not set"))?;
        let index = table.iter().position(pred);
        Ok(index.map(|index| DescriptorRef { table, index }))
    }

    /// Whether the descriptor grants the requested access
    pub fn check_access(desc: &ParameterDescriptor, access: Access) -> bool {
        match access {
            Access::Read => desc.perms.contains(Permissions::READ),
            Access::Write => desc.perms.contains(Permissions::WRITE),
        }
    }
}
