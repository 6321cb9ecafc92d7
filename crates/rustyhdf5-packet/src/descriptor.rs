//! Owned, introspectable handles on engine types.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::engine::{Hid, PacketTable, TypeClass, TypeEngine};
use crate::error::{Error, Result};

/// A type discovered at run time.
///
/// Wraps its own duplicate of an engine handle, so its lifetime is
/// independent of the handle it was created from. Member queries go to the
/// engine on every call; nothing is cached. The handle is released once,
/// either by [`close`](Self::close) or on drop.
pub struct TypeDescriptor<E: TypeEngine> {
    engine: Arc<E>,
    id: Hid,
    class: TypeClass,
}

impl<E: TypeEngine> TypeDescriptor<E> {
    /// Duplicate `id` and wrap the copy.
    pub fn from_handle(engine: &Arc<E>, id: Hid) -> Result<Self> {
        let copy = engine.copy_type(id)?;
        Self::adopt(engine, copy)
    }

    /// Descriptor for the element type of a packet table.
    pub fn for_table<T: PacketTable + ?Sized>(engine: &Arc<E>, table: &T) -> Result<Self> {
        Self::from_handle(engine, table.type_handle())
    }

    /// Take ownership of a handle the caller already owns, such as one
    /// returned by `copy_type` or a registration call. The handle is not
    /// duplicated and is released on drop, so predefined native handles must
    /// go through [`from_handle`](Self::from_handle) instead.
    pub fn adopt(engine: &Arc<E>, id: Hid) -> Result<Self> {
        match engine.type_class(id) {
            Ok(class) => Ok(Self {
                engine: Arc::clone(engine),
                id,
                class,
            }),
            Err(e) => {
                if let Err(close_err) = engine.close_type(id) {
                    log::error!("failed to release type handle {id}: {close_err}");
                }
                Err(e)
            }
        }
    }

    /// Engine handle, `0` once closed.
    pub fn id(&self) -> Hid {
        self.id
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Storage width in bytes; `0` if the engine cannot report it.
    pub fn size(&self) -> usize {
        self.engine.type_size(self.id).unwrap_or(0)
    }

    pub fn class(&self) -> TypeClass {
        self.class
    }

    fn require_compound(&self, op: &'static str) -> Result<()> {
        if self.class == TypeClass::Compound {
            Ok(())
        } else {
            Err(Error::NotCompound { op })
        }
    }

    pub fn member_count(&self) -> Result<usize> {
        self.require_compound("member_count")?;
        self.engine.member_count(self.id)
    }

    /// Descriptor for member `index`, resolved through a fresh engine query.
    pub fn member_type(&self, index: usize) -> Result<TypeDescriptor<E>> {
        self.require_compound("member_type")?;
        self.engine.member_class(self.id, index)?;
        let member = self.engine.member_type(self.id, index)?;
        Self::adopt(&self.engine, member)
    }

    /// Member name; empty when the engine cannot resolve it.
    pub fn member_name(&self, index: usize) -> String {
        self.engine.member_name(self.id, index).unwrap_or_default()
    }

    /// Byte offset of member `index` within one record; `0` when the engine
    /// cannot resolve it.
    pub fn member_offset(&self, index: usize) -> usize {
        self.engine.member_offset(self.id, index).unwrap_or(0)
    }

    /// All members keyed by name. Members whose type fails to resolve are
    /// skipped.
    pub fn members(&self) -> Result<HashMap<String, TypeDescriptor<E>>> {
        let count = self.member_count()?;
        let mut map = HashMap::with_capacity(count);
        for index in 0..count {
            if let Ok(member) = self.member_type(index) {
                map.insert(self.member_name(index), member);
            }
        }
        Ok(map)
    }

    /// The engine's type-equality predicate. Engine failures compare unequal.
    pub fn equals_type(&self, other: &TypeDescriptor<E>) -> bool {
        self.engine.types_equal(self.id, other.id).unwrap_or(false)
    }

    /// Duplicate the handle into an independent descriptor.
    pub fn try_clone(&self) -> Result<Self> {
        Self::from_handle(&self.engine, self.id)
    }

    /// Release the handle. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.id == 0 {
            return Ok(());
        }
        let id = std::mem::replace(&mut self.id, 0);
        self.engine.close_type(id)
    }
}

impl<E: TypeEngine> Drop for TypeDescriptor<E> {
    fn drop(&mut self) {
        let id = self.id;
        if let Err(e) = self.close() {
            log::error!("error closing datatype {id}: {e}");
        }
    }
}

impl<E: TypeEngine> fmt::Display for TypeDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<DynDatatype {} {}>", self.id, self.class)
    }
}

impl<E: TypeEngine> fmt::Debug for TypeDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("id", &self.id)
            .field("class", &self.class)
            .finish()
    }
}
