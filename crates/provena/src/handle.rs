//! Ownership discipline for engine handles.
//!
//! Some engine operations consume their handle and return a replacement, on
//! failure returning nothing at all. [`Owned`] realizes that contract in the
//! type system: the slot is emptied before the call, so whether the call
//! succeeds or fails the old handle can never be used again.

use crate::error::{Error, Result};

#[derive(Debug)]
pub(crate) struct Owned<H> {
    slot: Option<H>,
    what: &'static str,
}

impl<H> Owned<H> {
    pub(crate) fn new(handle: H, what: &'static str) -> Self {
        Self {
            slot: Some(handle),
            what,
        }
    }

    /// Whether the handle is still usable.
    pub(crate) fn is_valid(&self) -> bool {
        self.slot.is_some()
    }

    pub(crate) fn peek(&self) -> Option<&H> {
        self.slot.as_ref()
    }

    pub(crate) fn get(&self) -> Result<&H> {
        self.slot.as_ref().ok_or(Error::InvalidHandle { what: self.what })
    }

    pub(crate) fn get_mut(&mut self) -> Result<&mut H> {
        self.slot.as_mut().ok_or(Error::InvalidHandle { what: self.what })
    }

    /// Take the handle out, leaving the slot invalid.
    pub(crate) fn take(&mut self) -> Result<H> {
        self.slot.take().ok_or(Error::InvalidHandle { what: self.what })
    }

    /// Run a consuming operation. The old handle is moved out before the
    /// call; on failure the slot stays empty.
    pub(crate) fn consume_update(&mut self, op: impl FnOnce(H) -> Result<H>) -> Result<()> {
        let handle = self.take()?;
        self.slot = Some(op(handle)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_consume_invalidates_the_slot() {
        let mut owned = Owned::new(1u32, "counter");
        let err = owned
            .consume_update(|_| Err(Error::Engine { message: "boom".into() }))
            .unwrap_err();
        assert!(matches!(err, Error::Engine { .. }));
        assert!(!owned.is_valid());
        assert!(matches!(
            owned.get(),
            Err(Error::InvalidHandle { what: "counter" })
        ));
    }

    #[test]
    fn successful_consume_replaces_the_handle() {
        let mut owned = Owned::new(1u32, "counter");
        owned.consume_update(|n| Ok(n + 1)).unwrap();
        assert_eq!(*owned.get().unwrap(), 2);
        assert!(owned.is_valid());
    }
}
