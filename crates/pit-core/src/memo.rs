//! Computed-once, explicitly resettable cell.
//!
//! Derived quantities (loaded distributions, stack totals, combined
//! systematics) are computed on first access and kept until the owner
//! calls [`Memo::clear`]. Values are handed out as `Rc<T>` so a cleared cell
//! does not invalidate references already held by callers.
//!
//! The cell is single-threaded (`RefCell`, `Rc`): a memoized object is not
//! meant to be shared across threads.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Lazily computed value with manual invalidation.
pub struct Memo<T> {
    slot: RefCell<Option<Rc<T>>>,
}

impl<T> Memo<T> {
    /// Create an empty cell.
    pub const fn new() -> Self {
        Self { slot: RefCell::new(None) }
    }

    /// Current value, if computed.
    pub fn get(&self) -> Option<Rc<T>> {
        self.slot.borrow().clone()
    }

    /// Whether a value is stored.
    pub fn is_set(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Return the stored value or compute, store and return it.
    ///
    /// On error nothing is stored, so the next call retries.
    pub fn get_or_try_init<E, F>(&self, f: F) -> Result<Rc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(v) = self.get() {
            return Ok(v);
        }
        // `f` may read other memo cells, so no borrow is held while it runs.
        let value = Rc::new(f()?);
        *self.slot.borrow_mut() = Some(Rc::clone(&value));
        Ok(value)
    }

    /// Infallible variant of [`Memo::get_or_try_init`].
    pub fn get_or_init<F>(&self, f: F) -> Rc<T>
    where
        F: FnOnce() -> T,
    {
        match self.get_or_try_init::<std::convert::Infallible, _>(|| Ok(f())) {
            Ok(v) => v,
            Err(never) => match never {},
        }
    }

    /// Drop the stored value. Returns `true` if something was cleared.
    pub fn clear(&self) -> bool {
        self.slot.borrow_mut().take().is_some()
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.slot.borrow() {
            Some(v) => f.debug_tuple("Memo").field(v).finish(),
            None => f.write_str("Memo(<empty>)"),
        }
    }
}
