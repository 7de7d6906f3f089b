// interner.rs - Append-only arena of NUL-terminated strings
//
// The native engine keeps the addresses of names and signature expressions
// instead of copying them. Each `CString` owns its own heap buffer, so the
// bytes stay put when the backing `Vec` grows; only `clear` releases them.

use std::ffi::{c_char, CStr, CString};
use std::fmt;

/// Strings handed to the native engine, kept alive until world teardown.
#[derive(Default)]
pub struct StringArena {
    strings: Vec<CString>,
}

impl StringArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `text` and return the address of its NUL-terminated copy.
    ///
    /// No deduplication: interning the same text twice yields two buffers.
    pub fn intern(&mut self, text: &str) -> Result<*const c_char, std::ffi::NulError> {
        let owned = CString::new(text)?;
        let ptr = owned.as_ptr();
        self.strings.push(owned);
        Ok(ptr)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Release every buffer. Only valid once the engine no longer holds any
    /// of the returned addresses.
    pub(crate) fn clear(&mut self) {
        self.strings.clear();
    }
}

/// A string owned by a world's arena.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct InternedStr<'w> {
    inner: &'w CStr,
}

impl<'w> InternedStr<'w> {
    /// # Safety
    /// `ptr` must come from [`StringArena::intern`] on an arena that is not
    /// cleared for `'w`.
    pub(crate) unsafe fn from_arena(ptr: *const c_char) -> Self {
        Self {
            inner: CStr::from_ptr(ptr),
        }
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.inner.as_ptr()
    }

    pub fn as_c_str(&self) -> &'w CStr {
        self.inner
    }

    /// Bytes without the trailing NUL.
    pub fn to_bytes(&self) -> &'w [u8] {
        self.inner.to_bytes()
    }

    pub fn to_str(&self) -> Option<&'w str> {
        self.inner.to_str().ok()
    }
}

impl fmt::Debug for InternedStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.inner, f)
    }
}
