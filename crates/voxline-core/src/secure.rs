//! Locked plaintext buffers for decrypted credentials.
//!
//! OAuth tokens are decrypted into a `LockedVec`: the pages are pinned with
//! `mlock` on Unix so the OS cannot swap them out, and the buffer is zeroed
//! before release on drop. Platforms without `mlock` fall back to plain heap
//! memory (still zeroed on drop).

/// Heap buffer holding decrypted secret bytes, pinned in RAM where the
/// platform allows it and zeroed on drop.
pub struct LockedVec {
    inner: Vec<u8>,
    pinned: bool,
}

impl LockedVec {
    /// Takes ownership of freshly decrypted bytes and pins them in RAM.
    pub fn new(mut data: Vec<u8>) -> Self {
        let pinned = pin_pages(&mut data);
        if !pinned && !data.is_empty() {
            tracing::warn!(
                target: "voxline::secure",
                "mlock failed; decrypted credential bytes may reach swap"
            );
        }
        Self { inner: data, pinned }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.inner
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl AsRef<[u8]> for LockedVec {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Drop for LockedVec {
    fn drop(&mut self) {
        if self.inner.is_empty() {
            return;
        }
        let len = self.inner.len();
        let ptr = self.inner.as_mut_ptr();
        // Volatile-style zero so the wipe is not elided before the free.
        unsafe {
            std::ptr::write_bytes(ptr, 0, len);
        }
        if self.pinned {
            unpin_pages(ptr, len);
        }
    }
}

#[cfg(unix)]
fn pin_pages(data: &mut [u8]) -> bool {
    if data.is_empty() {
        return true;
    }
    // mlock covers the pages containing the range; no alignment needed.
    unsafe { libc::mlock(data.as_mut_ptr() as *mut libc::c_void, data.len()) == 0 }
}

#[cfg(unix)]
fn unpin_pages(ptr: *mut u8, len: usize) {
    unsafe {
        libc::munlock(ptr as *mut libc::c_void, len);
    }
}

#[cfg(not(unix))]
fn pin_pages(data: &mut [u8]) -> bool {
    let _ = data;
    false
}

#[cfg(not(unix))]
fn unpin_pages(ptr: *mut u8, len: usize) {
    let _ = (ptr, len);
}
