const FALLBACK_PAGE_SIZE: usize = 4096;

/// Returns the size of a virtual memory page in bytes.
///
/// Falls back to 4 KiB if the platform cannot tell us.
pub fn page_size() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf has no preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            return size as usize;
        }
        log::warn!("sysconf(_SC_PAGESIZE) failed, assuming {FALLBACK_PAGE_SIZE} bytes");
    }
    FALLBACK_PAGE_SIZE
}

#[test]
fn test_page_size_is_power_of_two() {
    let size = page_size();
    assert!(size.is_power_of_two(), "page size {size}");
    assert!(size >= 1024);
}
