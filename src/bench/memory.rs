//! Peak memory measurement for benchmark runs.
//!
//! Two sources are available:
//! - [`AllocationTracker`], a counting global allocator. Exact and resettable,
//!   but only active when a binary installs it with `#[global_allocator]`.
//! - [`ProcessMemory`], which reads the resident set high-water mark from
//!   `/proc/self/status` on Linux.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A source of peak memory readings scoped to a measurement window.
pub trait MemoryProbe: Send + Sync {
    fn name(&self) -> &'static str;

    /// Opens a new measurement window.
    fn reset(&self);

    /// Peak bytes in use above the level at the last `reset`, if measurable.
    fn peak(&self) -> Option<u64>;
}

static CURRENT: AtomicUsize = AtomicUsize::new(0);
static PEAK: AtomicUsize = AtomicUsize::new(0);
static BASELINE: AtomicUsize = AtomicUsize::new(0);
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Counting wrapper around the system allocator.
///
/// ```ignore
/// #[global_allocator]
/// static GLOBAL: vecprobe::bench::AllocationTracker = vecprobe::bench::AllocationTracker;
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct AllocationTracker;

impl AllocationTracker {
    /// Whether this allocator has served any allocation in this process.
    pub fn is_installed() -> bool {
        INSTALLED.load(Ordering::Relaxed)
    }

    /// Bytes currently allocated through the tracker.
    pub fn current() -> usize {
        CURRENT.load(Ordering::Relaxed)
    }

    fn grow(size: usize) {
        let now = CURRENT.fetch_add(size, Ordering::Relaxed) + size;
        PEAK.fetch_max(now, Ordering::Relaxed);
    }

    fn shrink(size: usize) {
        CURRENT.fetch_sub(size, Ordering::Relaxed);
    }
}

// SAFETY: every call is forwarded to `System` unchanged; the tracker only
// updates atomic counters around it.
unsafe impl GlobalAlloc for AllocationTracker {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            INSTALLED.store(true, Ordering::Relaxed);
            Self::grow(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            INSTALLED.store(true, Ordering::Relaxed);
            Self::grow(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        Self::shrink(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            let old_size = layout.size();
            if new_size > old_size {
                Self::grow(new_size - old_size);
            } else {
                Self::shrink(old_size - new_size);
            }
        }
        new_ptr
    }
}

impl MemoryProbe for AllocationTracker {
    fn name(&self) -> &'static str {
        "allocator"
    }

    fn reset(&self) {
        let now = CURRENT.load(Ordering::Relaxed);
        BASELINE.store(now, Ordering::Relaxed);
        PEAK.store(now, Ordering::Relaxed);
    }

    fn peak(&self) -> Option<u64> {
        if !Self::is_installed() {
            return None;
        }
        let peak = PEAK.load(Ordering::Relaxed);
        let baseline = BASELINE.load(Ordering::Relaxed);
        Some(peak.saturating_sub(baseline) as u64)
    }
}

/// Resident set size readings from procfs.
///
/// `reset` asks the kernel to clear the high-water mark (`clear_refs`), so the
/// reading covers only the window when that succeeds; otherwise it is the
/// process lifetime peak above the RSS at reset.
#[derive(Debug, Default)]
pub struct ProcessMemory {
    baseline: AtomicUsize,
}

impl ProcessMemory {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(target_os = "linux")]
    fn read_status() -> Option<(usize, usize)> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        let hwm = parse_status_kb(&status, "VmHWM:")?;
        let rss = parse_status_kb(&status, "VmRSS:")?;
        Some((hwm * 1024, rss * 1024))
    }

    #[cfg(not(target_os = "linux"))]
    fn read_status() -> Option<(usize, usize)> {
        None
    }

    #[cfg(target_os = "linux")]
    fn clear_high_water_mark() {
        if let Err(e) = std::fs::write("/proc/self/clear_refs", "5") {
            tracing::trace!("could not reset VmHWM: {e}");
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn clear_high_water_mark() {}
}

impl MemoryProbe for ProcessMemory {
    fn name(&self) -> &'static str {
        "rss"
    }

    fn reset(&self) {
        Self::clear_high_water_mark();
        let rss = Self::read_status().map_or(0, |(_, rss)| rss);
        self.baseline.store(rss, Ordering::Relaxed);
    }

    fn peak(&self) -> Option<u64> {
        let (hwm, _) = Self::read_status()?;
        Some(hwm.saturating_sub(self.baseline.load(Ordering::Relaxed)) as u64)
    }
}

/// Never measures anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProbe;

impl MemoryProbe for NoopProbe {
    fn name(&self) -> &'static str {
        "none"
    }

    fn reset(&self) {}

    fn peak(&self) -> Option<u64> {
        None
    }
}

/// The most precise probe available in this process.
pub fn default_probe() -> Box<dyn MemoryProbe> {
    if AllocationTracker::is_installed() {
        Box::new(AllocationTracker)
    } else {
        Box::new(ProcessMemory::new())
    }
}

/// Parses a `Key:   1234 kB` line from `/proc/self/status`.
fn parse_status_kb(status: &str, key: &str) -> Option<usize> {
    status
        .lines()
        .find_map(|line| line.strip_prefix(key))?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}
