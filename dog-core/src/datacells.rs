// datacells.rs
use core::cell::Cell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// A generic thread-safe container for sharing the latest value of something.
///
/// Every update bumps a version number so readers can tell a new value from
/// one they already consumed.
pub struct DataCell<T: Copy> {
    storage: Mutex<CriticalSectionRawMutex, Cell<(u32, T)>>,
}

impl<T: Copy> DataCell<T> {
    /// Create a new cell with an initial value (version 0).
    pub const fn new(init: T) -> Self {
        Self {
            storage: Mutex::new(Cell::new((0, init))),
        }
    }

    /// Replaces the value and returns its version.
    pub fn update(&self, data: T) -> u32 {
        self.storage.lock(|cell| {
            let version = cell.get().0.wrapping_add(1);
            cell.set((version, data));
            version
        })
    }

    pub fn read_versioned(&self) -> (u32, T) {
        self.storage.lock(|cell| cell.get())
    }

    /// The value, if its version differs from `seen`.
    pub fn read_if_newer(&self, seen: u32) -> Option<(u32, T)> {
        let (version, data) = self.read_versioned();
        (version != seen).then_some((version, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datacell_init() {
        let cell = DataCell::new(42);
        assert_eq!(cell.read_versioned(), (0, 42));
    }

    #[test]
    fn test_datacell_update() {
        let cell = DataCell::new(0);
        assert_eq!(cell.update(100), 1);
        assert_eq!(cell.update(200), 2);
        assert_eq!(cell.read_versioned(), (2, 200));
    }

    #[test]
    fn test_datacell_versions() {
        let cell = DataCell::new(0u8);
        assert_eq!(cell.read_if_newer(0), None);
        let v1 = cell.update(1);
        assert_eq!(cell.read_if_newer(0), Some((v1, 1)));
        assert_eq!(cell.read_if_newer(v1), None);
        // Same value written again is still a new datagram.
        let v2 = cell.update(1);
        assert_eq!(cell.read_if_newer(v1), Some((v2, 1)));
    }

    #[test]
    fn test_datacell_default() {
        #[derive(Copy, Clone, Default, PartialEq, Debug)]
        struct MyData {
            a: i32,
            b: f32,
        }
        let cell = DataCell::new(MyData::default());
        assert_eq!(cell.read_versioned().1, MyData { a: 0, b: 0.0 });
    }
}
