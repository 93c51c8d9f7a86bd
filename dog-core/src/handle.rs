// handle.rs
use crate::hardware::DeviceError;

/// Capability handle for a device on a hub port.
///
/// A handle is either bound to a live device or unbound. Any failed access
/// drops the device; the next access tries to reconnect it. The node never
/// stops because of a missing device, it only loses the presence bit.
pub struct Handle<D> {
    port: usize,
    device: Option<D>,
    rebound: bool,
}

impl<D> Handle<D> {
    pub const fn new(port: usize) -> Self {
        Self {
            port,
            device: None,
            rebound: false,
        }
    }

    pub const fn port(&self) -> usize {
        self.port
    }

    pub const fn is_bound(&self) -> bool {
        self.device.is_some()
    }

    /// Runs `op` on the device, connecting it first through `connect` if needed.
    pub fn access<R>(
        &mut self,
        connect: impl FnOnce(usize) -> Option<D>,
        op: impl FnOnce(&mut D) -> Result<R, DeviceError>,
    ) -> Result<R, DeviceError> {
        if self.device.is_none() {
            self.device = connect(self.port);
            if self.device.is_some() {
                self.rebound = true;
            }
        }
        let Some(device) = self.device.as_mut() else {
            return Err(DeviceError::Disconnected);
        };
        let result = op(device);
        if result.is_err() {
            self.device = None;
        }
        result
    }

    /// True once after every successful (re)connection.
    pub fn take_rebound(&mut self) -> bool {
        core::mem::take(&mut self.rebound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        reads: u32,
        fail_next: bool,
    }

    fn plugged(_port: usize) -> Option<Probe> {
        Some(Probe {
            reads: 0,
            fail_next: false,
        })
    }

    fn read(probe: &mut Probe) -> Result<u32, DeviceError> {
        if probe.fail_next {
            return Err(DeviceError::Timeout);
        }
        probe.reads += 1;
        Ok(probe.reads)
    }

    #[test]
    fn test_unplugged_port_reports_disconnected() {
        let mut handle = Handle::<Probe>::new(2);
        assert_eq!(handle.access(|_| None, read), Err(DeviceError::Disconnected));
        assert!(!handle.is_bound());
        assert!(!handle.take_rebound());
    }

    #[test]
    fn test_binds_on_first_access() {
        let mut handle = Handle::new(0);
        assert_eq!(handle.access(plugged, read), Ok(1));
        assert!(handle.is_bound());
        assert!(handle.take_rebound());
        assert!(!handle.take_rebound());
        // Already bound: connect must not be called again.
        assert_eq!(handle.access(|_| panic!("reconnected"), read), Ok(2));
    }

    #[test]
    fn test_failure_unbinds_then_rebinds() {
        let mut handle = Handle::new(1);
        handle.access(plugged, read).unwrap();
        handle.take_rebound();

        let failed = handle.access(plugged, |p| {
            p.fail_next = true;
            read(p)
        });
        assert_eq!(failed, Err(DeviceError::Timeout));
        assert!(!handle.is_bound());

        assert_eq!(handle.access(plugged, read), Ok(1));
        assert!(handle.take_rebound());
    }
}
