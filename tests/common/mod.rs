/// Common test utilities for the front-end integration tests
///
/// - fake_transport: a recording DeviceTransport
/// - captured reporters and a sleeper that counts ticks instead of waiting
pub mod fake_transport;

use seachest::config::{OutputFormat, Verbosity};
use seachest::ui::{Reporter, SharedBuffer, Sleeper};
use std::cell::Cell;
use std::time::Duration;

#[derive(Default)]
pub struct CountingSleeper {
    ticks: Cell<u32>,
}

#[allow(dead_code)]
impl CountingSleeper {
    pub fn ticks(&self) -> u32 {
        self.ticks.get()
    }
}

impl Sleeper for CountingSleeper {
    fn sleep(&self, _duration: Duration) {
        self.ticks.set(self.ticks.get() + 1);
    }
}

/// Reporter writing into buffers; returns (reporter, stdout, stderr)
#[allow(dead_code)]
pub fn captured(format: OutputFormat, verbosity: Verbosity) -> (Reporter, SharedBuffer, SharedBuffer) {
    let out = SharedBuffer::new();
    let err = SharedBuffer::new();
    let reporter = Reporter::new(format, verbosity, Box::new(out.clone()), Box::new(err.clone()));
    (reporter, out, err)
}
