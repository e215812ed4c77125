use std::io::{self, Write};
use std::thread;
use std::time::Duration;

/// Seconds an operator gets to interrupt an uninterruptible operation
pub const COUNTDOWN_SECONDS: u32 = 30;

const TICK: Duration = Duration::from_secs(1);

/// Wall-clock delay between countdown ticks
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Print one tick per second, rewriting the same line
pub fn countdown(out: &mut dyn Write, seconds: u32, sleeper: &dyn Sleeper) -> io::Result<()> {
    writeln!(out, "Press CTRL-C to abort.")?;
    for remaining in (1..=seconds).rev() {
        write!(out, "\rStarting in {:>2} seconds...", remaining)?;
        out.flush()?;
        sleeper.sleep(TICK);
    }
    writeln!(out, "\rStarting now.              ")?;
    out.flush()
}
