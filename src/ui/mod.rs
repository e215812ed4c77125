// Terminal output
//
// - render.rs: human and JSON rendering of run results
// - countdown.rs: the pre-operation countdown and its sleeper seam

pub mod countdown;
pub mod render;


pub use countdown::{countdown, Sleeper, ThreadSleeper, COUNTDOWN_SECONDS};
pub use render::{Reporter, SharedBuffer};
