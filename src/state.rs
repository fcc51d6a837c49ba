//! Controller state snapshot.

use crate::time::Timestamp;

/// A snapshot of the controller's mutable state.
///
/// Use [`Controller::snapshot`](crate::Controller::snapshot) to obtain one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerState {
    /// Current brightness step (0 = off).
    pub brightness_step: u32,
    /// When the last trigger was seen (creation time until the first one).
    pub last_trigger_time: Timestamp,
    /// Moving average of the recent lux samples, if sensor mode is enabled.
    pub average_lux: Option<u32>,
}

impl ControllerState {
    /// Whether the backlight is lit.
    pub fn is_on(&self) -> bool {
        self.brightness_step > 0
    }
}
