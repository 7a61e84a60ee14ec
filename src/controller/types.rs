//! Button, axis and power-level identifiers shared by sessions, snapshots and backends.
//!
//! The identifiers carry no backend meaning on their own. Every backend keeps an
//! explicit table from these identifiers to its own codes, so reordering a variant
//! here never silently changes what gets queried on the device.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest raw magnitude a backend reports for an axis.
pub const AXIS_MAX_RAW: f32 = 32767.0;

/// Largest rumble intensity accepted by a backend.
pub const RUMBLE_MAX_RAW: f32 = 65535.0;

// Button type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Button {
    A = 0,
    B = 1,
    X = 2,
    Y = 3,
    Back = 4,
    Guide = 5,
    Start = 6,
    LeftStick = 7,
    RightStick = 8,
    LeftBumper = 9,
    RightBumper = 10,
    DPadUp = 11,
    DPadDown = 12,
    DPadLeft = 13,
    DPadRight = 14,
    /// Share / microphone / capture button, depending on the pad
    Misc1 = 15,
    Paddle1 = 16,
    Paddle2 = 17,
    Paddle3 = 18,
    Paddle4 = 19,
    Touchpad = 20,
}

impl Button {
    pub const COUNT: usize = 21;

    pub const ALL: [Button; Button::COUNT] = [
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::Back,
        Button::Guide,
        Button::Start,
        Button::LeftStick,
        Button::RightStick,
        Button::LeftBumper,
        Button::RightBumper,
        Button::DPadUp,
        Button::DPadDown,
        Button::DPadLeft,
        Button::DPadRight,
        Button::Misc1,
        Button::Paddle1,
        Button::Paddle2,
        Button::Paddle3,
        Button::Paddle4,
        Button::Touchpad,
    ];

    /// Bit position inside a [`ButtonSet`].
    pub fn bit(self) -> u32 {
        self as u32
    }
}

// Axis type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Axis {
    LeftX = 0,
    LeftY = 1,
    RightX = 2,
    RightY = 3,
    TriggerLeft = 4,
    TriggerRight = 5,
}

impl Axis {
    pub const COUNT: usize = 6;

    pub const ALL: [Axis; Axis::COUNT] = [
        Axis::LeftX,
        Axis::LeftY,
        Axis::RightX,
        Axis::RightY,
        Axis::TriggerLeft,
        Axis::TriggerRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Converts a raw backend reading into the normalized range.
    ///
    /// The raw range is asymmetric (`-32768..=32767`) and the negative side is not
    /// rescaled, so the most negative reading lands just below `-1.0`.
    pub fn normalize(raw: i16) -> f32 {
        raw as f32 / AXIS_MAX_RAW
    }
}

/// Battery state of a controller.
///
/// Backends report a raw code where `-1` means unknown and `0..=5` name the
/// levels in this order, so the raw code is shifted by one to find the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerLevel {
    /// Power level unknown
    Unknown,
    /// 0-5%
    Empty,
    /// 6-20%
    Low,
    /// 21-70%
    Medium,
    /// 71-100%
    Full,
    /// Controller is wired
    Wired,
    Max,
}

impl PowerLevel {
    const TABLE: [PowerLevel; 7] = [
        PowerLevel::Unknown,
        PowerLevel::Empty,
        PowerLevel::Low,
        PowerLevel::Medium,
        PowerLevel::Full,
        PowerLevel::Wired,
        PowerLevel::Max,
    ];

    /// Maps a raw backend code to a level, `None` if the code is outside the table.
    pub fn from_raw(code: i32) -> Option<PowerLevel> {
        let index = usize::try_from(code.checked_add(1)?).ok()?;
        Self::TABLE.get(index).copied()
    }

    /// Inverse of [`PowerLevel::from_raw`], used by backends that build codes.
    pub fn raw(self) -> i32 {
        match self {
            PowerLevel::Unknown => -1,
            PowerLevel::Empty => 0,
            PowerLevel::Low => 1,
            PowerLevel::Medium => 2,
            PowerLevel::Full => 3,
            PowerLevel::Wired => 4,
            PowerLevel::Max => 5,
        }
    }
}

/// Rough family of a controller, derived from the name the backend reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ControllerKind {
    Xbox,
    PlayStation,
    Nintendo,
    Generic,
    #[default]
    Unknown,
}

impl ControllerKind {
    pub fn from_name(name: &str) -> ControllerKind {
        let name = name.to_lowercase();
        let has_any = |needles: &[&str]| needles.iter().any(|n| name.contains(n));

        if name.trim().is_empty() {
            ControllerKind::Unknown
        } else if has_any(&["xbox", "xinput", "x-box"]) {
            ControllerKind::Xbox
        } else if has_any(&["playstation", "dualsense", "dualshock", "sony", "ps3", "ps4", "ps5"]) {
            ControllerKind::PlayStation
        } else if has_any(&["nintendo", "switch", "joy-con", "joycon"]) {
            ControllerKind::Nintendo
        } else {
            ControllerKind::Generic
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ControllerKind::Xbox => "Xbox",
            ControllerKind::PlayStation => "PlayStation",
            ControllerKind::Nintendo => "Nintendo",
            ControllerKind::Generic => "Generic",
            ControllerKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Compact set of buttons, one bit per [`Button`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ButtonSet(u32);

impl ButtonSet {
    pub const EMPTY: ButtonSet = ButtonSet(0);

    pub fn contains(self, button: Button) -> bool {
        self.0 & (1 << button.bit()) != 0
    }

    pub fn set(&mut self, button: Button, value: bool) {
        if value {
            self.0 |= 1 << button.bit();
        } else {
            self.0 &= !(1 << button.bit());
        }
    }

    pub fn insert(&mut self, button: Button) {
        self.set(button, true);
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = Button> {
        Button::ALL.into_iter().filter(move |b| self.contains(*b))
    }
}

impl FromIterator<Button> for ButtonSet {
    fn from_iter<I: IntoIterator<Item = Button>>(iter: I) -> Self {
        let mut set = ButtonSet::EMPTY;
        for button in iter {
            set.insert(button);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_normalize_bounds() {
        assert_eq!(Axis::normalize(32767), 1.0);
        assert_eq!(Axis::normalize(0), 0.0);
        assert!(Axis::normalize(-32768) < -1.0);
    }

    #[test]
    fn test_power_level_offset_shift() {
        assert_eq!(PowerLevel::from_raw(-1), Some(PowerLevel::Unknown));
        assert_eq!(PowerLevel::from_raw(0), Some(PowerLevel::Empty));
        assert_eq!(PowerLevel::from_raw(4), Some(PowerLevel::Wired));
        assert_eq!(PowerLevel::from_raw(5), Some(PowerLevel::Max));
        assert_eq!(PowerLevel::from_raw(6), None);
        assert_eq!(PowerLevel::from_raw(-2), None);
        assert_eq!(PowerLevel::from_raw(i32::MAX), None);

        for level in PowerLevel::TABLE {
            assert_eq!(PowerLevel::from_raw(level.raw()), Some(level));
        }
    }

    #[test]
    fn test_button_bits_are_distinct() {
        let all: ButtonSet = Button::ALL.into_iter().collect();
        assert_eq!(all.len(), Button::COUNT);
    }

    #[test]
    fn test_button_set_toggle() {
        let mut set = ButtonSet::default();
        set.set(Button::Touchpad, true);
        set.set(Button::A, true);
        assert!(set.contains(Button::Touchpad));
        set.set(Button::A, false);
        assert!(!set.contains(Button::A));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Button::Touchpad]);
    }

    #[test]
    fn test_kind_from_name() {
        assert_eq!(ControllerKind::from_name("Xbox Wireless Controller"), ControllerKind::Xbox);
        assert_eq!(ControllerKind::from_name("DualSense Wireless Controller"), ControllerKind::PlayStation);
        assert_eq!(ControllerKind::from_name("Nintendo Switch Pro Controller"), ControllerKind::Nintendo);
        assert_eq!(ControllerKind::from_name("8BitDo SN30"), ControllerKind::Generic);
        assert_eq!(ControllerKind::from_name(""), ControllerKind::Unknown);
    }
}
