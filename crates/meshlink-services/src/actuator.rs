//! Local I/O seams: the indicator output and the trigger input.

/// Output level of the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Odd broadcast sequences light the indicator, even ones clear it.
    pub fn from_sequence(sequence: u32) -> Self {
        if sequence % 2 == 1 {
            Level::High
        } else {
            Level::Low
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

pub trait Indicator: Send + Sync {
    fn set_indicator(&self, level: Level);
}

/// Edge-triggered input: returns true once per press.
pub trait Trigger: Send + Sync {
    fn read_trigger(&self) -> bool;
}
