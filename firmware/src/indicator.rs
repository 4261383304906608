//! Semantic LED states and the ring patterns that render them.
use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedMode {
    Breathing,
    FastBlink,
    KeepsOn,
    Off,
    SlowBlink,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedColour {
    Blue,
    Green,
    Red,
    Yellow,
    Cyan,
}

/// What the sensor's LED ring is asked to do. `cycles == 0` repeats forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedPattern {
    pub mode: LedMode,
    pub colour: LedColour,
    pub cycles: u8,
}

impl LedPattern {
    const fn new(mode: LedMode, colour: LedColour, cycles: u8) -> Self {
        Self {
            mode,
            colour,
            cycles,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedState {
    BootOk,
    SensorFail,
    RegisterIdle,
    WaitingFinger,
    CaptureOk,
    CaptureFail,
    WaitingSecret,
    RegisterSuccess,
    RegisterFail,
    RecognizeReady,
    MatchFound,
    NoMatch,
    NoRegistration,
    Cooldown,
    SwitchAbort,
    CorruptState,
    Off,
}

impl LedState {
    pub const fn pattern(self) -> LedPattern {
        use LedColour::*;
        use LedMode::*;

        match self {
            LedState::BootOk => LedPattern::new(Breathing, Blue, 3),
            LedState::SensorFail => LedPattern::new(KeepsOn, Red, 0),
            LedState::RegisterIdle | LedState::WaitingFinger => {
                LedPattern::new(Breathing, Yellow, 0)
            }
            LedState::CaptureOk => LedPattern::new(FastBlink, Green, 3),
            LedState::CaptureFail | LedState::RegisterFail | LedState::NoMatch => {
                LedPattern::new(FastBlink, Red, 3)
            }
            LedState::WaitingSecret => LedPattern::new(Breathing, Cyan, 0),
            LedState::RegisterSuccess | LedState::MatchFound => LedPattern::new(KeepsOn, Green, 0),
            LedState::RecognizeReady => LedPattern::new(Breathing, Blue, 0),
            LedState::NoRegistration => LedPattern::new(KeepsOn, Red, 0),
            LedState::Cooldown => LedPattern::new(SlowBlink, Green, 0),
            LedState::SwitchAbort => LedPattern::new(FastBlink, Cyan, 3),
            LedState::CorruptState => LedPattern::new(FastBlink, Red, 5),
            LedState::Off => LedPattern::new(Off, Blue, 0),
        }
    }
}

impl fmt::Display for LedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Anything that can show a semantic state to the user.
pub trait Indicator {
    fn show(&mut self, state: LedState);
}

/// Raw LED ring driver, usually the fingerprint module itself.
pub trait LedRing {
    fn set_pattern(&mut self, pattern: LedPattern);
}

/// [`Indicator`] that renders states on an [`LedRing`].
pub struct RingIndicator<R> {
    ring: R,
    current: Option<LedState>,
}

impl<R: LedRing> RingIndicator<R> {
    pub fn new(ring: R) -> Self {
        Self {
            ring,
            current: None,
        }
    }

    pub fn current(&self) -> Option<LedState> {
        self.current
    }
}

impl<R: LedRing> Indicator for RingIndicator<R> {
    fn show(&mut self, state: LedState) {
        self.ring.set_pattern(state.pattern());
        self.current = Some(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Ring(Vec<LedPattern>);

    impl LedRing for Ring {
        fn set_pattern(&mut self, pattern: LedPattern) {
            self.0.push(pattern);
        }
    }

    #[test]
    fn states_map_to_ring_patterns() {
        assert_eq!(
            LedState::WaitingFinger.pattern(),
            LedPattern::new(LedMode::Breathing, LedColour::Yellow, 0)
        );
        assert_eq!(
            LedState::CorruptState.pattern(),
            LedPattern::new(LedMode::FastBlink, LedColour::Red, 5)
        );
        assert_eq!(
            LedState::Cooldown.pattern(),
            LedPattern::new(LedMode::SlowBlink, LedColour::Green, 0)
        );
        assert_eq!(LedState::Off.pattern().mode, LedMode::Off);
    }

    #[test]
    fn ring_indicator_forwards_patterns() {
        let mut indicator = RingIndicator::new(Ring::default());
        indicator.show(LedState::RecognizeReady);
        indicator.show(LedState::MatchFound);
        assert_eq!(indicator.current(), Some(LedState::MatchFound));
        assert_eq!(
            indicator.ring.0,
            vec![
                LedState::RecognizeReady.pattern(),
                LedState::MatchFound.pattern()
            ]
        );
    }
}
