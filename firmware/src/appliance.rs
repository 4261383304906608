//! Top-level control loop: boot check, mode routing and console commands.
use heapless::String;
use shared::console::{COMMAND_MAX_LEN, COMMAND_PREFIX, ConsoleCommand, Tag};

use crate::auth::{AuthOutcome, AuthenticationFlow};
use crate::boot::{BootOutcome, BootValidator};
use crate::config::Timings;
use crate::console::Console;
use crate::indicator::{Indicator, LedState};
use crate::platform::{Peripherals, Platform};
use crate::registration::{RegistrationError, RegistrationProtocol};
use crate::storage::{CredentialStore, Slot, StoreError};
use crate::switch::{Mode, ModeSwitch};
use crate::time::Clock;
use crate::touch::TouchFlag;

/// What a single [`Appliance::poll`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    Idle,
    ModeChanged(Mode),
    Registered(Slot),
    RegistrationFailed(RegistrationError),
    Authenticated(AuthOutcome),
    /// The host asked for a reboot; the board performs it.
    ResetRequested,
    StatusReported,
}

pub struct Appliance<'t, P: Platform> {
    store: CredentialStore<P::Region>,
    io: Peripherals<P>,
    touch: &'t TouchFlag,
    timings: Timings,
    auth: AuthenticationFlow,
    mode: Mode,
    boot: Option<BootOutcome>,
    cooling: bool,
    command: String<COMMAND_MAX_LEN>,
}

impl<'t, P: Platform> Appliance<'t, P> {
    pub fn new(
        store: CredentialStore<P::Region>,
        io: Peripherals<P>,
        touch: &'t TouchFlag,
        timings: Timings,
    ) -> Self {
        Self {
            store,
            io,
            touch,
            timings,
            auth: AuthenticationFlow::new(),
            mode: Mode::Register,
            boot: None,
            cooling: false,
            command: String::new(),
        }
    }

    /// Open the store, validate the credential pair and enter the mode the
    /// switch selects.
    pub fn start(&mut self) -> Result<BootOutcome, StoreError<P::RegionError>> {
        log::info!(target: "boot", "Fingerprint unlock starting");
        self.store.init()?;

        let outcome =
            BootValidator::new(&mut self.store, &mut self.io, self.timings.corrupt_hold_ms).run();
        log::info!(target: "boot", "Integrity: {outcome}");
        self.boot = Some(outcome);

        self.mode = self.io.switch.read();
        self.io.switch.acknowledge();
        self.touch.clear();
        self.enter_mode();
        Ok(outcome)
    }

    /// One pass of the main loop.
    pub fn poll(&mut self) -> ControlEvent {
        let mode = self.io.switch.read();
        if self.io.switch.changed() {
            self.io.switch.acknowledge();
            self.touch.clear();
            self.mode = mode;
            self.enter_mode();
            return ControlEvent::ModeChanged(mode);
        }

        if self.touch.take() {
            return match self.mode {
                Mode::Register => self.register(),
                Mode::Recognize => self.authenticate(),
            };
        }

        if let Some(event) = self.poll_console() {
            return event;
        }

        if self.cooling && self.auth.cooldown_remaining_ms(self.io.clock.now_ms()).is_none() {
            self.cooling = false;
            log::info!(target: "auth", "Ready");
            self.io.indicator.show(LedState::RecognizeReady);
        }

        self.io.clock.delay_ms(self.timings.loop_tick_ms);
        ControlEvent::Idle
    }

    /// Poll until the host requests a reset.
    pub fn run(&mut self) {
        while self.poll() != ControlEvent::ResetRequested {}
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn boot_outcome(&self) -> Option<BootOutcome> {
        self.boot
    }

    pub fn store_mut(&mut self) -> &mut CredentialStore<P::Region> {
        &mut self.store
    }

    pub fn io(&self) -> &Peripherals<P> {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut Peripherals<P> {
        &mut self.io
    }

    pub fn into_parts(self) -> (CredentialStore<P::Region>, Peripherals<P>) {
        (self.store, self.io)
    }

    fn enter_mode(&mut self) {
        log::info!(target: "mode", "{}", self.mode);
        self.auth.reset();
        self.cooling = false;

        match self.mode {
            Mode::Register => self.io.indicator.show(LedState::RegisterIdle),
            Mode::Recognize => {
                if self.auth.check_registration(&mut self.store, &mut self.io) {
                    log::info!(target: "auth", "Ready, touch sensor to unlock");
                    self.io.indicator.show(LedState::RecognizeReady);
                } else {
                    log::info!(target: "auth", "No registration, flip to REGISTER");
                    self.io.indicator.show(LedState::NoRegistration);
                }
            }
        }
    }

    fn register(&mut self) -> ControlEvent {
        let result = RegistrationProtocol::new(&mut self.store, &mut self.io, &self.timings).run();
        // Touches raised while capturing belong to the registration.
        self.touch.clear();

        match result {
            Ok(slot) => {
                self.io.indicator.show(LedState::RegisterIdle);
                ControlEvent::Registered(slot)
            }
            Err(err) => ControlEvent::RegistrationFailed(err),
        }
    }

    fn authenticate(&mut self) -> ControlEvent {
        let outcome = self.auth.run(&mut self.store, &mut self.io, &self.timings);
        self.touch.clear();
        if outcome.is_unlocked() {
            self.cooling = true;
        }
        ControlEvent::Authenticated(outcome)
    }

    fn poll_console(&mut self) -> Option<ControlEvent> {
        while let Some(byte) = self.io.console.read_byte() {
            match byte {
                b'\r' | b'\n' => {
                    if self.command.is_empty() {
                        continue;
                    }
                    let line = core::mem::take(&mut self.command);
                    return Some(self.dispatch(&line));
                }
                // Anything outside a prompt that is not a command is noise.
                _ if self.command.is_empty() && byte != COMMAND_PREFIX => {}
                _ => {
                    if self.command.push(char::from(byte)).is_err() {
                        log::warn!("Console command too long, discarded");
                        self.command.clear();
                    }
                }
            }
        }
        None
    }

    fn dispatch(&mut self, line: &str) -> ControlEvent {
        match ConsoleCommand::parse(line) {
            Some(ConsoleCommand::Reset) => {
                log::info!(target: "cmd", "Reset requested");
                ControlEvent::ResetRequested
            }
            Some(ConsoleCommand::Status) => {
                self.report_status();
                ControlEvent::StatusReported
            }
            None => {
                log::warn!("Unknown command: {line}");
                ControlEvent::Idle
            }
        }
    }

    fn report_status(&mut self) {
        let slot = self.store.active_slot();
        let now = self.io.clock.now_ms();
        let cooldown_s = self.auth.cooldown_remaining_ms(now).unwrap_or(0).div_ceil(1_000);
        let console = &mut self.io.console;

        console.write_line_fmt(Tag::Cmd, format_args!("Mode: {}", self.mode));
        match slot {
            Some(slot) => console.write_line_fmt(Tag::Cmd, format_args!("Active slot: {slot}")),
            None => console.write_line(Tag::Cmd, "Active slot: none"),
        }
        match self.boot {
            Some(outcome) => console.write_line_fmt(Tag::Cmd, format_args!("Boot: {outcome}")),
            None => console.write_line(Tag::Cmd, "Boot: pending"),
        }
        console.write_line_fmt(Tag::Cmd, format_args!("Cooldown: {cooldown_s}s"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockPlatform, MockSetup, mock_setup};

    fn appliance(touch: &TouchFlag, setup: MockSetup) -> Appliance<'_, MockPlatform> {
        Appliance::new(setup.store, setup.io, touch, Timings::default())
    }

    fn started(touch: &TouchFlag, setup: MockSetup) -> Appliance<'_, MockPlatform> {
        let mut appliance = appliance(touch, setup);
        appliance.start().unwrap();
        appliance
    }

    fn registered(slot: Slot, secret: &[u8]) -> MockSetup {
        let mut setup = mock_setup();
        setup.store.write(slot, secret).unwrap();
        setup.io.sensor.enroll(slot.id());
        setup.io.sensor.place_finger(Some(slot.id()));
        setup
    }

    #[test]
    fn blank_device_boots_virgin_into_register_idle() {
        let touch = TouchFlag::new();
        let mut appliance = appliance(&touch, mock_setup());

        assert_eq!(appliance.start(), Ok(BootOutcome::Virgin));

        assert_eq!(appliance.boot_outcome(), Some(BootOutcome::Virgin));
        assert_eq!(appliance.mode(), Mode::Register);
        assert_eq!(appliance.io().indicator.last(), Some(LedState::RegisterIdle));
        assert_eq!(appliance.poll(), ControlEvent::Idle);
    }

    #[test]
    fn recognize_without_registration_reports_it_on_touch() {
        let touch = TouchFlag::new();
        let mut setup = mock_setup();
        setup.io.switch.set_mode(Mode::Recognize);
        let mut appliance = started(&touch, setup);

        assert_eq!(appliance.io().indicator.last(), Some(LedState::NoRegistration));
        touch.signal();
        assert_eq!(
            appliance.poll(),
            ControlEvent::Authenticated(AuthOutcome::NoRegistration)
        );
        assert_eq!(appliance.io().sensor.capture_calls(), 0);
    }

    #[test]
    fn touch_routes_by_mode() {
        let touch = TouchFlag::new();
        let mut appliance = started(&touch, mock_setup());

        appliance.io_mut().console.push_str("pa55\rpa55\r");
        touch.signal();
        assert_eq!(appliance.poll(), ControlEvent::Registered(Slot::One));
        assert!(!touch.is_pending());

        appliance.io_mut().switch.set_mode(Mode::Recognize);
        assert_eq!(appliance.poll(), ControlEvent::ModeChanged(Mode::Recognize));
        assert_eq!(appliance.io().indicator.last(), Some(LedState::RecognizeReady));

        appliance.io_mut().sensor.place_finger(Some(1));
        touch.signal();
        assert_eq!(
            appliance.poll(),
            ControlEvent::Authenticated(AuthOutcome::Unlocked(Slot::One))
        );
        assert_eq!(appliance.io().keyboard.typed(), b"pa55");
    }

    #[test]
    fn mode_change_drops_pending_touch() {
        let touch = TouchFlag::new();
        let mut appliance = started(&touch, registered(Slot::One, b"pw"));

        touch.signal();
        appliance.io_mut().switch.set_mode(Mode::Recognize);

        assert_eq!(appliance.poll(), ControlEvent::ModeChanged(Mode::Recognize));
        assert!(!touch.is_pending());
        assert_eq!(appliance.poll(), ControlEvent::Idle);
        assert_eq!(appliance.io().sensor.capture_calls(), 0);
    }

    #[test]
    fn mode_change_forgets_cooldown() {
        let touch = TouchFlag::new();
        let mut setup = registered(Slot::Two, b"pw");
        setup.io.switch.set_mode(Mode::Recognize);
        let mut appliance = started(&touch, setup);

        touch.signal();
        assert!(matches!(
            appliance.poll(),
            ControlEvent::Authenticated(AuthOutcome::Unlocked(Slot::Two))
        ));

        appliance.io_mut().switch.set_mode(Mode::Register);
        appliance.poll();
        appliance.io_mut().switch.set_mode(Mode::Recognize);
        appliance.poll();

        touch.signal();
        assert!(matches!(
            appliance.poll(),
            ControlEvent::Authenticated(AuthOutcome::Unlocked(Slot::Two))
        ));
    }

    #[test]
    fn cooldown_expiry_restores_ready_led() {
        let touch = TouchFlag::new();
        let mut setup = registered(Slot::One, b"pw");
        setup.io.switch.set_mode(Mode::Recognize);
        let mut appliance = started(&touch, setup);

        touch.signal();
        appliance.poll();
        assert_eq!(appliance.io().indicator.last(), Some(LedState::Cooldown));

        appliance.poll();
        assert_eq!(appliance.io().indicator.last(), Some(LedState::Cooldown));

        appliance.io().clock.advance(Timings::default().cooldown_ms);
        assert_eq!(appliance.poll(), ControlEvent::Idle);
        assert_eq!(appliance.io().indicator.last(), Some(LedState::RecognizeReady));
    }

    #[test]
    fn flipping_during_registration_aborts_then_switches() {
        let touch = TouchFlag::new();
        let mut appliance = started(&touch, registered(Slot::One, b"old"));

        touch.signal();
        appliance.io_mut().switch.flip_after(1);
        assert_eq!(
            appliance.poll(),
            ControlEvent::RegistrationFailed(RegistrationError::Aborted)
        );
        assert_eq!(appliance.poll(), ControlEvent::ModeChanged(Mode::Recognize));
        assert_eq!(appliance.store_mut().active_slot(), Some(Slot::One));
    }

    #[test]
    fn status_command_reports_state() {
        let touch = TouchFlag::new();
        let mut appliance = started(&touch, registered(Slot::Two, b"pw"));

        appliance.io_mut().console.push_str("!status\r\n");
        assert_eq!(appliance.poll(), ControlEvent::StatusReported);

        let output = appliance.io().console.output();
        assert!(output.contains("[CMD] Mode: REGISTER\r\n"));
        assert!(output.contains("[CMD] Active slot: 2\r\n"));
        assert!(output.contains("[CMD] Boot: VALID\r\n"));
        assert!(output.contains("[CMD] Cooldown: 0s\r\n"));
    }

    #[test]
    fn stray_bytes_and_unknown_commands_are_ignored() {
        let touch = TouchFlag::new();
        let mut appliance = started(&touch, mock_setup());

        appliance.io_mut().console.push_str("hello\r!BOGUS\r");
        assert_eq!(appliance.poll(), ControlEvent::Idle);
        assert_eq!(appliance.poll(), ControlEvent::Idle);
        assert!(appliance.io().console.output().is_empty());
    }

    #[test]
    fn overlong_command_is_discarded() {
        let touch = TouchFlag::new();
        let mut appliance = started(&touch, mock_setup());

        appliance.io_mut().console.push_str("!RESETRESETRESETRESET\r");
        assert_eq!(appliance.poll(), ControlEvent::Idle);
        appliance.io_mut().console.push_str("!RESET\n");
        assert_eq!(appliance.poll(), ControlEvent::ResetRequested);
    }

    #[test]
    fn run_returns_on_reset() {
        let touch = TouchFlag::new();
        let mut appliance = started(&touch, mock_setup());
        appliance.io_mut().console.push_idle(5);
        appliance.io_mut().console.push_str("!RESET\r");

        appliance.run();

        assert_eq!(appliance.io().console.pending_input(), 0);
    }
}
