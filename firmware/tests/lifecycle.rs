#![cfg(feature = "test-support")]

use firmware::crypto::DeviceKeyMaterial;
use firmware::switch::Mode;
use firmware::testing::{
    MemoryEeprom, MockPeripherals, MockPlatform, mock_peripherals, mock_store,
};
use firmware::touch::TouchFlag;
use firmware::{
    Appliance, AuthOutcome, BootOutcome, ControlEvent, CredentialStore, RegistrationError, Slot,
    Timings,
};
use shared::record::OFFSET_CIPHERTEXT;

type Device<'t> = Appliance<'t, MockPlatform>;

fn boot(touch: &TouchFlag, region: MemoryEeprom, io: MockPeripherals) -> (Device<'_>, BootOutcome) {
    let mut device = Appliance::new(mock_store(region), io, touch, Timings::default());
    let outcome = device.start().expect("in-memory region opens");
    (device, outcome)
}

/// Cut power: only committed EEPROM contents and sensor templates survive.
fn power_cycle(device: Device<'_>) -> (MemoryEeprom, MockPeripherals) {
    let (store, mut io) = device.into_parts();
    io.console.clear_output();
    (MemoryEeprom::with_contents(store.region().committed()), io)
}

fn register(device: &mut Device<'_>, touch: &TouchFlag, secret: &str) -> ControlEvent {
    device.io_mut().console.push_str(secret);
    device.io_mut().console.push_str("\r");
    device.io_mut().console.push_str(secret);
    device.io_mut().console.push_str("\r");
    touch.signal();
    device.poll()
}

#[test]
fn registration_survives_reboot_and_unlocks() {
    let touch = TouchFlag::new();
    let (mut device, outcome) = boot(&touch, MemoryEeprom::new(), mock_peripherals(Mode::Register));
    assert_eq!(outcome, BootOutcome::Virgin);
    assert_eq!(
        register(&mut device, &touch, "correct horse"),
        ControlEvent::Registered(Slot::One)
    );

    let (region, mut io) = power_cycle(device);
    io.switch.set_mode(Mode::Recognize);
    io.sensor.place_finger(Some(Slot::One.id()));
    let (mut device, outcome) = boot(&touch, region, io);
    assert_eq!(outcome, BootOutcome::Valid);

    touch.signal();
    assert_eq!(
        device.poll(),
        ControlEvent::Authenticated(AuthOutcome::Unlocked(Slot::One))
    );
    assert_eq!(device.io().keyboard.typed(), b"correct horse");

    touch.signal();
    assert_eq!(
        device.poll(),
        ControlEvent::Authenticated(AuthOutcome::Cooldown)
    );
}

#[test]
fn repeated_registration_alternates_slots() {
    let touch = TouchFlag::new();
    let (mut device, _) = boot(&touch, MemoryEeprom::new(), mock_peripherals(Mode::Register));

    for (round, expected) in [Slot::One, Slot::Two, Slot::One, Slot::Two].into_iter().enumerate() {
        let secret = format!("secret-{round}");
        assert_eq!(
            register(&mut device, &touch, &secret),
            ControlEvent::Registered(expected)
        );
        let credential = device.store_mut().read().expect("committed");
        assert_eq!(credential.slot, expected);
        assert_eq!(credential.secret.as_bytes(), secret.as_bytes());
        assert!(device.io().sensor.is_enrolled(expected.id()));
        assert_eq!(device.io().sensor.enrolled_total(), 1);
    }
}

#[test]
fn aborted_reregistration_keeps_old_pair_across_reboot() {
    let touch = TouchFlag::new();
    let (mut device, _) = boot(&touch, MemoryEeprom::new(), mock_peripherals(Mode::Register));
    register(&mut device, &touch, "first");

    // Secret typed, then the user flips the switch while confirming.
    device.io_mut().console.push_str("second\r");
    device.io_mut().console.push_idle(50);
    device.io_mut().switch.flip_after(40);
    touch.signal();
    assert_eq!(
        device.poll(),
        ControlEvent::RegistrationFailed(RegistrationError::Aborted)
    );
    assert_eq!(device.poll(), ControlEvent::ModeChanged(Mode::Recognize));

    let (region, mut io) = power_cycle(device);
    io.sensor.place_finger(Some(Slot::One.id()));
    let (mut device, outcome) = boot(&touch, region, io);
    assert_eq!(outcome, BootOutcome::Valid);
    assert_eq!(device.mode(), Mode::Recognize);

    touch.signal();
    assert_eq!(
        device.poll(),
        ControlEvent::Authenticated(AuthOutcome::Unlocked(Slot::One))
    );
    assert_eq!(device.io().keyboard.typed(), b"first");
}

#[test]
fn corrupted_record_is_wiped_on_boot() {
    let touch = TouchFlag::new();
    let (mut device, _) = boot(&touch, MemoryEeprom::new(), mock_peripherals(Mode::Register));
    register(&mut device, &touch, "pw");

    let (mut region, mut io) = power_cycle(device);
    region.corrupt(OFFSET_CIPHERTEXT + 5, 0x10);
    io.switch.set_mode(Mode::Recognize);
    let (mut device, outcome) = boot(&touch, region, io);

    assert_eq!(outcome, BootOutcome::Corrupt);
    assert_eq!(device.io().sensor.enrolled_total(), 0);
    touch.signal();
    assert_eq!(
        device.poll(),
        ControlEvent::Authenticated(AuthOutcome::NoRegistration)
    );

    let (region, io) = power_cycle(device);
    let (_, outcome) = boot(&touch, region, io);
    assert_eq!(outcome, BootOutcome::Virgin);
}

#[test]
fn record_does_not_decrypt_on_another_device() {
    let touch = TouchFlag::new();
    let (mut device, _) = boot(&touch, MemoryEeprom::new(), mock_peripherals(Mode::Register));
    register(&mut device, &touch, "bound-to-this-chip");
    let (region, _) = power_cycle(device);

    let other = DeviceKeyMaterial::from_unique_id(&[0x11; 8]);
    let mut store = CredentialStore::new(region, other);
    store.init().expect("in-memory region opens");

    let secret = store.read().map(|credential| credential.secret.as_bytes().to_vec());
    assert_ne!(secret.as_deref(), Some(&b"bound-to-this-chip"[..]));
}
