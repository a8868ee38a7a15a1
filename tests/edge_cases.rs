//! Edge case and boundary condition tests for the station

use dcc_station::hal::{ManualScheduler, MockMemory};
use dcc_station::{
    ChannelRegistry, Config, DccError, Direction, Instruction, LayoutConfig, MAX_SPEED,
};

type Registry = ChannelRegistry<MockMemory, ManualScheduler>;

fn registry_with(config: &Config) -> Registry {
    ChannelRegistry::with_memory(
        MockMemory::for_layout(&config.layout),
        ManualScheduler::new(),
        config,
    )
    .unwrap()
}

fn started() -> Registry {
    let registry = registry_with(&Config::default());
    registry.start().unwrap();
    registry
}

// ============================================================================
// Boundary Value Tests
// ============================================================================

#[test]
fn throttle_at_max_speed() {
    let registry = started();
    registry.set_throttle(1, MAX_SPEED).unwrap();
    for _ in 0..MAX_SPEED {
        registry.scheduler().run_active();
    }
    assert_eq!(registry.status(1).unwrap().speed, MAX_SPEED);
}

#[test]
fn throttle_above_max_rejected() {
    let registry = started();
    assert!(matches!(
        registry.set_throttle(1, MAX_SPEED + 1),
        Err(DccError::InvalidInstruction(_))
    ));
    assert_eq!(registry.scheduler().run_active(), 0);
}

#[test]
fn highest_and_lowest_addresses() {
    let registry = started();
    registry.set_throttle(30, 1).unwrap();
    registry.set_throttle(1, 1).unwrap();
    registry.scheduler().run_active();
    assert_eq!(registry.status(30).unwrap().speed, 1);
    assert_eq!(registry.status(1).unwrap().speed, 1);
}

#[test]
fn addresses_outside_layout_rejected() {
    let registry = started();
    let expected = Err(DccError::AddressOutOfRange { address: 31, max: 30 });
    assert_eq!(registry.set_throttle(31, 1), expected);
    assert_eq!(
        registry.set_throttle(0, 1),
        Err(DccError::AddressOutOfRange { address: 0, max: 30 })
    );
    assert!(registry.set_direction(200, Direction::Reverse).is_err());
}

#[test]
fn single_address_layout() {
    let config = Config::default().with_layout(LayoutConfig::default().with_max_addr(1));
    let registry = registry_with(&config);
    registry.start().unwrap();
    assert_eq!(registry.scheduler().task_count(), 1);
    assert_eq!(registry.statuses().unwrap().len(), 1);
}

#[test]
fn full_short_address_range_needs_wider_slots() {
    let config = Config::default().with_layout(LayoutConfig::default().with_max_addr(127));
    let result = ChannelRegistry::with_memory(
        MockMemory::for_layout(&config.layout),
        ManualScheduler::new(),
        &config,
    );
    assert!(matches!(result, Err(DccError::SlotOverflow { .. })));

    let config = Config::default().with_layout(
        LayoutConfig::default()
            .with_max_addr(127)
            .with_bytes_per_channel(20),
    );
    let registry = registry_with(&config);
    registry.start().unwrap();
    registry.set_throttle(127, 1).unwrap();
    registry.scheduler().run_active();
    assert_eq!(registry.status(127).unwrap().speed, 1);
}

// ============================================================================
// Lifecycle Edge Cases
// ============================================================================

#[test]
fn everything_rejected_before_start() {
    let registry = registry_with(&Config::default());
    assert_eq!(registry.set_throttle(1, 1), Err(DccError::NotRunning));
    assert_eq!(
        registry.set_direction(1, Direction::Reverse),
        Err(DccError::NotRunning)
    );
    assert_eq!(registry.emergency_stop(true), Err(DccError::NotRunning));
    assert_eq!(registry.clear_stop(), Err(DccError::NotRunning));
}

#[test]
fn stop_without_start() {
    let registry = registry_with(&Config::default());
    registry.stop().unwrap();
    assert!(registry.scheduler().is_shut_down());
    assert_eq!(registry.start(), Err(DccError::NotRunning));
}

#[test]
fn stop_twice() {
    let registry = started();
    registry.stop().unwrap();
    registry.stop().unwrap();
}

// ============================================================================
// Emergency Stop
// ============================================================================

#[test]
fn emergency_stop_keeps_direction() {
    let registry = started();
    registry.set_direction(2, Direction::Reverse).unwrap();
    registry.set_throttle(2, 6).unwrap();
    registry.scheduler().run_active();
    registry.scheduler().run_active();

    registry.emergency_stop(false).unwrap();
    assert_eq!(
        registry.buffer().peek_instruction(2),
        Ok((Direction::Reverse, 0))
    );
    assert_eq!(
        registry.broadcast(),
        Ok(Instruction::Stop { emergency: false })
    );
}

#[test]
fn throttle_after_emergency_stop_ramps_again() {
    let registry = started();
    registry.set_throttle(3, 6).unwrap();
    registry.scheduler().run_active();
    registry.emergency_stop(true).unwrap();
    registry.clear_stop().unwrap();

    registry.set_throttle(3, 2).unwrap();
    registry.scheduler().run_active();
    registry.scheduler().run_active();
    assert_eq!(registry.status(3).unwrap().speed, 2);
}

#[test]
fn broadcast_stop_holds_trains_until_cleared() {
    let registry = started();
    registry.emergency_stop(true).unwrap();

    for address in [1, 15, 30] {
        assert_eq!(registry.set_throttle(address, MAX_SPEED), Err(DccError::StopActive));
    }
    assert_eq!(registry.scheduler().run_active(), 0);
    assert!(registry.statuses().unwrap().iter().all(|s| s.speed == 0));

    // Direction changes at rest are still allowed
    registry.set_direction(15, Direction::Reverse).unwrap();
    assert_eq!(
        registry.broadcast(),
        Ok(Instruction::Stop { emergency: true })
    );

    registry.clear_stop().unwrap();
    registry.set_throttle(15, 1).unwrap();
    registry.scheduler().run_active();
    assert_eq!(
        registry.buffer().peek_instruction(15),
        Ok((Direction::Reverse, 1))
    );
}

// ============================================================================
// Tick Failures
// ============================================================================

#[test]
fn failing_tick_pauses_only_its_channel() {
    let registry = started();
    registry.set_throttle(5, 10).unwrap();
    registry.set_throttle(6, 10).unwrap();

    // Corrupt slot 5 so its tick cannot read a speed back
    registry
        .buffer()
        .poke_instruction(5, &Instruction::Idle)
        .unwrap();
    registry.scheduler().run_active();

    assert!(registry.scheduler().handle(4).unwrap().state().paused);
    assert!(!registry.scheduler().handle(5).unwrap().state().paused);
    assert_eq!(registry.status(6).unwrap().speed, 1);
    assert!(matches!(
        registry.status(5),
        Err(DccError::UnexpectedInstruction { address: 5, .. })
    ));
}

#[test]
fn paused_after_failure_resumes_on_next_throttle() {
    let registry = started();
    registry.set_throttle(5, 10).unwrap();
    registry
        .buffer()
        .poke_instruction(5, &Instruction::Idle)
        .unwrap();
    registry.scheduler().run_active();

    // Repair the slot, then ask for the same throttle again
    registry
        .buffer()
        .poke_instruction(5, &Instruction::speed(5, Direction::Forward, 0).unwrap())
        .unwrap();
    registry.set_throttle(5, 10).unwrap();
    registry.scheduler().run_active();
    assert_eq!(registry.status(5).unwrap().speed, 1);
}
