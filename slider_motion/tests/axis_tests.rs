//! Axis worker integration tests.
//!
//! Real worker threads against the simulation driver: position tracking,
//! limit truncation in both polarities, backpressure, stop, enable gate,
//! zeroing and the servo ramp.

use slider_common::config::SliderConfig;
use slider_common::consts::{COMMAND_QUEUE_CAPACITY, ENQUEUE_TIMEOUT};
use slider_common::hal::config::{ServoConfig, StepperConfig};
use slider_common::io::DiLogic;
use slider_common::motion::{ServoCommand, StepperCommand};
use slider_common::watchdog::TaskWatchdog;
use slider_motion::core::SliderCore;
use slider_motion::drivers::simulation::{SimulatedRail, SimulatedServo, SimulationDriver};
use slider_motion::servo::ServoAxis;
use slider_motion::stepper::{StepperAxis, StepperHandle};
use std::thread;
use std::time::{Duration, Instant};

fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while !cond() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
    true
}

/// Zero-length waiting command: returns once everything queued before it ran.
fn barrier(stepper: &StepperHandle) {
    assert!(stepper.submit(StepperCommand::relative(0, None).waiting()));
}

fn start_core(rail: &SimulatedRail, servo: &SimulatedServo, logic: DiLogic) -> SliderCore {
    let mut config = SliderConfig::default();
    config.limits.logic = logic;
    let mut driver = SimulationDriver::with_hardware(rail.clone(), servo.clone());
    SliderCore::start(config, &mut driver).unwrap()
}

fn spawn_stepper(rail: &SimulatedRail) -> StepperAxis {
    StepperAxis::spawn(
        &StepperConfig::default(),
        Box::new(rail.outputs()),
        None,
        &TaskWatchdog::default(),
    )
    .unwrap()
}

// ─── Stepper ────────────────────────────────────────────────────────

#[test]
fn position_equals_sum_of_deltas() {
    let rail = SimulatedRail::default();
    let axis = spawn_stepper(&rail);
    let stepper = axis.handle();

    let mut expected = 0i64;
    for delta in [120, -45, 0, 300, -375, 17] {
        let before = stepper.position();
        assert!(stepper.submit(StepperCommand::relative(delta, Some(2000)).waiting()));
        expected += delta;
        assert_eq!(stepper.position(), before + delta);
    }
    assert_eq!(stepper.position(), expected);
    assert_eq!(rail.position(), expected);

    assert!(stepper.submit(StepperCommand::absolute(-10, Some(2000)).waiting()));
    assert_eq!(stepper.position(), -10);
    assert_eq!(stepper.target_position(), -10);
}

fn truncation_at_max_limit(logic: DiLogic) {
    let rail = SimulatedRail::new(-100, 100);
    let servo = SimulatedServo::new();
    let core = start_core(&rail, &servo, logic);
    let stepper = core.stepper();

    assert!(stepper.submit(StepperCommand::absolute(400, Some(2000)).waiting()));
    let reached = stepper.position();
    let overtravel_steps = 121;
    assert!(reached >= 100, "{logic:?}: stopped early at {reached}");
    assert!(
        reached <= 100 + overtravel_steps,
        "{logic:?}: overshot to {reached}"
    );
    assert_eq!(rail.position(), reached);
    assert!(core.limits().max_triggered());
    assert!(!core.limits().min_triggered());
    assert!(core.status().endstops.endstop_max);

    // Moving away from the actuated switch is allowed.
    assert!(stepper.submit(StepperCommand::absolute(0, Some(2000)).waiting()));
    assert_eq!(stepper.position(), 0);
}

#[test]
fn max_limit_truncates_move_nc() {
    truncation_at_max_limit(DiLogic::NC);
}

#[test]
fn max_limit_truncates_move_no() {
    truncation_at_max_limit(DiLogic::NO);
}

#[test]
fn min_limit_truncates_reverse_move() {
    let rail = SimulatedRail::new(-60, 5_000);
    let servo = SimulatedServo::new();
    let core = start_core(&rail, &servo, DiLogic::NO);
    let stepper = core.stepper();

    assert!(stepper.submit(StepperCommand::relative(-1_000, Some(2000)).waiting()));
    let reached = stepper.position();
    assert!((-60 - 121..=-60).contains(&reached), "reached {reached}");
    assert!(core.limits().min_triggered());
}

#[test]
fn move_toward_triggered_limit_executes_zero_steps() {
    let rail = SimulatedRail::default();
    let servo = SimulatedServo::new();
    let core = start_core(&rail, &servo, DiLogic::NC);
    rail.force_max(Some(true));
    assert!(wait_for(Duration::from_secs(1), || core.limits().max_triggered()));

    assert!(core.move_stepper(10.0, 50));
    barrier(&core.stepper());
    assert_eq!(core.stepper().position(), 0);
    assert_eq!(rail.pulse_count(), 0);

    // The opposite direction is unaffected: -10 mm = -250 steps.
    assert!(core.move_stepper(-10.0, 100));
    barrier(&core.stepper());
    assert_eq!(core.stepper().position(), -250);
}

#[test]
fn full_queue_rejects_without_blocking() {
    let rail = SimulatedRail::default();
    let axis = spawn_stepper(&rail);
    let stepper = axis.handle();

    // 1 step/s keeps the worker busy.
    assert!(stepper.move_relative(1_000, Some(1)));
    assert!(wait_for(Duration::from_secs(1), || stepper.is_moving()));
    for _ in 0..COMMAND_QUEUE_CAPACITY {
        assert!(stepper.move_relative(1, Some(2000)));
    }

    let start = Instant::now();
    assert!(!stepper.move_relative(1, Some(2000)));
    let waited = start.elapsed();
    assert!(waited >= ENQUEUE_TIMEOUT - Duration::from_millis(5), "{waited:?}");
    assert!(waited < Duration::from_millis(500), "{waited:?}");

    stepper.stop();
    assert!(wait_for(Duration::from_secs(2), || !stepper.is_moving()));
    assert!(stepper.position().abs() <= 2);
}

#[test]
fn stop_aborts_move_and_clears_queue() {
    let rail = SimulatedRail::default();
    let axis = spawn_stepper(&rail);
    let stepper = axis.handle();

    assert!(stepper.move_relative(10_000, Some(200)));
    assert!(stepper.move_relative(10_000, Some(200)));
    thread::sleep(Duration::from_millis(100));
    stepper.stop();
    assert!(wait_for(Duration::from_secs(1), || !stepper.is_moving()));

    let stopped_at = stepper.position();
    assert!(stopped_at > 0 && stopped_at < 100, "stopped at {stopped_at}");
    thread::sleep(Duration::from_millis(150));
    assert_eq!(stepper.position(), stopped_at);
    assert_eq!(rail.position(), stopped_at);

    // Still accepts work afterwards.
    assert!(stepper.submit(StepperCommand::relative(5, Some(2000)).waiting()));
    assert_eq!(stepper.position(), stopped_at + 5);
}

#[test]
fn disabled_stepper_ignores_commands() {
    let rail = SimulatedRail::default();
    let servo = SimulatedServo::new();
    let core = start_core(&rail, &servo, DiLogic::NC);

    core.enable_stepper(false);
    assert!(core.move_stepper(5.0, 100));
    barrier(&core.stepper());
    assert_eq!(core.stepper().position(), 0);
    assert!(wait_for(Duration::from_secs(1), || !rail.is_enabled()));
    assert!(!core.status().stepper.is_enabled);

    core.enable_stepper(true);
    assert!(core.move_stepper(5.0, 100));
    barrier(&core.stepper());
    assert_eq!(core.stepper().position(), 125);
    assert!(rail.is_enabled());
}

#[test]
fn zero_redefines_position() {
    let rail = SimulatedRail::default();
    let axis = spawn_stepper(&rail);
    let stepper = axis.handle();

    assert!(stepper.submit(StepperCommand::relative(80, Some(2000)).waiting()));
    stepper.zero();
    assert!(wait_for(Duration::from_secs(1), || stepper.position() == 0));
    assert!(stepper.submit(StepperCommand::absolute(-20, Some(2000)).waiting()));
    assert_eq!(stepper.position(), -20);
    assert_eq!(rail.position(), 60);
}

#[test]
fn oversized_requests_keep_the_worker_alive() {
    let rail = SimulatedRail::default();
    let axis = spawn_stepper(&rail);
    let stepper = axis.handle();

    assert!(stepper.submit(StepperCommand::relative(1, Some(2000)).waiting()));
    assert!(stepper.move_distance(1e300, 50));
    assert!(wait_for(Duration::from_secs(1), || stepper.is_moving()));
    assert_eq!(stepper.target_position(), i64::MAX);
    stepper.stop();
    assert!(wait_for(Duration::from_secs(1), || !stepper.is_moving()));

    assert!(stepper.move_to(i64::MIN, Some(2000)));
    assert!(wait_for(Duration::from_secs(1), || stepper.is_moving()));
    stepper.stop();
    assert!(wait_for(Duration::from_secs(1), || !stepper.is_moving()));

    // Still serving commands afterwards.
    let before = stepper.position();
    assert!(stepper.submit(StepperCommand::relative(5, Some(2000)).waiting()));
    assert_eq!(stepper.position(), before + 5);
    assert_eq!(rail.position(), stepper.position());
}

#[test]
fn default_speed_and_max_speed_setters() {
    let rail = SimulatedRail::default();
    let axis = spawn_stepper(&rail);
    let stepper = axis.handle();

    stepper.set_max_speed(500);
    stepper.set_speed(5_000);
    let state = stepper.state();
    assert_eq!(state.max_speed, 500);
    assert_eq!(state.speed, 500);
    assert_eq!(stepper.percent_to_speed(100), 500);
    assert_eq!(stepper.percent_to_speed(0), 100);

    // 50 steps at the 500 steps/s clamp take at least 100 ms.
    let start = Instant::now();
    assert!(stepper.submit(StepperCommand::relative(50, None).waiting()));
    assert!(start.elapsed() >= Duration::from_millis(100));
}

// ─── Servo ──────────────────────────────────────────────────────────

#[test]
fn servo_attaches_once_then_ramps() {
    let sim = SimulatedServo::new();
    let axis = ServoAxis::spawn(
        &ServoConfig::default(),
        Box::new(sim.output()),
        &TaskWatchdog::default(),
    )
    .unwrap();
    let servo = axis.handle();
    assert_eq!(servo.current_angle(), 90);

    assert!(servo.submit(ServoCommand::new(20, Some(100)).waiting()));
    assert_eq!(sim.angles(), vec![20]);

    let start = Instant::now();
    assert!(servo.submit(ServoCommand::new(25, Some(1)).waiting()));
    // five degrees at 20 ms each
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert_eq!(sim.angles(), vec![20, 21, 22, 23, 24, 25]);
    assert_eq!(sim.attach_count(), 1);
    assert_eq!(sim.pulse_range(), Some((500, 2400)));
    assert_eq!(servo.current_angle(), 25);
}

#[test]
fn servo_stop_interrupts_ramp() {
    let sim = SimulatedServo::new();
    let mut axis = ServoAxis::spawn(
        &ServoConfig::default(),
        Box::new(sim.output()),
        &TaskWatchdog::default(),
    )
    .unwrap();
    let servo = axis.handle();

    assert!(servo.submit(ServoCommand::new(0, None).waiting()));
    assert!(servo.move_to(180, Some(1)));
    thread::sleep(Duration::from_millis(100));
    servo.stop();
    assert!(wait_for(Duration::from_secs(1), || !servo.is_moving()));
    let angle = servo.current_angle();
    assert!(angle > 0 && angle < 20, "angle {angle}");

    axis.shutdown();
    assert!(!sim.is_attached());
}
