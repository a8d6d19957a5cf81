use std::time::Duration;

use handheld_input::battery::BatteryEstimator;
use handheld_input::config::Config;
use handheld_input::hal::sim::SimBoard;
use handheld_input::hal::{AudioSink, PinBankArbiter};
use handheld_input::input::{GamepadKey, InputSubsystem, SamplerParts};

const A_PIN: u8 = 26;
const MENU_PIN: u8 = 5;
const X_CHANNEL: u8 = 1;
const Y_CHANNEL: u8 = 2;
const BATTERY_CHANNEL: u8 = 0;

fn subsystem(board: &SimBoard, arbiter: PinBankArbiter) -> InputSubsystem {
    let parts = SamplerParts {
        pins: Box::new(board.pins()),
        adc: Box::new(board.adc()),
        external_pad: Some(Box::new(board.pad())),
    };
    InputSubsystem::new(parts, &Config::default(), arbiter).unwrap()
}

async fn wait(input: &InputSubsystem, key: GamepadKey, pressed: bool) {
    tokio::time::timeout(Duration::from_millis(200), input.wait_for_key(key, pressed))
        .await
        .unwrap_or_else(|_| panic!("{} never became pressed={}", key, pressed));
}

#[tokio::test(start_paused = true)]
async fn press_and_release_become_visible() {
    let board = SimBoard::new();
    let mut input = subsystem(&board, PinBankArbiter::default());
    input.init().await;

    board.press(A_PIN);
    wait(&input, GamepadKey::A, true).await;
    assert!(input.read_gamepad().contains(GamepadKey::A));

    board.release(A_PIN);
    wait(&input, GamepadKey::A, false).await;
    assert!(!input.is_pressed(GamepadKey::A));

    input.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn reader_handles_work_from_other_tasks() {
    let board = SimBoard::new();
    let mut input = subsystem(&board, PinBankArbiter::default());
    input.init().await;

    let reader = input.reader();
    let watcher = tokio::spawn(async move {
        reader.wait_for_key(GamepadKey::Menu, true).await;
        reader.read_gamepad()
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    board.press(MENU_PIN);

    let seen = tokio::time::timeout(Duration::from_millis(200), watcher)
        .await
        .unwrap()
        .unwrap();
    assert!(seen.contains(GamepadKey::Menu));

    input.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn second_init_keeps_a_single_loop() {
    let board = SimBoard::new();
    let mut input = subsystem(&board, PinBankArbiter::default());
    input.init().await;
    input.init().await;
    assert!(input.is_running());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let reads = board.analog_reads(Y_CHANNEL);
    assert!((9..=12).contains(&reads), "unexpected read count {}", reads);

    input.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_sampling_and_init_resumes_it() {
    let board = SimBoard::new();
    let mut input = subsystem(&board, PinBankArbiter::default());
    input.init().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    input.deinit();
    assert!(!input.is_running());
    input.shutdown().await;

    let stopped_at = board.analog_reads(Y_CHANNEL);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(board.analog_reads(Y_CHANNEL), stopped_at);

    input.init().await;
    assert!(input.is_running());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(board.analog_reads(Y_CHANNEL) > stopped_at);

    input.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn init_after_deinit_restarts_without_shutdown() {
    let board = SimBoard::new();
    let mut input = subsystem(&board, PinBankArbiter::default());
    input.init().await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    input.deinit();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let stopped_at = board.analog_reads(Y_CHANNEL);
    assert!(stopped_at > 0);

    input.init().await;
    assert!(input.is_running());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(board.analog_reads(Y_CHANNEL) > stopped_at);

    // Back-to-back pairs, the second init arriving before the loop noticed.
    for _ in 0..3 {
        input.deinit();
        input.init().await;
        assert!(input.is_running());
    }
    board.press(A_PIN);
    wait(&input, GamepadKey::A, true).await;

    input.shutdown().await;
    assert!(!input.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn samples_on_a_multi_thread_runtime() {
    let board = SimBoard::new();
    let mut input = subsystem(&board, PinBankArbiter::default());
    input.init().await;

    board.press(A_PIN);
    tokio::time::timeout(Duration::from_secs(2), input.wait_for_key(GamepadKey::A, true))
        .await
        .unwrap();

    input.deinit();
    input.init().await;
    board.release(A_PIN);
    tokio::time::timeout(Duration::from_secs(2), input.wait_for_key(GamepadKey::A, false))
        .await
        .unwrap();

    input.shutdown().await;
    assert!(!input.is_running());
}

#[tokio::test(start_paused = true)]
async fn state_survives_a_restart() {
    let board = SimBoard::new();
    let mut input = subsystem(&board, PinBankArbiter::default());
    input.init().await;

    board.press(A_PIN);
    wait(&input, GamepadKey::A, true).await;
    input.shutdown().await;

    // Stopped sampler leaves the last published word in place.
    board.release(A_PIN);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(input.is_pressed(GamepadKey::A));

    input.init().await;
    wait(&input, GamepadKey::A, false).await;
    input.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn external_pad_follows_the_audio_sink() {
    let board = SimBoard::new();
    let arbiter = PinBankArbiter::for_sink(AudioSink::ExternalDac);
    let mut input = subsystem(&board, arbiter.clone());
    input.init().await;

    board.set_pad(GamepadKey::B.mask());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!input.is_pressed(GamepadKey::B));
    assert_eq!(board.pad_reads(), 0);

    arbiter.select_audio_sink(AudioSink::Speaker);
    wait(&input, GamepadKey::B, true).await;
    assert!(board.pad_reads() > 0);

    input.arbiter().select_audio_sink(AudioSink::ExternalDac);
    wait(&input, GamepadKey::B, false).await;

    input.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn axes_drive_direction_keys() {
    let board = SimBoard::new();
    let mut input = subsystem(&board, PinBankArbiter::default());
    input.init().await;

    board.set_analog(Y_CHANNEL, 4000);
    wait(&input, GamepadKey::Up, true).await;
    assert!(!input.is_pressed(GamepadKey::Down));

    board.set_analog(Y_CHANNEL, 2000);
    wait(&input, GamepadKey::Down, true).await;
    assert!(!input.is_pressed(GamepadKey::Up));

    board.set_analog(X_CHANNEL, 3500);
    wait(&input, GamepadKey::Left, true).await;
    assert!(!input.is_pressed(GamepadKey::Right));

    board.set_analog(X_CHANNEL, 0);
    board.set_analog(Y_CHANNEL, 0);
    wait(&input, GamepadKey::Left, false).await;
    wait(&input, GamepadKey::Down, false).await;

    input.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn last_read_elapsed_tracks_queries() {
    let board = SimBoard::new();
    let input = subsystem(&board, PinBankArbiter::default());
    assert_eq!(input.last_read_elapsed(), Duration::ZERO);

    input.read_gamepad();
    std::thread::sleep(Duration::from_millis(5));
    assert!(input.last_read_elapsed() >= Duration::from_millis(5));
}

#[test]
fn new_rejects_invalid_config() {
    let board = SimBoard::new();
    let mut config = Config::default();
    config.sampler.debounce_depth = 0;
    let parts = SamplerParts {
        pins: Box::new(board.pins()),
        adc: Box::new(board.adc()),
        external_pad: None,
    };
    assert!(InputSubsystem::new(parts, &config, PinBankArbiter::default()).is_err());
}

#[test]
fn battery_estimate_from_the_sim_board() {
    let board = SimBoard::new();
    let config = Config::default();
    let hw = board.board(false);
    let mut battery = BatteryEstimator::new(hw.battery_adc, config.battery).unwrap();

    // 2048 raw is about 1.79 V at the node, 3.58 V at the cell.
    board.set_analog(BATTERY_CHANNEL, 2048);
    let state = battery.read();
    assert!((3570..=3600).contains(&state.millivolts), "{:?}", state);
    assert!((10..=13).contains(&state.percentage), "{:?}", state);

    // Full-scale reading saturates the percentage but not the voltage.
    board.set_analog(BATTERY_CHANNEL, 4095);
    for _ in 0..20 {
        battery.read();
    }
    let state = battery.read();
    assert_eq!(state.percentage, 100);
    assert!(state.millivolts > 4200);
}
