use simplelog::{CombinedLogger, ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

pub mod fake_recaptcha;
pub mod fake_smtp;

/// Routes `log` output to the terminal. Safe to call from several tests in one process.
pub fn setup_logging() {
    let _ = CombinedLogger::init(vec![TermLogger::new(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
