use crossterm::terminal;

/// Must only be called if terminal is NOT in raw mode.
///
/// Failure is reported but not fatal: the simulator still runs, with line-buffered input.
pub fn enable_raw_mode() {
    debug_assert!(
        !terminal::is_raw_mode_enabled().is_ok_and(|is| is),
        "terminal should not be in raw mode to enable raw mode",
    );
    if let Err(error) = terminal::enable_raw_mode() {
        eprintln!("Could not set terminal to raw mode: {error}");
    }
}

/// Must only be called if terminal is in raw mode.
pub fn disable_raw_mode() {
    if let Err(error) = terminal::disable_raw_mode() {
        eprintln!("Could not reset terminal: {error}");
    }
}
