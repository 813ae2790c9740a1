#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Arbitrary TOML must either fail to parse or validate without panicking,
    // including the frame-center setpoint default and the pin overlap scan.
    if let Ok(cfg) = pantrack_config::load_toml(data) {
        let _ = cfg.validate();
        let _ = cfg.effective_setpoint_x();
    }
});
