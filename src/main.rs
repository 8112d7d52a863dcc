use cache_probe::{Probe, ProbeConfig, Tabled};
use log::info;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = ProbeConfig::default();
    info!(
        "probing with {} slots per buffer, {} tries per sample",
        config.buffer_capacity, config.tries_per_sample
    );
    let mut probe = Probe::new(config);
    probe.run(&mut Tabled::new())?;
    Ok(())
}
