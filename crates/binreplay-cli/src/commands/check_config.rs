use anyhow::{Context, Result};
use binreplay_config::{to_writer_config, ReplayConfig};

pub fn cmd_check_config(config: ReplayConfig) -> Result<()> {
    let writer = to_writer_config(&config).context("Invalid configuration")?;

    println!("Configuration is valid.\n");
    println!("  batch size:      {}", writer.batch_size);
    println!(
        "  queue capacity:  {}",
        writer.queue_capacity.unwrap_or(writer.batch_size)
    );
    println!("  dialect:         {:?}", writer.dialect);
    println!("  drift policy:    {:?}", writer.drift_policy);
    println!(
        "  retries:         {} attempts, {:?} .. {:?} (x{})",
        writer.retry.max_attempts,
        writer.retry.initial_delay,
        writer.retry.max_delay,
        writer.retry.backoff_factor
    );
    println!(
        "  rewrites:        {} database(s), {} table(s)",
        writer.rewrites.databases.len(),
        writer.rewrites.tables.len()
    );
    println!("  state:           {} ({})", config.state_path(), config.state.stream);
    Ok(())
}
