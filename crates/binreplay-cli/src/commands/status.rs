use anyhow::{Context, Result};
use binreplay_config::ReplayConfig;
use binreplay_state::SqliteStateStore;

pub fn cmd_status(config: ReplayConfig) -> Result<()> {
    let path = config.state_path();
    let store = SqliteStateStore::open_read_only(&path, &config.state.stream)
        .with_context(|| format!("Failed to open state database: {}", path))?;

    let checkpoints = store.all_checkpoints()?;

    if checkpoints.is_empty() {
        println!("No checkpoints found. Run 'binreplay run' to start replaying.");
        return Ok(());
    }

    println!("\nReplay Status:");
    println!("{:<30} {:>30} {:>15}", "Stream", "Log file", "Offset");
    println!("{:-<77}", "");

    for (stream, position) in checkpoints {
        let marker = if stream == config.state.stream { "*" } else { "" };
        println!(
            "{:<30} {:>30} {:>15}",
            format!("{}{}", stream, marker),
            position.file,
            position.offset
        );
    }

    println!();
    Ok(())
}
