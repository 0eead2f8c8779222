//! Interactive target selection.
//!
//! Lists the discovered JVMs and reads a numbered choice from stdin.
//! The contract towards the caller: a positive pid means "attach to
//! this", anything non-positive means "no selection, do nothing".

use std::io::Write;

use anyhow::{Context, Result};

use vmattach_core::{AttachProvider, VmDescriptor};

/// Sentinel for "nothing selected".
pub const NO_SELECTION: i64 = 0;

/// Let the operator pick a target from the discovered VMs.
///
/// Returns the selected pid, or [`NO_SELECTION`] when there are no
/// candidates or the operator declines (empty line, out-of-range or
/// non-numeric input).
pub fn select(provider: &dyn AttachProvider) -> Result<i64> {
    let vms = provider
        .list()
        .context("failed to enumerate attach-capable JVMs")?;

    if vms.is_empty() {
        println!("no attach-capable JVMs found");
        return Ok(NO_SELECTION);
    }

    println!("visible JVMs:");
    for (index, vm) in vms.iter().enumerate() {
        println!("  [{}] {:>8}  {}", index + 1, vm.id, vm.display_name);
    }
    print!("select a target [1-{}] (enter to cancel): ", vms.len());
    std::io::stdout().flush().context("failed to flush stdout")?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read selection")?;

    Ok(parse_selection(&line, &vms))
}

/// Map one line of operator input to a pid or [`NO_SELECTION`].
fn parse_selection(line: &str, vms: &[VmDescriptor]) -> i64 {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return NO_SELECTION;
    }
    match trimmed.parse::<usize>() {
        Ok(choice) if (1..=vms.len()).contains(&choice) => {
            vms[choice - 1].id.parse().unwrap_or(NO_SELECTION)
        }
        _ => NO_SELECTION,
    }
}
