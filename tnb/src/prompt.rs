//! Interactive prompts. Every prompt has a default that `--yes` and
//! non-terminal runs fall back to.

use anyhow::{Context, Result};
use dialoguer::{Confirm, MultiSelect, Select};
use tnb_bench::{PoolSelection, SpaceDecision, SpaceShortfall};
use tnb_common::{GIB, Iterations, PoolInfo};
use tracing::warn;

/// Default answer when a pool is short on space.
pub const LOW_SPACE_DEFAULT: SpaceDecision = SpaceDecision::Skip;
/// Default answer to the post-run dataset deletion question.
pub const DELETE_DEFAULT: bool = true;

/// Pick pools from the inventory. Every pool is preselected.
pub fn select_pools(pools: &[PoolInfo]) -> Result<PoolSelection> {
    if pools.is_empty() {
        return Ok(PoolSelection::None);
    }
    let items: Vec<String> = pools
        .iter()
        .map(|p| format!("{} ({})", p.name, p.path))
        .collect();
    let defaults = vec![true; pools.len()];
    let chosen = MultiSelect::new()
        .with_prompt("Pools to benchmark (space toggles, enter confirms)")
        .items(&items)
        .defaults(&defaults)
        .interact()
        .context("Pool selection prompt failed")?;
    Ok(selection_from_indices(pools, &chosen))
}

/// Map prompt indices back onto a selection.
pub fn selection_from_indices(pools: &[PoolInfo], chosen: &[usize]) -> PoolSelection {
    if chosen.is_empty() {
        PoolSelection::None
    } else if chosen.len() == pools.len() {
        PoolSelection::All
    } else {
        PoolSelection::Named(
            chosen
                .iter()
                .filter_map(|&i| pools.get(i))
                .map(|p| p.name.clone())
                .collect(),
        )
    }
}

pub fn iterations(what: &str, current: Iterations) -> Result<Iterations> {
    let default = usize::from(current == Iterations::TWICE);
    let choice = Select::new()
        .with_prompt(format!("{what} iterations"))
        .items(&["1", "2"])
        .default(default)
        .interact()
        .context("Iteration prompt failed")?;
    Ok(if choice == 0 {
        Iterations::ONCE
    } else {
        Iterations::TWICE
    })
}

pub fn confirm(question: &str, default: bool) -> Result<bool> {
    Confirm::new()
        .with_prompt(question)
        .default(default)
        .interact()
        .context("Confirmation prompt failed")
}

/// Space policy hook for `--on-low-space ask`. Prompt errors fall back to the default.
pub fn ask_low_space(shortfall: &SpaceShortfall) -> SpaceDecision {
    let question = format!(
        "Pool {} has {:.2} GiB free but {} threads need {:.2} GiB. Continue anyway?",
        shortfall.pool,
        shortfall.available as f64 / GIB as f64,
        shortfall.threads,
        shortfall.required as f64 / GIB as f64,
    );
    match confirm(&question, LOW_SPACE_DEFAULT == SpaceDecision::Proceed) {
        Ok(true) => SpaceDecision::Proceed,
        Ok(false) => SpaceDecision::Skip,
        Err(e) => {
            warn!(pool = %shortfall.pool, error = %e, "Space prompt failed, using default");
            LOW_SPACE_DEFAULT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pools() -> Vec<PoolInfo> {
        vec![
            PoolInfo::new("tank", "/mnt/tank"),
            PoolInfo::new("fast", "/mnt/fast"),
            PoolInfo::new("cold", "/mnt/cold"),
        ]
    }

    #[test]
    fn test_selection_from_indices() {
        let pools = pools();
        assert_eq!(selection_from_indices(&pools, &[]), PoolSelection::None);
        assert_eq!(selection_from_indices(&pools, &[0, 1, 2]), PoolSelection::All);
        assert_eq!(
            selection_from_indices(&pools, &[2, 0]),
            PoolSelection::Named(vec!["cold".to_string(), "tank".to_string()])
        );
    }

    #[test]
    fn test_select_pools_empty_inventory_needs_no_prompt() {
        assert_eq!(select_pools(&[]).unwrap(), PoolSelection::None);
    }

    #[test]
    fn test_defaults_are_conservative_on_space() {
        assert_eq!(LOW_SPACE_DEFAULT, SpaceDecision::Skip);
    }
}
