//! Turns a branch / module-name / build-number triple into a concrete build
//! by walking the CI server's lookup endpoints.

use crate::api::BuildApi;
use crate::app::{Build, BuildNumber, BuildState, ModuleState, WatchTarget};
use color_eyre::eyre::{eyre, Result};

/// A running entry only shadows the last finished build once the server has
/// committed to it. Builds still waiting on upstreams or slots resolve to
/// the previous build.
fn usable_in_progress(state: BuildState) -> bool {
    matches!(
        state,
        BuildState::Queued
            | BuildState::Launching
            | BuildState::InProgress
            | BuildState::Succeeded
            | BuildState::Cancelled
            | BuildState::Failed
            | BuildState::Unstable
    )
}

fn build_to_use(state: &ModuleState) -> Option<&Build> {
    if let Some(running) = &state.in_progress_build {
        if usable_in_progress(running.state) {
            return Some(running);
        }
    }
    state.last_build.as_ref()
}

/// Resolve `target` to a fully fetched build.
///
/// Numeric build numbers go through the branch history to the right repo
/// build and its per-module builds; `latest` goes through the branch's live
/// module states. Either way the chain ends with a fresh fetch of the
/// chosen build, and any miss along the way is an error.
pub async fn resolve_build(api: &dyn BuildApi, target: &WatchTarget) -> Result<Build> {
    let history = api.branch_history(target.branch_id).await?;
    let modules = api.branch_modules(target.branch_id).await?;
    let module = modules
        .iter()
        .find(|m| m.active && m.name == target.module_name)
        .ok_or_else(|| {
            eyre!(
                "no active module named {:?} on branch {}",
                target.module_name,
                target.branch_id
            )
        })?;

    let build_id = match target.build_number {
        BuildNumber::Number(number) => {
            let repo_build = history
                .iter()
                .find(|b| b.build_number == number)
                .ok_or_else(|| {
                    eyre!(
                        "build #{number} is not in the history of branch {}",
                        target.branch_id
                    )
                })?;
            let module_builds = api.repo_build_module_builds(repo_build.id).await?;
            module_builds
                .iter()
                .find(|b| b.module_id == module.id)
                .ok_or_else(|| {
                    eyre!(
                        "repo build {} has no build for module {:?}",
                        repo_build.id,
                        target.module_name
                    )
                })?
                .id
        }
        BuildNumber::Latest => {
            let states = api.branch_module_states(target.branch_id).await?;
            let module_state = states
                .into_iter()
                .find(|s| s.module.id == module.id)
                .ok_or_else(|| {
                    eyre!(
                        "no live state for module {:?} on branch {}",
                        target.module_name,
                        target.branch_id
                    )
                })?;
            let chosen = build_to_use(&module_state)
                .ok_or_else(|| eyre!("module {:?} has no builds yet", target.module_name))?;
            let repo_build = history
                .iter()
                .find(|b| b.build_number == chosen.build_number)
                .ok_or_else(|| {
                    eyre!(
                        "build #{} is not in the history of branch {}",
                        chosen.build_number,
                        target.branch_id
                    )
                })?;
            tracing::debug!(
                build_id = chosen.id,
                repo_build_id = repo_build.id,
                "resolved latest build"
            );
            chosen.id
        }
    };

    api.module_build(build_id).await
}
