use crate::app::{Build, BuildState};
use notify_rust::{Notification, Urgency};

pub fn send_desktop(build: &Build) {
    let (summary, icon, urgency) = match build.state {
        BuildState::Succeeded => ("Build Succeeded", "dialog-information", Urgency::Normal),
        BuildState::Failed => ("Build Failed", "dialog-error", Urgency::Critical),
        BuildState::Unstable => ("Build Unstable", "dialog-error", Urgency::Critical),
        BuildState::Cancelled => ("Build Cancelled", "dialog-information", Urgency::Normal),
        _ => ("Build Finished", "dialog-information", Urgency::Normal),
    };

    let body = format!("Build #{} finished as {}", build.build_number, build.state);

    let _ = Notification::new()
        .summary(summary)
        .body(&body)
        .icon(icon)
        .urgency(urgency)
        .show();
}
