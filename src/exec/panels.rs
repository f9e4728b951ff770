//! Navigation and panel handlers. These only notify the UI; publishing is
//! fire-and-forget and a dropped event never fails the command.

use crate::call::FunctionCall;
use crate::context::VoiceContext;
use crate::error::VoxResult;
use crate::events::{UiEvent, UiEventKind};
use crate::result::ExecutionResult;

use super::{str_param, ToolExecutor};

pub(super) fn navigate(
    exec: &ToolExecutor,
    call: &FunctionCall,
    _ctx: &VoiceContext,
) -> VoxResult<ExecutionResult> {
    let destination = str_param(call, "destination")?;
    exec.ui().publish(
        UiEvent::new(UiEventKind::NavigationRequest).with("destination", destination.clone()),
    );
    tracing::debug!(destination = %destination, "navigation requested");
    Ok(ExecutionResult::Navigated { destination })
}

pub(super) fn toggle_panel(
    exec: &ToolExecutor,
    call: &FunctionCall,
    _ctx: &VoiceContext,
) -> VoxResult<ExecutionResult> {
    let panel = str_param(call, "panel")?;
    exec.ui()
        .publish(UiEvent::new(UiEventKind::PanelToggle).with("panel", panel.clone()));
    Ok(ExecutionResult::PanelToggled { panel })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::FunctionName;
    use crate::context::Section;
    use crate::events::UiEventBus;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn ctx() -> VoiceContext {
        VoiceContext::new(Section::Home, NaiveDate::from_ymd_opt(2026, 8, 27).unwrap())
    }

    #[test]
    fn navigate_publishes_destination() {
        let (bus, rx) = UiEventBus::channel();
        let exec = ToolExecutor::builder().ui(Arc::new(bus)).build();
        let call = FunctionCall::new(FunctionName::Navigate).with_str("destination", "journal");
        let result = exec.dispatch(&call, &ctx()).unwrap();
        assert!(matches!(result, ExecutionResult::Navigated { .. }));
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, UiEventKind::NavigationRequest);
        assert_eq!(ev.payload.get("destination").map(String::as_str), Some("journal"));
    }

    #[test]
    fn navigate_succeeds_with_no_subscriber() {
        // UI absence must never fail the command.
        let exec = ToolExecutor::builder().build();
        let call = FunctionCall::new(FunctionName::Navigate).with_str("destination", "health");
        assert!(exec.dispatch(&call, &ctx()).is_ok());
    }

    #[test]
    fn toggle_panel_round_trip() {
        let (bus, rx) = UiEventBus::channel();
        let exec = ToolExecutor::builder().ui(Arc::new(bus)).build();
        let call = FunctionCall::new(FunctionName::TogglePanel).with_str("panel", "levelHud");
        exec.dispatch(&call, &ctx()).unwrap();
        assert_eq!(rx.try_recv().unwrap().kind, UiEventKind::PanelToggle);
    }
}
