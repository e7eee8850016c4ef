use std::sync::Arc;

use courtside_agent::{build_llm_client, AgentDeps, AgentRuntime, RuntimeSettings, TurnInput};
use courtside_core::audit::TracingAuditSink;
use courtside_core::clock::SystemClock;

use crate::commands::{with_migrated_pool, CommandResult};

/// One turn against the configured database. The reply is printed as plain
/// text so the conversation can be continued by re-running the command.
/// Blank phone or text is rejected before any database work, like `/test-message`.
pub fn run(phone: &str, text: &str) -> CommandResult {
    if phone.trim().is_empty() || text.trim().is_empty() {
        return CommandResult::failure("chat", "invalid_input", "phone and message are required", 1);
    }

    let result = with_migrated_pool(|config, pool| async move {
        let settings = RuntimeSettings::from_config(&config)
            .map_err(|error| ("config_validation", error.to_string(), 2u8))?;
        let deps = AgentDeps::from_pool(
            pool,
            build_llm_client(&config.llm),
            Arc::new(SystemClock),
            Arc::new(TracingAuditSink),
        );
        let runtime = AgentRuntime::new(deps, settings);
        Ok(runtime.handle_turn(TurnInput::new(phone, text)).await)
    });

    match result {
        Ok(reply) => CommandResult { exit_code: 0, output: reply },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}
