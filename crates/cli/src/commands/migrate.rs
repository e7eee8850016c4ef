use crate::commands::{with_migrated_pool, CommandResult};

pub fn run() -> CommandResult {
    match with_migrated_pool(|_config, _pool| async { Ok(()) }) {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
