use courtside_db::{seed_demo_courts, SeedResult};

use crate::commands::{with_migrated_pool, CommandResult};

pub fn run() -> CommandResult {
    let result = with_migrated_pool(|_config, pool| async move {
        seed_demo_courts(&pool).await.map_err(|error| ("seed_execution", error.to_string(), 6u8))
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", summarize(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn summarize(seeded: &SeedResult) -> String {
    let mut message = format!("demo catalog ready ({} courts)", seeded.total());
    if !seeded.inserted.is_empty() {
        message.push_str(&format!("; inserted: {}", seeded.inserted.join(", ")));
    }
    if !seeded.already_present.is_empty() {
        message.push_str(&format!("; already present: {}", seeded.already_present.join(", ")));
    }
    message
}
