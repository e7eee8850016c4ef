use rust_decimal::Decimal;

use courtside_core::domain::court::{Court, CourtId, SlotModel};

use crate::connection::DbPool;
use crate::repositories::{CourtRepository, RepositoryError, SqlCourtRepository};

pub const DEMO_OPEN_HOUR: u32 = 8;
pub const DEMO_CLOSE_HOUR: u32 = 22;

/// `(id, name, sport, hourly rate in cents)`
const DEMO_CATALOG: &[(&str, &str, &str, i64)] = &[
    ("court-1", "Quadra 1 - Futebol Society", "Futebol Society", 12_000),
    ("court-2", "Quadra 2 - Futsal", "Futsal", 10_000),
    ("court-3", "Quadra 3 - Vôlei", "Vôlei", 8_000),
    ("court-4", "Quadra 4 - Basquete", "Basquete", 9_000),
];

/// The demo catalog: four courts open from 08h to 22h local time.
pub fn demo_courts() -> Vec<Court> {
    DEMO_CATALOG
        .iter()
        .map(|(id, name, sport, cents)| Court {
            id: CourtId((*id).to_string()),
            name: (*name).to_string(),
            sport: (*sport).to_string(),
            hourly_rate: Decimal::new(*cents, 2),
            slots: SlotModel::OperatingHours {
                open_hour: DEMO_OPEN_HOUR,
                close_hour: DEMO_CLOSE_HOUR,
            },
        })
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub inserted: Vec<String>,
    pub already_present: Vec<String>,
}

impl SeedResult {
    pub fn total(&self) -> usize {
        self.inserted.len() + self.already_present.len()
    }
}

/// Inserts the demo courts that are missing. Existing rows, including any
/// operator edits to them, are left untouched.
pub async fn seed_demo_courts(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
    let repo = SqlCourtRepository::new(pool.clone());
    let mut result = SeedResult::default();

    for court in demo_courts() {
        if repo.find_by_id(&court.id).await?.is_some() {
            result.already_present.push(court.name);
            continue;
        }
        let name = court.name.clone();
        repo.save(court).await?;
        result.inserted.push(name);
    }

    tracing::info!(
        event_name = "db.seed_completed",
        inserted = result.inserted.len(),
        already_present = result.already_present.len(),
        "demo court catalog seeded"
    );
    Ok(result)
}
