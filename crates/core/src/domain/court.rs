use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::text::fold;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CourtId(pub String);

/// How a court exposes its bookable hours.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotModel {
    /// Every local hour in `[open_hour, close_hour)` is bookable unless reserved.
    OperatingHours { open_hour: u32, close_hour: u32 },
    /// Legacy catalog entries listing each free slot start explicitly.
    FixedSlots { slots: Vec<DateTime<Utc>> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Court {
    pub id: CourtId,
    pub name: String,
    pub sport: String,
    pub hourly_rate: Decimal,
    pub slots: SlotModel,
}

impl Court {
    /// Matches a folded sport keyword (`futebol`, `volei`, ...) against the sport label.
    pub fn plays(&self, sport_keyword: &str) -> bool {
        fold(&self.sport).contains(sport_keyword)
    }

    pub fn price_for(&self, duration_hours: u32) -> Decimal {
        self.hourly_rate * Decimal::from(duration_hours)
    }

    pub fn summary_line(&self) -> String {
        let hours = match &self.slots {
            SlotModel::OperatingHours { open_hour, close_hour } => {
                format!("{open_hour:02}h–{close_hour:02}h")
            }
            SlotModel::FixedSlots { slots } => format!("{} horários avulsos", slots.len()),
        };
        format!("- {}: {} (R$ {:.2}/hora, {hours})", self.name, self.sport, self.hourly_rate)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{Court, CourtId, SlotModel};

    fn court() -> Court {
        Court {
            id: CourtId("court-2".to_string()),
            name: "Quadra 2 - Futsal".to_string(),
            sport: "Futsal".to_string(),
            hourly_rate: Decimal::new(10_000, 2),
            slots: SlotModel::OperatingHours { open_hour: 8, close_hour: 22 },
        }
    }

    #[test]
    fn price_scales_with_whole_hours() {
        assert_eq!(court().price_for(2), Decimal::new(20_000, 2));
        assert_eq!(format!("{:.2}", court().price_for(2)), "200.00");
    }

    #[test]
    fn sport_matching_is_accent_insensitive() {
        let mut volei = court();
        volei.sport = "Vôlei".to_string();
        assert!(volei.plays("volei"));
        assert!(!volei.plays("futsal"));
    }

    #[test]
    fn summary_line_lists_rate_and_window() {
        assert_eq!(court().summary_line(), "- Quadra 2 - Futsal: Futsal (R$ 100.00/hora, 08h–22h)");
    }
}
