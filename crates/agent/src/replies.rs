//! Portuguese reply texts sent back over WhatsApp.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use courtside_core::domain::court::Court;
use courtside_core::domain::negotiation::PendingNegotiation;
use courtside_core::domain::reservation::Reservation;
use courtside_core::errors::{NotFoundKind, ValidationIssue};

pub const SOMETHING_WENT_WRONG: &str =
    "❌ Ops! Algo deu errado. Tente novamente ou digite 'ajuda' para ver as opções disponíveis.";

const MENU: &str = "🏟️ Reservar uma quadra
📋 Consultar suas reservas
❌ Cancelar uma reserva
📅 Ver horários disponíveis";

const BOOKING_EXAMPLE: &str = "Exemplo: \"Quero reservar uma quadra de futebol amanhã às 18h\"";

fn hours_label(hours: u32) -> String {
    if hours == 1 {
        "1 hora".to_string()
    } else {
        format!("{hours} horas")
    }
}

pub fn greeting(display_name: &str) -> String {
    format!(
        "Olá {display_name}! 👋\n\nBem-vindo ao sistema de reservas de quadras!\n\nPosso te ajudar com:\n{MENU}\n\nComo posso te ajudar hoje?"
    )
}

pub fn help() -> String {
    "📋 *Como usar o sistema:*

🏟️ *Para reservar:*
\"Quero reservar uma quadra de futebol amanhã às 18h por 2 horas\"

📅 *Para consultar:*
\"Quais são minhas reservas?\"

❌ *Para cancelar:*
\"Quero cancelar minha reserva de amanhã às 18h\"

📋 *Para ver disponibilidade:*
\"Que horários estão livres hoje?\"

Digite sua solicitação em linguagem natural! 😊"
        .to_string()
}

pub fn farewell() -> String {
    "Até mais! 👋 Quando quiser reservar uma quadra, é só mandar uma mensagem.".to_string()
}

pub fn quote(quote: &PendingNegotiation, offset: FixedOffset) -> String {
    let local = quote.start.with_timezone(&offset);
    format!(
        "💰 *Confirmação de Reserva*

🏟️ Quadra: {}
📅 Data: {}
🕐 Horário: {}
⏰ Duração: {}
💰 Valor/hora: R$ {:.2}
💵 Valor total: R$ {:.2}

Para confirmar, responda: 'confirmo'
Para desistir, responda: 'cancelar'",
        quote.court_name,
        local.format("%d/%m/%Y"),
        local.format("%H:%M"),
        hours_label(quote.duration_hours),
        quote.hourly_rate,
        quote.total_price
    )
}

pub fn clarification(issue: &ValidationIssue) -> String {
    match issue {
        ValidationIssue::MissingDate => format!(
            "📅 Para qual dia você quer reservar?\n\nPode ser 'hoje', 'amanhã' ou uma data como 25/10.\n\n{BOOKING_EXAMPLE}"
        ),
        ValidationIssue::MissingTime => format!(
            "🕐 Que horas você quer começar? Trabalhamos com horas cheias, como 18h ou 19:00.\n\n{BOOKING_EXAMPLE}"
        ),
        ValidationIssue::MissingCourt => {
            "🏟️ Qual quadra ou esporte você prefere? Temos futebol, futsal, vôlei e basquete."
                .to_string()
        }
        ValidationIssue::InvalidHour { hour } => format!(
            "❌ {hour}h não é um horário válido. Informe uma hora entre 0h e 23h, por exemplo: 'amanhã às 19h'."
        ),
        ValidationIssue::NotWholeHour { minute } => format!(
            "❌ As reservas começam sempre em hora cheia (você pediu :{minute:02}). Que tal 19:00 ou 20:00?"
        ),
        ValidationIssue::DurationOutOfBounds { max, .. } => {
            format!("⏰ Cada reserva pode durar de 1 a {max} horas. Por quanto tempo você quer jogar?")
        }
        ValidationIssue::StartInPast => {
            "⌛ Esse horário já passou. Escolha um horário a partir de agora.".to_string()
        }
        ValidationIssue::MisalignedStart => {
            "❌ As reservas começam sempre em hora cheia. Informe um horário como 18h.".to_string()
        }
        ValidationIssue::InvalidDate => {
            "📅 Não reconheci essa data. Use o formato dia/mês, por exemplo 25/10.".to_string()
        }
    }
}

pub fn outside_operating_hours(open_hour: u32, close_hour: u32) -> String {
    format!(
        "🕐 Nossas quadras funcionam das {open_hour:02}h às {close_hour:02}h. Escolha um horário que termine até as {close_hour:02}h."
    )
}

pub fn not_found(kind: &NotFoundKind) -> String {
    match kind {
        NotFoundKind::Court(name) => {
            format!("❌ Não encontrei a quadra '{name}'. Digite 'disponibilidade' para ver as quadras.")
        }
        NotFoundKind::Sport(sport) => {
            format!("❌ Não temos quadra de {sport}. Temos futebol, futsal, vôlei e basquete.")
        }
        NotFoundKind::Reservation(reference) => format!(
            "❌ Não encontrei nenhuma reserva sua para {reference}.\n\nVerifique os dados e tente novamente."
        ),
    }
}

pub fn slot_unavailable(hours: &[DateTime<Utc>], offset: FixedOffset) -> String {
    let taken = hours
        .iter()
        .map(|hour| hour.with_timezone(&offset).format("%d/%m às %H:%M").to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "❌ Esse horário não está mais disponível (ocupado: {taken}).\n\nTente outro horário ou digite 'disponibilidade' para ver horários livres."
    )
}

pub fn reservation_confirmed(reservation: &Reservation, court_name: &str, offset: FixedOffset) -> String {
    let local = reservation.start.with_timezone(&offset);
    format!(
        "✅ Reserva confirmada!\n\n🏟️ {court_name}\n📅 {} às {}\n⏰ {}\n🔖 Código: {}\n\nPara cancelar, envie 'cancelar {}'.",
        local.format("%d/%m/%Y"),
        local.format("%H:%M"),
        hours_label(reservation.duration_hours),
        reservation.id.0,
        reservation.id.0
    )
}

pub fn nothing_to_confirm() -> String {
    format!("🤔 Não há nenhuma reserva aguardando confirmação.\n\n{BOOKING_EXAMPLE}")
}

pub fn negotiation_cancelled() -> String {
    "👍 Tudo bem, descartei esse orçamento. Quando quiser, é só pedir outro horário!".to_string()
}

pub fn nothing_to_cancel() -> String {
    "👍 Não há nada pendente para cancelar.\n\nPara cancelar uma reserva confirmada, informe a data e o horário, por exemplo: \"cancelar amanhã às 18h\"."
        .to_string()
}

pub fn reservation_cancelled(reservation: &Reservation, offset: FixedOffset) -> String {
    let local = reservation.start.with_timezone(&offset);
    format!(
        "✅ Reserva cancelada com sucesso!\n\n📅 Data cancelada: {}\n\nPara fazer uma nova reserva, é só me avisar! 😊",
        local.format("%d/%m às %H:%M")
    )
}

pub fn reservation_list(entries: &[(Reservation, String)], offset: FixedOffset) -> String {
    if entries.is_empty() {
        return format!("📋 Você não tem nenhuma reserva no momento.\n\n{BOOKING_EXAMPLE}");
    }

    let mut reply = String::from("📋 *Suas reservas:*\n\n");
    for (position, (reservation, court_name)) in entries.iter().enumerate() {
        let local = reservation.start.with_timezone(&offset);
        reply.push_str(&format!(
            "{}. 🏟️ {court_name}\n   📅 {}\n   ⏰ {}\n   🔖 {} ({})\n\n",
            position + 1,
            local.format("%d/%m/%Y às %H:%M"),
            hours_label(reservation.duration_hours),
            reservation.id.0,
            reservation.status.as_str()
        ));
    }
    reply.push_str("Para cancelar, digite: 'cancelar [data] às [hora]' ou 'cancelar [código]'");
    reply
}

pub fn availability(date: NaiveDate, report: &[(Court, Vec<u32>)]) -> String {
    if report.is_empty() {
        return "❌ Nenhuma quadra cadastrada no sistema.".to_string();
    }

    let mut reply = format!("📅 *Horários disponíveis em {}:*\n\n", date.format("%d/%m/%Y"));
    for (court, hours) in report {
        reply.push_str(&format!("🏟️ {} (R$ {:.2}/hora)\n", court.name, court.hourly_rate));
        if hours.is_empty() {
            reply.push_str("   Sem horários disponíveis\n\n");
        } else {
            let listed = hours.iter().map(|hour| format!("{hour:02}h")).collect::<Vec<_>>();
            reply.push_str(&format!("   {}\n\n", listed.join(", ")));
        }
    }
    reply.push_str("Para reservar, digite: 'Quero reservar uma quadra de [tipo] [data] às [hora]'");
    reply
}

pub fn not_understood(message: &str) -> String {
    format!(
        "🤔 Não entendi sua solicitação: \"{message}\"\n\nPosso te ajudar com:\n{MENU}\n\nDigite 'ajuda' para ver exemplos de como usar o sistema! 😊"
    )
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone, Utc};
    use rust_decimal::Decimal;

    use courtside_core::domain::court::CourtId;
    use courtside_core::domain::negotiation::{Awaiting, PendingNegotiation};
    use courtside_core::domain::user::PhoneNumber;
    use courtside_core::errors::ValidationIssue;

    use super::{clarification, quote, slot_unavailable};

    fn offset() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).expect("offset")
    }

    #[test]
    fn quote_lists_court_time_duration_and_total() {
        let pending = PendingNegotiation {
            sender: PhoneNumber("+5551999990000".to_string()),
            court_id: CourtId("court-2".to_string()),
            court_name: "Quadra 2 - Futsal".to_string(),
            start: Utc.with_ymd_and_hms(2026, 10, 19, 22, 0, 0).unwrap(),
            duration_hours: 2,
            hourly_rate: Decimal::new(10_000, 2),
            total_price: Decimal::new(20_000, 2),
            awaiting: Awaiting::Confirmation,
            created_at: Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap(),
        };

        let text = quote(&pending, offset());
        assert!(text.contains("Quadra 2 - Futsal"));
        assert!(text.contains("19/10/2026"));
        assert!(text.contains("19:00"));
        assert!(text.contains("2 horas"));
        assert!(text.contains("R$ 100.00"));
        assert!(text.contains("R$ 200.00"));
    }

    #[test]
    fn clarifications_name_what_is_wrong() {
        assert!(clarification(&ValidationIssue::InvalidHour { hour: 25 }).contains("25h"));
        assert!(clarification(&ValidationIssue::MissingTime).contains("Que horas"));
        assert!(clarification(&ValidationIssue::NotWholeHour { minute: 30 }).contains(":30"));
    }

    #[test]
    fn unavailable_slots_are_shown_in_local_time() {
        let hours = [Utc.with_ymd_and_hms(2026, 10, 19, 23, 0, 0).unwrap()];
        assert!(slot_unavailable(&hours, offset()).contains("19/10 às 20:00"));
    }
}
