//! Deterministic intent classification over folded words.
//!
//! Rules are evaluated top to bottom and the first match wins. Rules marked
//! `requires_pending` only apply while a quote is outstanding.

use serde::{Deserialize, Serialize};

use crate::text::{contains_phrase, words};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Help,
    Book,
    Confirm,
    Cancel,
    ListMine,
    Availability,
    Farewell,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Help => "help",
            Self::Book => "book",
            Self::Confirm => "confirm",
            Self::Cancel => "cancel",
            Self::ListMine => "list_mine",
            Self::Availability => "availability",
            Self::Farewell => "farewell",
            Self::Unknown => "unknown",
        }
    }
}

const FAREWELL: &[&str] =
    &["tchau", "ate logo", "ate mais", "ate breve", "adeus", "falou", "flw", "bye"];
const AFFIRM: &[&str] = &[
    "sim",
    "s",
    "ok",
    "confirmo",
    "confirmar",
    "confirma",
    "confirmado",
    "aceito",
    "fechado",
    "fechou",
    "beleza",
    "pode ser",
    "isso",
];
const NEGATE: &[&str] = &[
    "nao",
    "n",
    "cancelar",
    "cancela",
    "cancelo",
    "desisto",
    "desmarcar",
    "deixa pra la",
    "esquece",
];
const LIST_MINE: &[&str] = &[
    "minhas reservas",
    "ver reservas",
    "ver minhas",
    "mostrar reservas",
    "quais sao minhas",
    "consultar reservas",
    "consultar",
    "listar",
];
const CANCEL: &[&str] = &["cancelar", "cancela", "cancelo", "desmarcar", "remover reserva"];
const BOOK: &[&str] = &[
    "reservar",
    "fazer reserva",
    "fazer uma reserva",
    "nova reserva",
    "agendar",
    "marcar",
    "alugar",
    "quero uma quadra",
    "quero jogar",
];
const CONFIRM: &[&str] = &["confirmo", "confirmar", "confirma", "pode confirmar"];
const AVAILABILITY: &[&str] = &[
    "disponivel",
    "disponiveis",
    "disponibilidade",
    "horarios livres",
    "horario livre",
    "livres",
    "vagos",
    "que horas",
    "quando posso",
];
const HELP: &[&str] = &["ajuda", "help", "como usar", "o que posso", "comandos", "menu"];
const GREETING: &[&str] =
    &["oi", "ola", "opa", "bom dia", "boa tarde", "boa noite", "hello", "e ai"];

fn any_of(tokens: &[String], phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| contains_phrase(tokens, phrase))
}

struct IntentRule {
    intent: Intent,
    requires_pending: bool,
    matches: fn(&[String]) -> bool,
}

const RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::Farewell,
        requires_pending: false,
        matches: |tokens| any_of(tokens, FAREWELL),
    },
    // "nao confirmo" must not read as an affirmation
    IntentRule {
        intent: Intent::Confirm,
        requires_pending: true,
        matches: |tokens| any_of(tokens, AFFIRM) && !any_of(tokens, NEGATE),
    },
    IntentRule {
        intent: Intent::Cancel,
        requires_pending: true,
        matches: |tokens| any_of(tokens, NEGATE),
    },
    IntentRule {
        intent: Intent::ListMine,
        requires_pending: false,
        matches: |tokens| any_of(tokens, LIST_MINE) && !any_of(tokens, CANCEL),
    },
    IntentRule {
        intent: Intent::Cancel,
        requires_pending: false,
        matches: |tokens| any_of(tokens, CANCEL),
    },
    IntentRule {
        intent: Intent::Book,
        requires_pending: false,
        matches: |tokens| any_of(tokens, BOOK),
    },
    IntentRule {
        intent: Intent::Confirm,
        requires_pending: false,
        matches: |tokens| any_of(tokens, CONFIRM),
    },
    IntentRule {
        intent: Intent::Availability,
        requires_pending: false,
        matches: |tokens| any_of(tokens, AVAILABILITY),
    },
    IntentRule {
        intent: Intent::Help,
        requires_pending: false,
        matches: |tokens| any_of(tokens, HELP),
    },
    IntentRule {
        intent: Intent::Greeting,
        requires_pending: false,
        matches: |tokens| any_of(tokens, GREETING),
    },
];

/// Maps a message to an intent given whether a quote is outstanding.
pub fn classify(text: &str, has_pending: bool) -> Intent {
    let tokens = words(text);
    RULES
        .iter()
        .filter(|rule| has_pending || !rule.requires_pending)
        .find(|rule| (rule.matches)(&tokens))
        .map(|rule| rule.intent)
        .unwrap_or(Intent::Unknown)
}
