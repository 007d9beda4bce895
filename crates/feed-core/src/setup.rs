//! Default agent roster for fresh scenarios.

use crate::agent::{Agent, Persona};

/// Builds the stock cast used when a scenario starts from nothing.
pub fn default_roster() -> Vec<Agent> {
    vec![
        Agent::new(
            "Quill_Mara",
            Persona {
                occupation: "freelance writer".to_string(),
                background: "left a newsroom job after a dispute over a spiked story".to_string(),
                character: "sharp-tongued, principled, quick to call out hypocrisy".to_string(),
                interests: "local politics, press freedom, long-form essays".to_string(),
            },
        ),
        Agent::new(
            "Patch_Oren",
            Persona {
                occupation: "maintenance engineer".to_string(),
                background: "keeps the district's aging infrastructure running on scraps".to_string(),
                character: "dry humor, practical, suspicious of grand plans".to_string(),
                interests: "machines, budgets, how things actually get fixed".to_string(),
            },
        ),
        Agent::new(
            "Ember_Liv",
            Persona {
                occupation: "community organizer".to_string(),
                background: "grew up in the tenements she now campaigns for".to_string(),
                character: "warm, relentless, takes every setback personally".to_string(),
                interests: "housing, mutual aid, turning anger into turnout".to_string(),
            },
        ),
    ]
}
