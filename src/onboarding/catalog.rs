//! Option catalogs for choice fields (id → human label).

use serde::Serialize;

/// A selectable option shown on a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub id: &'static str,
    pub label: &'static str,
}

const fn choice(id: &'static str, label: &'static str) -> Choice {
    Choice { id, label }
}

pub const HEALTH_CONCERNS: &[Choice] = &[
    choice("insomnia", "Sleep difficulties"),
    choice("stress", "Stress & anxiety"),
    choice("weight", "Weight management"),
    choice("digestion", "Digestive issues"),
    choice("fatigue", "Low energy / fatigue"),
    choice("chronic_pain", "Chronic pain"),
    choice("blood_pressure", "High blood pressure"),
    choice("hormonal", "Hormonal balance"),
];

pub const EXERCISE_FREQUENCIES: &[Choice] = &[
    choice("sedentary", "Rarely or never"),
    choice("light", "1-2 times a week"),
    choice("moderate", "3-4 times a week"),
    choice("active", "5-6 times a week"),
    choice("very_active", "Every day"),
];

pub const WELLNESS_GOALS: &[Choice] = &[
    choice("better_sleep", "Sleep better"),
    choice("reduce_stress", "Reduce stress"),
    choice("lose_weight", "Lose weight"),
    choice("build_strength", "Build strength"),
    choice("eat_healthier", "Eat healthier"),
    choice("more_energy", "Have more energy"),
    choice("mindfulness", "Practice mindfulness"),
];

pub const GOAL_TIMELINES: &[Choice] = &[
    choice("one_month", "1 month"),
    choice("three_months", "3 months"),
    choice("six_months", "6 months"),
    choice("one_year", "1 year"),
];

pub const STRESS_LEVELS: &[Choice] = &[
    choice("low", "Low"),
    choice("moderate", "Moderate"),
    choice("high", "High"),
];

pub const SESSION_FORMATS: &[Choice] = &[
    choice("video", "Video call"),
    choice("phone", "Phone call"),
    choice("in_person", "In person"),
    choice("chat", "Text chat"),
];

pub const AVAILABILITY: &[Choice] = &[
    choice("mornings", "Mornings"),
    choice("afternoons", "Afternoons"),
    choice("evenings", "Evenings"),
    choice("weekends", "Weekends"),
];

pub const SPECIALIZATIONS: &[Choice] = &[
    choice("nutrition", "Nutrition"),
    choice("fitness", "Fitness & movement"),
    choice("sleep", "Sleep health"),
    choice("stress_management", "Stress management"),
    choice("weight_management", "Weight management"),
    choice("mindfulness", "Mindfulness & meditation"),
    choice("chronic_conditions", "Chronic conditions"),
    choice("womens_health", "Women's health"),
    choice("gut_health", "Gut health"),
    choice("life_coaching", "Life coaching"),
];

pub const PAYMENT_METHODS: &[Choice] = &[
    choice("direct_deposit", "Direct deposit"),
    choice("check", "Paper check"),
    choice("paypal", "PayPal"),
];

/// Documents in the coach welcome packet.
pub const WELCOME_DOCUMENTS: &[Choice] = &[
    choice("coach_handbook", "Coach Handbook"),
    choice("code_of_conduct", "Code of Conduct"),
    choice("payment_policy", "Payment & Payout Policy"),
    choice("marketing_guide", "Marketing Guide"),
];

/// Welcome documents that must be acknowledged before a coach can finish.
pub const REQUIRED_DOCUMENTS: &[&str] = &["coach_handbook", "code_of_conduct", "payment_policy"];

/// Look up the label for `id` in `choices`.
pub fn label_for(choices: &[Choice], id: &str) -> Option<&'static str> {
    choices.iter().find(|c| c.id == id).map(|c| c.label)
}
