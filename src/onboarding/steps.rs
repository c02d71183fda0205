//! Step descriptors and the fixed per-type flows.

use serde::Serialize;

use super::catalog::{
    AVAILABILITY, EXERCISE_FREQUENCIES, GOAL_TIMELINES, HEALTH_CONCERNS, PAYMENT_METHODS,
    REQUIRED_DOCUMENTS, SESSION_FORMATS, SPECIALIZATIONS, STRESS_LEVELS, WELCOME_DOCUMENTS,
    WELLNESS_GOALS,
};
use super::model::OnboardingType;
use super::rules::{Condition, FieldRule, Rule, StepSchema};

/// Most specializations a coach may list.
pub const MAX_SPECIALIZATIONS: usize = 4;

/// One page of the wizard.
#[derive(Debug, Clone)]
pub struct StepDescriptor {
    pub id: &'static str,
    pub title: &'static str,
    pub applies_to: OnboardingType,
    pub schema: StepSchema,
}

impl StepDescriptor {
    fn new(
        id: &'static str,
        title: &'static str,
        applies_to: OnboardingType,
        fields: Vec<FieldRule>,
    ) -> Self {
        Self {
            id,
            title,
            applies_to,
            schema: StepSchema::new(fields),
        }
    }

    pub fn is_review(&self) -> bool {
        self.id == REVIEW_STEP
    }

    pub fn info(&self, index: usize) -> StepInfo {
        StepInfo {
            index,
            id: self.id,
            title: self.title,
            fields: self.schema.fields.iter().map(|f| f.field).collect(),
        }
    }
}

/// Serializable view of a step for API consumers.
#[derive(Debug, Clone, Serialize)]
pub struct StepInfo {
    pub index: usize,
    pub id: &'static str,
    pub title: &'static str,
    pub fields: Vec<&'static str>,
}

pub const REVIEW_STEP: &str = "review";

/// Ordered, immutable sequence of steps for one onboarding type.
#[derive(Debug, Clone)]
pub struct Flow {
    pub kind: OnboardingType,
    pub steps: Vec<StepDescriptor>,
}

impl Flow {
    pub fn for_type(kind: OnboardingType) -> Self {
        let steps = match kind {
            OnboardingType::Client => client_steps(),
            OnboardingType::Coach => coach_steps(),
        };
        Self { kind, steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn step(&self, index: usize) -> Option<&StepDescriptor> {
        self.steps.get(index)
    }

    /// The step that collects `field`, with its index.
    pub fn owner_of(&self, field: &str) -> Option<(usize, &StepDescriptor)> {
        self.steps
            .iter()
            .enumerate()
            .find(|(_, s)| s.schema.field(field).is_some())
    }

    pub fn field_rule(&self, field: &str) -> Option<&FieldRule> {
        self.owner_of(field).and_then(|(_, s)| s.schema.field(field))
    }
}

fn personal_info(kind: OnboardingType) -> StepDescriptor {
    let mut phone = FieldRule::new("phone", "Phone number");
    if kind == OnboardingType::Coach {
        phone = phone.rule(Rule::Required);
    }
    StepDescriptor::new(
        "personal_info",
        "Personal information",
        kind,
        vec![
            FieldRule::new("firstName", "First name").rule(Rule::Required),
            FieldRule::new("lastName", "Last name").rule(Rule::Required),
            FieldRule::new("email", "Email")
                .rule(Rule::Required)
                .rule(Rule::Email),
            phone.rule(Rule::Phone),
        ],
    )
}

fn agreements() -> Vec<FieldRule> {
    vec![
        FieldRule::new("agreeTerms", "Terms of service").rule(Rule::Checked),
        FieldRule::new("agreePrivacy", "Privacy policy").rule(Rule::Checked),
    ]
}

fn review(kind: OnboardingType) -> StepDescriptor {
    StepDescriptor::new(REVIEW_STEP, "Review & submit", kind, Vec::new())
}

fn client_steps() -> Vec<StepDescriptor> {
    use OnboardingType::Client;
    vec![
        personal_info(Client),
        StepDescriptor::new(
            "health_assessment",
            "Health assessment",
            Client,
            vec![
                FieldRule::new("healthConcerns", "Health concerns")
                    .rule(Rule::Count { min: 1, max: usize::MAX })
                    .rule(Rule::SubsetOf(HEALTH_CONCERNS)),
                FieldRule::new("exerciseFrequency", "Exercise frequency")
                    .rule(Rule::Required)
                    .rule(Rule::OneOf(EXERCISE_FREQUENCIES)),
            ],
        ),
        StepDescriptor::new(
            "wellness_goals",
            "Wellness goals",
            Client,
            vec![
                FieldRule::new("wellnessGoals", "Wellness goals")
                    .rule(Rule::Count { min: 1, max: usize::MAX })
                    .rule(Rule::SubsetOf(WELLNESS_GOALS)),
                FieldRule::new("goalTimeline", "Goal timeline")
                    .rule(Rule::Required)
                    .rule(Rule::OneOf(GOAL_TIMELINES)),
            ],
        ),
        StepDescriptor::new(
            "lifestyle",
            "Lifestyle",
            Client,
            vec![
                FieldRule::new("stressLevel", "Stress level")
                    .rule(Rule::Required)
                    .rule(Rule::OneOf(STRESS_LEVELS)),
                FieldRule::new("sleepHours", "Average hours of sleep")
                    .rule(Rule::Required)
                    .rule(Rule::NumberRange { min: 0.0, max: 24.0 }),
            ],
        ),
        StepDescriptor::new(
            "coach_preferences",
            "Coach preferences",
            Client,
            vec![
                FieldRule::new("sessionFormat", "Preferred session format")
                    .rule(Rule::Required)
                    .rule(Rule::OneOf(SESSION_FORMATS)),
                FieldRule::new("availability", "Availability")
                    .rule(Rule::Count { min: 1, max: usize::MAX })
                    .rule(Rule::SubsetOf(AVAILABILITY)),
            ],
        ),
        StepDescriptor::new("consent", "Consent", Client, agreements()),
        review(Client),
    ]
}

fn coach_steps() -> Vec<StepDescriptor> {
    use OnboardingType::Coach;

    let direct_deposit = || Condition::Equals("paymentMethod", "direct_deposit");

    let mut welcome = vec![
        FieldRule::new("acknowledgedDocuments", "Welcome packet")
            .rule(Rule::ContainsAll(REQUIRED_DOCUMENTS))
            .rule(Rule::SubsetOf(WELCOME_DOCUMENTS)),
    ];
    welcome.extend(agreements());

    vec![
        personal_info(Coach),
        StepDescriptor::new(
            "professional_background",
            "Professional background",
            Coach,
            vec![
                FieldRule::new("yearsExperience", "Years of experience")
                    .rule(Rule::Required)
                    .rule(Rule::NumberRange { min: 0.0, max: 60.0 }),
                FieldRule::new("certifications", "Certifications")
                    .rule(Rule::Count { min: 1, max: usize::MAX }),
                FieldRule::new("bio", "Bio")
                    .rule(Rule::Required)
                    .rule(Rule::MinLength(50)),
            ],
        ),
        StepDescriptor::new(
            "specializations",
            "Specializations",
            Coach,
            vec![
                FieldRule::new("specializations", "Specializations")
                    .rule(Rule::Count { min: 1, max: MAX_SPECIALIZATIONS })
                    .rule(Rule::SubsetOf(SPECIALIZATIONS)),
            ],
        ),
        StepDescriptor::new(
            "session_setup",
            "Sessions & rates",
            Coach,
            vec![
                FieldRule::new("sessionRate", "Session rate")
                    .rule(Rule::Required)
                    .rule(Rule::NumberRange { min: 1.0, max: 1000.0 }),
                FieldRule::new("sessionFormats", "Session formats")
                    .rule(Rule::Count { min: 1, max: usize::MAX })
                    .rule(Rule::SubsetOf(SESSION_FORMATS)),
            ],
        ),
        StepDescriptor::new(
            "banking",
            "Payout details",
            Coach,
            vec![
                FieldRule::new("paymentMethod", "Payment method")
                    .rule(Rule::Required)
                    .rule(Rule::OneOf(PAYMENT_METHODS)),
                FieldRule::new("bankName", "Bank name")
                    .rule(Rule::Required)
                    .when(direct_deposit()),
                FieldRule::new("accountNumber", "Account number")
                    .rule(Rule::Required)
                    .rule(Rule::Digits { min: 4, max: 17 })
                    .when(direct_deposit()),
                FieldRule::new("routingNumber", "Routing number")
                    .rule(Rule::Required)
                    .rule(Rule::Digits { min: 9, max: 9 })
                    .when(direct_deposit()),
                FieldRule::new("accountHolderName", "Account holder name")
                    .rule(Rule::Required)
                    .when(direct_deposit()),
            ],
        ),
        StepDescriptor::new("welcome_packet", "Welcome packet", Coach, welcome),
        review(Coach),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flows_end_with_review() {
        for kind in [OnboardingType::Client, OnboardingType::Coach] {
            let flow = Flow::for_type(kind);
            assert!(flow.step(flow.last_index()).unwrap().is_review());
            assert!(flow.steps.iter().all(|s| s.applies_to == kind));
            // Only the last step is the review step
            assert_eq!(flow.steps.iter().filter(|s| s.is_review()).count(), 1);
        }
    }

    #[test]
    fn step_ids_are_unique_within_flow() {
        for kind in [OnboardingType::Client, OnboardingType::Coach] {
            let flow = Flow::for_type(kind);
            let mut ids: Vec<&str> = flow.steps.iter().map(|s| s.id).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), flow.len());
        }
    }

    #[test]
    fn each_field_has_one_owner() {
        for kind in [OnboardingType::Client, OnboardingType::Coach] {
            let flow = Flow::for_type(kind);
            let mut fields: Vec<&str> = flow
                .steps
                .iter()
                .flat_map(|s| s.schema.fields.iter().map(|f| f.field))
                .collect();
            let total = fields.len();
            fields.sort_unstable();
            fields.dedup();
            // agreeTerms / agreePrivacy appear once per flow
            assert_eq!(fields.len(), total, "{kind} flow has a field owned twice");
        }
    }

    #[test]
    fn owner_lookup() {
        let flow = Flow::for_type(OnboardingType::Coach);
        let (index, step) = flow.owner_of("routingNumber").unwrap();
        assert_eq!(step.id, "banking");
        assert_eq!(index, 4);
        assert_eq!(
            flow.field_rule("specializations").unwrap().max_count(),
            Some(MAX_SPECIALIZATIONS)
        );
        assert!(flow.owner_of("healthConcerns").is_none());
    }

    #[test]
    fn review_step_is_always_valid() {
        let flow = Flow::for_type(OnboardingType::Client);
        let review = flow.step(flow.last_index()).unwrap();
        assert!(review.schema.evaluate(&serde_json::Map::new()).is_valid());
    }
}
