//! Static questionnaire catalogs, one per tier.
//!
//! Catalogs are versioned so stored answers can be traced back to the wording the
//! subject actually saw. Weights are non-negative; the scoring engine clamps the sum
//! to the tier maximum, so a catalog may carry more headroom than its cap.

use serde::Serialize;

use super::domain::TierId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnswerOption {
    pub id: &'static str,
    pub label: &'static str,
    pub weight: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Question {
    pub id: &'static str,
    pub prompt: &'static str,
    pub options: &'static [AnswerOption],
}

impl Question {
    pub fn option(&self, option_id: &str) -> Option<&'static AnswerOption> {
        self.options.iter().find(|option| option.id == option_id)
    }

    pub fn max_weight(&self) -> u8 {
        self.options
            .iter()
            .map(|option| option.weight)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuestionTier {
    pub tier: TierId,
    pub version: &'static str,
    pub title: &'static str,
    pub questions: &'static [Question],
}

impl QuestionTier {
    pub fn question(&self, question_id: &str) -> Option<&'static Question> {
        self.questions
            .iter()
            .find(|question| question.id == question_id)
    }

    /// Highest reachable raw sum before clamping.
    pub fn raw_ceiling(&self) -> u16 {
        self.questions
            .iter()
            .map(|question| u16::from(question.max_weight()))
            .sum()
    }
}

/// Catalog used for the given tier.
pub fn catalog(tier: TierId) -> &'static QuestionTier {
    match tier {
        TierId::Basic => &BASIC,
        TierId::Intermediate => &INTERMEDIATE,
        TierId::Advanced => &ADVANCED,
    }
}

const fn opt(id: &'static str, label: &'static str, weight: u8) -> AnswerOption {
    AnswerOption { id, label, weight }
}

const FREQUENCY: &[AnswerOption] = &[
    opt("not_at_all", "Not at all", 0),
    opt("several_days", "Several days", 1),
    opt("more_than_half", "More than half the days", 2),
    opt("nearly_every_day", "Nearly every day", 3),
];

static BASIC: QuestionTier = QuestionTier {
    tier: TierId::Basic,
    version: "basic-2024.1",
    title: "Initial wellbeing check",
    questions: &[
        Question {
            id: "general_health",
            prompt: "How would you rate your overall health?",
            options: &[
                opt("excellent", "Excellent", 0),
                opt("good", "Good", 1),
                opt("fair", "Fair", 2),
                opt("poor", "Poor", 3),
            ],
        },
        Question {
            id: "sleep_quality",
            prompt: "How often has poor sleep affected your day over the past two weeks?",
            options: FREQUENCY,
        },
        Question {
            id: "low_mood",
            prompt: "How often have you felt down, depressed or hopeless over the past two weeks?",
            options: FREQUENCY,
        },
        Question {
            id: "physical_activity",
            prompt: "How active are you in a typical week?",
            options: &[
                opt("very_active", "150 minutes or more", 0),
                opt("somewhat_active", "Between 60 and 150 minutes", 1),
                opt("rarely_active", "Less than 60 minutes", 2),
                opt("inactive", "No regular activity", 3),
            ],
        },
        Question {
            id: "support_network",
            prompt: "Do you have people you can rely on when you need help?",
            options: &[
                opt("strong", "Yes, several", 0),
                opt("some", "One or two", 1),
                opt("limited", "Rarely", 2),
                opt("none", "No one", 3),
            ],
        },
    ],
};

static INTERMEDIATE: QuestionTier = QuestionTier {
    tier: TierId::Intermediate,
    version: "intermediate-2024.1",
    title: "Follow-up risk review",
    questions: &[
        Question {
            id: "medication_adherence",
            prompt: "How often do you miss prescribed medication?",
            options: &[
                opt("never", "Never or not prescribed", 0),
                opt("occasionally", "Once or twice a month", 1),
                opt("weekly", "Most weeks", 2),
                opt("daily", "Most days", 3),
            ],
        },
        Question {
            id: "symptom_change",
            prompt: "Since your last assessment, have your symptoms changed?",
            options: &[
                opt("improved", "Improved", 0),
                opt("unchanged", "About the same", 1),
                opt("slightly_worse", "Slightly worse", 2),
                opt("much_worse", "Much worse", 3),
            ],
        },
        Question {
            id: "appetite_change",
            prompt: "How often have you had poor appetite or overeating?",
            options: FREQUENCY,
        },
        Question {
            id: "substance_use",
            prompt: "How often do you use alcohol or other substances to cope?",
            options: &[
                opt("never", "Never", 0),
                opt("monthly", "Monthly or less", 1),
                opt("weekly", "Weekly", 2),
                opt("daily", "Daily or almost daily", 3),
            ],
        },
        Question {
            id: "daily_functioning",
            prompt: "How difficult has it been to manage work, home or social life?",
            options: &[
                opt("not_difficult", "Not difficult", 0),
                opt("somewhat", "Somewhat difficult", 1),
                opt("very", "Very difficult", 2),
                opt("extremely", "Extremely difficult", 3),
            ],
        },
        Question {
            id: "appointment_attendance",
            prompt: "Have you missed any scheduled care appointments recently?",
            options: &[
                opt("none_missed", "None missed", 0),
                opt("one_missed", "One", 1),
                opt("two_missed", "Two", 2),
                opt("three_or_more", "Three or more", 3),
            ],
        },
    ],
};

static ADVANCED: QuestionTier = QuestionTier {
    tier: TierId::Advanced,
    version: "advanced-2024.1",
    title: "Comprehensive risk assessment",
    questions: &[
        Question {
            id: "self_harm_thoughts",
            prompt: "Have you had thoughts of harming yourself in the past two weeks?",
            options: &[
                opt("never", "No", 0),
                opt("passing", "Passing thoughts", 2),
                opt("frequent", "Frequent thoughts", 4),
            ],
        },
        Question {
            id: "hospital_visits",
            prompt: "How many emergency or hospital visits have you had in the past three months?",
            options: &[
                opt("none", "None", 0),
                opt("one", "One", 1),
                opt("two", "Two", 2),
                opt("three_or_more", "Three or more", 4),
            ],
        },
        Question {
            id: "chronic_conditions",
            prompt: "How many long-term conditions are you currently managing?",
            options: &[
                opt("none", "None", 0),
                opt("one", "One", 1),
                opt("two", "Two", 2),
                opt("three", "Three", 3),
                opt("four_or_more", "Four or more", 4),
            ],
        },
        Question {
            id: "care_plan_confidence",
            prompt: "How confident are you in following your current care plan?",
            options: &[
                opt("very_confident", "Very confident", 0),
                opt("confident", "Confident", 1),
                opt("unsure", "Unsure", 2),
                opt("not_confident", "Not confident", 3),
            ],
        },
        Question {
            id: "stressful_events",
            prompt: "How many major stressful life events have you had in the past six months?",
            options: &[
                opt("none", "None", 0),
                opt("one", "One", 1),
                opt("two", "Two", 2),
                opt("three", "Three", 3),
                opt("four_or_more", "Four or more", 4),
            ],
        },
        Question {
            id: "social_isolation",
            prompt: "How often do you feel isolated from others?",
            options: FREQUENCY,
        },
        Question {
            id: "caregiver_strain",
            prompt: "If you care for someone else, how much strain does it place on you?",
            options: &[
                opt("not_applicable", "Not a caregiver", 0),
                opt("manageable", "Manageable", 1),
                opt("considerable", "Considerable", 2),
                opt("severe", "Severe", 3),
                opt("overwhelming", "Overwhelming", 4),
            ],
        },
        Question {
            id: "pain_interference",
            prompt: "How much has pain interfered with your daily activities?",
            options: &[
                opt("none", "Not at all", 0),
                opt("a_little", "A little", 1),
                opt("moderately", "Moderately", 2),
                opt("extremely", "Extremely", 3),
            ],
        },
    ],
};
