//! Intent taxonomy: weighted trigger patterns and veto patterns per intent.

use std::sync::LazyLock;

use regex::Regex;

use super::IntentKind;

pub(crate) struct IntentPattern {
    pub regex: Regex,
    pub weight: f32,
}

pub(crate) struct IntentRule {
    pub kind: IntentKind,
    pub patterns: Vec<IntentPattern>,
    /// A veto match overlapping a pattern hit cancels that hit.
    pub vetoes: Vec<Regex>,
}

fn rule(kind: IntentKind, patterns: &[(&str, f32)], vetoes: &[&str]) -> IntentRule {
    IntentRule {
        kind,
        patterns: patterns
            .iter()
            .map(|(p, weight)| IntentPattern {
                regex: Regex::new(&format!("(?i){p}")).expect("invalid intent pattern"),
                weight: *weight,
            })
            .collect(),
        vetoes: vetoes
            .iter()
            .map(|v| Regex::new(&format!("(?i){v}")).expect("invalid veto pattern"))
            .collect(),
    }
}

pub(crate) static INTENT_RULES: LazyLock<Vec<IntentRule>> = LazyLock::new(|| {
    vec![
        rule(
            IntentKind::EmergencyConcern,
            &[
                (r"\b(?:911|999|112)\b|\bambulance\b|\bemergency\b", 0.85),
                (r"\b(?:can'?t breathe|cannot breathe|struggling to breathe|choking)\b", 0.9),
                (r"\b(?:heart attack|stroke|dying|going to die|collapsed|unconscious|seizure)\b", 0.85),
                (r"\bworst (?:pain|headache) of my life\b", 0.9),
                (r"\b(?:kill myself|suicid\w*|end my life|overdos\w*)\b", 0.95),
            ],
            &[
                r"\b(?:not an? emergency|no emergency|isn'?t an emergency)\b",
                r"\bhistory of (?:a )?(?:heart attack|stroke|seizures?)\b",
                r"\bhad an? (?:heart attack|stroke|seizure)s? (?:in|years|last|when|as)\b",
                r"\b(?:mother|mom|mum|father|dad|brother|sister|parents?|grand(?:mother|father|ma|pa)|aunt|uncle|siblings?)\b[^.]{0,30}?\b(?:heart attack|stroke)\b",
            ],
        ),
        rule(
            IntentKind::SymptomReporting,
            &[
                (r"\b(?:I have|I've got|I've been having|I am having|I'm having|I feel|I'm feeling|I've had|there is|there's)\b", 0.6),
                (r"\b(?:pain|ache|aches|hurts?|hurting|sore|symptoms?|sick|unwell|nause\w*|vomit\w*|dizz\w*|cough\w*|fever|headache|rash|bleeding|swelling|itch\w*)\b", 0.55),
                (r"\bit(?:'s| is| has) (?:been )?(?:bothering|bugging) me\b", 0.5),
            ],
            &[
                r"\b(?:no|not|without|denies?|don'?t have|never had|haven'?t had) (?:any )?(?:pain|ache|aches|symptoms?|fever|nausea|cough|rash|headache|bleeding|swelling)\b",
                r"\bno other symptoms\b",
            ],
        ),
        rule(
            IntentKind::SeverityAssessment,
            &[
                (r"\b(?:[0-9]|10)\s*(?:/|out of)\s*10\b", 0.85),
                (r"\b(?:mild|moderate|severe|terrible|excruciating|unbearable|worst|really bad|intense)\b", 0.6),
                (r"\b(?:getting worse|worsening|getting better|improving)\b", 0.55),
            ],
            &[],
        ),
        rule(
            IntentKind::FollowUp,
            &[
                (r"\b(?:also|another thing|one more thing|oh and|besides that|in addition|on top of that)\b", 0.55),
                (r"\b(?:still|again|same as before|it came back|since we talked)\b", 0.5),
            ],
            &[],
        ),
        rule(
            IntentKind::DurationReport,
            &[
                (r"\b(?:for|over|past|last) (?:the )?(?:past |last )?(?:\d+|a|an|one|two|three|four|five|six|seven|several|few|a few|couple) (?:of )?(?:minutes?|hours?|days?|weeks?|months?|years?)\b", 0.8),
                (r"\bsince (?:yesterday|last \w+|this morning|monday|tuesday|wednesday|thursday|friday|saturday|sunday|\d)", 0.75),
                (r"\b\w+ (?:minutes?|hours?|days?|weeks?|months?|years?) ago\b", 0.75),
                (r"\b(?:started|began)\b", 0.55),
            ],
            &[],
        ),
        rule(
            IntentKind::LocationReport,
            &[
                (r"\b(?:in|on|around|behind) (?:my|the) (?:\w+ )?(?:head|chest|stomach|abdomen|back|arm|leg|neck|throat|side|knee|foot|hand|shoulder|eye|ear)\b", 0.75),
                (r"\b(?:left|right) (?:side|arm|leg|shoulder|knee|foot|hand|eye|ear)\b", 0.7),
                (r"\b(?:radiat\w+|spreads?|shoots?) (?:to|down|into|up)\b", 0.7),
            ],
            &[],
        ),
        rule(
            IntentKind::TriggerReport,
            &[
                (r"\b(?:worse|better) (?:when|with|after|if|on)\b", 0.8),
                (r"\b(?:when|after|whenever) I (?:eat|walk|climb|stand|lie|bend|exercise|run|lift|cough|breathe)\w*\b", 0.75),
                (r"\b(?:triggered|brought on|sets? it off|makes it (?:worse|better))\b", 0.75),
            ],
            &[],
        ),
        rule(
            IntentKind::MedicationQuery,
            &[
                (r"\b(?:can|should|could) I (?:take|use|stop|keep taking)\b", 0.8),
                (r"\bwhat (?:medicine|medication|pill|dose)\b", 0.8),
                (r"\bis it safe to take\b|\bhow much \w+ can I\b", 0.8),
            ],
            &[],
        ),
        rule(
            IntentKind::MedicationReport,
            &[
                (r"\bI(?:'m| am) (?:taking|on)\b", 0.75),
                (r"\bI take\b|\b(?:took|have been taking|started taking)\b", 0.7),
                (r"\b(?:no|not on any|don'?t take any) (?:regular )?(?:medications?|medicines?|meds)\b", 0.7),
                (r"\b(?:ibuprofen|paracetamol|acetaminophen|tylenol|advil|aspirin|metformin|lisinopril|insulin|antibiotics?|inhaler|statins?|birth control|\w+(?:pril|olol|statin|mycin|cillin|azole))\b", 0.6),
            ],
            &[],
        ),
        rule(
            IntentKind::AllergyReport,
            &[
                (r"\ballerg\w*\b", 0.85),
                (r"\breact(?:ion)? to\b", 0.6),
            ],
            &[],
        ),
        rule(
            IntentKind::MedicalHistoryReport,
            &[
                (r"\b(?:history of|diagnosed with|in the past I had|surgery|operation|hospitali[sz]ed)\b", 0.7),
                (r"\b(?:diabetes|diabetic|hypertension|high blood pressure|asthma|copd|heart disease|cancer|thyroid|kidney disease|epilepsy|depression)\b", 0.7),
                (r"\bno (?:medical|past) (?:history|problems|conditions)\b|\bhealthy otherwise\b|\botherwise healthy\b", 0.7),
            ],
            &[],
        ),
        rule(
            IntentKind::FamilyHistoryReport,
            &[
                (r"\bruns in (?:my|the) family\b|\bfamily history\b", 0.9),
                (r"\bmy (?:mother|mom|mum|father|dad|brother|sister|parents?|grand(?:mother|father|ma|pa)|aunt|uncle|siblings?)\b", 0.6),
            ],
            &[],
        ),
        rule(
            IntentKind::SocialHistoryReport,
            &[
                (r"\b(?:smoke|smoking|smoker|cigarettes?|vape|vaping|alcohol|beers?|glasses of wine|drinks? a (?:week|day)|recreational drugs|cannabis|marijuana)\b", 0.75),
                (r"\b(?:I work (?:as|at|in)|my job|I live (?:alone|with)|exercise regularly|sedentary)\b", 0.65),
            ],
            &[],
        ),
        rule(
            IntentKind::ReassuranceSeeking,
            &[
                (r"\b(?:is (?:it|this) (?:serious|bad|normal|dangerous|something to worry about)|should I (?:be )?(?:worried|concerned)|am I going to be (?:ok|okay|fine)|probably nothing|it'?s (?:probably )?nothing)\b", 0.8),
                (r"\b(?:worried|scared|afraid|anxious|nervous) (?:about|that|it)\b", 0.6),
            ],
            &[],
        ),
        rule(
            IntentKind::Clarification,
            &[
                (r"\b(?:what do you mean|I don'?t understand|can you (?:explain|repeat|rephrase)|what does that mean|pardon)\b", 0.85),
                (r"^\s*(?:what|huh)\s*\??\s*$", 0.7),
            ],
            &[],
        ),
        rule(
            IntentKind::Denial,
            &[
                (r"^\s*(?:no|nope|nah|not really|none|never)\b", 0.85),
                (r"\b(?:I don'?t have|I haven'?t (?:had|noticed)|denies?|no other symptoms|nothing else)\b", 0.7),
            ],
            &[],
        ),
        rule(
            IntentKind::Affirmation,
            &[(r"^\s*(?:yes|yeah|yep|yup|correct|that'?s right|exactly|sure|ok(?:ay)?|I do)\b", 0.8)],
            &[],
        ),
        rule(
            IntentKind::Greeting,
            &[(r"^\s*(?:hi|hello|hey|good (?:morning|afternoon|evening)|greetings)\b", 0.85)],
            &[],
        ),
        rule(
            IntentKind::Gratitude,
            &[(r"\b(?:thank(?:s| you)|appreciate (?:it|that|your help)|cheers)\b", 0.85)],
            &[],
        ),
        rule(
            IntentKind::EndConversation,
            &[(
                r"\b(?:bye|goodbye|that'?s all|that is all|nothing else to add|I'?m done|end (?:the )?(?:conversation|consultation|session)|no more questions|we'?re done)\b",
                0.85,
            )],
            &[],
        ),
    ]
});
