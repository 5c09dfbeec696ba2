//! Static entity pattern library, compiled once and indexed by `PatternId`.
//!
//! Every regex is compiled case-insensitively. Order in `PATTERN_SPECS` is the
//! pattern id; ids are only stable within one build of the library.

use std::sync::LazyLock;

use regex::Regex;

use super::disambiguate::AmbiguousTerm;
use crate::models::{ClinicalSignificance as Sig, PatternId, QualityDimension, TriggerType};

/// What an entity built from a match looks like.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PatternTemplate {
    Symptom {
        name: &'static str,
        urgency: f32,
        body_site: Option<&'static str>,
    },
    /// Body site from the `site` group, laterality from the `side` group.
    Location,
    /// Like `Location`, for "radiates to my left arm".
    Radiation,
    /// `None` descriptor uses the matched text.
    Quality {
        descriptor: Option<&'static str>,
        dimension: QualityDimension,
    },
    Frequency {
        pattern: &'static str,
        circadian: Option<&'static str>,
    },
    /// Factor from the `factor` group, or the whole match.
    Trigger { trigger_type: TriggerType },
    Ambiguous(AmbiguousTerm),
}

struct PatternSpec {
    regex: &'static str,
    template: PatternTemplate,
    weight: f32,
    specificity: f32,
    significance: Sig,
}

#[derive(Debug)]
pub struct EntityPattern {
    pub id: PatternId,
    pub regex: Regex,
    pub template: PatternTemplate,
    pub weight: f32,
    pub specificity: f32,
    pub significance: Sig,
}

impl EntityPattern {
    /// Overlap-resolution priority.
    pub fn priority(&self) -> f32 {
        self.weight + self.specificity + self.significance.weight()
    }

    /// Generic body-less "pain" that picks up a site from a nearby location.
    pub fn is_generic_pain(&self) -> bool {
        matches!(
            self.template,
            PatternTemplate::Symptom {
                name: "pain",
                body_site: None,
                ..
            }
        )
    }
}

#[derive(Debug)]
pub struct PatternLibrary {
    patterns: Vec<EntityPattern>,
}

impl PatternLibrary {
    fn build() -> Self {
        let patterns = PATTERN_SPECS
            .iter()
            .enumerate()
            .map(|(i, spec)| EntityPattern {
                id: PatternId(i as u16),
                regex: Regex::new(&format!("(?i){}", spec.regex))
                    .expect("invalid entity pattern"),
                template: spec.template,
                weight: spec.weight,
                specificity: spec.specificity,
                significance: spec.significance,
            })
            .collect();
        Self { patterns }
    }

    pub fn get(&self, id: PatternId) -> Option<&EntityPattern> {
        self.patterns.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityPattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

pub static PATTERN_LIBRARY: LazyLock<PatternLibrary> = LazyLock::new(PatternLibrary::build);

const fn symptom(
    regex: &'static str,
    name: &'static str,
    urgency: f32,
    body_site: Option<&'static str>,
    weight: f32,
    specificity: f32,
    significance: Sig,
) -> PatternSpec {
    PatternSpec {
        regex,
        template: PatternTemplate::Symptom {
            name,
            urgency,
            body_site,
        },
        weight,
        specificity,
        significance,
    }
}

const fn quality(
    regex: &'static str,
    descriptor: Option<&'static str>,
    dimension: QualityDimension,
    weight: f32,
    specificity: f32,
    significance: Sig,
) -> PatternSpec {
    PatternSpec {
        regex,
        template: PatternTemplate::Quality {
            descriptor,
            dimension,
        },
        weight,
        specificity,
        significance,
    }
}

const fn frequency(
    regex: &'static str,
    pattern: &'static str,
    circadian: Option<&'static str>,
) -> PatternSpec {
    PatternSpec {
        regex,
        template: PatternTemplate::Frequency { pattern, circadian },
        weight: 0.55,
        specificity: 0.6,
        significance: Sig::Low,
    }
}

const fn trigger(
    regex: &'static str,
    trigger_type: TriggerType,
    weight: f32,
    specificity: f32,
    significance: Sig,
) -> PatternSpec {
    PatternSpec {
        regex,
        template: PatternTemplate::Trigger { trigger_type },
        weight,
        specificity,
        significance,
    }
}

const fn ambiguous(
    regex: &'static str,
    term: AmbiguousTerm,
    weight: f32,
    specificity: f32,
    significance: Sig,
) -> PatternSpec {
    PatternSpec {
        regex,
        template: PatternTemplate::Ambiguous(term),
        weight,
        specificity,
        significance,
    }
}

static PATTERN_SPECS: &[PatternSpec] = &[
    // -- Time-critical presentations --------------------------------------
    symptom(
        r"\bthunderclap headache\b|\bworst headache(?: of my life)?\b|\bsudden (?:severe |splitting )?headache\b",
        "thunderclap headache", 0.95, Some("head"), 0.95, 0.95, Sig::Emergency,
    ),
    symptom(
        r"\b(?:throat|tongue|lips?|face) (?:is |are |feels )?(?:swelling|swollen|closing(?: up)?)\b|\bswollen (?:throat|tongue|lips?)\b",
        "throat swelling", 0.95, Some("throat"), 0.95, 0.95, Sig::Emergency,
    ),
    symptom(
        r"\bnon-?blanching rash\b|\brash (?:that )?(?:doesn'?t|does not|won'?t) fade\b|\bpurple spots\b|\bpinpoint spots\b",
        "non-blanching rash", 0.9, Some("skin"), 0.95, 0.95, Sig::Emergency,
    ),
    symptom(
        r"\b(?:face|mouth) (?:is )?droop(?:ing|y|s)?\b|\bfacial droop\b|\bdroop(?:ing|y) (?:face|mouth)\b",
        "facial droop", 0.95, Some("face"), 0.95, 0.95, Sig::Emergency,
    ),
    symptom(
        r"\bslurred speech\b|\bslurring (?:my )?words\b|\bspeech is slurred\b|\btrouble (?:speaking|talking)\b|\bcan'?t (?:speak|talk) properly\b",
        "slurred speech", 0.95, Some("head"), 0.95, 0.95, Sig::Emergency,
    ),
    symptom(
        r"\b(?:weak(?:ness)?|numb(?:ness)?) (?:on|in) one side\b|\bone side of my (?:body|face) (?:is |feels |went )?(?:weak|numb)\b|\b(?:arm|leg) (?:suddenly )?(?:went|going) (?:numb|weak|dead)\b",
        "one-sided weakness", 0.9, None, 0.95, 0.95, Sig::Emergency,
    ),
    symptom(
        r"\bunconscious\b|\bunresponsive\b|\bwon'?t wake up\b",
        "unresponsiveness", 1.0, None, 0.95, 0.95, Sig::Emergency,
    ),
    symptom(
        r"\bseizures?\b|\bconvuls(?:ion|ions|ing)\b",
        "seizure", 0.9, Some("head"), 0.9, 0.9, Sig::Emergency,
    ),
    symptom(
        r"\bvomit(?:ing|ed) blood\b|\bthrowing up blood\b|\bblood in (?:my )?vomit\b",
        "vomiting blood", 0.9, None, 0.95, 0.95, Sig::Emergency,
    ),
    // -- Cardiorespiratory -------------------------------------------------
    ambiguous(
        r"\bchest (?:pain|pressure|tightness|discomfort|heaviness|hurts|is hurting|feels tight|feels heavy)\b|\bpain in (?:my |the )?chest\b|\btight chest\b",
        AmbiguousTerm::Chest, 0.9, 0.8, Sig::Urgent,
    ),
    symptom(
        r"\bshortness of breath\b|\bbreathless(?:ness)?\b|\bdifficulty breathing\b|\bcan'?t breathe\b|\bstruggling to breathe\b|\bgasping for (?:air|breath)\b",
        "shortness of breath", 0.7, Some("chest"), 0.9, 0.8, Sig::Urgent,
    ),
    symptom(
        r"\bcoughing (?:up )?blood\b|\bblood when I cough\b",
        "coughing blood", 0.8, Some("chest"), 0.9, 0.9, Sig::Urgent,
    ),
    symptom(
        r"\bpalpitations?\b|\bheart (?:is )?(?:racing|pounding|fluttering|skipping beats)\b|\bracing heart\b|\bpounding heart\b",
        "palpitations", 0.5, Some("chest"), 0.85, 0.8, Sig::Moderate,
    ),
    symptom(
        r"\bwheez(?:ing|y|e)\b",
        "wheezing", 0.4, Some("chest"), 0.8, 0.75, Sig::Moderate,
    ),
    symptom(
        r"\bcough(?:ing|s)?\b",
        "cough", 0.2, Some("chest"), 0.8, 0.65, Sig::Low,
    ),
    symptom(
        r"\bsore throat\b|\bthroat (?:hurts|is sore|pain)\b|\bpainful to swallow\b",
        "sore throat", 0.1, Some("throat"), 0.8, 0.75, Sig::Low,
    ),
    symptom(
        r"\brunny nose\b|\bstuffy nose\b|\bblocked nose\b|\b(?:nasal )?congestion\b",
        "nasal congestion", 0.05, Some("nose"), 0.75, 0.7, Sig::Low,
    ),
    symptom(
        r"\bsneez(?:ing|es|e)\b",
        "sneezing", 0.05, Some("nose"), 0.7, 0.7, Sig::Low,
    ),
    symptom(
        r"\bheartburn\b|\bacid reflux\b|\breflux\b|\bindigestion\b|\bsour taste\b",
        "heartburn", 0.1, Some("chest"), 0.8, 0.75, Sig::Low,
    ),
    // -- Neurological ------------------------------------------------------
    symptom(
        r"\bheadaches?\b|\bhead pain\b",
        "headache", 0.3, Some("head"), 0.85, 0.7, Sig::Moderate,
    ),
    symptom(
        r"\bmigraines?\b",
        "migraine", 0.3, Some("head"), 0.8, 0.85, Sig::Moderate,
    ),
    symptom(
        r"\bstiff neck\b|\bneck (?:is )?stiff(?:ness)?\b|\bcan'?t (?:bend|move) my neck\b",
        "neck stiffness", 0.6, Some("neck"), 0.9, 0.85, Sig::Urgent,
    ),
    symptom(
        r"\bsensitiv(?:e|ity) to light\b|\blight hurts my eyes\b|\bphotophobia\b",
        "light sensitivity", 0.3, Some("eyes"), 0.85, 0.8, Sig::Moderate,
    ),
    symptom(
        r"\bconfus(?:ed|ion)\b|\bdisoriented\b|\bnot making sense\b",
        "confusion", 0.7, Some("head"), 0.85, 0.8, Sig::Urgent,
    ),
    symptom(
        r"\bblurr(?:y|ed) vision\b|\bdouble vision\b|\bvision loss\b|\blost (?:my )?vision\b|\bcan'?t see\b",
        "vision changes", 0.6, Some("eyes"), 0.85, 0.8, Sig::Urgent,
    ),
    symptom(
        r"\bfaint(?:ed|ing)?\b|\bsyncope\b|\blost consciousness\b|\bloss of consciousness\b",
        "syncope", 0.75, None, 0.9, 0.85, Sig::Urgent,
    ),
    symptom(
        r"\blight-?headed(?:ness)?\b",
        "lightheadedness", 0.3, Some("head"), 0.8, 0.7, Sig::Moderate,
    ),
    ambiguous(r"\bdizz(?:y|iness)\b", AmbiguousTerm::Dizzy, 0.7, 0.4, Sig::Moderate),
    symptom(
        r"\bnumb(?:ness)?\b",
        "numbness", 0.3, None, 0.75, 0.6, Sig::Moderate,
    ),
    symptom(
        r"\btingl(?:ing|y|es)\b",
        "tingling", 0.2, None, 0.7, 0.6, Sig::Low,
    ),
    // -- Gastrointestinal / genitourinary ---------------------------------
    symptom(
        r"\babdominal (?:pain|cramps?|cramping|discomfort)\b|\bpain in (?:my |the )?abdomen\b|\babdomen (?:hurts|is hurting|pain)\b",
        "abdominal pain", 0.4, Some("abdomen"), 0.85, 0.75, Sig::Moderate,
    ),
    ambiguous(
        r"\bstomach (?:pain|ache|hurts|is hurting|cramps?|cramping|is upset)\b|\bupset stomach\b|\bpain in (?:my |the )?stomach\b",
        AmbiguousTerm::Stomach, 0.75, 0.5, Sig::Moderate,
    ),
    symptom(
        r"\bnause(?:a|ated|ous)\b|\bqueasy\b|\bsick to my stomach\b",
        "nausea", 0.2, None, 0.8, 0.7, Sig::Low,
    ),
    symptom(
        r"\bpersistent vomiting\b|\bcan'?t stop vomiting\b|\bvomiting (?:all day|all night|nonstop|non-stop)\b",
        "persistent vomiting", 0.5, None, 0.85, 0.85, Sig::Urgent,
    ),
    symptom(
        r"\bvomit(?:ing|ed|s)?\b",
        "vomiting", 0.3, None, 0.85, 0.75, Sig::Moderate,
    ),
    symptom(
        r"\bdiarrh(?:ea|oea)\b|\bloose stools?\b|\bwatery stools?\b",
        "diarrhea", 0.2, None, 0.8, 0.7, Sig::Low,
    ),
    symptom(
        r"\bblood in (?:my |the )?stool\b|\bbloody stools?\b|\bblack,? tarry stools?\b|\brectal bleeding\b",
        "blood in stool", 0.7, Some("abdomen"), 0.9, 0.9, Sig::Urgent,
    ),
    symptom(
        r"\bconstipat(?:ed|ion)\b",
        "constipation", 0.1, Some("abdomen"), 0.75, 0.7, Sig::Low,
    ),
    symptom(
        r"\bbloat(?:ed|ing)\b",
        "bloating", 0.05, Some("abdomen"), 0.7, 0.6, Sig::Low,
    ),
    symptom(
        r"\bpainful urination\b|\b(?:burning|pain|hurts) when (?:I )?urinat(?:e|ing)\b|\bdysuria\b",
        "painful urination", 0.2, None, 0.8, 0.8, Sig::Low,
    ),
    symptom(
        r"\bblood in (?:my |the )?urine\b",
        "blood in urine", 0.5, None, 0.85, 0.85, Sig::Urgent,
    ),
    ambiguous(
        r"\b(?:lower |upper )?back (?:pain|ache|hurts|is hurting)\b|\bbackache\b|\bpain in (?:my |the )?(?:lower |upper )?back\b",
        AmbiguousTerm::Back, 0.75, 0.5, Sig::Moderate,
    ),
    // -- Systemic ----------------------------------------------------------
    symptom(
        r"\bhigh fever\b|\b(?:fever|temperature|temp) (?:of |is |was )?(?:10[3-9]|4[0-2])(?:\.\d)?\b",
        "high fever", 0.6, None, 0.9, 0.85, Sig::Urgent,
    ),
    symptom(
        r"\bfevers?\b|\bfebrile\b",
        "fever", 0.4, None, 0.85, 0.7, Sig::Moderate,
    ),
    symptom(
        r"\bshaking chills\b|\bchills\b|\bshivering\b|\brigors\b",
        "chills", 0.2, None, 0.75, 0.65, Sig::Low,
    ),
    ambiguous(r"\b(?:a |the )?cold\b", AmbiguousTerm::Cold, 0.5, 0.3, Sig::Low),
    symptom(
        r"\bcold sweats?\b|\bsweat(?:ing|s|y)?\b|\bdiaphoresis\b|\bclammy\b",
        "sweating", 0.35, None, 0.75, 0.65, Sig::Moderate,
    ),
    symptom(
        r"\bweakness\b|\bfeel(?:ing)? weak\b|\bweak\b",
        "weakness", 0.3, None, 0.7, 0.55, Sig::Moderate,
    ),
    symptom(
        r"\bfatigued?\b|\btired(?:ness)?\b|\bexhaust(?:ed|ion)\b|\bno energy\b|\bworn out\b",
        "fatigue", 0.1, None, 0.7, 0.55, Sig::Low,
    ),
    symptom(
        r"\bweight loss\b|\blosing weight\b",
        "weight loss", 0.2, None, 0.75, 0.7, Sig::Low,
    ),
    symptom(
        r"\banxi(?:ety|ous)\b|\bpanic(?:king| attacks?)?\b|\bstressed out\b",
        "anxiety", 0.1, None, 0.6, 0.5, Sig::Low,
    ),
    // -- Skin / musculoskeletal --------------------------------------------
    symptom(
        r"\bhives\b|\bwelts\b",
        "hives", 0.3, Some("skin"), 0.8, 0.8, Sig::Moderate,
    ),
    symptom(
        r"\brash(?:es)?\b|\bspots on (?:my )?skin\b|\bred spots\b",
        "rash", 0.2, Some("skin"), 0.75, 0.65, Sig::Low,
    ),
    symptom(
        r"\b(?:calf|leg) (?:pain|swelling|is swollen)\b|\bswollen (?:calf|leg|ankles?)\b",
        "leg swelling", 0.4, Some("leg"), 0.8, 0.75, Sig::Moderate,
    ),
    symptom(
        r"\bswell(?:ing|ed)\b|\bswollen\b",
        "swelling", 0.2, None, 0.6, 0.4, Sig::Low,
    ),
    symptom(
        r"\bjoint pain\b|\bjoints? (?:hurt|ache|are sore)\b",
        "joint pain", 0.1, Some("joints"), 0.75, 0.7, Sig::Low,
    ),
    symptom(
        r"\bmuscle (?:aches?|pains?)\b|\bbody aches?\b|\baching all over\b",
        "body aches", 0.1, None, 0.75, 0.7, Sig::Low,
    ),
    symptom(
        r"\bpain(?:s|ful)?\b|\baches?\b|\bhurts?\b|\bhurting\b|\bsore(?:ness)?\b",
        "pain", 0.2, None, 0.5, 0.2, Sig::Low,
    ),
    // -- Anatomy -----------------------------------------------------------
    PatternSpec {
        regex: r"\b(?:radiat(?:es|ing)|spread(?:s|ing)?|goes|going|shoots?|shooting|moves?|travels?) (?:to|into|down|up|through)(?: to)? (?:my |the )?(?:(?P<side>left|right|both) )?(?P<site>arms?|shoulders?|jaw|neck|back|legs?|side|groin|teeth)\b",
        template: PatternTemplate::Radiation,
        weight: 0.75,
        specificity: 0.85,
        significance: Sig::Moderate,
    },
    PatternSpec {
        regex: r"\b(?:(?P<side>left|right|both) )?(?P<site>arms?|shoulders?|jaw|neck|legs?|knees?|hips?|foot|feet|hands?|side|flank|eyes?|ears?|throat|head|abdomen|calf|calves|wrists?|elbows?|ankles?|groin|ribs?|teeth|tooth)\b",
        template: PatternTemplate::Location,
        weight: 0.6,
        specificity: 0.5,
        significance: Sig::Low,
    },
    // -- Qualities ---------------------------------------------------------
    quality(
        r"\b(?:crushing|squeezing|tearing|ripping|vise-like|like an elephant)\b",
        None, QualityDimension::Character, 0.7, 0.75, Sig::Urgent,
    ),
    quality(
        r"\b(?:pressure|tightness|heaviness|heavy|tight|pressing)\b",
        None, QualityDimension::Character, 0.65, 0.6, Sig::Moderate,
    ),
    quality(
        r"\b(?:sharp|stabbing|dull|burning|throbbing|pounding|cramping|shooting|gnawing|colicky|aching)\b",
        None, QualityDimension::Character, 0.6, 0.6, Sig::Low,
    ),
    quality(
        r"\b(?:excruciating|unbearable|agonizing|worst pain)\b",
        None, QualityDimension::Severity, 0.7, 0.7, Sig::Urgent,
    ),
    quality(
        r"\b(?:severe|severely|terrible|horrible|intense|really bad|very bad)\b",
        None, QualityDimension::Severity, 0.6, 0.6, Sig::Moderate,
    ),
    quality(
        r"\b(?:moderate|moderately)\b",
        None, QualityDimension::Severity, 0.55, 0.6, Sig::Low,
    ),
    quality(
        r"\b(?:mild|mildly|slight|slightly)\b",
        None, QualityDimension::Severity, 0.55, 0.6, Sig::Low,
    ),
    quality(
        r"\b(?:[89]|10)\s*(?:/|out of)\s*10\b",
        None, QualityDimension::Severity, 0.75, 0.9, Sig::Urgent,
    ),
    quality(
        r"\b[5-7]\s*(?:/|out of)\s*10\b",
        None, QualityDimension::Severity, 0.75, 0.9, Sig::Moderate,
    ),
    quality(
        r"\b[0-4]\s*(?:/|out of)\s*10\b",
        None, QualityDimension::Severity, 0.75, 0.9, Sig::Low,
    ),
    quality(
        r"\b(?:sudden(?:ly)?|all of a sudden|out of nowhere|came on (?:fast|quickly|suddenly))\b",
        Some("sudden onset"), QualityDimension::Onset, 0.65, 0.7, Sig::Moderate,
    ),
    quality(
        r"\b(?:gradual(?:ly)?|came on slowly|slowly got worse|over time)\b",
        Some("gradual onset"), QualityDimension::Onset, 0.6, 0.65, Sig::Low,
    ),
    quality(
        r"\b(?:can'?t|unable to|couldn'?t) (?:walk|sleep|work|eat|move|stand|get out of bed|concentrate)\b|\bkeeps? me (?:up|awake) at night\b|\bwo(?:ke|kes) me up\b",
        None, QualityDimension::FunctionalImpact, 0.6, 0.7, Sig::Moderate,
    ),
    // -- Frequency and time of day ----------------------------------------
    frequency(
        r"\b(?:constant(?:ly)?|all the time|non-?stop|continuous(?:ly)?|never goes away|doesn'?t go away)\b",
        "constant", None,
    ),
    frequency(
        r"\b(?:comes and goes|on and off|off and on|intermittent(?:ly)?|every now and then|sometimes|occasionally|episodes?)\b",
        "intermittent", None,
    ),
    frequency(
        r"\b(?:every day|daily|several times a day|(?:once|twice|\d+ times) a (?:day|week))\b",
        "daily", None,
    ),
    frequency(
        r"\b(?:in the morning|mornings|every morning|when I wake up|on waking)\b",
        "recurring", Some("morning"),
    ),
    frequency(
        r"\b(?:at night|nights|every night|nighttime|overnight)\b",
        "recurring", Some("night"),
    ),
    frequency(
        r"\b(?:in the evening|evenings|every evening)\b",
        "recurring", Some("evening"),
    ),
    // -- Triggers ----------------------------------------------------------
    trigger(
        r"\b(?:when|after|on|while) (?:I )?(?P<factor>stand(?:ing)? up|standing|stand|lying down|lie down|lay down|bend(?:ing)?(?: over)?|turn(?:ing)? my head|sit(?:ting)? up|get(?:ting)? up|roll(?:ing)? over|mov(?:e|ing) my (?:head|neck))\b",
        TriggerType::Positional, 0.65, 0.7, Sig::Low,
    ),
    trigger(
        r"\b(?:when|after|while|with|during|on) (?:I'?m |I am |I )?(?P<factor>walk(?:ing)?|climb(?:ing)?(?: (?:the )?stairs)?|(?:going |walking )?up (?:the )?stairs|(?:the )?stairs|exercis(?:e|ing)|running|run|exertion|physical activity|lift(?:ing)?(?: heavy things)?|carry(?:ing)?|working out|work out)\b",
        TriggerType::Exertional, 0.7, 0.75, Sig::Moderate,
    ),
    trigger(
        r"\b(?:better|goes away|eases|improves|relieved|stops|settles)\b[^.;]{0,20}?\b(?:with|when|after|if) (?:I )?(?P<factor>rest(?:ing)?|sit(?:ting)? down|stop(?:ping)?|lie still|lying still|antacids?|medication|ibuprofen|tylenol|paracetamol|aspirin)\b",
        TriggerType::Relieving, 0.65, 0.75, Sig::Low,
    ),
    trigger(
        r"\b(?P<factor>rest)(?:ing)? (?:helps|makes it better)\b",
        TriggerType::Relieving, 0.65, 0.7, Sig::Low,
    ),
    trigger(
        r"\b(?:after|since) (?:a |the )?(?P<factor>bee sting|wasp sting|insect bite|eating (?:peanuts?|nuts|shellfish|seafood)|taking (?:penicillin|amoxicillin|a new (?:medication|medicine|pill)))\b",
        TriggerType::Environmental, 0.75, 0.8, Sig::Moderate,
    ),
    trigger(
        r"\b(?:around|near|exposed to|after being around|from) (?P<factor>cats?|dogs?|pollen|dust|smoke|mold|cold air|perfume|grass)\b",
        TriggerType::Environmental, 0.6, 0.65, Sig::Low,
    ),
    trigger(
        r"\b(?:after|when|while|with) (?:I )?(?P<factor>eat(?:ing)?(?: (?:fatty|spicy|greasy|rich|big) (?:food|foods|meals?))?|(?:fatty|spicy|greasy|rich|big) (?:food|foods|meals?)|meals?|drinking (?:alcohol|coffee|milk)|dairy|milk|coffee|alcohol|food|lunch|dinner|breakfast)\b",
        TriggerType::Dietary, 0.65, 0.7, Sig::Low,
    ),
    trigger(
        r"\b(?:when|after|with|during) (?:I'?m |I am |I get |I feel )?(?P<factor>stress(?:ed)?|anxious|upset|worried|nervous|under pressure)\b",
        TriggerType::Emotional, 0.6, 0.65, Sig::Low,
    ),
    trigger(
        r"\b(?P<factor>stress)(?:ed|ful)?\b",
        TriggerType::Emotional, 0.55, 0.5, Sig::Low,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_compiles_and_ids_match_positions() {
        assert!(!PATTERN_LIBRARY.is_empty());
        for (i, pattern) in PATTERN_LIBRARY.iter().enumerate() {
            assert_eq!(pattern.id, PatternId(i as u16));
            assert_eq!(
                PATTERN_LIBRARY.get(pattern.id).map(|p| p.id),
                Some(pattern.id)
            );
        }
    }

    #[test]
    fn weights_within_unit_interval() {
        for pattern in PATTERN_LIBRARY.iter() {
            assert!((0.0..=1.0).contains(&pattern.weight), "{:?}", pattern.regex);
            assert!((0.0..=1.0).contains(&pattern.specificity), "{:?}", pattern.regex);
            if let PatternTemplate::Symptom { urgency, .. } = pattern.template {
                assert!((0.0..=1.0).contains(&urgency));
            }
        }
    }

    #[test]
    fn anatomy_patterns_expose_named_groups() {
        for pattern in PATTERN_LIBRARY.iter() {
            let names: Vec<_> = pattern.regex.capture_names().flatten().collect();
            match pattern.template {
                PatternTemplate::Location | PatternTemplate::Radiation => {
                    assert!(names.contains(&"site"));
                    assert!(names.contains(&"side"));
                }
                PatternTemplate::Trigger { .. } => assert!(names.contains(&"factor")),
                _ => {}
            }
        }
    }

    #[test]
    fn specific_pattern_outranks_generic() {
        let lib = &*PATTERN_LIBRARY;
        let find = |text: &str| {
            lib.iter()
                .filter(|p| p.regex.find(text).is_some_and(|m| m.as_str() == text))
                .map(|p| p.priority())
                .fold(f32::MIN, f32::max)
        };
        assert!(find("persistent vomiting") > find("vomiting"));
        assert!(find("thunderclap headache") > find("headache"));
    }
}
