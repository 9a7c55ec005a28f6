//! The registration forms shipped with the application.

use crate::errors::SystemError;
use crate::forms::*;
use crate::models::Perk;
use crate::rules::Pattern;

pub const HACKATHON: &str = "hackathon";
pub const CTF: &str = "ctf";
pub const GRADUATION_PROJECT: &str = "graduation-project";
pub const PRE_GRADUATION: &str = "pre-graduation";
pub const SCHOOL_PROJECT: &str = "school-project";
pub const SPAGHETTI_BRIDGE: &str = "spaghetti-bridge";
pub const TECHNICAL_SUBMISSION: &str = "technical-submission";

pub const UNIVERSITIES: &[&str] = &[
    "Aswan University",
    "AAST Aswan",
    "Luxor University",
    "South Valley University",
    "Azhar University",
    "Sohag University",
    "Assiut University",
    "Minia University",
    "Beni Suef University",
    "Nahda University in Beni Suef",
    "Sphinx University in Assiut",
    "Deraya University in minia",
    "Al-Tod Institute of Engineering",
    "Sohag Institute of Engineering",
];

const PROJECT_CATEGORIES: &[&str] = &[
    "Power and Green Environment",
    "Civil Engineering",
    "Architecture Engineering",
    "Information and Communications Technology",
    OTHER,
];

const SCHOOL_CATEGORIES: &[&str] = &[
    "Power and Green Environment",
    "Information and Communications Technology",
    OTHER,
];

// Categories whose projects are not split into tracks.
const TRACKLESS_CATEGORIES: &[&str] = &["Civil Engineering", "Architecture Engineering"];

// Pre-graduation entries only pick a track in these categories.
const TRACKED_CATEGORIES: &[&str] = &[
    "Information and Communications Technology",
    "Power and Green Environment",
];

const STUDY_YEARS: &[&str] = &["Prep", "1", "2", "3", "4", "5"];

const EDUCATIONAL_LEVELS: &[&str] = &["Primary", "Preparatory", "Secondary"];

const REFERRAL_SOURCES: &[&str] = &[
    "Facebook",
    "Instagram",
    "LinkedIn",
    "Friend",
    "Community Partner",
    OTHER,
];

const DECK_EXTENSIONS: &[&str] = &["ppt", "pptx", "pdf"];
const DECK_MIME_TYPES: &[&str] = &[
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/pdf",
];

const PROPOSAL_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];
const PROPOSAL_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

pub fn builtin() -> Result<Vec<FormDefinition>, SystemError> {
    Ok(vec![
        hackathon()?,
        ctf()?,
        graduation_project()?,
        pre_graduation()?,
        school_project()?,
        spaghetti_bridge()?,
        technical_submission()?,
    ])
}

fn invalid(id: &str) -> impl FnOnce(FormDefinitionBuilderError) -> SystemError + '_ {
    move |err| SystemError::InvalidFormDefinition(id.to_string(), err.to_string())
}

// Team competitions keep their leader apart from the member list and key
// members from zero, e.g. `member0FullName`, `leaderWhatsapp`.
fn team_competition_keys() -> KeyStyle {
    KeyStyle {
        index_base: 0,
        member: FieldLabels::new("member")
            .full_name("FullName")
            .phone("Whatsapp"),
        leader: FieldLabels::new("leader")
            .full_name("FullName")
            .phone("Whatsapp"),
        supervisor: FieldLabels::new("supervisor"),
    }
}

fn organization_name<S: Into<String>>(name: S) -> FieldSpec {
    FieldSpec::new(name, TextRule::matching(Pattern::OrganizationName).min_len(3))
}

fn other_companion(name: &str, select: &str) -> FieldSpec {
    FieldSpec::required(name).when(Condition::other_selected(select))
}

fn prototype_dimensions() -> [FieldSpec; 2] {
    [
        FieldSpec::new("hasPrototype", TextRule::present().optional()),
        FieldSpec::required("prototypeDimensions").when(Condition::Checked {
            field: "hasPrototype".to_string(),
        }),
    ]
}

fn hackathon() -> Result<FormDefinition, SystemError> {
    FormDefinitionBuilder::default()
        .id(HACKATHON)
        .title("AI Hackathon")
        .fields(vec![
            organization_name("teamName"),
            organization_name("university"),
            FieldSpec::new("ideaSummary", TextRule::present().min_len(50)),
        ])
        .leader(ParticipantRules::standard(Pattern::LoosePersonName))
        .members(MemberPolicy {
            min: 0,
            max: 2,
            initial: 0,
            rules: ParticipantRules::standard(Pattern::LoosePersonName),
        })
        .attachment(
            FileRule::new("pitchDeck", 10 * FileRule::MB)
                .extensions(DECK_EXTENSIONS)
                .mime_types(DECK_MIME_TYPES),
        )
        .perks(vec![Perk::Accommodation])
        .key_style(team_competition_keys())
        .build()
        .map_err(invalid(HACKATHON))
}

fn ctf() -> Result<FormDefinition, SystemError> {
    FormDefinitionBuilder::default()
        .id(CTF)
        .title("Capture The Flag")
        .fields(vec![
            organization_name("teamName"),
            organization_name("universityName"),
        ])
        .leader(ParticipantRules::standard(Pattern::LoosePersonName))
        .members(MemberPolicy {
            min: 0,
            max: 2,
            initial: 0,
            rules: ParticipantRules::standard(Pattern::LoosePersonName),
        })
        .perks(vec![Perk::Accommodation])
        .key_style(team_competition_keys())
        .build()
        .map_err(invalid(CTF))
}

fn graduation_project() -> Result<FormDefinition, SystemError> {
    let mut fields = vec![
        FieldSpec::new("projectTitle", TextRule::matching(Pattern::PersonName)),
        FieldSpec::select("projectCategory", PROJECT_CATEGORIES)
            .clears(&["projectTrack", "otherTrack"]),
        other_companion("otherCategory", "projectCategory"),
        FieldSpec::required("projectTrack").when(Condition::NoneOf {
            field: "projectCategory".to_string(),
            values: TRACKLESS_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }),
        other_companion("otherTrack", "projectTrack"),
    ];
    fields.extend(prototype_dimensions());
    fields.extend([
        FieldSpec::required("projectAbstract"),
        FieldSpec::required("university"),
        FieldSpec::required("faculty"),
    ]);

    FormDefinitionBuilder::default()
        .id(GRADUATION_PROJECT)
        .title("Graduation Projects")
        .fields(fields)
        .members(MemberPolicy {
            min: 2,
            max: 7,
            initial: 2,
            rules: ParticipantRules::standard(Pattern::PersonName),
        })
        .attachment(
            FileRule::new("projectProposal", 25 * FileRule::MB)
                .extensions(PROPOSAL_EXTENSIONS)
                .mime_types(PROPOSAL_MIME_TYPES),
        )
        .perks(vec![Perk::Accommodation, Perk::Lunch])
        .build()
        .map_err(invalid(GRADUATION_PROJECT))
}

fn pre_graduation() -> Result<FormDefinition, SystemError> {
    let tracked = |field: &str| Condition::OneOf {
        field: field.to_string(),
        values: TRACKED_CATEGORIES.iter().map(|c| c.to_string()).collect(),
    };

    let mut fields = vec![
        FieldSpec::new("projectTitle", TextRule::present().min_len(3)),
        FieldSpec::select("projectCategory", PROJECT_CATEGORIES)
            .clears(&["projectTrack", "otherTrack"]),
        other_companion("otherCategory", "projectCategory"),
        FieldSpec::required("projectTrack").when(tracked("projectCategory")),
        FieldSpec::required("otherTrack").when(Condition::All {
            conditions: vec![
                tracked("projectCategory"),
                Condition::other_selected("projectTrack"),
            ],
        }),
    ];
    fields.extend(prototype_dimensions());
    fields.extend([
        FieldSpec::new("projectAbstract", TextRule::present().min_len(5)),
        FieldSpec::required("educationalAdministration"),
        FieldSpec::required("faculty"),
        FieldSpec::select("year", STUDY_YEARS),
    ]);

    FormDefinitionBuilder::default()
        .id(PRE_GRADUATION)
        .title("Pre-Graduation Projects")
        .fields(fields)
        .leader(ParticipantRules::contact())
        .members(MemberPolicy {
            min: 2,
            max: 7,
            initial: 2,
            rules: ParticipantRules::standard(Pattern::PersonName),
        })
        .attachment(
            FileRule::new("projectProposal", 100 * FileRule::MB)
                .extensions(PROPOSAL_EXTENSIONS)
                .mime_types(PROPOSAL_MIME_TYPES),
        )
        .perks(vec![Perk::Accommodation, Perk::Lunch])
        .build()
        .map_err(invalid(PRE_GRADUATION))
}

fn school_project() -> Result<FormDefinition, SystemError> {
    let mut fields = vec![
        FieldSpec::new("projectTitle", TextRule::matching(Pattern::PersonName)),
        FieldSpec::select("projectCategory", SCHOOL_CATEGORIES),
        FieldSpec::new("otherCategory", TextRule::matching(Pattern::PersonName))
            .when(Condition::other_selected("projectCategory")),
    ];
    fields.extend(prototype_dimensions());
    fields.extend([
        FieldSpec::required("projectAbstract"),
        FieldSpec::select("educationalLevel", EDUCATIONAL_LEVELS),
        FieldSpec::required("educationalAdministration"),
        FieldSpec::required("schoolName"),
    ]);

    FormDefinitionBuilder::default()
        .id(SCHOOL_PROJECT)
        .title("School Projects")
        .fields(fields)
        .supervisor(ParticipantRules::standard(Pattern::PersonName))
        .members(MemberPolicy {
            min: 1,
            max: 5,
            initial: 1,
            rules: ParticipantRules::standard(Pattern::PersonName),
        })
        .attachment(
            FileRule::new("projectProposal", 25 * FileRule::MB)
                .extensions(PROPOSAL_EXTENSIONS)
                .mime_types(PROPOSAL_MIME_TYPES),
        )
        .perks(vec![Perk::Accommodation, Perk::Lunch])
        .build()
        .map_err(invalid(SCHOOL_PROJECT))
}

fn spaghetti_bridge() -> Result<FormDefinition, SystemError> {
    let universities: Vec<&str> = UNIVERSITIES.iter().copied().chain([OTHER]).collect();

    FormDefinitionBuilder::default()
        .id(SPAGHETTI_BRIDGE)
        .title("Spaghetti Bridge Competition")
        .fields(vec![
            FieldSpec::new("teamName", TextRule::present().min_len(3)),
            FieldSpec::select("university", &universities),
            other_companion("otherUniversity", "university"),
            FieldSpec::new("faculty", TextRule::present().min_len(3)),
            FieldSpec::select("howDidYouKnow", REFERRAL_SOURCES),
            FieldSpec::required("communityPartner").when(Condition::Equals {
                field: "howDidYouKnow".to_string(),
                value: "Community Partner".to_string(),
            }),
        ])
        .members(MemberPolicy {
            min: 1,
            max: 5,
            initial: 1,
            rules: ParticipantRules::standard(Pattern::PersonName),
        })
        .build()
        .map_err(invalid(SPAGHETTI_BRIDGE))
}

fn technical_submission() -> Result<FormDefinition, SystemError> {
    let mut fields = vec![
        // Collected but never checked.
        FieldSpec::new("projectTitle", TextRule::present().optional()),
        FieldSpec::select("projectCategory", SCHOOL_CATEGORIES),
        FieldSpec::new("otherCategory", TextRule::matching(Pattern::PersonName))
            .when(Condition::other_selected("projectCategory")),
    ];
    fields.extend(prototype_dimensions());
    fields.extend([
        FieldSpec::new("projectAbstract", TextRule::present().min_len(5)),
        FieldSpec::required("educationalAdministration"),
        FieldSpec::new("school", TextRule::matching(Pattern::PersonName)),
    ]);

    let mut supervisor = ParticipantRules::standard(Pattern::PersonName);
    supervisor.email = Some(TextRule::matching(Pattern::Email).optional());

    FormDefinitionBuilder::default()
        .id(TECHNICAL_SUBMISSION)
        .title("Technical Submission")
        .fields(fields)
        .leader(ParticipantRules::contact())
        .supervisor(supervisor)
        .members(MemberPolicy {
            min: 1,
            max: 5,
            initial: 1,
            rules: ParticipantRules::standard(Pattern::PersonName),
        })
        .perks(vec![Perk::Accommodation])
        .build()
        .map_err(invalid(TECHNICAL_SUBMISSION))
}
