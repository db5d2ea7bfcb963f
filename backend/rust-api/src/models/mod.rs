use serde::{Deserialize, Serialize};

pub mod answer;
pub mod api;
pub mod question;
pub mod result;
pub mod session;

pub use answer::{Answer, AskedRecord, PersonalizationSource, RenderedOption};
pub use api::*;
pub use question::{CatalogIndex, Question, QuestionOption, QuestionType};
pub use result::{AnswerImpact, AssessmentResult, CourseSummary, DomainStat, ResultNarrative};
pub use session::{Session, SessionMeta, SessionStatus};

/// The six RIASEC interest domains, in the fixed tie-breaking order used
/// throughout selection and aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    #[serde(rename = "R")]
    Realistic,
    #[serde(rename = "I")]
    Investigative,
    #[serde(rename = "A")]
    Artistic,
    #[serde(rename = "S")]
    Social,
    #[serde(rename = "E")]
    Enterprising,
    #[serde(rename = "C")]
    Conventional,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::Realistic,
        Domain::Investigative,
        Domain::Artistic,
        Domain::Social,
        Domain::Enterprising,
        Domain::Conventional,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Domain::Realistic => "R",
            Domain::Investigative => "I",
            Domain::Artistic => "A",
            Domain::Social => "S",
            Domain::Enterprising => "E",
            Domain::Conventional => "C",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Domain::Realistic => "Realistic",
            Domain::Investigative => "Investigative",
            Domain::Artistic => "Artistic",
            Domain::Social => "Social",
            Domain::Enterprising => "Enterprising",
            Domain::Conventional => "Conventional",
        }
    }

    /// Index into the fixed R,I,A,S,E,C order.
    pub fn index(self) -> usize {
        match self {
            Domain::Realistic => 0,
            Domain::Investigative => 1,
            Domain::Artistic => 2,
            Domain::Social => 3,
            Domain::Enterprising => 4,
            Domain::Conventional => 5,
        }
    }

    pub fn from_code(code: &str) -> Option<Domain> {
        match code.trim() {
            "R" => Some(Domain::Realistic),
            "I" => Some(Domain::Investigative),
            "A" => Some(Domain::Artistic),
            "S" => Some(Domain::Social),
            "E" => Some(Domain::Enterprising),
            "C" => Some(Domain::Conventional),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::High => "HIGH",
        }
    }
}

/// Academic stream suggested by the mapping deriver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stream {
    Science,
    Commerce,
    Arts,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Stream::Science => "Science",
            Stream::Commerce => "Commerce",
            Stream::Arts => "Arts",
        }
    }
}
