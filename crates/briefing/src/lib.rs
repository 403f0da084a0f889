//! Briefing and review generation on top of `omnibrain-store`.

mod data;
mod generator;
mod narrative;
mod review;

pub use data::{
    BriefingData, BriefingKind, CalendarEventItem, CalendarSection, EmailSection,
    HighPriorityProposal, PriorityItem, ProposalSection,
};
pub use generator::BriefingGenerator;
pub use narrative::NarrativeLlm;
pub use review::{DayStats, EveningSummary, ReviewEngine, WeekStats, WeeklyReview};
