use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use clap::Args;

use admission_flow::error::AppError;
use admission_flow::workflows::selection::domain::{
    ApplicantId, ReviewerId, Stage, StageStatus,
};
use admission_flow::workflows::selection::ledger::{ReviewDecision, SubmissionIntent};
use admission_flow::workflows::selection::repository::{ApplicantNotice, Notifier, NotifyError};
use admission_flow::workflows::selection::schedule::SlotDraft;
use admission_flow::workflows::selection::template::{
    AnswerSet, AnswerValue, Question, QuestionKind,
};
use admission_flow::workflows::selection::{
    CapacityScheduler, InMemoryDraftStore, ScheduleError, StageOrchestrator, SubmissionLedger,
};

use crate::infra::InMemorySelectionStore;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Number of applicants walked through the questionnaire stage
    #[arg(long, default_value_t = 3)]
    pub(crate) applicants: u32,
    /// Seats offered in the demo interview slot
    #[arg(long, default_value_t = 2)]
    pub(crate) seats: u32,
}

#[derive(Default)]
struct CollectedNotices {
    sent: Mutex<Vec<ApplicantNotice>>,
}

impl CollectedNotices {
    fn drain(&self) -> Vec<ApplicantNotice> {
        match self.sent.lock() {
            Ok(mut sent) => std::mem::take(&mut *sent),
            Err(_) => Vec::new(),
        }
    }
}

impl Notifier for CollectedNotices {
    fn notify(&self, notice: ApplicantNotice) -> Result<(), NotifyError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| NotifyError::Transport("notice mutex poisoned".to_string()))?;
        sent.push(notice);
        Ok(())
    }
}

fn demo_questions() -> Vec<Question> {
    vec![
        Question {
            id: "motivation".to_string(),
            text: "Why do you want to join the organization?".to_string(),
            kind: QuestionKind::Text,
            required: true,
            order: 1,
            options: vec![],
            max_length: Some(500),
            min_value: None,
            max_value: None,
        },
        Question {
            id: "track".to_string(),
            text: "Preferred track".to_string(),
            kind: QuestionKind::SingleChoice,
            required: true,
            order: 2,
            options: vec!["design".to_string(), "media".to_string()],
            max_length: None,
            min_value: None,
            max_value: None,
        },
    ]
}

fn demo_answers(applicant: u32) -> AnswerSet {
    let mut answers = AnswerSet::new();
    answers.insert(
        "motivation".to_string(),
        AnswerValue::Text(format!("Applicant {applicant} wants to build things.")),
    );
    let track = if applicant % 2 == 0 { "media" } else { "design" };
    answers.insert(
        "track".to_string(),
        AnswerValue::Choice(track.to_string()),
    );
    answers
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { applicants, seats } = args;

    let store = Arc::new(InMemorySelectionStore::default());
    let drafts = Arc::new(InMemoryDraftStore::new(std::time::Duration::from_secs(
        3600,
    )));
    let notices = Arc::new(CollectedNotices::default());
    let ledger = SubmissionLedger::new(store.clone(), drafts, notices.clone());
    let scheduler = CapacityScheduler::new(store.clone(), notices.clone());
    let orchestrator = StageOrchestrator::new(store);

    println!("Admission selection demo");

    let unit = orchestrator
        .create_unit("Design Faculty".to_string(), Utc::now())
        .map_err(AppError::workflow)?;
    let template = orchestrator
        .publish_template(unit.id, Stage::Questionnaire, demo_questions())
        .map_err(AppError::workflow)?;
    orchestrator
        .set_stage(unit.id, Some(Stage::Questionnaire), StageStatus::Open)
        .map_err(AppError::workflow)?;
    println!(
        "- unit '{}' opened the questionnaire stage (template v{})",
        unit.name, template.version
    );

    let mut tickets = Vec::new();
    for applicant in 1..=applicants {
        let receipt = ledger
            .submit(
                SubmissionIntent {
                    applicant: ApplicantId(i64::from(applicant)),
                    unit: unit.id,
                    stage: Stage::Questionnaire,
                    template_id: template.id,
                    answers: demo_answers(applicant),
                },
                Utc::now(),
            )
            .map_err(AppError::workflow)?;
        tickets.push(receipt.ticket);
    }
    println!("- {applicants} applicant(s) submitted the questionnaire");

    // The head reviewer approves everyone except the last applicant.
    for (index, ticket) in tickets.iter().enumerate() {
        let decision = if index + 1 == tickets.len() && tickets.len() > 1 {
            ReviewDecision::Reject {
                reason: "portfolio incomplete".to_string(),
            }
        } else {
            ReviewDecision::Approve
        };
        ledger
            .resolve(*ticket, decision, ReviewerId(1), None, Utc::now())
            .map_err(AppError::workflow)?;
    }
    println!("- review finished; pending worklist is empty");

    orchestrator
        .set_stage(unit.id, Some(Stage::Interview), StageStatus::Open)
        .map_err(AppError::workflow)?;
    let now = Utc::now();
    let slot = scheduler
        .create_slot(
            SlotDraft {
                unit: unit.id,
                starts_at: now + Duration::days(1),
                ends_at: now + Duration::days(1) + Duration::hours(1),
                max_participants: seats,
                location: Some("Main hall".to_string()),
            },
            ReviewerId(1),
            now,
        )
        .map_err(AppError::workflow)?;
    println!("- interview slot opened with {seats} seat(s)");

    let mut booked = 0_u32;
    for applicant in 1..=applicants {
        match scheduler.book(ApplicantId(i64::from(applicant)), slot.id, Utc::now()) {
            Ok(_) => booked += 1,
            Err(ScheduleError::SlotFull) => {
                println!("- applicant {applicant} found the slot full");
            }
            Err(err) => return Err(AppError::workflow(err)),
        }
    }
    println!("- {booked} booking(s) confirmed, seats never oversold");

    println!("\nNotices emitted during the round:");
    for notice in notices.drain() {
        println!(
            "  - applicant {}: {:?} ({})",
            notice.applicant.0, notice.kind, notice.context
        );
    }

    Ok(())
}
