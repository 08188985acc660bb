use super::domain::{ApplicantProgress, OrganizationalUnit, ProgressStatus, Stage, StageStatus};

/// Why the gate refused a write. Surfaced to the end user as "can't do
/// that right now"; never used as control flow elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateRefusal {
    #[error("unit is not running the {} stage", .requested.label())]
    StageMismatch {
        requested: Stage,
        current: Option<Stage>,
    },
    #[error("the {} stage is not open ({})", .stage.label(), .status.label())]
    StageClosed { stage: Stage, status: StageStatus },
    #[error("a submission for this stage already exists")]
    AlreadySubmitted,
}

/// Decide whether an applicant write (submit, upload, book) is currently
/// permitted. Pure and side-effect-free; every write path re-checks this
/// inside its own transaction.
///
/// Rules apply in order: stage mismatch, stage not open, then existing
/// submission. Once progress reaches submitted or approved the refusal is
/// permanent regardless of later stage changes on the unit.
pub fn can_write(
    unit: &OrganizationalUnit,
    stage: Stage,
    progress: Option<&ApplicantProgress>,
) -> Result<(), GateRefusal> {
    if unit.current_stage != Some(stage) {
        return Err(GateRefusal::StageMismatch {
            requested: stage,
            current: unit.current_stage,
        });
    }

    if unit.stage_status != StageStatus::Open {
        return Err(GateRefusal::StageClosed {
            stage,
            status: unit.stage_status,
        });
    }

    if let Some(progress) = progress {
        if matches!(
            progress.status,
            ProgressStatus::Submitted | ProgressStatus::Approved
        ) {
            return Err(GateRefusal::AlreadySubmitted);
        }
    }

    Ok(())
}
