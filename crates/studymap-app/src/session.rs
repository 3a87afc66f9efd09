use studymap_core::{ChapterSelection, SessionPhase, SyllabusData, SyllabusError};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Syllabus(#[from] SyllabusError),
    #[error("No syllabus submitted")]
    NoSyllabus,
    #[error("Content for {0:?} is still being generated")]
    Busy(String),
}

/// Handed out when a chapter starts generating; only the newest one can
/// finish the phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTicket {
    pub selection: ChapterSelection,
    generation: u64,
}

/// Input → selection → generating → visualizing.
#[derive(Debug, Default)]
pub struct Session {
    phase: SessionPhase,
    syllabus: Option<SyllabusData>,
    selection: Option<ChapterSelection>,
    generation: u64,
}

impl Session {
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn syllabus(&self) -> Option<&SyllabusData> {
        self.syllabus.as_ref()
    }

    pub fn selection(&self) -> Option<&ChapterSelection> {
        self.selection.as_ref()
    }

    /// Store the validated syllabus and move to chapter selection.
    pub fn submit_syllabus(&mut self, data: &SyllabusData) -> Result<&SyllabusData, SessionError> {
        if let SessionPhase::Generating = self.phase {
            return Err(self.busy());
        }
        let validated = data.validated()?;
        self.selection = None;
        self.set_phase(SessionPhase::Selection);
        Ok(self.syllabus.insert(validated))
    }

    pub fn begin_chapter(
        &mut self,
        subject_index: usize,
        chapter_index: usize,
    ) -> Result<GenerationTicket, SessionError> {
        if let SessionPhase::Generating = self.phase {
            return Err(self.busy());
        }
        let syllabus = self.syllabus.as_ref().ok_or(SessionError::NoSyllabus)?;
        let selection = syllabus.select_chapter(subject_index, chapter_index)?;

        self.generation += 1;
        self.selection = Some(selection.clone());
        self.set_phase(SessionPhase::Generating);
        Ok(GenerationTicket {
            selection,
            generation: self.generation,
        })
    }

    /// Close the generating phase. Success moves to visualizing, failure
    /// resets the session. Returns false when the ticket is outdated.
    pub fn finish_generation(&mut self, ticket: &GenerationTicket, succeeded: bool) -> bool {
        if ticket.generation != self.generation || self.phase != SessionPhase::Generating {
            debug!(topic = %ticket.selection.topic(), "dropping outdated generation result");
            return false;
        }
        if succeeded {
            self.set_phase(SessionPhase::Visualizing);
        } else {
            self.reset();
        }
        true
    }

    /// Jump straight to visualizing a chapter, skipping generation.
    pub fn seeded(&mut self, selection: ChapterSelection) {
        self.generation += 1;
        self.selection = Some(selection);
        self.set_phase(SessionPhase::Visualizing);
    }

    pub fn reset(&mut self) {
        self.generation += 1;
        self.syllabus = None;
        self.selection = None;
        self.set_phase(SessionPhase::Input);
    }

    fn busy(&self) -> SessionError {
        let topic = self
            .selection
            .as_ref()
            .map(ChapterSelection::topic)
            .unwrap_or_default();
        SessionError::Busy(topic)
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            info!(from = ?self.phase, to = ?phase, "session phase changed");
            self.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selected() -> (Session, GenerationTicket) {
        let mut session = Session::default();
        session
            .submit_syllabus(&SyllabusData::sample())
            .expect("syllabus");
        let ticket = session.begin_chapter(0, 0).expect("chapter");
        (session, ticket)
    }

    #[test]
    fn test_happy_path_phases() {
        let mut session = Session::default();
        assert_eq!(session.phase(), SessionPhase::Input);

        session
            .submit_syllabus(&SyllabusData::sample())
            .expect("syllabus");
        assert_eq!(session.phase(), SessionPhase::Selection);

        let ticket = session.begin_chapter(0, 0).expect("chapter");
        assert_eq!(session.phase(), SessionPhase::Generating);
        assert_eq!(ticket.selection.topic(), "Computer Science: Data Structures");

        assert!(session.finish_generation(&ticket, true));
        assert_eq!(session.phase(), SessionPhase::Visualizing);
        assert!(session.syllabus().is_some());
    }

    #[test]
    fn test_failed_generation_returns_to_input() {
        let (mut session, ticket) = selected();
        assert!(session.finish_generation(&ticket, false));
        assert_eq!(session.phase(), SessionPhase::Input);
        assert!(session.syllabus().is_none());
        assert!(session.selection().is_none());
    }

    #[test]
    fn test_chapter_requires_syllabus() {
        let mut session = Session::default();
        assert_eq!(session.begin_chapter(0, 0), Err(SessionError::NoSyllabus));
    }

    #[test]
    fn test_out_of_range_chapter() {
        let mut session = Session::default();
        session
            .submit_syllabus(&SyllabusData::sample())
            .expect("syllabus");
        let err = session.begin_chapter(5, 0).expect_err("range");
        assert!(matches!(
            err,
            SessionError::Syllabus(SyllabusError::SubjectOutOfRange { index: 5, .. })
        ));
        assert_eq!(session.phase(), SessionPhase::Selection);
    }

    #[test]
    fn test_busy_while_generating() {
        let (mut session, _ticket) = selected();
        assert!(matches!(session.begin_chapter(0, 1), Err(SessionError::Busy(_))));
        assert!(matches!(
            session.submit_syllabus(&SyllabusData::sample()),
            Err(SessionError::Busy(_))
        ));
    }

    #[test]
    fn test_reset_outdates_pending_generation() {
        let (mut session, ticket) = selected();
        session.reset();
        assert!(!session.finish_generation(&ticket, true));
        assert_eq!(session.phase(), SessionPhase::Input);
    }

    #[test]
    fn test_empty_syllabus_rejected() {
        let mut session = Session::default();
        let err = session
            .submit_syllabus(&SyllabusData::default())
            .expect_err("empty");
        assert_eq!(err, SessionError::Syllabus(SyllabusError::Empty));
        assert_eq!(session.phase(), SessionPhase::Input);
    }
}
