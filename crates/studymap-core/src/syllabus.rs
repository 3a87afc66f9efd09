use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyllabusError {
    #[error("Syllabus needs at least one subject with chapters and topics")]
    Empty,
    #[error("Subject index {index} out of range ({count} subjects)")]
    SubjectOutOfRange { index: usize, count: usize },
    #[error("Chapter index {index} out of range ({count} chapters in {subject})")]
    ChapterOutOfRange {
        subject: String,
        index: usize,
        count: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub name: String,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SyllabusData {
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

/// A chapter picked out of a syllabus, ready to seed the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSelection {
    pub subject: String,
    pub chapter: String,
    pub topics: Vec<Topic>,
}

impl ChapterSelection {
    /// Label sent to the content source while the visualization is generated.
    pub fn topic(&self) -> String {
        format!("{}: {}", self.subject, self.chapter)
    }
}

impl SyllabusData {
    /// Drop blank entries bottom-up: topics, then chapters without topics,
    /// then subjects without chapters.
    pub fn validated(&self) -> Result<SyllabusData, SyllabusError> {
        let subjects: Vec<Subject> = self
            .subjects
            .iter()
            .filter(|subject| !subject.name.trim().is_empty())
            .map(|subject| Subject {
                name: subject.name.trim().to_string(),
                chapters: subject
                    .chapters
                    .iter()
                    .filter(|chapter| !chapter.name.trim().is_empty())
                    .map(|chapter| Chapter {
                        name: chapter.name.trim().to_string(),
                        topics: chapter
                            .topics
                            .iter()
                            .filter(|topic| !topic.name.trim().is_empty())
                            .map(|topic| Topic {
                                name: topic.name.trim().to_string(),
                            })
                            .collect(),
                    })
                    .filter(|chapter| !chapter.topics.is_empty())
                    .collect(),
            })
            .filter(|subject| !subject.chapters.is_empty())
            .collect();

        if subjects.is_empty() {
            return Err(SyllabusError::Empty);
        }
        Ok(SyllabusData { subjects })
    }

    pub fn select_chapter(
        &self,
        subject_index: usize,
        chapter_index: usize,
    ) -> Result<ChapterSelection, SyllabusError> {
        let subject =
            self.subjects
                .get(subject_index)
                .ok_or(SyllabusError::SubjectOutOfRange {
                    index: subject_index,
                    count: self.subjects.len(),
                })?;
        let chapter =
            subject
                .chapters
                .get(chapter_index)
                .ok_or_else(|| SyllabusError::ChapterOutOfRange {
                    subject: subject.name.clone(),
                    index: chapter_index,
                    count: subject.chapters.len(),
                })?;

        Ok(ChapterSelection {
            subject: subject.name.clone(),
            chapter: chapter.name.clone(),
            topics: chapter.topics.clone(),
        })
    }

    /// Built-in syllabus returned when an uploaded document is processed
    /// without a parsing backend.
    pub fn sample() -> Self {
        fn chapter(name: &str, topics: &[&str]) -> Chapter {
            Chapter {
                name: name.to_string(),
                topics: topics
                    .iter()
                    .map(|t| Topic {
                        name: (*t).to_string(),
                    })
                    .collect(),
            }
        }

        SyllabusData {
            subjects: vec![
                Subject {
                    name: "Computer Science".to_string(),
                    chapters: vec![
                        chapter("Data Structures", &["Arrays", "Linked Lists"]),
                        chapter("Algorithms", &["Sorting", "Searching"]),
                    ],
                },
                Subject {
                    name: "Mathematics".to_string(),
                    chapters: vec![chapter("Calculus", &["Limits", "Derivatives"])],
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(name: &str) -> Topic {
        Topic {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_validated_drops_blank_entries() {
        let raw = SyllabusData {
            subjects: vec![
                Subject {
                    name: " Physics ".to_string(),
                    chapters: vec![
                        Chapter {
                            name: "Optics".to_string(),
                            topics: vec![topic("Lenses"), topic("  ")],
                        },
                        Chapter {
                            name: "Empty".to_string(),
                            topics: vec![topic("")],
                        },
                    ],
                },
                Subject {
                    name: "".to_string(),
                    chapters: vec![Chapter {
                        name: "Orphan".to_string(),
                        topics: vec![topic("Ignored")],
                    }],
                },
            ],
        };

        let valid = raw.validated().expect("one subject survives");
        assert_eq!(valid.subjects.len(), 1);
        assert_eq!(valid.subjects[0].name, "Physics");
        assert_eq!(valid.subjects[0].chapters.len(), 1);
        assert_eq!(valid.subjects[0].chapters[0].topics, vec![topic("Lenses")]);
    }

    #[test]
    fn test_validated_rejects_empty_syllabus() {
        let raw = SyllabusData {
            subjects: vec![Subject {
                name: "Blank".to_string(),
                chapters: vec![],
            }],
        };
        assert_eq!(raw.validated(), Err(SyllabusError::Empty));
    }

    #[test]
    fn test_select_chapter_builds_topic_label() {
        let selection = SyllabusData::sample()
            .select_chapter(0, 0)
            .expect("chapter exists");
        assert_eq!(selection.topic(), "Computer Science: Data Structures");
        assert_eq!(selection.topics, vec![topic("Arrays"), topic("Linked Lists")]);
    }

    #[test]
    fn test_select_chapter_out_of_range() {
        let sample = SyllabusData::sample();
        assert!(matches!(
            sample.select_chapter(5, 0),
            Err(SyllabusError::SubjectOutOfRange { index: 5, count: 2 })
        ));
        assert!(matches!(
            sample.select_chapter(1, 3),
            Err(SyllabusError::ChapterOutOfRange { index: 3, count: 1, .. })
        ));
    }
}
