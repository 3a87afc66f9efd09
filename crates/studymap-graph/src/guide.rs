use crate::selection::{DetailStatus, DetailView};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use studymap_core::NodeKind;

/// Video shown when neither the content nor the lookup table has one.
pub const DEFAULT_VIDEO_ID: &str = "9QTXnkLxIGE";

const KNOWN_VIDEOS: &[(&str, &str)] = &[
    ("Data Structures", "fObAQbYCjNU"),
    ("Arrays", "W2MfQ5Y_LHc"),
    ("Linked Lists", "A5_XdiK4J8A"),
    ("Algorithms", "A3ZUpyrnCbM"),
    ("Sorting", "Hoixgm4-P4M"),
    ("Calculus", "Qb-kbg_T9dA"),
    ("Limits", "riXcZT0VBNM"),
];

/// Rendered body of the detail panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyGuide {
    pub title: String,
    pub markdown: String,
    pub video_id: Option<String>,
}

pub fn video_for_label(label: &str) -> &'static str {
    KNOWN_VIDEOS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, id)| *id)
        .unwrap_or(DEFAULT_VIDEO_ID)
}

impl DetailView {
    /// Markdown study guide for the panel. `None` while still loading.
    pub fn study_guide(&self) -> Option<StudyGuide> {
        let label = &self.label;
        let field = if self.kind == NodeKind::Primary {
            "computer science"
        } else {
            "this subject"
        };

        let mut md = String::new();
        let _ = writeln!(md, "# {label}");
        let _ = writeln!(md, "## Overview");

        let video_id = match &self.status {
            DetailStatus::Loading => return None,
            DetailStatus::Fallback { placeholder } => {
                let _ = writeln!(md, "{placeholder}");
                return Some(StudyGuide {
                    title: label.clone(),
                    markdown: md,
                    video_id: None,
                });
            }
            DetailStatus::Ready(content) => {
                if content.description.trim().is_empty() {
                    let _ = writeln!(
                        md,
                        "{label} is a fundamental concept in {field}. Understanding this topic thoroughly will help you build a strong foundation."
                    );
                } else {
                    let _ = writeln!(md, "{}", content.description.trim());
                }

                let _ = writeln!(md, "## Key Points to Remember");
                if content.subtopics.is_empty() {
                    let _ = writeln!(md, "- First important point about {label}");
                    let _ = writeln!(md, "- Second key concept related to this topic");
                    let _ = writeln!(md, "- Applications of {label} in real-world scenarios");
                    let _ = writeln!(md, "- Common challenges students face when learning this");
                } else {
                    for subtopic in &content.subtopics {
                        if subtopic.description.is_empty() {
                            let _ = writeln!(md, "- {}", subtopic.name);
                        } else {
                            let _ = writeln!(md, "- {}: {}", subtopic.name, subtopic.description);
                        }
                    }
                }

                if !content.resources.is_empty() {
                    let _ = writeln!(md, "## Related Resources");
                    for resource in &content.resources {
                        let _ = writeln!(md, "- [{}]({})", resource.title, resource.url);
                    }
                }

                content
                    .video_id
                    .clone()
                    .unwrap_or_else(|| video_for_label(label).to_string())
            }
        };

        let _ = writeln!(md, "## Study Approach");
        let _ = writeln!(md, "1. Begin with the basic definitions");
        let _ = writeln!(md, "2. Work through example problems");
        let _ = writeln!(md, "3. Apply the concepts to practical scenarios");
        let _ = writeln!(md, "4. Review and test your knowledge");

        Some(StudyGuide {
            title: label.clone(),
            markdown: md,
            video_id: Some(video_id),
        })
    }
}
