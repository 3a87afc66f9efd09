use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fmt::Write as _;
use std::path::PathBuf;
use studymap_app::{AppConfig, VisualizerController};
use studymap_content::build_content_source;
use studymap_core::{NodeId, SyllabusData, TopicNode};
use studymap_events::{Event, EventBus, EventListener};
use studymap_graph::GraphSnapshot;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Syllabus JSON file (`{"subjects": [...]}`)
    #[arg(long, conflicts_with = "sample", required_unless_present = "sample")]
    syllabus: Option<PathBuf>,

    /// Use the built-in sample syllabus
    #[arg(long)]
    sample: bool,

    #[arg(long, default_value_t = 0)]
    subject: usize,

    #[arg(long, default_value_t = 0)]
    chapter: usize,

    /// Node to expand; repeat to expand several, parents first
    #[arg(long)]
    expand: Vec<String>,

    /// Node to collapse after all expansions
    #[arg(long)]
    collapse: Vec<String>,

    /// Node whose study guide is printed
    #[arg(long)]
    select: Option<String>,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the final state as JSON instead of a tree
    #[arg(long)]
    json: bool,
}

/// Tallies what happened during the run.
#[derive(Debug, Default)]
struct RunSummary {
    expanded: usize,
    from_cache: usize,
    failed: usize,
    collapsed: usize,
    stale: usize,
}

impl EventListener for RunSummary {
    fn handle_event(&mut self, event: &Event) {
        debug!(?event, "visualizer event");
        match event {
            Event::NodeExpanded { from_cache, .. } => {
                self.expanded += 1;
                if *from_cache {
                    self.from_cache += 1;
                }
            }
            Event::NodeExpandFailed { .. } => self.failed += 1,
            Event::NodeCollapsed { .. } => self.collapsed += 1,
            Event::StaleResponseDropped { .. } => self.stale += 1,
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let syllabus = match &args.syllabus {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read syllabus {}", path.display()))?;
            serde_json::from_str::<SyllabusData>(&text)
                .with_context(|| format!("Invalid syllabus {}", path.display()))?
        }
        None => SyllabusData::sample(),
    };

    let source =
        build_content_source(&config.content).context("Failed to build content source")?;
    let bus = EventBus::new();
    let controller = VisualizerController::spawn(source, config.layout, bus.clone());
    let mut summary = RunSummary::default();

    controller
        .submit_syllabus(syllabus)
        .await
        .context("Syllabus rejected")?;
    controller
        .select_chapter(args.subject, args.chapter)
        .await
        .context("Failed to open chapter")?;

    for id in &args.expand {
        controller
            .expand(NodeId::from(id.as_str()))
            .await
            .with_context(|| format!("Cannot expand {id}"))?;
        controller.settled().await;
        bus.dispatch_to(&mut summary);
    }
    for id in &args.collapse {
        controller
            .collapse(NodeId::from(id.as_str()))
            .await
            .with_context(|| format!("Cannot collapse {id}"))?;
    }
    if let Some(id) = &args.select {
        controller
            .select(NodeId::from(id.as_str()))
            .await
            .with_context(|| format!("Cannot select {id}"))?;
    }
    controller.settled().await;
    bus.dispatch_to(&mut summary);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&controller.state())?);
        return Ok(());
    }

    let status = controller.status();
    let graph = controller.graph();
    if graph.is_empty() {
        bail!("Chapter produced no topics");
    }
    print!("{}", render_tree(&graph));
    println!(
        "\n{} nodes, {} edges ({} expanded, {} from cache, {} failed, {} collapsed)",
        graph.nodes.len(),
        graph.edges.len(),
        summary.expanded,
        summary.from_cache,
        summary.failed,
        summary.collapsed,
    );
    if summary.stale > 0 {
        println!("{} late responses ignored", summary.stale);
    }

    if let Some(guide) = status.detail.as_ref().and_then(|v| v.study_guide()) {
        println!("\n{}", guide.markdown);
        if let Some(video) = guide.video_id {
            println!("Video: https://www.youtube.com/watch?v={video}");
        }
    }
    Ok(())
}

fn render_tree(graph: &GraphSnapshot) -> String {
    let mut out = String::new();
    for root in graph.nodes.iter().filter(|n| n.is_root()) {
        render_node(graph, root, &mut out);
    }
    out
}

fn render_node(graph: &GraphSnapshot, node: &TopicNode, out: &mut String) {
    let marker = if node.loading {
        "~"
    } else if node.error {
        "!"
    } else if node.expanded {
        "-"
    } else {
        "+"
    };
    let indent = "  ".repeat(node.depth as usize);
    let _ = writeln!(
        out,
        "{indent}[{marker}] {} ({}) @ {:.0},{:.0}",
        node.label, node.id, node.position.x, node.position.y
    );
    for child in node.children.iter().filter_map(|id| graph.node(id)) {
        render_node(graph, child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use studymap_core::{Subtopic, TopicEdge};

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_syllabus_or_sample_required() {
        assert!(Args::try_parse_from(["studymap-cli"]).is_err());
        assert!(
            Args::try_parse_from(["studymap-cli", "--sample", "--syllabus", "s.json"]).is_err()
        );
        let args = Args::try_parse_from([
            "studymap-cli",
            "--sample",
            "--expand",
            "topic-0",
            "--expand",
            "topic-0-1",
        ])
        .expect("args");
        assert_eq!(args.expand, vec!["topic-0", "topic-0-1"]);
    }

    #[test]
    fn test_render_tree_nests_children() {
        let mut root = TopicNode::root(NodeId::from("topic-0"), "Arrays", "Topic in Data");
        let child = TopicNode::child_of(
            &root,
            0,
            &Subtopic {
                id: String::new(),
                name: "Indexing".to_string(),
                description: String::new(),
                content: None,
                subtopics: Vec::new(),
                resources: Vec::new(),
            },
        );
        root.expanded = true;
        root.children = vec![child.id.clone()];
        let graph = GraphSnapshot {
            edges: vec![TopicEdge::new(root.id.clone(), child.id.clone())],
            nodes: vec![root, child],
        };

        let tree = render_tree(&graph);
        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[-] Arrays (topic-0)"));
        assert!(lines[1].starts_with("  [+] Indexing (topic-0-0)"));
    }

    #[test]
    fn test_summary_counts_events() {
        let mut summary = RunSummary::default();
        summary.handle_event(&Event::NodeExpanded {
            id: NodeId::from("topic-0"),
            child_count: 4,
            from_cache: true,
        });
        summary.handle_event(&Event::StaleResponseDropped {
            id: NodeId::from("topic-0-1"),
        });
        assert_eq!(summary.expanded, 1);
        assert_eq!(summary.from_cache, 1);
        assert_eq!(summary.stale, 1);
    }
}
