use crate::session::{GenerationTicket, Session, SessionError};
use std::sync::Arc;
use studymap_api::{ApiError, DetailDto, VisualizerStateDto};
use studymap_content::{ContentError, ContentSource};
use studymap_core::{ChapterSelection, NodeId, SessionPhase, SyllabusData, TopicContent};
use studymap_events::{Event, EventBus};
use studymap_graph::{
    CollapseOutcome, DetailBinding, DetailRequest, DetailTicket, DetailView, ExpandOutcome,
    ExpandStart, ExpandTicket, GraphSnapshot, GraphStore, IgnoreReason, LayoutConfig,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

type Reply<T> = oneshot::Sender<Result<T, ApiError>>;
type FetchResult = Result<TopicContent, ContentError>;

enum Command {
    SubmitSyllabus {
        syllabus: SyllabusData,
        reply: Reply<SyllabusData>,
    },
    SelectChapter {
        subject_index: usize,
        chapter_index: usize,
        reply: Reply<()>,
    },
    Seed {
        selection: ChapterSelection,
        reply: Reply<()>,
    },
    Expand {
        id: NodeId,
        reply: Reply<()>,
    },
    Collapse {
        id: NodeId,
        reply: Reply<()>,
    },
    Select {
        id: NodeId,
        reply: Reply<()>,
    },
    CloseDetail {
        reply: Reply<()>,
    },
    Reset {
        reply: Reply<()>,
    },

    // Fetch completions, sent by the tasks the actor spawns.
    ChapterGenerated {
        ticket: GenerationTicket,
        result: FetchResult,
        reply: Reply<()>,
    },
    ExpandFetched {
        ticket: ExpandTicket,
        result: FetchResult,
    },
    DetailFetched {
        ticket: DetailTicket,
        result: FetchResult,
    },
}

/// Session state published next to the graph after every command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub syllabus: Option<SyllabusData>,
    pub detail: Option<DetailView>,
    /// Content fetches spawned and not yet applied.
    pub in_flight: usize,
}

fn stopped() -> ApiError {
    ApiError::internal("Visualizer task has stopped")
}

fn session_error(err: SessionError) -> ApiError {
    match err {
        SessionError::Busy(_) => ApiError::new("conflict", err.to_string()),
        SessionError::Syllabus(_) | SessionError::NoSyllabus => {
            ApiError::invalid_argument(err.to_string())
        }
    }
}

fn unknown_node(id: &NodeId) -> ApiError {
    ApiError::not_found(format!("Unknown node: {id}"))
}

/// Graph and session status as of one command, published together so a
/// reader never pairs a graph with the status of a different update.
#[derive(Debug, Clone, Default)]
struct Published {
    graph: Arc<GraphSnapshot>,
    status: SessionStatus,
}

/// Handle to the visualizer actor.
///
/// All graph mutations go through one task that owns the store, so expand,
/// collapse, and fetch completions are applied strictly in arrival order.
/// Readers get post-update snapshots from a watch channel and never lock.
#[derive(Clone)]
pub struct VisualizerController {
    commands: mpsc::UnboundedSender<Command>,
    published: watch::Receiver<Published>,
}

impl VisualizerController {
    /// Start the actor on the current tokio runtime.
    pub fn spawn(source: Arc<dyn ContentSource>, layout: LayoutConfig, bus: EventBus) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (published_tx, published) = watch::channel(Published::default());

        let actor = Visualizer {
            store: GraphStore::new(layout),
            detail: DetailBinding::default(),
            session: Session::default(),
            source,
            bus,
            commands: commands.downgrade(),
            published_tx,
            in_flight: 0,
        };
        tokio::spawn(actor.run(rx));

        Self {
            commands,
            published,
        }
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, ApiError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(make(tx)).map_err(|_| stopped())?;
        rx.await.map_err(|_| stopped())?
    }

    pub async fn submit_syllabus(&self, syllabus: SyllabusData) -> Result<SyllabusData, ApiError> {
        self.request(|reply| Command::SubmitSyllabus { syllabus, reply })
            .await
    }

    /// Generate content for a chapter and seed the graph with its topics.
    /// Resolves once the generating phase is over.
    pub async fn select_chapter(
        &self,
        subject_index: usize,
        chapter_index: usize,
    ) -> Result<(), ApiError> {
        self.request(|reply| Command::SelectChapter {
            subject_index,
            chapter_index,
            reply,
        })
        .await
    }

    /// Seed the graph directly, without a generating phase.
    pub async fn seed(&self, selection: ChapterSelection) -> Result<(), ApiError> {
        self.request(|reply| Command::Seed { selection, reply })
            .await
    }

    pub async fn expand(&self, id: NodeId) -> Result<(), ApiError> {
        self.request(|reply| Command::Expand { id, reply }).await
    }

    pub async fn collapse(&self, id: NodeId) -> Result<(), ApiError> {
        self.request(|reply| Command::Collapse { id, reply }).await
    }

    pub async fn select(&self, id: NodeId) -> Result<(), ApiError> {
        self.request(|reply| Command::Select { id, reply }).await
    }

    pub async fn close_detail(&self) -> Result<(), ApiError> {
        self.request(|reply| Command::CloseDetail { reply }).await
    }

    pub async fn reset(&self) -> Result<(), ApiError> {
        self.request(|reply| Command::Reset { reply }).await
    }

    pub fn graph(&self) -> Arc<GraphSnapshot> {
        Arc::clone(&self.published.borrow().graph)
    }

    pub fn status(&self) -> SessionStatus {
        self.published.borrow().status.clone()
    }

    pub fn detail(&self) -> Option<DetailDto> {
        self.published
            .borrow()
            .status
            .detail
            .as_ref()
            .map(DetailDto::from)
    }

    /// Phase, graph, and detail taken from a single published update.
    pub fn state(&self) -> VisualizerStateDto {
        let published = self.published.borrow();
        VisualizerStateDto {
            phase: published.status.phase,
            graph: GraphSnapshot::clone(&published.graph),
            detail: published.status.detail.as_ref().map(DetailDto::from),
        }
    }

    /// Wait until the published status satisfies `pred`.
    pub async fn wait_for(&self, mut pred: impl FnMut(&SessionStatus) -> bool) -> SessionStatus {
        let mut published = self.published.clone();
        match published.wait_for(|p| pred(&p.status)).await {
            Ok(current) => current.status.clone(),
            Err(_) => self.status(),
        }
    }

    /// Wait until every spawned fetch has been applied or dropped.
    pub async fn settled(&self) -> SessionStatus {
        self.wait_for(|s| s.in_flight == 0).await
    }
}

struct Visualizer {
    store: GraphStore,
    detail: DetailBinding,
    session: Session,
    source: Arc<dyn ContentSource>,
    bus: EventBus,
    /// Weak so the actor stops once every handle is dropped.
    commands: mpsc::WeakUnboundedSender<Command>,
    published_tx: watch::Sender<Published>,
    in_flight: usize,
}

impl Visualizer {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        debug!(source = self.source.name(), "visualizer started");
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        debug!("visualizer stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::SubmitSyllabus { syllabus, reply } => {
                let result = self.submit_syllabus(&syllabus);
                self.respond(reply, result);
            }
            Command::SelectChapter {
                subject_index,
                chapter_index,
                reply,
            } => self.select_chapter(subject_index, chapter_index, reply),
            Command::Seed { selection, reply } => {
                self.seed(selection);
                self.respond(reply, Ok(()));
            }
            Command::Expand { id, reply } => {
                let result = self.expand(&id);
                self.respond(reply, result);
            }
            Command::Collapse { id, reply } => {
                let result = self.collapse(&id);
                self.respond(reply, result);
            }
            Command::Select { id, reply } => {
                let result = self.select(&id);
                self.respond(reply, result);
            }
            Command::CloseDetail { reply } => {
                if self.detail.view().is_some() {
                    self.detail.close();
                    self.bus.publish(Event::DetailClosed);
                }
                self.respond(reply, Ok(()));
            }
            Command::Reset { reply } => {
                self.reset();
                self.respond(reply, Ok(()));
            }
            Command::ChapterGenerated {
                ticket,
                result,
                reply,
            } => {
                self.in_flight -= 1;
                let result = self.chapter_generated(ticket, result);
                self.respond(reply, result);
            }
            Command::ExpandFetched { ticket, result } => {
                self.in_flight -= 1;
                self.expand_fetched(&ticket, result);
                self.publish();
            }
            Command::DetailFetched { ticket, result } => {
                self.in_flight -= 1;
                self.detail_fetched(&ticket, result);
                self.publish();
            }
        }
    }

    /// Publish the new state, then answer the caller, so a caller that
    /// reads the watch channels after its reply sees its own update.
    fn respond<T>(&mut self, reply: Reply<T>, result: Result<T, ApiError>) {
        self.publish();
        let _ = reply.send(result);
    }

    fn publish(&mut self) {
        self.published_tx.send_replace(Published {
            graph: Arc::new(self.store.snapshot()),
            status: SessionStatus {
                phase: self.session.phase(),
                syllabus: self.session.syllabus().cloned(),
                detail: self.detail.view().cloned(),
                in_flight: self.in_flight,
            },
        });
    }

    fn spawn_fetch(
        &mut self,
        topic: String,
        done: impl FnOnce(FetchResult) -> Command + Send + 'static,
    ) {
        self.in_flight += 1;
        let source = Arc::clone(&self.source);
        let commands = self.commands.clone();
        tokio::spawn(async move {
            // Run the fetch as its own task so a panicking source still
            // produces a completion and the node leaves its loading state.
            let fetch = {
                let topic = topic.clone();
                tokio::spawn(async move { source.generate(&topic).await })
            };
            let result = match fetch.await {
                Ok(result) => result,
                Err(err) => {
                    warn!(topic, error = %err, "content fetch task failed");
                    Err(ContentError::Transport(format!("content fetch failed: {err}")))
                }
            };
            match commands.upgrade() {
                Some(commands) => {
                    let _ = commands.send(done(result));
                }
                None => debug!(topic, "visualizer gone, discarding fetch result"),
            }
        });
    }

    fn phase_changed(&self) {
        self.bus.publish(Event::SessionPhaseChanged {
            phase: self.session.phase(),
        });
    }

    fn submit_syllabus(&mut self, syllabus: &SyllabusData) -> Result<SyllabusData, ApiError> {
        let validated = self
            .session
            .submit_syllabus(syllabus)
            .map_err(session_error)?
            .clone();
        self.phase_changed();
        Ok(validated)
    }

    fn select_chapter(&mut self, subject_index: usize, chapter_index: usize, reply: Reply<()>) {
        let ticket = match self.session.begin_chapter(subject_index, chapter_index) {
            Ok(ticket) => ticket,
            Err(err) => return self.respond(reply, Err(session_error(err))),
        };

        let topic = ticket.selection.topic();
        info!(topic, "generating chapter content");
        self.phase_changed();
        self.bus.publish(Event::StatusUpdate {
            message: format!("Generating content for {topic}"),
        });
        self.spawn_fetch(topic, move |result| Command::ChapterGenerated {
            ticket,
            result,
            reply,
        });
        self.publish();
    }

    fn chapter_generated(
        &mut self,
        ticket: GenerationTicket,
        result: FetchResult,
    ) -> Result<(), ApiError> {
        if !self.session.finish_generation(&ticket, result.is_ok()) {
            return Err(ApiError::new(
                "cancelled",
                "Session changed while content was being generated",
            ));
        }

        match result {
            Ok(content) => {
                debug!(
                    topic = %ticket.selection.topic(),
                    subtopics = content.subtopics.len(),
                    "chapter content generated"
                );
                self.seed_graph(&ticket.selection);
                self.phase_changed();
                Ok(())
            }
            Err(err) => {
                warn!(topic = %ticket.selection.topic(), error = %err, "chapter generation failed");
                self.store.reset();
                self.detail.close();
                self.phase_changed();
                self.bus.publish(Event::ShowError {
                    message: err.to_string(),
                });
                Err(ApiError::unavailable(format!(
                    "Failed to generate content: {err}"
                )))
            }
        }
    }

    fn seed(&mut self, selection: ChapterSelection) {
        self.seed_graph(&selection);
        self.session.seeded(selection);
        self.phase_changed();
    }

    fn seed_graph(&mut self, selection: &ChapterSelection) {
        self.store.seed(selection);
        if self.detail.view().is_some() {
            self.detail.close();
            self.bus.publish(Event::DetailClosed);
        }
        info!(topic = %selection.topic(), roots = self.store.len(), "graph seeded");
        self.bus.publish(Event::GraphSeeded {
            topic: selection.topic(),
            root_count: self.store.len(),
        });
    }

    fn expand(&mut self, id: &NodeId) -> Result<(), ApiError> {
        match self.store.begin_expand(id) {
            ExpandStart::Ignored(IgnoreReason::Missing) => Err(unknown_node(id)),
            ExpandStart::Ignored(_) => Ok(()),
            ExpandStart::Materialized { children } => {
                self.bus.publish(Event::NodeExpanded {
                    id: id.clone(),
                    child_count: children.len(),
                    from_cache: true,
                });
                Ok(())
            }
            ExpandStart::Fetch(ticket) => {
                self.bus.publish(Event::NodeLoading { id: id.clone() });
                let topic = ticket.label.clone();
                self.spawn_fetch(topic, move |result| Command::ExpandFetched { ticket, result });
                Ok(())
            }
        }
    }

    fn expand_fetched(&mut self, ticket: &ExpandTicket, result: FetchResult) {
        let error = result.as_ref().err().map(ToString::to_string);
        let event = match self.store.complete_expand(ticket, result) {
            ExpandOutcome::Expanded { node_id, children } => Event::NodeExpanded {
                id: node_id,
                child_count: children.len(),
                from_cache: false,
            },
            ExpandOutcome::Failed { node_id } => Event::NodeExpandFailed {
                id: node_id,
                error: error.unwrap_or_default(),
            },
            ExpandOutcome::Stale { node_id } => Event::StaleResponseDropped { id: node_id },
        };
        self.bus.publish(event);
    }

    fn collapse(&mut self, id: &NodeId) -> Result<(), ApiError> {
        match self.store.collapse(id) {
            CollapseOutcome::Ignored(IgnoreReason::Missing) => Err(unknown_node(id)),
            CollapseOutcome::Ignored(_) => Ok(()),
            CollapseOutcome::Collapsed {
                node_id,
                removed_nodes,
                removed_edges,
            } => {
                self.bus.publish(Event::NodeCollapsed {
                    id: node_id,
                    removed_nodes: removed_nodes.len(),
                    removed_edges,
                });
                Ok(())
            }
        }
    }

    fn select(&mut self, id: &NodeId) -> Result<(), ApiError> {
        match self.detail.select(id, &self.store) {
            DetailRequest::Ignored => Err(unknown_node(id)),
            DetailRequest::Ready => {
                self.bus.publish(Event::NodeSelected { id: id.clone() });
                self.bus.publish(Event::DetailReady { id: id.clone() });
                Ok(())
            }
            DetailRequest::Fetch(ticket) => {
                self.bus.publish(Event::NodeSelected { id: id.clone() });
                let topic = ticket.label.clone();
                self.spawn_fetch(topic, move |result| Command::DetailFetched { ticket, result });
                Ok(())
            }
        }
    }

    fn detail_fetched(&mut self, ticket: &DetailTicket, result: FetchResult) {
        let error = result.as_ref().err().map(ToString::to_string);
        let id = ticket.node_id.clone();
        if !self.detail.complete(ticket, result, &mut self.store) {
            self.bus.publish(Event::StaleResponseDropped { id });
            return;
        }
        match error {
            None => self.bus.publish(Event::DetailReady { id }),
            Some(error) => self.bus.publish(Event::DetailFallback { id, error }),
        }
    }

    fn reset(&mut self) {
        self.store.reset();
        self.detail.close();
        self.session.reset();
        info!("visualizer reset");
        self.bus.publish(Event::GraphReset);
        self.phase_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use studymap_content::MockContentSource;
    use studymap_core::Subtopic;
    use studymap_graph::DetailStatus;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Returns `subtopics` children for every topic. Topics listed in
    /// `gated` block until the test releases a permit; topics in `failing`
    /// return a transport error; topics in `panicking` panic.
    struct ScriptedSource {
        calls: Mutex<Vec<String>>,
        gate: Semaphore,
        gated: Vec<&'static str>,
        failing: Vec<&'static str>,
        panicking: Vec<&'static str>,
        subtopics: usize,
    }

    impl ScriptedSource {
        fn new(subtopics: usize) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                gate: Semaphore::new(0),
                gated: Vec::new(),
                failing: Vec::new(),
                panicking: Vec::new(),
                subtopics,
            }
        }

        fn gated(mut self, topics: &[&'static str]) -> Self {
            self.gated.extend_from_slice(topics);
            self
        }

        fn failing(mut self, topics: &[&'static str]) -> Self {
            self.failing.extend_from_slice(topics);
            self
        }

        fn panicking(mut self, topics: &[&'static str]) -> Self {
            self.panicking.extend_from_slice(topics);
            self
        }

        fn calls_for(&self, topic: &str) -> usize {
            self.calls.lock().iter().filter(|t| *t == topic).count()
        }
    }

    #[async_trait]
    impl ContentSource for ScriptedSource {
        async fn generate(&self, topic: &str) -> Result<TopicContent, ContentError> {
            self.calls.lock().push(topic.to_string());
            if self.gated.iter().any(|t| *t == topic) {
                if let Ok(permit) = self.gate.acquire().await {
                    permit.forget();
                }
            }
            if self.panicking.iter().any(|t| *t == topic) {
                panic!("source crashed on {topic}");
            }
            if self.failing.iter().any(|t| *t == topic) {
                return Err(ContentError::Transport("connection reset".to_string()));
            }
            Ok(TopicContent {
                id: topic.to_lowercase(),
                name: topic.to_string(),
                description: format!("About {topic}"),
                content: None,
                video_id: None,
                subtopics: (0..self.subtopics)
                    .map(|i| Subtopic {
                        id: format!("{topic}-{i}"),
                        name: format!("{topic} {i}"),
                        description: String::new(),
                        content: None,
                        subtopics: Vec::new(),
                        resources: Vec::new(),
                    })
                    .collect(),
                resources: Vec::new(),
            })
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn start(source: Arc<ScriptedSource>) -> (VisualizerController, EventBus) {
        let bus = EventBus::new();
        let controller = VisualizerController::spawn(source, LayoutConfig::default(), bus.clone());
        (controller, bus)
    }

    async fn seeded(source: Arc<ScriptedSource>) -> (VisualizerController, EventBus) {
        let (controller, bus) = start(source);
        controller
            .seed(SyllabusData::sample().select_chapter(0, 0).expect("chapter"))
            .await
            .expect("seed");
        (controller, bus)
    }

    fn id(raw: &str) -> NodeId {
        NodeId::from(raw)
    }

    #[tokio::test]
    async fn test_chapter_selection_seeds_roots() {
        let source = Arc::new(ScriptedSource::new(3));
        let (controller, bus) = start(source.clone());

        let syllabus = controller
            .submit_syllabus(SyllabusData::sample())
            .await
            .expect("syllabus");
        assert_eq!(syllabus.subjects.len(), 2);
        assert_eq!(controller.status().phase, SessionPhase::Selection);

        controller.select_chapter(0, 0).await.expect("chapter");
        assert_eq!(controller.status().phase, SessionPhase::Visualizing);
        assert_eq!(
            source.calls_for("Computer Science: Data Structures"),
            1
        );

        let graph = controller.graph();
        let labels: Vec<&str> = graph.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["Arrays", "Linked Lists"]);
        assert_eq!(graph.nodes[0].id, id("topic-0"));
        assert!(graph.edges.is_empty());

        let events = bus.drain();
        assert!(events.contains(&Event::GraphSeeded {
            topic: "Computer Science: Data Structures".to_string(),
            root_count: 2,
        }));
    }

    #[tokio::test]
    async fn test_failed_generation_returns_to_input() {
        let source = Arc::new(
            ScriptedSource::new(3).failing(&["Computer Science: Data Structures"]),
        );
        let (controller, _bus) = start(source);
        controller
            .submit_syllabus(SyllabusData::sample())
            .await
            .expect("syllabus");

        let err = controller.select_chapter(0, 0).await.expect_err("fails");
        assert_eq!(err.code, "unavailable");
        let status = controller.status();
        assert_eq!(status.phase, SessionPhase::Input);
        assert!(status.syllabus.is_none());
        assert!(controller.graph().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_chapter_is_rejected() {
        let (controller, _bus) = start(Arc::new(ScriptedSource::new(3)));
        let err = controller.select_chapter(0, 0).await.expect_err("no syllabus");
        assert_eq!(err.code, "invalid_argument");

        controller
            .submit_syllabus(SyllabusData::sample())
            .await
            .expect("syllabus");
        let err = controller.select_chapter(0, 9).await.expect_err("range");
        assert_eq!(err.code, "invalid_argument");
        assert_eq!(controller.status().phase, SessionPhase::Selection);
    }

    #[tokio::test]
    async fn test_expand_then_collapse() {
        let source = Arc::new(ScriptedSource::new(3));
        let (controller, bus) = seeded(source).await;

        controller.expand(id("topic-0")).await.expect("expand");
        controller.settled().await;

        let graph = controller.graph();
        let children: Vec<&str> = graph
            .edges_from(&id("topic-0"))
            .map(|e| e.target.as_str())
            .collect();
        assert_eq!(children, vec!["topic-0-0", "topic-0-1", "topic-0-2"]);
        assert_eq!(graph.edges.len(), 3);
        let root = graph.node(&id("topic-0")).expect("root");
        assert!(root.expanded && !root.loading);

        controller.collapse(id("topic-0")).await.expect("collapse");
        let graph = controller.graph();
        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.edges.is_empty());
        assert!(!graph.node(&id("topic-0")).expect("root").expanded);

        let events = bus.drain();
        assert!(events.contains(&Event::NodeExpanded {
            id: id("topic-0"),
            child_count: 3,
            from_cache: false,
        }));
        assert!(events.contains(&Event::NodeCollapsed {
            id: id("topic-0"),
            removed_nodes: 3,
            removed_edges: 3,
        }));
    }

    #[tokio::test]
    async fn test_double_expand_fetches_once() {
        let source = Arc::new(ScriptedSource::new(3).gated(&["Arrays"]));
        let (controller, _bus) = seeded(source.clone()).await;

        controller.expand(id("topic-0")).await.expect("first");
        controller.expand(id("topic-0")).await.expect("second");
        let loading = controller.graph();
        assert!(loading.node(&id("topic-0")).expect("root").loading);
        assert_eq!(controller.status().in_flight, 1);

        source.gate.add_permits(2);
        controller.settled().await;

        assert_eq!(source.calls_for("Arrays"), 1);
        let graph = controller.graph();
        assert_eq!(graph.edges_from(&id("topic-0")).count(), 3);
        assert_eq!(graph.nodes.len(), 5);
    }

    #[tokio::test]
    async fn test_failed_expand_flags_node() {
        let source = Arc::new(ScriptedSource::new(3).failing(&["Arrays"]));
        let (controller, bus) = seeded(source).await;

        controller.expand(id("topic-0")).await.expect("expand");
        controller.settled().await;

        let graph = controller.graph();
        let node = graph.node(&id("topic-0")).expect("root");
        assert!(!node.loading && !node.expanded && node.error);
        assert_eq!(graph.nodes.len(), 2);
        assert!(bus
            .drain()
            .iter()
            .any(|e| matches!(e, Event::NodeExpandFailed { id, .. } if id.as_str() == "topic-0")));
    }

    #[tokio::test]
    async fn test_panicking_fetch_releases_node() {
        let source = Arc::new(ScriptedSource::new(3).panicking(&["Arrays"]));
        let (controller, bus) = seeded(source.clone()).await;

        controller.expand(id("topic-0")).await.expect("expand");
        let status = tokio::time::timeout(Duration::from_secs(5), controller.settled())
            .await
            .expect("settled");
        assert_eq!(status.in_flight, 0);

        let graph = controller.graph();
        let node = graph.node(&id("topic-0")).expect("root");
        assert!(!node.loading && !node.expanded && node.error);
        assert!(bus
            .drain()
            .iter()
            .any(|e| matches!(e, Event::NodeExpandFailed { id, .. } if id.as_str() == "topic-0")));

        // Not stuck behind the loading guard: a retry fetches again.
        controller.expand(id("topic-0")).await.expect("retry");
        tokio::time::timeout(Duration::from_secs(5), controller.settled())
            .await
            .expect("settled");
        assert_eq!(source.calls_for("Arrays"), 2);
    }

    #[tokio::test]
    async fn test_state_pairs_phase_with_its_graph() {
        let source = Arc::new(ScriptedSource::new(2));
        let (controller, _bus) = seeded(source).await;
        let state = controller.state();
        assert_eq!(state.phase, SessionPhase::Visualizing);
        assert_eq!(state.graph.nodes.len(), 2);

        controller.reset().await.expect("reset");
        let state = controller.state();
        assert_eq!(state.phase, SessionPhase::Input);
        assert!(state.graph.is_empty());
        assert!(state.detail.is_none());
    }

    #[tokio::test]
    async fn test_completion_after_parent_collapse_is_dropped() {
        let source = Arc::new(ScriptedSource::new(2).gated(&["Arrays 0"]));
        let (controller, bus) = seeded(source.clone()).await;

        controller.expand(id("topic-0")).await.expect("expand root");
        controller.settled().await;
        controller.expand(id("topic-0-0")).await.expect("expand child");
        controller.collapse(id("topic-0")).await.expect("collapse");

        source.gate.add_permits(1);
        controller.settled().await;

        let graph = controller.graph();
        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.nodes.iter().all(|n| !n.id.is_descendant_of(&id("topic-0"))));
        assert!(bus.drain().contains(&Event::StaleResponseDropped {
            id: id("topic-0-0")
        }));
    }

    #[tokio::test]
    async fn test_completion_after_reset_is_dropped() {
        let source = Arc::new(ScriptedSource::new(2).gated(&["Arrays"]));
        let (controller, _bus) = seeded(source.clone()).await;

        controller.expand(id("topic-0")).await.expect("expand");
        controller.reset().await.expect("reset");
        source.gate.add_permits(1);
        let status = controller.settled().await;

        assert_eq!(status.phase, SessionPhase::Input);
        assert!(controller.graph().is_empty());
    }

    #[tokio::test]
    async fn test_re_expand_uses_cached_content() {
        let source = Arc::new(ScriptedSource::new(3));
        let (controller, bus) = seeded(source.clone()).await;

        controller.expand(id("topic-1")).await.expect("expand");
        controller.settled().await;
        let first = controller.graph();
        controller.collapse(id("topic-1")).await.expect("collapse");
        controller.expand(id("topic-1")).await.expect("re-expand");
        let second = controller.graph();

        assert_eq!(source.calls_for("Linked Lists"), 1);
        let ids = |g: &GraphSnapshot| g.nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(first.as_ref()), ids(second.as_ref()));
        assert!(bus.drain().contains(&Event::NodeExpanded {
            id: id("topic-1"),
            child_count: 3,
            from_cache: true,
        }));
    }

    #[tokio::test]
    async fn test_select_fetches_and_caches_detail() {
        let source = Arc::new(ScriptedSource::new(2));
        let (controller, _bus) = seeded(source.clone()).await;

        controller.select(id("topic-0")).await.expect("select");
        let status = controller.settled().await;
        let view = status.detail.expect("detail open");
        assert!(matches!(view.status, DetailStatus::Ready(_)));

        let guide = controller.detail().and_then(|d| d.guide).expect("guide");
        assert!(guide.markdown.starts_with("# Arrays\n"));

        // The detail fetch cached the content, so expanding needs no fetch.
        controller.expand(id("topic-0")).await.expect("expand");
        assert_eq!(controller.status().in_flight, 0);
        assert_eq!(source.calls_for("Arrays"), 1);
        assert_eq!(controller.graph().nodes.len(), 4);
    }

    #[tokio::test]
    async fn test_detail_failure_shows_fallback() {
        let source = Arc::new(ScriptedSource::new(2).failing(&["Linked Lists"]));
        let (controller, bus) = seeded(source).await;

        controller.select(id("topic-1")).await.expect("select");
        controller.settled().await;

        let detail = controller.detail().expect("detail");
        assert!(matches!(detail.view.status, DetailStatus::Fallback { .. }));
        let guide = detail.guide.expect("fallback guide");
        assert!(guide.video_id.is_none());
        assert!(bus
            .drain()
            .iter()
            .any(|e| matches!(e, Event::DetailFallback { .. })));

        controller.close_detail().await.expect("close");
        assert!(controller.detail().is_none());
    }

    #[tokio::test]
    async fn test_unknown_nodes_are_not_found() {
        let (controller, _bus) = seeded(Arc::new(ScriptedSource::new(2))).await;
        for result in [
            controller.expand(id("topic-9")).await,
            controller.collapse(id("topic-9")).await,
            controller.select(id("topic-9")).await,
        ] {
            assert_eq!(result.expect_err("unknown").code, "not_found");
        }
        // Collapsing a collapsed node is a quiet no-op.
        controller.collapse(id("topic-0")).await.expect("no-op");
    }

    #[tokio::test]
    async fn test_mock_source_drives_full_session() {
        let bus = EventBus::new();
        let controller = VisualizerController::spawn(
            Arc::new(MockContentSource::new()),
            LayoutConfig::default(),
            bus,
        );
        controller
            .submit_syllabus(SyllabusData::sample())
            .await
            .expect("syllabus");
        controller.select_chapter(1, 0).await.expect("chapter");
        controller.expand(id("topic-0")).await.expect("expand");
        controller.settled().await;

        let state = controller.state();
        assert_eq!(state.phase, SessionPhase::Visualizing);
        let root = state.graph.node(&id("topic-0")).expect("root");
        assert_eq!(root.label, "Limits");
        for child in state.graph.nodes.iter().filter(|n| n.parent.is_some()) {
            assert!(child.position.y >= root.position.y + 150.0);
        }
    }
}
