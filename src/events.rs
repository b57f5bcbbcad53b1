//! Domain events and listener registry
//!
//! Events are immutable snapshots produced after the mutating store write
//! completes, never before. The registry maps each event kind to an ordered
//! listener list built at startup; listeners enqueue exactly one background
//! job each and return immediately.

use crate::jobs::{Job, JobQueue};
use crate::proposal::{Proposal, ProposalStatus, Review};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Domain event payloads
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A proposal was submitted by a speaker
    Submitted {
        proposal: Proposal,
        file_path: Option<String>,
        owner_id: Uuid,
    },
    /// An admin moved a proposal to a different status (old != new)
    StatusChanged {
        proposal: Proposal,
        old_status: ProposalStatus,
        new_status: ProposalStatus,
    },
    /// A reviewer rated a proposal
    Reviewed { proposal: Proposal, review: Review },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Submitted,
    StatusChanged,
    Reviewed,
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::Submitted { .. } => EventKind::Submitted,
            DomainEvent::StatusChanged { .. } => EventKind::StatusChanged,
            DomainEvent::Reviewed { .. } => EventKind::Reviewed,
        }
    }

    pub fn proposal(&self) -> &Proposal {
        match self {
            DomainEvent::Submitted { proposal, .. }
            | DomainEvent::StatusChanged { proposal, .. }
            | DomainEvent::Reviewed { proposal, .. } => proposal,
        }
    }
}

/// Event listener. Implementations enqueue a job; they never perform the
/// side effect inline.
pub trait EventListener: Send + Sync {
    fn handle(&self, event: &DomainEvent);
}

/// Explicit publish/subscribe registry with deterministic listener order
pub struct EventBus {
    listeners: HashMap<EventKind, Vec<Arc<dyn EventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: EventKind, listener: Arc<dyn EventListener>) {
        self.listeners.entry(kind).or_default().push(listener);
    }

    /// Standard wiring: the listener lists (and their order) for each event.
    pub fn standard(queue: Arc<dyn JobQueue>) -> Self {
        let mut bus = Self::new();

        let process_file = Arc::new(ProcessFileListener {
            queue: queue.clone(),
        });
        let reindex = Arc::new(ReindexListener {
            queue: queue.clone(),
        });
        let notify_admins = Arc::new(NotifyAdminsListener {
            queue: queue.clone(),
        });
        let notify_speaker = Arc::new(NotifySpeakerListener { queue });

        bus.register(EventKind::Submitted, process_file);
        bus.register(EventKind::Submitted, reindex.clone());
        bus.register(EventKind::Submitted, notify_admins);

        bus.register(EventKind::StatusChanged, reindex.clone());
        bus.register(EventKind::StatusChanged, notify_speaker.clone());

        bus.register(EventKind::Reviewed, reindex);
        bus.register(EventKind::Reviewed, notify_speaker);

        bus
    }

    /// Dispatch to the registered listeners, in registration order.
    pub fn emit(&self, event: &DomainEvent) {
        debug!(proposal_id = %event.proposal().id, kind = ?event.kind(), "Emitting domain event");
        if let Some(listeners) = self.listeners.get(&event.kind()) {
            for listener in listeners {
                listener.handle(event);
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Enqueues background validation of the attached file (if any)
struct ProcessFileListener {
    queue: Arc<dyn JobQueue>,
}

impl EventListener for ProcessFileListener {
    fn handle(&self, event: &DomainEvent) {
        if let DomainEvent::Submitted {
            proposal,
            file_path: Some(file_path),
            owner_id,
        } = event
        {
            self.queue.enqueue(Job::ProcessFile {
                proposal_id: proposal.id,
                file_path: file_path.clone(),
                owner_id: *owner_id,
            });
        }
    }
}

/// Enqueues a search reindex for any proposal-affecting event
struct ReindexListener {
    queue: Arc<dyn JobQueue>,
}

impl EventListener for ReindexListener {
    fn handle(&self, event: &DomainEvent) {
        self.queue.enqueue(Job::Reindex {
            proposal_id: event.proposal().id,
        });
    }
}

/// Enqueues the admin notification for submitted proposals
struct NotifyAdminsListener {
    queue: Arc<dyn JobQueue>,
}

impl EventListener for NotifyAdminsListener {
    fn handle(&self, event: &DomainEvent) {
        if let DomainEvent::Submitted { proposal, .. } = event {
            self.queue.enqueue(Job::NotifySubmitted {
                proposal_id: proposal.id,
            });
        }
    }
}

/// Enqueues the speaker notification for status changes and reviews
struct NotifySpeakerListener {
    queue: Arc<dyn JobQueue>,
}

impl EventListener for NotifySpeakerListener {
    fn handle(&self, event: &DomainEvent) {
        match event {
            DomainEvent::StatusChanged {
                proposal,
                old_status,
                new_status,
            } => self.queue.enqueue(Job::NotifyStatusChanged {
                proposal_id: proposal.id,
                old_status: old_status.as_str().to_string(),
                new_status: new_status.as_str().to_string(),
            }),
            DomainEvent::Reviewed { proposal, review } => {
                self.queue.enqueue(Job::NotifyReviewed {
                    proposal_id: proposal.id,
                    review_id: review.id,
                })
            }
            DomainEvent::Submitted { .. } => {}
        }
    }
}
