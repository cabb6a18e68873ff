use construction_schema::UnitTypeId;
use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::orders::{ConstructionOrder, OrderId, PlanHandle};

/// Sink for "the pending construction queue changed" notifications.
pub trait ProductionPlanner: Send + Sync {
    fn pending_queue_changed(&self, order: &ConstructionOrder);
}

/// Planner that ignores notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPlanner;

impl ProductionPlanner for NullPlanner {
    fn pending_queue_changed(&self, _order: &ConstructionOrder) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerNotice {
    QueueChanged {
        order: OrderId,
        building: UnitTypeId,
        plan: Option<PlanHandle>,
    },
}

/// Forwards notifications to a planner living elsewhere (another thread, a test).
#[derive(Debug, Clone)]
pub struct ChannelPlanner {
    sender: Sender<PlannerNotice>,
}

impl ChannelPlanner {
    pub fn new(sender: Sender<PlannerNotice>) -> Self {
        Self { sender }
    }

    pub fn channel() -> (Self, Receiver<PlannerNotice>) {
        let (sender, receiver) = unbounded();
        (Self::new(sender), receiver)
    }
}

impl ProductionPlanner for ChannelPlanner {
    fn pending_queue_changed(&self, order: &ConstructionOrder) {
        let notice = PlannerNotice::QueueChanged {
            order: order.id(),
            building: order.building_type().clone(),
            plan: order.linked_plan(),
        };
        if let Err(err) = self.sender.send(notice) {
            tracing::debug!(
                target: "construction::planner",
                error = %err,
                "planner.notice.dropped"
            );
        }
    }
}
