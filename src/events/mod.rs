//! In-process event bus.
//!
//! Services publish domain events after their transaction commits; the
//! consumer task logs them and is the seam where outbound notification
//! delivery (chat bots, dashboards) plugs in. Delivery is fire-and-forget and
//! best-effort: a full or closed channel is logged, never surfaced to the
//! caller.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::entities::{batch::BatchLocation, lot::LotStatus, setup_job::SetupStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BatchCreated {
        batch_id: i32,
        setup_job_id: i32,
        card_number: i32,
    },
    SortingBatchCreated {
        batch_id: i32,
        lot_id: i32,
    },
    BatchRecounted {
        batch_id: i32,
        discrepancy_absolute: Option<i32>,
    },
    /// Reconciliation warning: discrepancy above the configured threshold.
    /// Recorded, never blocking; surfaced to the admin workflow downstream.
    BatchDiscrepancyAlert {
        batch_id: i32,
        operator_reported_quantity: i32,
        recounted_quantity: i32,
        discrepancy_absolute: i32,
        discrepancy_percentage: String,
    },
    BatchInspected {
        batch_id: i32,
        outcome: BatchLocation,
    },
    BatchSplit {
        parent_batch_id: i32,
        child_batch_ids: Vec<i32>,
    },
    BatchesMerged {
        new_batch_id: i32,
        source_batch_ids: Vec<i32>,
    },
    BatchArchived {
        batch_id: i32,
        original_location: BatchLocation,
    },
    CardAcquired {
        machine_id: i32,
        card_number: i32,
        batch_id: i32,
    },
    CardReleased {
        machine_id: i32,
        card_number: i32,
    },
    CardMarkedLost {
        machine_id: i32,
        card_number: i32,
    },
    SetupStatusChanged {
        setup_job_id: i32,
        lot_id: i32,
        old_status: SetupStatus,
        new_status: SetupStatus,
    },
    LotStatusRepaired {
        lot_id: i32,
        old_status: LotStatus,
        new_status: LotStatus,
    },
    AdjustmentRecomputed {
        setup_job_id: i32,
        total_adjustment: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Best-effort publish. Events carry no state the database does not
    /// already hold, so a lost event costs a notification, not correctness.
    pub async fn publish(&self, event: Event) {
        if let Err(err) = self.sender.send(event).await {
            warn!(error = %err, "event channel closed, dropping event");
        }
    }
}

/// Consumer loop spawned at startup.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::BatchDiscrepancyAlert {
                batch_id,
                operator_reported_quantity,
                recounted_quantity,
                discrepancy_absolute,
                discrepancy_percentage,
            } => {
                warn!(
                    batch_id,
                    operator_reported_quantity,
                    recounted_quantity,
                    discrepancy_absolute,
                    %discrepancy_percentage,
                    "warehouse recount discrepancy above threshold"
                );
            }
            other => info!(event = ?other, "domain event"),
        }
    }
    info!("event channel drained, consumer exiting");
}
