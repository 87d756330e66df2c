pub mod adjustments;
pub mod batches;
pub mod cards;
pub mod lot_status;
pub mod setups;

pub use adjustments::{AdjustmentBreakdown, AdjustmentService};
pub use batches::{
    BatchService, CreateBatchCommand, CreatedBatch, InspectBatchCommand, InspectionOutcome,
    MergeBatchesCommand, RecountBatchCommand, SplitBatchCommand, SplitChild,
};
pub use cards::{CardService, CARDS_PER_MACHINE};
pub use lot_status::{LotStatusService, SyncOutcome};
pub use setups::{CreateSetupCommand, SetupService, UpdateSetupStatusCommand};
