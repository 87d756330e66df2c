pub mod batch;
pub mod card;
pub mod employee;
pub mod lot;
pub mod machine;
pub mod part;
pub mod setup_job;
pub mod setup_quantity_adjustment;

pub use batch::{BatchLocation, Entity as Batch};
pub use card::{CardStatus, Entity as Card};
pub use employee::Entity as Employee;
pub use lot::{Entity as Lot, LotStatus};
pub use machine::Entity as Machine;
pub use part::Entity as Part;
pub use setup_job::{Entity as SetupJob, SetupStatus};
pub use setup_quantity_adjustment::Entity as SetupQuantityAdjustment;
