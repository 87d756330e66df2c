#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, NotSet, Set};
use shopfloor_api::{
    config::AppConfig,
    db,
    entities::{employee, lot, lot::LotStatus, machine, part, setup_job, setup_job::SetupStatus},
    events::{self, EventSender},
    AppState,
};
use tokio::sync::mpsc;

/// Harness backed by an in-memory SQLite database with migrations applied.
pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single pooled connection so every query sees the same in-memory db.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (tx, rx) = mpsc::channel(256);
        let event_sender = EventSender::new(tx);
        let event_task = tokio::spawn(events::process_events(rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        Self {
            state,
            _event_task: event_task,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.state.db.as_ref()
    }

    pub async fn seed_machine(&self, name: &str) -> machine::Model {
        machine::ActiveModel {
            id: NotSet,
            name: Set(name.to_string()),
            machine_type: Set(Some("lathe".to_string())),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed machine")
    }

    /// Machine with its 20-card pool already provisioned.
    pub async fn seed_machine_with_cards(&self, name: &str) -> machine::Model {
        let m = self.seed_machine(name).await;
        self.state
            .services
            .cards
            .provision_machine(m.id)
            .await
            .expect("provision cards");
        m
    }

    pub async fn seed_employee(&self, full_name: &str) -> employee::Model {
        employee::ActiveModel {
            id: NotSet,
            full_name: Set(full_name.to_string()),
            role_id: Set(None),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed employee")
    }

    pub async fn seed_part(&self, drawing_number: &str) -> part::Model {
        part::ActiveModel {
            id: NotSet,
            drawing_number: Set(drawing_number.to_string()),
            description: Set(None),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed part")
    }

    pub async fn seed_lot(&self, part_id: i32, lot_number: &str, status: LotStatus) -> lot::Model {
        lot::ActiveModel {
            id: NotSet,
            lot_number: Set(lot_number.to_string()),
            part_id: Set(part_id),
            initial_planned_quantity: Set(Some(1000)),
            additional_quantity: Set(0),
            status: Set(status),
            assigned_machine_id: Set(None),
            machine_queue_position: Set(None),
            reserved_material_id: Set(None),
            due_date: Set(None),
            order_manager_id: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed lot")
    }

    pub async fn seed_setup(
        &self,
        lot: &lot::Model,
        machine_id: i32,
        status: SetupStatus,
    ) -> setup_job::Model {
        setup_job::ActiveModel {
            id: NotSet,
            lot_id: Set(lot.id),
            part_id: Set(lot.part_id),
            machine_id: Set(machine_id),
            employee_id: Set(None),
            planned_quantity: Set(500),
            additional_quantity: Set(0),
            cycle_time: Set(Some(45)),
            status: Set(status),
            start_time: Set(None),
            end_time: Set(None),
            qa_id: Set(None),
            qa_date: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed setup")
    }

    /// Machine with cards, part, lot and an `allowed` setup: everything batch
    /// creation needs.
    pub async fn seed_production_line(&self, tag: &str) -> (machine::Model, lot::Model, setup_job::Model) {
        let machine = self.seed_machine_with_cards(&format!("machine-{tag}")).await;
        let part = self.seed_part(&format!("DWG-{tag}")).await;
        let lot = self
            .seed_lot(part.id, &format!("LOT-{tag}"), LotStatus::InProduction)
            .await;
        let setup = self.seed_setup(&lot, machine.id, SetupStatus::Allowed).await;
        (machine, lot, setup)
    }
}
