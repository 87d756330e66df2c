mod common;

use common::TestApp;
use shopfloor_api::{
    entities::lot::LotStatus,
    entities::setup_job::SetupStatus,
    errors::ServiceError,
    services::lot_status::SyncOutcome,
    services::setups::{CreateSetupCommand, UpdateSetupStatusCommand},
};

#[tokio::test]
async fn lagging_lot_is_promoted_once() {
    let app = TestApp::new().await;
    let machine = app.seed_machine("machine-sync").await;
    let part = app.seed_part("DWG-sync").await;
    let lot = app.seed_lot(part.id, "LOT-sync", LotStatus::Assigned).await;
    app.seed_setup(&lot, machine.id, SetupStatus::Allowed).await;

    let outcome = app
        .state
        .services
        .lot_status
        .sync_lot(lot.id)
        .await
        .expect("sync");
    assert_eq!(outcome, SyncOutcome::Promoted);
    assert_eq!(
        app.state
            .services
            .lot_status
            .get_status(lot.id)
            .await
            .expect("status"),
        LotStatus::InProduction
    );

    // Running the repair again is a no-op.
    let again = app
        .state
        .services
        .lot_status
        .sync_lot(lot.id)
        .await
        .expect("second sync");
    assert_eq!(again, SyncOutcome::Unchanged);
}

#[tokio::test]
async fn lot_without_live_setup_is_left_alone() {
    let app = TestApp::new().await;
    let machine = app.seed_machine("machine-idle").await;
    let part = app.seed_part("DWG-idle").await;

    let fresh = app.seed_lot(part.id, "LOT-fresh", LotStatus::New).await;
    let outcome = app
        .state
        .services
        .lot_status
        .sync_lot(fresh.id)
        .await
        .expect("sync fresh");
    assert_eq!(outcome, SyncOutcome::Unchanged);

    // A terminal setup does not count as live.
    let done = app.seed_lot(part.id, "LOT-done", LotStatus::Assigned).await;
    app.seed_setup(&done, machine.id, SetupStatus::Completed)
        .await;
    let outcome = app
        .state
        .services
        .lot_status
        .sync_lot(done.id)
        .await
        .expect("sync done");
    assert_eq!(outcome, SyncOutcome::Unchanged);
    assert_eq!(
        app.state
            .services
            .lot_status
            .get_status(done.id)
            .await
            .expect("status"),
        LotStatus::Assigned
    );
}

#[tokio::test]
async fn repair_never_downgrades() {
    let app = TestApp::new().await;
    let machine = app.seed_machine("machine-nodown").await;
    let part = app.seed_part("DWG-nodown").await;
    let lot = app
        .seed_lot(part.id, "LOT-nodown", LotStatus::PostProduction)
        .await;
    app.seed_setup(&lot, machine.id, SetupStatus::Started).await;

    let outcome = app
        .state
        .services
        .lot_status
        .sync_lot(lot.id)
        .await
        .expect("sync");
    assert_eq!(outcome, SyncOutcome::Unchanged);
    assert_eq!(
        app.state
            .services
            .lot_status
            .get_status(lot.id)
            .await
            .expect("status"),
        LotStatus::PostProduction
    );
}

#[tokio::test]
async fn sweep_repairs_every_lagging_lot() {
    let app = TestApp::new().await;
    let machine = app.seed_machine("machine-sweep").await;
    let part = app.seed_part("DWG-sweep").await;

    let lagging_a = app.seed_lot(part.id, "LOT-sw-a", LotStatus::New).await;
    app.seed_setup(&lagging_a, machine.id, SetupStatus::Created)
        .await;
    let lagging_b = app.seed_lot(part.id, "LOT-sw-b", LotStatus::Assigned).await;
    app.seed_setup(&lagging_b, machine.id, SetupStatus::Queued)
        .await;
    let idle = app.seed_lot(part.id, "LOT-sw-idle", LotStatus::New).await;

    let mut repaired = app
        .state
        .services
        .lot_status
        .sweep()
        .await
        .expect("sweep");
    repaired.sort_unstable();
    assert_eq!(repaired, vec![lagging_a.id, lagging_b.id]);

    assert_eq!(
        app.state
            .services
            .lot_status
            .get_status(idle.id)
            .await
            .expect("status"),
        LotStatus::New
    );
}

#[tokio::test]
async fn setup_creation_pulls_the_lot_forward() {
    let app = TestApp::new().await;
    let machine = app.seed_machine("machine-pull").await;
    let part = app.seed_part("DWG-pull").await;
    let lot = app.seed_lot(part.id, "LOT-pull", LotStatus::Assigned).await;

    app.state
        .services
        .setups
        .create_setup(CreateSetupCommand {
            lot_id: lot.id,
            machine_id: machine.id,
            employee_id: None,
            planned_quantity: 400,
            cycle_time: Some(30),
        })
        .await
        .expect("create setup");

    assert_eq!(
        app.state
            .services
            .lot_status
            .get_status(lot.id)
            .await
            .expect("status"),
        LotStatus::InProduction
    );
}

#[tokio::test]
async fn setup_workflow_rejects_illegal_transitions() {
    let app = TestApp::new().await;
    let machine = app.seed_machine("machine-flow").await;
    let part = app.seed_part("DWG-flow").await;
    let lot = app.seed_lot(part.id, "LOT-flow", LotStatus::Assigned).await;
    let setup = app
        .seed_setup(&lot, machine.id, SetupStatus::Created)
        .await;

    // created -> pending_qc -> allowed -> started is the QC-gated path.
    app.state
        .services
        .setups
        .update_status(UpdateSetupStatusCommand {
            setup_job_id: setup.id,
            new_status: SetupStatus::PendingQc,
            qa_id: None,
        })
        .await
        .expect("to pending_qc");

    let err = app
        .state
        .services
        .setups
        .update_status(UpdateSetupStatusCommand {
            setup_job_id: setup.id,
            new_status: SetupStatus::Started,
            qa_id: None,
        })
        .await
        .expect_err("pending_qc cannot start without approval");
    assert!(matches!(err, ServiceError::InvalidState(_)));

    let allowed = app
        .state
        .services
        .setups
        .update_status(UpdateSetupStatusCommand {
            setup_job_id: setup.id,
            new_status: SetupStatus::Allowed,
            qa_id: Some(11),
        })
        .await
        .expect("to allowed");
    assert_eq!(allowed.qa_id, Some(11));
    assert!(allowed.qa_date.is_some());

    let started = app
        .state
        .services
        .setups
        .update_status(UpdateSetupStatusCommand {
            setup_job_id: setup.id,
            new_status: SetupStatus::Started,
            qa_id: None,
        })
        .await
        .expect("to started");
    assert!(started.start_time.is_some());

    let completed = app
        .state
        .services
        .setups
        .update_status(UpdateSetupStatusCommand {
            setup_job_id: setup.id,
            new_status: SetupStatus::Completed,
            qa_id: None,
        })
        .await
        .expect("to completed");
    assert!(completed.end_time.is_some());

    // Terminal statuses are dead ends.
    let err = app
        .state
        .services
        .setups
        .update_status(UpdateSetupStatusCommand {
            setup_job_id: setup.id,
            new_status: SetupStatus::Started,
            qa_id: None,
        })
        .await
        .expect_err("completed is terminal");
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn approval_requires_an_inspector() {
    let app = TestApp::new().await;
    let machine = app.seed_machine("machine-qa").await;
    let part = app.seed_part("DWG-qa").await;
    let lot = app.seed_lot(part.id, "LOT-qa", LotStatus::Assigned).await;
    let setup = app
        .seed_setup(&lot, machine.id, SetupStatus::PendingQc)
        .await;

    let err = app
        .state
        .services
        .setups
        .update_status(UpdateSetupStatusCommand {
            setup_job_id: setup.id,
            new_status: SetupStatus::Allowed,
            qa_id: None,
        })
        .await
        .expect_err("allowed without qa_id");
    assert!(matches!(err, ServiceError::ValidationError(_)));
}
