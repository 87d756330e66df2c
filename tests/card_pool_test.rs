mod common;

use common::TestApp;
use shopfloor_api::{
    entities::card::CardStatus,
    errors::ServiceError,
    services::batches::CreateBatchCommand,
    services::CARDS_PER_MACHINE,
};

#[tokio::test]
async fn pool_exhaustion_rejects_the_twenty_first_batch() {
    let app = TestApp::new().await;
    let (machine, _lot, setup) = app.seed_production_line("exhaust").await;

    for i in 0..CARDS_PER_MACHINE {
        let created = app
            .state
            .services
            .batches
            .create_batch(CreateBatchCommand {
                setup_job_id: setup.id,
                initial_quantity: 10,
                operator_id: 1,
            })
            .await
            .unwrap_or_else(|e| panic!("batch {i} should get a card: {e}"));
        assert_eq!(created.card_number, i + 1);
    }

    let err = app
        .state
        .services
        .batches
        .create_batch(CreateBatchCommand {
            setup_job_id: setup.id,
            initial_quantity: 10,
            operator_id: 1,
        })
        .await
        .expect_err("pool of 20 is exhausted");
    assert!(matches!(
        err,
        ServiceError::NoCardAvailable { machine_id } if machine_id == machine.id
    ));

    // The rejected batch was rolled back with the card claim.
    let pool = app
        .state
        .services
        .cards
        .pool_state(machine.id)
        .await
        .expect("pool state");
    assert_eq!(pool.len(), 20);
    assert!(pool.iter().all(|c| c.status == CardStatus::InUse));
}

#[tokio::test]
async fn released_card_number_is_reused() {
    let app = TestApp::new().await;
    let (_machine, _lot, setup) = app.seed_production_line("reuse").await;

    let mut batches = Vec::new();
    for _ in 0..CARDS_PER_MACHINE {
        batches.push(
            app.state
                .services
                .batches
                .create_batch(CreateBatchCommand {
                    setup_job_id: setup.id,
                    initial_quantity: 10,
                    operator_id: 1,
                })
                .await
                .expect("create batch"),
        );
    }

    // Archive the batch that holds card 7; exactly that number comes back.
    let holder = &batches[6];
    assert_eq!(holder.card_number, 7);
    app.state
        .services
        .batches
        .archive(holder.batch.id)
        .await
        .expect("archive");

    let next = app
        .state
        .services
        .batches
        .create_batch(CreateBatchCommand {
            setup_job_id: setup.id,
            initial_quantity: 10,
            operator_id: 1,
        })
        .await
        .expect("create after release");
    assert_eq!(next.card_number, 7);
}

#[tokio::test]
async fn concurrent_acquisition_never_oversubscribes() {
    let app = TestApp::new().await;
    let (machine, _lot, setup) = app.seed_production_line("concurrent").await;

    let mut handles = Vec::new();
    for _ in 0..30 {
        let batches = app.state.services.batches.clone();
        let setup_id = setup.id;
        handles.push(tokio::spawn(async move {
            batches
                .create_batch(CreateBatchCommand {
                    setup_job_id: setup_id,
                    initial_quantity: 5,
                    operator_id: 1,
                })
                .await
        }));
    }

    let mut granted = Vec::new();
    let mut rejected = 0;
    for handle in handles {
        match handle.await.expect("task join") {
            Ok(created) => granted.push(created.card_number),
            Err(ServiceError::NoCardAvailable { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(granted.len(), 20);
    assert_eq!(rejected, 10);
    granted.sort_unstable();
    granted.dedup();
    assert_eq!(granted.len(), 20, "a card number was handed out twice");

    let pool = app
        .state
        .services
        .cards
        .pool_state(machine.id)
        .await
        .expect("pool state");
    assert!(pool.iter().all(|c| c.status == CardStatus::InUse));
}

#[tokio::test]
async fn lost_cards_stay_out_of_the_pool_until_reset() {
    let app = TestApp::new().await;
    let (machine, _lot, setup) = app.seed_production_line("lost").await;

    app.state
        .services
        .cards
        .mark_lost(machine.id, 1)
        .await
        .expect("mark lost");

    let created = app
        .state
        .services
        .batches
        .create_batch(CreateBatchCommand {
            setup_job_id: setup.id,
            initial_quantity: 10,
            operator_id: 1,
        })
        .await
        .expect("create batch");
    assert_eq!(created.card_number, 2, "lost card 1 must be skipped");

    // A lost card cannot be released, only reset.
    let err = app
        .state
        .services
        .cards
        .release(machine.id, 1)
        .await
        .expect_err("release of a lost card");
    assert!(matches!(err, ServiceError::InvalidState(_)));

    app.state
        .services
        .cards
        .reset(machine.id, 1)
        .await
        .expect("reset");

    let next = app
        .state
        .services
        .batches
        .create_batch(CreateBatchCommand {
            setup_job_id: setup.id,
            initial_quantity: 10,
            operator_id: 1,
        })
        .await
        .expect("create after reset");
    assert_eq!(next.card_number, 1);
}

#[tokio::test]
async fn provisioning_is_idempotent() {
    let app = TestApp::new().await;
    let machine = app.seed_machine("machine-idem").await;

    let first = app
        .state
        .services
        .cards
        .provision_machine(machine.id)
        .await
        .expect("first provision");
    assert_eq!(first, 20);

    let second = app
        .state
        .services
        .cards
        .provision_machine(machine.id)
        .await
        .expect("second provision");
    assert_eq!(second, 0);

    let pool = app
        .state
        .services
        .cards
        .pool_state(machine.id)
        .await
        .expect("pool state");
    assert_eq!(pool.len(), 20);
    let numbers: Vec<i32> = pool.iter().map(|c| c.card_number).collect();
    assert_eq!(numbers, (1..=20).collect::<Vec<_>>());
}
