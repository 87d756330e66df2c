mod common;

use common::TestApp;
use rust_decimal_macros::dec;
use shopfloor_api::{
    entities::batch::BatchLocation,
    entities::card::{CardStatus, Entity as Card},
    errors::ServiceError,
    services::batches::{
        CreateBatchCommand, InspectBatchCommand, InspectionOutcome, MergeBatchesCommand,
        RecountBatchCommand, SplitBatchCommand, SplitChild,
    },
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

#[tokio::test]
async fn split_conserves_quantity_and_archives_parent() {
    let app = TestApp::new().await;
    let (machine, _lot, setup) = app.seed_production_line("split").await;

    let created = app
        .state
        .services
        .batches
        .create_batch(CreateBatchCommand {
            setup_job_id: setup.id,
            initial_quantity: 360,
            operator_id: 1,
        })
        .await
        .expect("create batch");
    let parent = created.batch;

    let children = app
        .state
        .services
        .batches
        .split(SplitBatchCommand {
            batch_id: parent.id,
            children: vec![
                SplitChild {
                    quantity: 200,
                    target_location: BatchLocation::Good,
                },
                SplitChild {
                    quantity: 160,
                    target_location: BatchLocation::ReworkRepair,
                },
            ],
            operator_id: None,
        })
        .await
        .expect("split batch");

    assert_eq!(children.len(), 2);
    let total: i32 = children.iter().map(|c| c.current_quantity).sum();
    assert_eq!(total, 360);
    for child in &children {
        assert_eq!(child.parent_batch_id, Some(parent.id));
        assert_eq!(child.setup_job_id, parent.setup_job_id);
        assert_eq!(child.lot_id, parent.lot_id);
    }

    let archived = app
        .state
        .services
        .batches
        .get_batch(parent.id)
        .await
        .expect("reload parent");
    assert_eq!(archived.current_location, BatchLocation::Archived);
    assert_eq!(archived.original_location, Some(BatchLocation::Production));
    assert_eq!(archived.current_quantity, 360);

    // The parent's card went back to the pool.
    let free = Card::find()
        .filter(shopfloor_api::entities::card::Column::MachineId.eq(machine.id))
        .filter(shopfloor_api::entities::card::Column::Status.eq(CardStatus::Free))
        .all(app.db())
        .await
        .expect("query cards");
    assert_eq!(free.len(), 20);
}

#[tokio::test]
async fn split_with_bad_sum_changes_nothing() {
    let app = TestApp::new().await;
    let (machine, _lot, setup) = app.seed_production_line("badsum").await;

    let parent = app
        .state
        .services
        .batches
        .create_batch(CreateBatchCommand {
            setup_job_id: setup.id,
            initial_quantity: 360,
            operator_id: 1,
        })
        .await
        .expect("create batch")
        .batch;

    let err = app
        .state
        .services
        .batches
        .split(SplitBatchCommand {
            batch_id: parent.id,
            children: vec![
                SplitChild {
                    quantity: 128,
                    target_location: BatchLocation::Good,
                },
                SplitChild {
                    quantity: 12,
                    target_location: BatchLocation::Defect,
                },
            ],
            operator_id: None,
        })
        .await
        .expect_err("sum 140 against 360 must fail");
    assert!(matches!(
        err,
        ServiceError::QuantityMismatch {
            parent_quantity: 360,
            children_sum: 140
        }
    ));

    // Parent untouched, card still claimed, no children written.
    let reloaded = app
        .state
        .services
        .batches
        .get_batch(parent.id)
        .await
        .expect("reload parent");
    assert_eq!(reloaded.current_location, BatchLocation::Production);
    assert_eq!(reloaded.current_quantity, 360);

    let children = app
        .state
        .services
        .batches
        .children(parent.id)
        .await
        .expect("children");
    assert!(children.is_empty());

    let in_use = Card::find()
        .filter(shopfloor_api::entities::card::Column::MachineId.eq(machine.id))
        .filter(shopfloor_api::entities::card::Column::Status.eq(CardStatus::InUse))
        .all(app.db())
        .await
        .expect("query cards");
    assert_eq!(in_use.len(), 1);
}

#[tokio::test]
async fn archived_batch_rejects_every_mutation() {
    let app = TestApp::new().await;
    let (_machine, _lot, setup) = app.seed_production_line("immutable").await;

    let batch = app
        .state
        .services
        .batches
        .create_batch(CreateBatchCommand {
            setup_job_id: setup.id,
            initial_quantity: 50,
            operator_id: 1,
        })
        .await
        .expect("create batch")
        .batch;

    app.state
        .services
        .batches
        .archive(batch.id)
        .await
        .expect("archive");

    let recount_err = app
        .state
        .services
        .batches
        .recount(RecountBatchCommand {
            batch_id: batch.id,
            recounted_quantity: 50,
            warehouse_employee_id: 2,
            operator_reported_quantity: None,
        })
        .await
        .expect_err("recount on archived");
    assert!(matches!(recount_err, ServiceError::ImmutableBatch(id) if id == batch.id));

    let split_err = app
        .state
        .services
        .batches
        .split(SplitBatchCommand {
            batch_id: batch.id,
            children: vec![SplitChild {
                quantity: 50,
                target_location: BatchLocation::Good,
            }],
            operator_id: None,
        })
        .await
        .expect_err("split on archived");
    assert!(matches!(split_err, ServiceError::ImmutableBatch(_)));

    let archive_err = app
        .state
        .services
        .batches
        .archive(batch.id)
        .await
        .expect_err("double archive");
    assert!(matches!(archive_err, ServiceError::ImmutableBatch(_)));
}

#[tokio::test]
async fn recount_records_discrepancy_without_blocking() {
    let app = TestApp::new().await;
    let (_machine, _lot, setup) = app.seed_production_line("recount").await;

    let batch = app
        .state
        .services
        .batches
        .create_batch(CreateBatchCommand {
            setup_job_id: setup.id,
            initial_quantity: 250,
            operator_id: 1,
        })
        .await
        .expect("create batch")
        .batch;

    let updated = app
        .state
        .services
        .batches
        .recount(RecountBatchCommand {
            batch_id: batch.id,
            recounted_quantity: 245,
            warehouse_employee_id: 9,
            operator_reported_quantity: None,
        })
        .await
        .expect("recount");

    assert_eq!(updated.current_location, BatchLocation::WarehouseCounted);
    assert_eq!(updated.operator_reported_quantity, Some(250));
    assert_eq!(updated.recounted_quantity, Some(245));
    assert_eq!(updated.discrepancy_absolute, Some(-5));
    assert_eq!(updated.discrepancy_percentage, Some(dec!(2.00)));
    assert!(!updated.admin_acknowledged_discrepancy);
    assert_eq!(updated.warehouse_employee_id, Some(9));
    assert!(updated.warehouse_received_at.is_some());
    // Recounting never rewrites the tracked quantity.
    assert_eq!(updated.current_quantity, 250);

    // The setup's warehouse component reflects the shortfall.
    let breakdown = app
        .state
        .services
        .adjustments
        .breakdown(setup.id)
        .await
        .expect("breakdown");
    assert_eq!(breakdown.warehouse_discrepancy_adjustment, 5);
    assert_eq!(breakdown.total_adjustment, 5);
}

#[tokio::test]
async fn sorting_batch_recount_has_no_percentage() {
    let app = TestApp::new().await;
    let part = app.seed_part("DWG-sorting").await;
    let lot = app
        .seed_lot(
            part.id,
            "LOT-sorting",
            shopfloor_api::entities::lot::LotStatus::InProduction,
        )
        .await;

    let sorting = app
        .state
        .services
        .batches
        .create_sorting_batch(lot.id, 3)
        .await
        .expect("create sorting batch");
    assert_eq!(sorting.current_location, BatchLocation::Sorting);
    assert_eq!(sorting.current_quantity, 0);
    assert_eq!(sorting.setup_job_id, None);

    let updated = app
        .state
        .services
        .batches
        .recount(RecountBatchCommand {
            batch_id: sorting.id,
            recounted_quantity: 17,
            warehouse_employee_id: 9,
            operator_reported_quantity: None,
        })
        .await
        .expect("recount sorting batch");

    assert_eq!(updated.discrepancy_absolute, Some(17));
    assert_eq!(updated.discrepancy_percentage, None);
}

#[tokio::test]
async fn inspection_flow_routes_defects_into_the_adjustment() {
    let app = TestApp::new().await;
    let (_machine, _lot, setup) = app.seed_production_line("inspect").await;

    let batch = app
        .state
        .services
        .batches
        .create_batch(CreateBatchCommand {
            setup_job_id: setup.id,
            initial_quantity: 120,
            operator_id: 1,
        })
        .await
        .expect("create batch")
        .batch;

    app.state
        .services
        .batches
        .recount(RecountBatchCommand {
            batch_id: batch.id,
            recounted_quantity: 120,
            warehouse_employee_id: 9,
            operator_reported_quantity: None,
        })
        .await
        .expect("recount");

    let on_bench = app
        .state
        .services
        .batches
        .start_inspection(batch.id, 4)
        .await
        .expect("start inspection");
    assert_eq!(on_bench.current_location, BatchLocation::Inspection);
    assert_eq!(on_bench.qc_inspector_id, Some(4));
    assert!(on_bench.qc_start_time.is_some());

    let verdict = app
        .state
        .services
        .batches
        .inspect(InspectBatchCommand {
            batch_id: batch.id,
            qc_inspector_id: 4,
            outcome: InspectionOutcome::Defect,
            comment: Some("surface cracks".to_string()),
        })
        .await
        .expect("inspect");
    assert_eq!(verdict.current_location, BatchLocation::Defect);
    assert!(verdict.qc_end_time.is_some());
    assert_eq!(verdict.qc_comment.as_deref(), Some("surface cracks"));

    let breakdown = app
        .state
        .services
        .adjustments
        .breakdown(setup.id)
        .await
        .expect("breakdown");
    assert_eq!(breakdown.defect_adjustment, 120);
    // The batch left warehouse_counted, so that component dropped back to 0.
    assert_eq!(breakdown.warehouse_discrepancy_adjustment, 0);
    assert_eq!(breakdown.total_adjustment, 120);
}

#[tokio::test]
async fn inspect_requires_the_bench() {
    let app = TestApp::new().await;
    let (_machine, _lot, setup) = app.seed_production_line("nobench").await;

    let batch = app
        .state
        .services
        .batches
        .create_batch(CreateBatchCommand {
            setup_job_id: setup.id,
            initial_quantity: 30,
            operator_id: 1,
        })
        .await
        .expect("create batch")
        .batch;

    let err = app
        .state
        .services
        .batches
        .inspect(InspectBatchCommand {
            batch_id: batch.id,
            qc_inspector_id: 4,
            outcome: InspectionOutcome::Good,
            comment: None,
        })
        .await
        .expect_err("inspect straight from production");
    assert!(matches!(err, ServiceError::InvalidState(_)));
}

#[tokio::test]
async fn merge_sums_sources_and_archives_them() {
    let app = TestApp::new().await;
    let (_machine, lot, setup) = app.seed_production_line("merge").await;

    let mut sources = Vec::new();
    for qty in [40, 60] {
        let b = app
            .state
            .services
            .batches
            .create_batch(CreateBatchCommand {
                setup_job_id: setup.id,
                initial_quantity: qty,
                operator_id: 1,
            })
            .await
            .expect("create batch")
            .batch;
        sources.push(b);
    }

    let merged = app
        .state
        .services
        .batches
        .merge(MergeBatchesCommand {
            batch_ids: sources.iter().map(|b| b.id).collect(),
            target_location: BatchLocation::Production,
            employee_id: Some(1),
        })
        .await
        .expect("merge");

    assert_eq!(merged.current_quantity, 100);
    assert_eq!(merged.lot_id, lot.id);
    assert_eq!(merged.setup_job_id, Some(setup.id));
    assert_eq!(merged.parent_batch_id, None);

    for source in &sources {
        let reloaded = app
            .state
            .services
            .batches
            .get_batch(source.id)
            .await
            .expect("reload source");
        assert_eq!(reloaded.current_location, BatchLocation::Archived);
    }
}

#[tokio::test]
async fn merge_rejects_batches_from_different_lots() {
    let app = TestApp::new().await;
    let (_machine_a, lot_a, setup_a) = app.seed_production_line("mixa").await;
    let (_machine_b, lot_b, setup_b) = app.seed_production_line("mixb").await;

    let mut sources = Vec::new();
    for (setup_id, qty) in [(setup_a.id, 40), (setup_b.id, 60)] {
        let b = app
            .state
            .services
            .batches
            .create_batch(CreateBatchCommand {
                setup_job_id: setup_id,
                initial_quantity: qty,
                operator_id: 1,
            })
            .await
            .expect("create batch")
            .batch;
        sources.push(b);
    }

    let err = app
        .state
        .services
        .batches
        .merge(MergeBatchesCommand {
            batch_ids: sources.iter().map(|b| b.id).collect(),
            target_location: BatchLocation::Production,
            employee_id: Some(1),
        })
        .await
        .expect_err("batches of two lots must not merge");
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    // Nothing was archived and no merged batch appeared in either lot.
    for source in &sources {
        let reloaded = app
            .state
            .services
            .batches
            .get_batch(source.id)
            .await
            .expect("reload source");
        assert_eq!(reloaded.current_location, BatchLocation::Production);
        assert_eq!(reloaded.current_quantity, source.current_quantity);
    }
    for lot_id in [lot_a.id, lot_b.id] {
        let batches = app
            .state
            .services
            .batches
            .batches_for_lot(lot_id)
            .await
            .expect("batches for lot");
        assert_eq!(batches.len(), 1);
    }
}

#[tokio::test]
async fn batch_creation_requires_an_active_setup() {
    let app = TestApp::new().await;
    let machine = app.seed_machine_with_cards("machine-inactive").await;
    let part = app.seed_part("DWG-inactive").await;
    let lot = app
        .seed_lot(
            part.id,
            "LOT-inactive",
            shopfloor_api::entities::lot::LotStatus::InProduction,
        )
        .await;
    let setup = app
        .seed_setup(
            &lot,
            machine.id,
            shopfloor_api::entities::setup_job::SetupStatus::Completed,
        )
        .await;

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
        .expect_err("completed setup must reject batches");
    assert!(matches!(err, ServiceError::InvalidState(_)));
}
