mod common;

use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use uuid::Uuid;

use cellarstock_api::entities::history::{Entity as History, StockAction};
use cellarstock_api::entities::wine::{self, Entity as Wine, WineStatus};
use cellarstock_api::errors::ServiceError;
use cellarstock_api::models::StockSnapshot;
use cellarstock_api::services::wine::{
    CreateWineRequest, PackageRequest, StockMovementRequest, UpdateStockRequest,
};

fn create_request(name: &str) -> CreateWineRequest {
    CreateWineRequest {
        name: name.to_string(),
        wine_type: "red".to_string(),
        unpackaged_boxes: 10,
        packaged_boxes: 5,
        remaining_water: dec!(2.5),
        remark: None,
    }
}

fn movement(unpackaged: i32, packaged: i32, water: rust_decimal::Decimal) -> StockMovementRequest {
    StockMovementRequest {
        unpackaged_boxes: unpackaged,
        packaged_boxes: packaged,
        remaining_water: water,
        remark: None,
    }
}

#[tokio::test]
async fn create_records_initial_stock_in() {
    let ctx = common::setup().await;

    let outcome = ctx
        .wines
        .create_wine(create_request("Cabernet"), "alice")
        .await
        .expect("create wine");

    assert_eq!(outcome.wine.name, "Cabernet");
    assert_eq!(outcome.wine.unpackaged_boxes, 10);
    assert_eq!(outcome.wine.packaged_boxes, 5);
    assert_eq!(outcome.wine.remaining_water, dec!(2.5));
    assert_eq!(outcome.wine.total_stock, 15);
    assert_eq!(outcome.wine.status, WineStatus::InStock);

    assert_eq!(outcome.entry.action, StockAction::StockIn);
    assert_eq!(outcome.entry.wine_name, "Cabernet");
    assert_eq!(outcome.entry.operator, "alice");
    assert_eq!(outcome.entry.details.before, StockSnapshot::ZERO);
    assert_eq!(outcome.entry.details.after, outcome.wine.snapshot());
    assert_eq!(outcome.entry.details.change, outcome.wine.snapshot());
}

#[tokio::test]
async fn create_rejects_negative_and_missing_fields() {
    let ctx = common::setup().await;

    let mut bad = create_request("Merlot");
    bad.unpackaged_boxes = -1;
    assert!(matches!(
        ctx.wines.create_wine(bad, "alice").await,
        Err(ServiceError::ValidationError(_))
    ));

    let mut unnamed = create_request("");
    unnamed.name = String::new();
    assert!(matches!(
        ctx.wines.create_wine(unnamed, "alice").await,
        Err(ServiceError::ValidationError(_))
    ));
}

#[tokio::test]
async fn stock_in_adds_and_audits_deltas() {
    let ctx = common::setup().await;
    let id = ctx
        .wines
        .create_wine(create_request("Syrah"), "alice")
        .await
        .expect("create wine")
        .wine
        .id;

    let outcome = ctx
        .wines
        .stock_in(id, movement(3, 2, dec!(0.5)), "bob")
        .await
        .expect("stock in");

    assert_eq!(outcome.wine.unpackaged_boxes, 13);
    assert_eq!(outcome.wine.packaged_boxes, 7);
    assert_eq!(outcome.wine.remaining_water, dec!(3.0));
    assert_eq!(outcome.wine.total_stock, 20);

    let details = &outcome.entry.details;
    assert_eq!(outcome.entry.action, StockAction::StockIn);
    assert_eq!(details.change, StockSnapshot::new(3, 2, dec!(0.5)));
    assert_eq!(details.before.apply(&details.change), details.after);

    let persisted = Wine::find_by_id(id)
        .one(&*ctx.db)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(persisted.snapshot(), details.after);
}

#[tokio::test]
async fn stock_out_decrements_with_negative_change() {
    let ctx = common::setup().await;
    let id = ctx
        .wines
        .create_wine(create_request("Malbec"), "alice")
        .await
        .expect("create wine")
        .wine
        .id;

    let outcome = ctx
        .wines
        .stock_out(id, movement(4, 1, dec!(1.5)), "alice")
        .await
        .expect("stock out");

    assert_eq!(outcome.wine.unpackaged_boxes, 6);
    assert_eq!(outcome.wine.packaged_boxes, 4);
    assert_eq!(outcome.wine.remaining_water, dec!(1.0));

    let details = &outcome.entry.details;
    assert_eq!(outcome.entry.action, StockAction::StockOut);
    assert_eq!(details.change, StockSnapshot::new(-4, -1, dec!(-1.5)));
    assert_eq!(details.before.apply(&details.change), details.after);
}

#[tokio::test]
async fn stock_out_exceeding_any_field_writes_nothing() {
    let ctx = common::setup().await;
    let created = ctx
        .wines
        .create_wine(create_request("Pinot"), "alice")
        .await
        .expect("create wine")
        .wine;

    let entries_before = History::find().count(&*ctx.db).await.expect("count");

    // More packaged boxes than available; unpackaged alone would be fine.
    let err = ctx
        .wines
        .stock_out(created.id, movement(1, 6, dec!(0)), "alice")
        .await
        .expect_err("should fail");
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    let untouched = Wine::find_by_id(created.id)
        .one(&*ctx.db)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(untouched.snapshot(), created.snapshot());
    assert_eq!(untouched.version, created.version);

    let entries_after = History::find().count(&*ctx.db).await.expect("count");
    assert_eq!(entries_before, entries_after);
}

#[tokio::test]
async fn update_replaces_supplied_fields_and_keeps_others() {
    let ctx = common::setup().await;
    let id = ctx
        .wines
        .create_wine(create_request("Riesling"), "alice")
        .await
        .expect("create wine")
        .wine
        .id;

    let outcome = ctx
        .wines
        .update_stock(
            id,
            UpdateStockRequest {
                unpackaged_boxes: Some(20),
                packaged_boxes: None,
                remaining_water: Some(dec!(0.75)),
                remark: Some("recount".to_string()),
            },
            "alice",
        )
        .await
        .expect("update");

    assert_eq!(outcome.wine.unpackaged_boxes, 20);
    assert_eq!(outcome.wine.packaged_boxes, 5);
    assert_eq!(outcome.wine.remaining_water, dec!(0.75));
    assert_eq!(outcome.wine.total_stock, 25);

    assert_eq!(outcome.entry.action, StockAction::UpdateStock);
    assert_eq!(outcome.entry.remark, "recount");
    assert_eq!(
        outcome.entry.details.change,
        StockSnapshot::new(10, 0, dec!(-1.75))
    );

    assert!(matches!(
        ctx.wines
            .update_stock(
                id,
                UpdateStockRequest {
                    unpackaged_boxes: Some(-3),
                    packaged_boxes: None,
                    remaining_water: None,
                    remark: None,
                },
                "alice",
            )
            .await,
        Err(ServiceError::ValidationError(_))
    ));
}

#[tokio::test]
async fn package_moves_boxes_between_pools() {
    let ctx = common::setup().await;
    let id = ctx
        .wines
        .create_wine(create_request("Chardonnay"), "alice")
        .await
        .expect("create wine")
        .wine
        .id;

    let outcome = ctx
        .wines
        .package(
            id,
            PackageRequest {
                packaged_boxes: 4,
                remaining_water: None,
                remark: None,
            },
            "bob",
        )
        .await
        .expect("package");

    assert_eq!(outcome.wine.unpackaged_boxes, 6);
    assert_eq!(outcome.wine.packaged_boxes, 9);
    assert_eq!(outcome.wine.total_stock, 15);
    assert_eq!(outcome.wine.remaining_water, dec!(2.5));

    assert_eq!(outcome.entry.action, StockAction::UpdateStock);
    assert_eq!(outcome.entry.remark, "packaging run");
    assert_eq!(outcome.entry.details.change, StockSnapshot::new(-4, 4, dec!(0)));
}

#[tokio::test]
async fn package_records_liquid_delta_only_when_supplied() {
    let ctx = common::setup().await;
    let id = ctx
        .wines
        .create_wine(create_request("Viognier"), "alice")
        .await
        .expect("create wine")
        .wine
        .id;

    let outcome = ctx
        .wines
        .package(
            id,
            PackageRequest {
                packaged_boxes: 2,
                remaining_water: Some(dec!(1.0)),
                remark: Some("after bottling".to_string()),
            },
            "alice",
        )
        .await
        .expect("package");

    assert_eq!(outcome.wine.remaining_water, dec!(1.0));
    assert_eq!(outcome.entry.details.change.remaining_water, dec!(-1.5));
    assert_eq!(outcome.entry.remark, "after bottling");
}

#[tokio::test]
async fn package_rejects_out_of_range_amounts() {
    let ctx = common::setup().await;
    let id = ctx
        .wines
        .create_wine(create_request("Gamay"), "alice")
        .await
        .expect("create wine")
        .wine
        .id;

    for amount in [0, -2] {
        assert!(matches!(
            ctx.wines
                .package(
                    id,
                    PackageRequest {
                        packaged_boxes: amount,
                        remaining_water: None,
                        remark: None,
                    },
                    "alice",
                )
                .await,
            Err(ServiceError::ValidationError(_))
        ));
    }

    let err = ctx
        .wines
        .package(
            id,
            PackageRequest {
                packaged_boxes: 11,
                remaining_water: None,
                remark: None,
            },
            "alice",
        )
        .await
        .expect_err("over the unpackaged count");
    match err {
        ServiceError::ValidationError(message) => {
            assert!(message.contains("10"), "message should cite the maximum: {}", message)
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn package_rejects_out_of_stock_product() {
    let ctx = common::setup().await;
    let now = Utc::now();

    let retired = wine::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Retired".to_string()),
        wine_type: Set("white".to_string()),
        unpackaged_boxes: Set(8),
        packaged_boxes: Set(0),
        remaining_water: Set(dec!(0)),
        total_stock: Set(8),
        status: Set(WineStatus::OutOfStock),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*ctx.db)
    .await
    .expect("insert");

    assert!(matches!(
        ctx.wines
            .package(
                retired.id,
                PackageRequest {
                    packaged_boxes: 1,
                    remaining_water: None,
                    remark: None,
                },
                "alice",
            )
            .await,
        Err(ServiceError::InvalidOperation(_))
    ));
}

#[tokio::test]
async fn delete_keeps_history_under_original_name() {
    let ctx = common::setup().await;
    let created = ctx
        .wines
        .create_wine(create_request("Tempranillo"), "alice")
        .await
        .expect("create wine")
        .wine;
    ctx.wines
        .stock_in(created.id, movement(1, 0, dec!(0)), "alice")
        .await
        .expect("stock in");

    ctx.wines
        .delete_wine(created.id, "alice")
        .await
        .expect("delete");

    assert!(matches!(
        ctx.wines.get_wine(created.id).await,
        Err(ServiceError::NotFound(_))
    ));

    let survivors = History::find().all(&*ctx.db).await.expect("query");
    assert_eq!(survivors.len(), 2);
    assert!(survivors.iter().all(|entry| entry.wine_name == "Tempranillo"));
    assert!(survivors.iter().all(|entry| entry.wine_id == created.id));
}

#[tokio::test]
async fn list_filters_by_status_and_search() {
    let ctx = common::setup().await;

    ctx.wines
        .create_wine(create_request("Estate Cabernet"), "alice")
        .await
        .expect("create");
    ctx.wines
        .create_wine(
            CreateWineRequest {
                name: "House White".to_string(),
                wine_type: "white".to_string(),
                unpackaged_boxes: 1,
                packaged_boxes: 0,
                remaining_water: dec!(0),
                remark: None,
            },
            "alice",
        )
        .await
        .expect("create");

    let now = Utc::now();
    wine::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Hidden".to_string()),
        wine_type: Set("red".to_string()),
        unpackaged_boxes: Set(0),
        packaged_boxes: Set(0),
        remaining_water: Set(dec!(0)),
        total_stock: Set(0),
        status: Set(WineStatus::OutOfStock),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*ctx.db)
    .await
    .expect("insert");

    let all = ctx.wines.list_wines(None).await.expect("list");
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|w| w.status == WineStatus::InStock));

    // Substring match on name, case-insensitive.
    let by_name = ctx.wines.list_wines(Some("cabernet")).await.expect("list");
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].name, "Estate Cabernet");

    // Substring match on type.
    let by_type = ctx.wines.list_wines(Some("WHITE")).await.expect("list");
    assert_eq!(by_type.len(), 1);
    assert_eq!(by_type[0].name, "House White");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stock_ins_never_lose_updates() {
    let ctx = common::setup().await;
    let id = ctx
        .wines
        .create_wine(create_request("Barbera"), "alice")
        .await
        .expect("create wine")
        .wine
        .id;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let wines = ctx.wines.clone();
        handles.push(tokio::spawn(async move {
            wines.stock_in(id, movement(1, 0, dec!(0)), "alice").await
        }));
    }

    // A writer that loses the version race is rejected outright, never
    // silently absorbed into another writer's update. SQLite reports some
    // of the lock contention as driver errors; both kinds count as rejected.
    let mut accepted = 0i32;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => accepted += 1,
            Err(ServiceError::Conflict(_)) | Err(ServiceError::DatabaseError(_)) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert!(accepted >= 1);

    let settled = Wine::find_by_id(id)
        .one(&*ctx.db)
        .await
        .expect("query")
        .expect("exists");
    assert_eq!(settled.unpackaged_boxes, 10 + accepted);
    assert_eq!(settled.packaged_boxes, 5);
    assert_eq!(settled.version, 1 + accepted);

    // One audit row per accepted mutation plus the initial registration.
    let entries = History::find().count(&*ctx.db).await.expect("count");
    assert_eq!(entries, 1 + accepted as u64);
}

#[tokio::test]
async fn mutations_on_missing_product_return_not_found() {
    let ctx = common::setup().await;
    let missing = Uuid::new_v4();

    assert!(matches!(
        ctx.wines.stock_in(missing, movement(1, 0, dec!(0)), "alice").await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        ctx.wines.delete_wine(missing, "alice").await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        ctx.wines.get_wine(missing).await,
        Err(ServiceError::NotFound(_))
    ));
}
