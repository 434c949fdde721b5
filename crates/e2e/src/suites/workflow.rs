//! Sales-to-field workflow: offer -> sale -> service order -> dispatch
//!
//! Each stage is converted from the previous one, so a failure early in the
//! chain hard-skips everything downstream. Cleanup runs in reverse order and
//! always runs.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;

use super::crud::{create_entity, delete_entity, fetch_entity};
use super::{keys, DISPATCHES, OFFERS, SALES, SERVICE_ORDERS};
use crate::context::TestContext;
use crate::definition::{TestDefinition, TestResponse};

const OFFERS_PATH: &str = "/api/offers";
const SALES_PATH: &str = "/api/sales";
const SERVICE_ORDERS_PATH: &str = "/api/service-orders";
const DISPATCHES_PATH: &str = "/api/dispatches";

pub fn offers() -> Vec<TestDefinition> {
    vec![
        TestDefinition::new("offer-create", "Create Offer", OFFERS, |ctx| {
            Box::pin(create_offer(ctx))
        })
        .depends_on(["contact-create", "article-create"]),
        TestDefinition::new("offer-get", "Get Offer", OFFERS, |ctx| {
            Box::pin(fetch_entity(ctx, OFFERS_PATH, keys::OFFER, "Offer"))
        })
        .depends_on(["offer-create"]),
        TestDefinition::new("offer-accept", "Accept Offer", OFFERS, |ctx| {
            Box::pin(set_status(ctx, OFFERS_PATH, keys::OFFER, "Offer", "accepted"))
        })
        .depends_on(["offer-get"]),
        TestDefinition::new("offer-cleanup", "Delete Offer", OFFERS, |ctx| {
            Box::pin(delete_entity(ctx, OFFERS_PATH, keys::OFFER, "Offer"))
        })
        .depends_on(["offer-accept", "sale-cleanup"])
        .run_if_dependency_failed(true),
    ]
}

pub fn sales() -> Vec<TestDefinition> {
    vec![
        TestDefinition::new("sale-from-offer", "Convert Offer to Sale", SALES, |ctx| {
            Box::pin(convert(ctx, OFFERS_PATH, keys::OFFER, "convert-to-sale", keys::SALE, "Sale"))
        })
        .depends_on(["offer-accept"])
        .description("Converts the accepted offer into a sale"),
        TestDefinition::new("sale-get", "Get Sale", SALES, |ctx| {
            Box::pin(fetch_entity(ctx, SALES_PATH, keys::SALE, "Sale"))
        })
        .depends_on(["sale-from-offer"]),
        TestDefinition::new("sale-cleanup", "Delete Sale", SALES, |ctx| {
            Box::pin(delete_entity(ctx, SALES_PATH, keys::SALE, "Sale"))
        })
        .depends_on(["sale-get", "service-order-cleanup"])
        .run_if_dependency_failed(true),
    ]
}

pub fn service_orders() -> Vec<TestDefinition> {
    vec![
        TestDefinition::new(
            "service-order-from-sale",
            "Create Service Order from Sale",
            SERVICE_ORDERS,
            |ctx| {
                Box::pin(convert(
                    ctx,
                    SALES_PATH,
                    keys::SALE,
                    "service-orders",
                    keys::SERVICE_ORDER,
                    "Service Order",
                ))
            },
        )
        .depends_on(["sale-get"]),
        TestDefinition::new("service-order-get", "Get Service Order", SERVICE_ORDERS, |ctx| {
            Box::pin(fetch_entity(ctx, SERVICE_ORDERS_PATH, keys::SERVICE_ORDER, "Service Order"))
        })
        .depends_on(["service-order-from-sale"]),
        TestDefinition::new("service-order-list", "List Service Orders", SERVICE_ORDERS, |ctx| {
            Box::pin(list_service_orders(ctx))
        })
        .depends_on(["service-order-from-sale"]),
        TestDefinition::new(
            "service-order-cleanup",
            "Delete Service Order",
            SERVICE_ORDERS,
            |ctx| Box::pin(delete_entity(ctx, SERVICE_ORDERS_PATH, keys::SERVICE_ORDER, "Service Order")),
        )
        .depends_on(["service-order-get", "service-order-list", "dispatch-cleanup"])
        .run_if_dependency_failed(true),
    ]
}

pub fn dispatches() -> Vec<TestDefinition> {
    vec![
        TestDefinition::new("dispatch-create", "Dispatch Technician", DISPATCHES, |ctx| {
            Box::pin(create_dispatch(ctx))
        })
        .depends_on(["service-order-get"]),
        TestDefinition::new("dispatch-get", "Get Dispatch", DISPATCHES, |ctx| {
            Box::pin(fetch_entity(ctx, DISPATCHES_PATH, keys::DISPATCH, "Dispatch"))
        })
        .depends_on(["dispatch-create"]),
        TestDefinition::new("dispatch-start", "Start Dispatch", DISPATCHES, |ctx| {
            Box::pin(set_status(ctx, DISPATCHES_PATH, keys::DISPATCH, "Dispatch", "in_progress"))
        })
        .depends_on(["dispatch-get"]),
        TestDefinition::new("dispatch-cleanup", "Delete Dispatch", DISPATCHES, |ctx| {
            Box::pin(delete_entity(ctx, DISPATCHES_PATH, keys::DISPATCH, "Dispatch"))
        })
        .depends_on(["dispatch-start"])
        .run_if_dependency_failed(true),
    ]
}

async fn create_offer(ctx: &mut TestContext) -> anyhow::Result<TestResponse> {
    let (Some(contact), Some(article)) = (
        ctx.fixtures.get(keys::CONTACT).cloned(),
        ctx.fixtures.get(keys::ARTICLE).cloned(),
    ) else {
        return Ok(TestResponse::skipped("offer needs a contact and an article"));
    };

    let body = json!({
        "title": ctx.unique("Test Offer"),
        "contactId": contact.to_json(),
        "items": [{
            "articleId": article.to_json(),
            "quantity": 2,
            "unitPrice": 49.5,
        }],
    });
    create_entity(ctx, OFFERS_PATH, body, keys::OFFER, "Offer").await
}

/// PUT `{path}/{id}/status` with the new status
async fn set_status(
    ctx: &mut TestContext,
    path: &str,
    key: &str,
    label: &str,
    status: &str,
) -> anyhow::Result<TestResponse> {
    let Some(id) = ctx.fixtures.get(key).cloned() else {
        return Ok(TestResponse::skipped(format!("no {} was created", label)));
    };
    let response = ctx
        .put(format!("{}/{}/status", path, id), json!({ "status": status }))
        .await?;
    Ok(TestResponse::from_api(&response, format!("{} {} is now {}", label, id, status)))
}

/// POST `{path}/{id}/{action}` on the source entity and store the id of the
/// entity it produced under `target_key`
async fn convert(
    ctx: &mut TestContext,
    path: &str,
    source_key: &str,
    action: &str,
    target_key: &str,
    label: &str,
) -> anyhow::Result<TestResponse> {
    let Some(source) = ctx.fixtures.get(source_key).cloned() else {
        return Ok(TestResponse::skipped(format!("nothing to convert into a {}", label)));
    };
    create_entity(ctx, &format!("{}/{}/{}", path, source, action), json!({}), target_key, label).await
}

async fn list_service_orders(ctx: &mut TestContext) -> anyhow::Result<TestResponse> {
    let Some(id) = ctx.fixtures.get(keys::SERVICE_ORDER).cloned() else {
        return Ok(TestResponse::skipped("no service order was created"));
    };

    let response = ctx.get(SERVICE_ORDERS_PATH).await?;
    if !response.is_success() {
        return Ok(TestResponse::from_api(&response, ""));
    }

    let wanted = id.to_json();
    let found = response
        .items()
        .is_some_and(|items| items.iter().any(|item| item.get("id") == Some(&wanted)));
    Ok(TestResponse::check(found, format!("service order {} listed: {}", id, found))
        .with_exchange(&response))
}

async fn create_dispatch(ctx: &mut TestContext) -> anyhow::Result<TestResponse> {
    let Some(order) = ctx.fixtures.get(keys::SERVICE_ORDER).cloned() else {
        return Ok(TestResponse::skipped("no service order to dispatch"));
    };
    let Some(technician) = ctx.session.user_id.clone() else {
        return Ok(TestResponse::skipped("current user id is unknown"));
    };

    let body = json!({
        "serviceOrderId": order.to_json(),
        "technicianId": technician.to_json(),
        "scheduledDate": (Utc::now() + ChronoDuration::days(1)).to_rfc3339(),
        "notes": ctx.unique("Dispatch"),
    });
    create_entity(ctx, DISPATCHES_PATH, body, keys::DISPATCH, "Dispatch").await
}
