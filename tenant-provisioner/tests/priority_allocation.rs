mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use common::*;
use futures::future::join_all;
use tenant_provisioner::clients::memory::{CallLog, MemoryRouting};
use tenant_provisioner::steps::PriorityAllocator;

#[tokio::test]
async fn concurrent_allocations_never_collide() {
    let routing = Arc::new(MemoryRouting::new(CallLog::default()));
    routing.add_rule("3");
    routing.add_rule("7");
    let allocator = Arc::new(PriorityAllocator::new(routing));

    let handles = (0..16).map(|_| {
        let allocator = allocator.clone();
        tokio::spawn(async move { allocator.next_priority(LISTENER_ARN).await.unwrap() })
    });
    let priorities: BTreeSet<u32> = join_all(handles).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(priorities, (8..24).collect());
}

#[tokio::test]
async fn rules_created_elsewhere_raise_the_floor() {
    let routing = Arc::new(MemoryRouting::new(CallLog::default()));
    let allocator = PriorityAllocator::new(routing.clone());

    assert_eq!(allocator.next_priority(LISTENER_ARN).await.unwrap(), 1);
    routing.add_rule("40");
    assert_eq!(allocator.next_priority(LISTENER_ARN).await.unwrap(), 41);
    assert_eq!(allocator.next_priority(LISTENER_ARN).await.unwrap(), 42);
}

#[tokio::test]
async fn concurrent_creates_get_distinct_priorities() {
    let world = seeded_world();
    let app = start(&world).await;
    let tenants = ["acme", "globex", "initech", "umbrella", "hooli"];

    let creates = tenants.iter().map(|t| app.saga.create(create_request(t)));
    for outcome in join_all(creates).await {
        outcome.unwrap();
    }
    for tenant in tenants {
        assert_all_completed(&settled_jobs(&app.saga, tenant, 4).await);
    }

    let priorities: BTreeSet<String> = tenants
        .iter()
        .map(|t| world.stacks.get(t).unwrap().parameters["PRIORITY"].clone())
        .collect();
    assert_eq!(priorities.len(), tenants.len());
    assert_eq!(
        priorities,
        ["10", "11", "12", "8", "9"].into_iter().map(String::from).collect()
    );

    app.shutdown().await.unwrap();
}
