//! Chain Demo - Nested Selector Resolution
//!
//! Walks through resolving selector chains against an in-memory page,
//! waiting for state, and driving two actors at once.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=locus=debug cargo run --example chain_demo -p locus
//! ```

#![allow(clippy::uninlined_format_args, clippy::unwrap_used)]

use locus::logging::init_tracing;
use locus::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn page() -> MockScope {
    MockScope::with_tree(vec![
        MockElement::new("nav")
            .id("menu")
            .child(MockElement::new("a").class("item").text("Home"))
            .child(MockElement::new("a").class("item").text("Orders")),
        MockElement::new("section")
            .id("cart")
            .child(MockElement::new("span").class("total").text("Total: 42.00"))
            .child(MockElement::new("button").text("Checkout"))
            .child(MockElement::new("div").id("toast").text("Saved").hidden()),
        MockElement::new("form")
            .id("search")
            .child(MockElement::new("input").id("q")),
    ])
}

#[tokio::main]
async fn main() -> LocusResult<()> {
    init_tracing("locus=info");
    println!("=== Locus Chain Demo ===\n");

    demo_resolution().await?;
    demo_state_waits().await?;
    demo_actors().await?;

    println!("\n=== Chain Demo Complete ===");
    Ok(())
}

async fn demo_resolution() -> LocusResult<()> {
    println!("--- Demo 1: Resolution ---\n");
    let scope = page();
    let engine = Engine::new();

    let spec: SelectorSpec = SelectorSpec::chain("#menu")
        .sub_selector(SelectorSpec::chain("a.item").has_text("Orders"))
        .into();
    let handle = engine.resolve(&scope, &spec, &ResolveOptions::new())?;
    println!("Spec:   {}", spec);
    println!("Handle: {}", handle);
    println!("Matches: {}", handle.count().await?);

    let loose = engine.resolve(&scope, &"a.item".into(), &ResolveOptions::new())?;
    match loose.element().await {
        Ok(node) => println!("Unexpected single match {}", node),
        Err(err) => println!("Strict matching: {}", err),
    }

    let from_yaml = SelectorSpec::from_yaml_str(
        "base: '#cart'\nsub_selector:\n  base: span\n  has_text: { pattern: 'Total: \\d+' }\n",
    )?;
    let total = engine.resolve(&scope, &from_yaml, &ResolveOptions::new())?;
    println!("Total text: {}\n", scope.text_of(&total.element().await?).await?);
    Ok(())
}

async fn demo_state_waits() -> LocusResult<()> {
    println!("--- Demo 2: State Waits ---\n");
    let scope = page();
    let engine = Engine::new();
    let toast = scope.find_by_id("toast").await.unwrap();

    let spec = SelectorSpec::chain("#toast")
        .state(StateKind::Visible)
        .timeout(Duration::from_millis(300))
        .into();
    let options = ResolveOptions::new();
    let (located, ()) = tokio::join!(
        engine.locate(&scope, &spec, &options),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            scope.set_visible(&toast, true).await.unwrap();
        }
    );
    println!("Toast became visible: {}", located?);

    let missing = SelectorSpec::chain("#spinner")
        .state(StateKind::Visible)
        .timeout(Duration::from_millis(200))
        .into();
    if let Err(err) = engine.locate(&scope, &missing, &options).await {
        println!("Bounded wait: {}\n", err);
    }
    Ok(())
}

async fn demo_actors() -> LocusResult<()> {
    println!("--- Demo 3: Actors ---\n");
    let shop = Arc::new(page());
    let search = Arc::new(page());

    let buyer = Actor::named("buyer").who_can(BrowseTheScope::with(Arc::clone(&shop)));
    let searcher = Actor::named("searcher").who_can(BrowseTheScope::with(Arc::clone(&search)));

    let checkout = Click::on(SelectorSpec::chain("#cart").sub_selector("button"));
    let query = Fill::new("#q", "rust books");
    let buyer_steps: [&dyn Action; 1] = [&checkout];
    let searcher_steps: [&dyn Action; 1] = [&query];
    let (bought, searched) = tokio::join!(
        buyer.attempts_to(&buyer_steps),
        searcher.attempts_to(&searcher_steps),
    );
    bought?;
    searched?;

    println!("Buyer clicks: {:?}", shop.clicks().await);
    println!(
        "Searcher typed: {:?}",
        searcher.asks(&Value::of("#q")).await?
    );
    println!(
        "Menu items: {}",
        searcher.asks(&Count::of("a.item")).await?
    );
    Ok(())
}
