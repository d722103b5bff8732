//! Price ticker screen backed by a refresher.
//!
//! Run with `cargo run -p loom-refresher --example ticker`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Context as _;
use loom_refresher::{LifecycleState, ProduceContext, Refresher, RefresherConfig, SharingPolicy};
use loom_worker::WorkerScope;
use {pretty_assertions as _, serde_json as _};

#[derive(Debug, Clone, PartialEq)]
struct Quote {
	symbol: &'static str,
	cents: u32,
	starred: bool,
}

/// Stand-in for a slow network call.
async fn fetch_quote(ctx: ProduceContext, ticks: Arc<AtomicU32>) -> anyhow::Result<Quote> {
	let tick = ticks.fetch_add(1, Ordering::SeqCst);
	tokio::time::sleep(Duration::from_millis(300)).await;
	ctx.checkpoint().context("fetching quote")?;
	if tick == 2 {
		anyhow::bail!("exchange unavailable");
	}
	Ok(Quote {
		symbol: "LOOM",
		cents: 10_000 + tick * 25,
		starred: false,
	})
}

/// Screen-scoped owner of the refresher, like a view model.
struct TickerScreen {
	scope: WorkerScope,
	quote: Refresher<Quote>,
}

impl TickerScreen {
	fn new() -> Self {
		let scope = WorkerScope::current();
		let ticks = Arc::new(AtomicU32::new(0));
		let config = RefresherConfig::new()
			.name("ticker")
			.debounce(Duration::from_millis(100))
			.sharing(SharingPolicy::WhileObserved {
				stop_timeout: Duration::from_secs(2),
			});
		let quote = Refresher::new(&scope, config, move |ctx| fetch_quote(ctx, Arc::clone(&ticks)));
		Self { scope, quote }
	}

	fn pull_to_refresh(&self) {
		self.quote.refresh(true);
	}

	fn toggle_star(&self) {
		self.quote.update(|quote| Quote {
			starred: !quote.starred,
			..quote.clone()
		});
	}
}

impl Drop for TickerScreen {
	fn drop(&mut self) {
		self.scope.cancel();
	}
}

fn render(state: &LifecycleState<Quote>) {
	match state {
		LifecycleState::Uninitialized => println!("  …"),
		LifecycleState::Loading => println!("  loading"),
		LifecycleState::Loaded(quote) => {
			let star = if quote.starred { "*" } else { " " };
			println!("{star} {} {}.{:02}", quote.symbol, quote.cents / 100, quote.cents % 100);
		}
		LifecycleState::Failed(failure) => println!("  error: {failure:#}"),
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let screen = TickerScreen::new();
	let mut observer = screen.quote.observe();
	let ui = tokio::spawn(async move {
		while let Ok(state) = observer.changed().await {
			render(&state);
		}
	});

	tokio::time::sleep(Duration::from_millis(500)).await;
	screen.toggle_star();

	// A burst of pulls collapses into one fetch.
	for _ in 0..5 {
		screen.pull_to_refresh();
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
	tokio::time::sleep(Duration::from_millis(600)).await;

	screen.pull_to_refresh();
	tokio::time::sleep(Duration::from_millis(600)).await;
	screen.pull_to_refresh();
	tokio::time::sleep(Duration::from_millis(600)).await;

	screen.quote.shutdown().await;
	drop(screen);
	ui.await.context("ui task")?;
	Ok(())
}
