/*
[INPUT]:  OANDA_API_KEY and OANDA_ACCOUNT environment variables
[OUTPUT]: Pricing snapshot, recent candles and a few streamed ticks
[POS]:    Examples - practice-environment market data queries
[UPDATE]: When adding new market data endpoints
*/

use std::time::Duration;

use oanda_adapter::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Example: Query market data on the practice environment
#[tokio::main]
async fn main() {
    println!("=== OANDA Market Data Example ===\n");

    let token = std::env::var("OANDA_API_KEY").unwrap_or_default();
    let account = std::env::var("OANDA_ACCOUNT").unwrap_or_default();
    let context = Context::for_environment(Environment::Practice, token, account);

    let client = match OandaClient::new(context) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };

    let instruments = ["EUR_USD", "USD_JPY"];

    println!("Querying prices for {:?}...", instruments);
    match client.get_pricing(&instruments).await {
        Ok(prices) => {
            for price in &prices.prices {
                match Tick::try_from(price) {
                    Ok(tick) => println!("✓ {}", tick),
                    Err(e) => println!("✗ {}: {}", price.instrument, e),
                }
            }
        }
        Err(e) => println!("✗ Error: {}", e),
    }

    println!("\nQuerying last 5 M1 candles for EUR_USD...");
    match client
        .get_candles("EUR_USD", 5, Granularity::M1, PriceComponent::Mid)
        .await
    {
        Ok(candles) => println!("✓ {} candles", candles.candles.len()),
        Err(e) => println!("✗ Error: {}", e),
    }

    println!("\nStreaming ticks for 10 seconds...");
    let stream_client = match client.stream_client() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create stream client: {}", e);
            return;
        }
    };
    let cancel = CancellationToken::new();
    let (tick_tx, mut tick_rx) = mpsc::channel(1);
    let (hb_tx, mut hb_rx) = mpsc::channel(1);
    let handle = StreamPipeline::new(stream_client, &instruments)
        .with_cancellation(cancel.clone())
        .tick_stream(tick_tx, hb_tx);

    let deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            Some(tick) = tick_rx.recv() => println!("  {}", tick),
            Some(heartbeat) = hb_rx.recv() => println!("  heartbeat {}", heartbeat.time),
            else => break,
        }
    }
    cancel.cancel();

    match handle.await {
        Ok(Ok(end)) => println!("\n✓ Stream ended: {:?}", end),
        Ok(Err(e)) => println!("\n✗ Stream failed: {}", e),
        Err(e) => println!("\n✗ Stream task panicked: {}", e),
    }
}
