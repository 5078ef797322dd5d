use std::time::Duration;

use guarded_fetch::{CancellationToken, FetchOptions, Fetcher, RequestInit, RetryPolicy};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // FETCH_BASE_URI, FETCH_TIMEOUT_MS and FETCH_MAX_RETRIES are all optional.
    let fetcher = Fetcher::from_env().map_err(anyhow::Error::msg)?;
    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://httpbin.org/anything".to_owned());

    let echoed: serde_json::Value = fetcher
        .execute(
            &target,
            RequestInit::post().body(json!({ "user": { "name": "Han Solo" } })),
            FetchOptions::default().with_retry(RetryPolicy::new(3, [429, 502, 503, 504])),
        )
        .json()
        .await?;
    println!("{echoed:#}");

    // Give up after 200 ms no matter how much of the deadline is left.
    let signal = CancellationToken::new();
    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    match fetcher
        .execute(&target, RequestInit::get().signal(signal), FetchOptions::default())
        .text()
        .await
    {
        Ok(text) => println!("finished before the signal: {} bytes", text.len()),
        Err(err) => println!("{:?}: {err}", err.kind()),
    }

    Ok(())
}
