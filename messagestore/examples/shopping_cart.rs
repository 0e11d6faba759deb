//! Shopping cart walk-through against the in-memory session.
//!
//! Run with `RUST_LOG=messagestore=debug cargo run --example shopping_cart`
//! to see the store's tracing output.

use messagestore::{
    ExpectedVersion, GetOptions, MessageStoreError, PutOptions, Session, StreamName,
    WriteMessage,
};
use messagestore_memory::InMemorySession;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize, Deserialize)]
struct ItemAdded {
    sku: String,
    qty: u32,
}

/// Append `event` after re-reading the stream version, retrying on conflict.
async fn append_with_retry<S: Session + Sync>(
    session: &S,
    stream: &StreamName,
    event: &ItemAdded,
) -> Result<Option<u64>, MessageStoreError> {
    let message = WriteMessage::from_payload("ItemAdded", event)?;

    loop {
        let expected = match messagestore::stream_version(session, stream).await? {
            Some(version) => ExpectedVersion::Version(version),
            None => ExpectedVersion::NoStream,
        };

        match messagestore::put(
            session,
            &message,
            stream,
            PutOptions::new().with_expected_version(expected),
        )
        .await
        {
            Err(error) if error.is_version_conflict() => {
                tracing::warn!(%error, "cart moved on, retrying");
            }
            result => return result,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let session = InMemorySession::new();
    let cart = StreamName::compose("cart", &[], Some("123"))?;

    for (sku, qty) in [("ABC-1", 2), ("XYZ-9", 1), ("ABC-1", 1)] {
        let event = ItemAdded {
            sku: sku.to_string(),
            qty,
        };
        let global_position = append_with_retry(&session, &cart, &event).await?;
        println!("added {qty} x {sku} at global position {global_position:?}");
    }

    // A stale writer that still believes the cart is empty
    let stale = messagestore::put(
        &session,
        &WriteMessage::from_payload(
            "ItemAdded",
            &ItemAdded {
                sku: "LATE-0".to_string(),
                qty: 1,
            },
        )?,
        &cart,
        PutOptions::new().with_expected_version(ExpectedVersion::NoStream),
    )
    .await;
    if let Err(error) = stale {
        println!("stale writer rejected: {error}");
    }

    let mut total = 0;
    for message in messagestore::get(&session, &cart, GetOptions::default()).await? {
        let item: ItemAdded = message.data_as()?;
        println!(
            "#{} {} {:?}",
            message.position(),
            message.message_type(),
            item
        );
        total += item.qty;
    }
    println!("{} items in {}", total, cart.category());

    Ok(())
}
