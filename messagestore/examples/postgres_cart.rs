//! Append and read a cart stream in a Message DB database.
//!
//! Requires the `postgres` feature and a database with Message DB installed:
//!
//! ```text
//! DATABASE_URL=postgres://message_store@localhost/message_store \
//!     cargo run --example postgres_cart --features postgres
//! ```

use messagestore::{GetOptions, PostgresSession, PutOptions, StreamName, WriteMessage};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let url = std::env::var("DATABASE_URL")?;
    let session = PostgresSession::connect(url).await?;
    session.ping().await?;

    let cart = StreamName::try_new(format!("cart-{}", uuid::Uuid::now_v7().simple()))?;
    let message = WriteMessage::new("ItemAdded", json!({ "sku": "ABC-1", "qty": 2 }));

    let global_position = messagestore::put(&session, &message, &cart, PutOptions::default()).await?;
    println!("written to {cart} at global position {global_position:?}");

    for message in messagestore::get(&session, &cart, GetOptions::default()).await? {
        println!(
            "{} #{} {} {}",
            message.stream_name(),
            message.position(),
            message.message_type(),
            message.data()
        );
    }

    Ok(())
}
