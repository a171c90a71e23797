mod logging;

use anyhow::Result;
use context_store::dynamodb::DynamoDb;
use context_store::{ContextStore, ContextStoreOptions};
use std::sync::Arc;
use tracing::info;

/// Provisions the context table described by the `CONTEXT_STORE_*`
/// environment and reports its status.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging(logging::level_from_env()?)?;

    let options = ContextStoreOptions::from_env()?;
    let sdk_config = aws_config::load_from_env().await;

    let ddb = DynamoDb::new(&sdk_config);
    ddb.check_auth().await?;

    let store = ContextStore::new(Arc::new(ddb), options).await?;
    let table = store.table();
    info!("Table name: {}", table.name());
    info!("Hash key: {} (prefix '{}')", table.hash_key(), table.prefix());
    if let Some(sort_key) = table.sort_key() {
        info!("Sort key: {} = {}", sort_key.attribute_name(), sort_key.value());
    }

    let status = store.client().describe_table(table.name()).await?;
    info!("Table status: {:?}", status);

    Ok(())
}
