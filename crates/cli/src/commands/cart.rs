//! Local cart commands.
//!
//! Changes apply to the local cart first. The command then waits for the
//! remote mirror to settle so the shopper sees whether the server agreed.

use cartwheel_core::{CatalogItem, ProductKey};
use cartwheel_storefront::{CartSession, PendingMutation, SyncState};

use crate::output;

/// Add `qty` units of `item`.
///
/// # Errors
///
/// Returns `AppError::Cart` when the item is rejected locally.
pub async fn add(
    session: &mut CartSession,
    item: &CatalogItem,
    qty: u32,
) -> cartwheel_storefront::Result<()> {
    let pending = session.add(item, qty)?;
    settle(session, pending).await;
    Ok(())
}

/// Remove `qty` units of `sku`. Removing an absent product is not an error.
pub async fn remove(session: &mut CartSession, sku: &ProductKey, qty: u32) {
    let pending = session.remove(sku, qty);
    settle(session, pending).await;
}

async fn settle(session: &CartSession, pending: PendingMutation) {
    let mutation = pending.mutation();
    output::mutation(mutation);

    if let Some(e) = &mutation.persist_error {
        output::warning(&format!("cart was not saved on this device: {e}"));
    }

    match pending.settled().await {
        SyncState::Confirmed => {
            tracing::debug!(mutation_id = %pending.id(), "Remote cart confirmed");
        }
        SyncState::Failed(e) if session.is_signed_in() => {
            output::warning(&format!(
                "{} (the local change is kept)",
                e.user_message()
            ));
        }
        SyncState::Failed(_) => {
            output::warning("not signed in; the change is saved on this device only");
        }
        SyncState::Pending => {}
    }
}
