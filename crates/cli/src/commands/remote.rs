//! Remote cart commands.

use cartwheel_storefront::CartSession;

use crate::output;

/// Print the server's cart and how it differs from the local one.
///
/// # Errors
///
/// Returns `AppError::RemoteSync` when signed out or the fetch fails.
pub async fn show(session: &CartSession) -> cartwheel_storefront::Result<()> {
    let mirror = session.fetch_remote_cart().await?;
    output::remote(&mirror, session.pricing());

    if let Some(diff) = session.divergence().await {
        output::divergence(&diff);
    }
    Ok(())
}

/// Replace the local cart with the server's cart.
///
/// # Errors
///
/// Returns `AppError::RemoteSync` or `AppError::Cart`; the local cart is
/// unchanged in that case.
pub async fn pull(session: &mut CartSession) -> cartwheel_storefront::Result<()> {
    let report = session.refresh_from_server().await?;
    output::refreshed(&report);
    if let Some(e) = &report.persist_error {
        output::warning(&format!("cart was not saved on this device: {e}"));
    }
    output::cart(&session.grouped(), &session.totals(), session.pricing());
    Ok(())
}
