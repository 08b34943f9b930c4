//! Terminal rendering. The only module that writes to stdout/stderr.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use cartwheel_core::{CartTotals, GroupedCart, Price, PricingConfig, ProductKey};
use cartwheel_storefront::remote::{Divergence, RemoteCartMirror};
use cartwheel_storefront::store::MutationKind;
use cartwheel_storefront::{AppError, LocalMutation, RefreshReport};

pub fn count(sku: &ProductKey, quantity: u32) {
    println!("{sku}: {quantity}");
}

pub fn mutation(mutation: &LocalMutation) {
    let verb = match mutation.kind {
        MutationKind::Add => "added",
        MutationKind::Remove if mutation.changed => "removed",
        MutationKind::Remove => {
            println!("{} is not in the cart", mutation.product_key);
            return;
        }
    };
    println!(
        "{verb} {} x {} (now {})",
        mutation.delta, mutation.product_key, mutation.quantity_after
    );
}

pub fn cart(grouped: &GroupedCart, totals: &CartTotals, pricing: &PricingConfig) {
    if grouped.is_empty() {
        println!("Cart is empty");
    }

    for group in grouped {
        let line = &group.line;
        let title = line
            .metadata
            .title
            .as_deref()
            .unwrap_or_else(|| line.product_key.as_str());
        let unit = line.price();
        let line_total = Price::new(line.line_total(), line.currency);
        println!(
            "{:>4} x {title} ({}) @ {} = {}",
            line.quantity,
            line.product_key,
            unit.display(pricing.display),
            line_total.display(pricing.display),
        );
    }

    self::totals(totals);
}

pub fn totals(totals: &CartTotals) {
    println!("Items:    {}", totals.item_count);
    println!("Subtotal: {}", totals.formatted.subtotal);
    println!("Tax:      {}", totals.formatted.tax);
    println!("Total:    {}", totals.formatted.total);
}

pub fn remote(mirror: &RemoteCartMirror, pricing: &PricingConfig) {
    if mirror.is_empty() {
        println!("Server cart is empty");
        return;
    }

    for line in mirror.lines() {
        let price = line.unit_price.map_or_else(
            || "-".to_string(),
            |amount| Price::new(amount, pricing.default_currency).display(pricing.display),
        );
        println!(
            "{:>4} x {} ({}) @ {price}",
            line.quantity,
            line.name.as_deref().unwrap_or("?"),
            line.product_key,
        );
    }
}

pub fn divergence(diff: &[Divergence]) {
    if diff.is_empty() {
        println!("Local cart matches the server");
        return;
    }

    println!("Differs from local cart:");
    for d in diff {
        println!("  {}: local {}, server {}", d.product_key, d.local, d.remote);
    }
}

pub fn refreshed(report: &RefreshReport) {
    println!(
        "Replaced local cart with server cart ({} lines, {} changed)",
        report.line_count,
        report.replaced.len()
    );
}

pub fn warning(message: &str) {
    eprintln!("warning: {message}");
}

pub fn failure(error: &AppError) {
    eprintln!("error: {}", error.user_message());
}
