// Financial model: resale value under the "half of profit" rule and
// post-transaction funds.
//
// Prices are converted to integer tenths before any arithmetic so the
// 0.1-granularity rounding is exact.

use std::collections::HashMap;

/// Convert a £m amount to integer tenths.
pub fn to_tenths(value: f64) -> i64 {
    (value * 10.0).round() as i64
}

/// Convert integer tenths back to £m.
pub fn from_tenths(tenths: i64) -> f64 {
    tenths as f64 / 10.0
}

/// Round a £m amount to one decimal place.
pub fn round1(value: f64) -> f64 {
    from_tenths(to_tenths(value))
}

fn selling_price_tenths(current: i64, purchase: i64) -> i64 {
    if current <= purchase {
        return current;
    }
    // Half of the rise, rounded down to the nearest tenth.
    purchase + (current - purchase) / 2
}

/// Realizable sale value of a player.
///
/// - `current <= purchase`: the full current price (loss realized in full)
/// - otherwise: `purchase + floor((current - purchase) / 0.2) * 0.1`
pub fn selling_price(current_price: f64, purchase_price: f64) -> f64 {
    from_tenths(selling_price_tenths(
        to_tenths(current_price),
        to_tenths(purchase_price),
    ))
}

fn sale_value_tenths(id: u32, price_now: &HashMap<u32, f64>, buy_price: &HashMap<u32, f64>) -> i64 {
    let current = price_now.get(&id).copied().unwrap_or(0.0);
    let bought = buy_price.get(&id).copied().unwrap_or(current);
    selling_price_tenths(to_tenths(current), to_tenths(bought))
}

/// Bank balance after selling `out_ids` and buying `in_ids`.
///
/// Sales use [`selling_price`]; a player with no recorded purchase price is
/// assumed to have been bought at the current price. Purchases cost the
/// current price. Ids missing from `price_now` count as zero.
pub fn compute_available_funds(
    bank: f64,
    out_ids: &[u32],
    in_ids: &[u32],
    price_now: &HashMap<u32, f64>,
    buy_price: &HashMap<u32, f64>,
) -> f64 {
    let proceeds: i64 = out_ids
        .iter()
        .map(|&id| sale_value_tenths(id, price_now, buy_price))
        .sum();
    let cost: i64 = in_ids
        .iter()
        .map(|id| to_tenths(price_now.get(id).copied().unwrap_or(0.0)))
        .sum();
    from_tenths(to_tenths(bank) + proceeds - cost)
}

/// Total realizable sale value of a set of players (bank excluded).
pub fn squad_sale_value(
    ids: &[u32],
    price_now: &HashMap<u32, f64>,
    buy_price: &HashMap<u32, f64>,
) -> f64 {
    from_tenths(
        ids.iter()
            .map(|&id| sale_value_tenths(id, price_now, buy_price))
            .sum(),
    )
}
