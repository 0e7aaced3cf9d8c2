//! Display helpers for addresses and amounts.

/// Shorten an address to `0x1234...abcd`.
///
/// Inputs too short to shorten are returned unchanged.
pub fn format_address(address: &str, chars: usize) -> String {
    if address.len() <= chars * 2 + 2 || !address.is_ascii() {
        return address.to_string();
    }
    format!(
        "{}...{}",
        &address[..chars + 2],
        &address[address.len() - chars..]
    )
}

/// Compact a number with K/M/B suffixes. Non-numeric input renders as `"0"`.
pub fn format_compact(num: &str, decimals: usize) -> String {
    let Ok(value) = num.trim().parse::<f64>() else {
        return "0".to_string();
    };
    if value.is_nan() {
        return "0".to_string();
    }
    if value >= 1e9 {
        format!("{:.*}B", decimals, value / 1e9)
    } else if value >= 1e6 {
        format!("{:.*}M", decimals, value / 1e6)
    } else if value >= 1e3 {
        format!("{:.*}K", decimals, value / 1e3)
    } else {
        format!("{:.*}", decimals, value)
    }
}

pub fn format_usd(num: &str, decimals: usize) -> String {
    format!("${}", format_compact(num, decimals))
}

/// Render a raw token amount with `decimals` places, truncated (not rounded)
/// to `display_decimals`.
pub fn format_token_amount(amount: u128, decimals: u32, display_decimals: usize) -> String {
    let (integer, fraction) = match 10u128.checked_pow(decimals) {
        Some(divisor) => (amount / divisor, amount % divisor),
        None => (0, amount),
    };
    let width = decimals as usize;
    let fraction = format!("{fraction:0>width$}");
    let shown: String = fraction.chars().take(display_decimals).collect();
    format!("{integer}.{shown}")
}
