/// Decimal places of one TON expressed in nanotons.
pub const TON_DECIMALS: u32 = 9;

/// Render a nanoton amount as an exact decimal TON string, without trailing zeros.
pub fn format_coins(nanotons: u128) -> String {
	let unit = 10u128.pow(TON_DECIMALS);
	let whole = nanotons / unit;
	let frac = nanotons % unit;
	if frac == 0 {
		return whole.to_string();
	}
	let digits = format!("{:0width$}", frac, width = TON_DECIMALS as usize);
	format!("{}.{}", whole, digits.trim_end_matches('0'))
}
