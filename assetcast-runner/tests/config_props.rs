//! Property tests for ticker normalization and table naming.

use assetcast_core::store::table_name;
use assetcast_runner::{currency_symbol, normalize_ticker, AssetType};
use proptest::prelude::*;

fn asset_type() -> impl Strategy<Value = AssetType> {
    prop_oneof![Just(AssetType::Crypto), Just(AssetType::Stock)]
}

proptest! {
    #[test]
    fn normalization_is_idempotent(raw in "[a-zA-Z]{1,6}(-[a-zA-Z]{3})?", kind in asset_type()) {
        let once = normalize_ticker(&raw, kind);
        prop_assert_eq!(normalize_ticker(&once, kind), once.clone());
        prop_assert_eq!(once.to_ascii_uppercase(), once);
    }

    #[test]
    fn crypto_tickers_always_carry_a_quote_currency(raw in "[a-zA-Z]{1,6}") {
        let ticker = normalize_ticker(&raw, AssetType::Crypto);
        prop_assert!(ticker.ends_with("-USD"));
        prop_assert_eq!(currency_symbol(&ticker), "$");
    }

    #[test]
    fn plain_tickers_form_valid_table_names(raw in "[a-zA-Z]{1,6}(-[a-zA-Z]{3})?", kind in asset_type()) {
        let ticker = normalize_ticker(&raw, kind);
        let table = table_name(&ticker, "lstm").unwrap();
        prop_assert!(!table.contains('-'));
        prop_assert!(table.ends_with("_lstm"));
    }
}
