use proptest::prelude::*;
use stx_protocol::asset::{Asset, MAX_SHARE_SUPPLY, SATOSHIS_PER_COIN, SPHTX_SYMBOL};
use stx_protocol::types::{AccountName, TimePointSec};

proptest! {
    #[test]
    fn asset_string_form_round_trips(amount in 0..=MAX_SHARE_SUPPLY) {
        let asset = Asset::new(amount, SPHTX_SYMBOL);
        let parsed: Asset = asset.to_string().parse().unwrap();
        prop_assert_eq!(parsed, asset);
    }

    #[test]
    fn asset_checked_add_matches_integer_math(
        a in 0..=(MAX_SHARE_SUPPLY / 2),
        b in 0..=(MAX_SHARE_SUPPLY / 2),
    ) {
        let sum = Asset::new(a, SPHTX_SYMBOL)
            .checked_add(&Asset::new(b, SPHTX_SYMBOL))
            .unwrap();
        prop_assert_eq!(sum.amount, a + b);
    }

    #[test]
    fn whole_coin_constructor_scales(coins in 0i64..500_000_000) {
        prop_assert_eq!(Asset::sphtx(coins).amount, coins * SATOSHIS_PER_COIN);
    }

    #[test]
    fn timestamps_round_trip_below_year_2106(secs in 0u32..4_102_444_800) {
        let t = TimePointSec::from_secs(secs);
        let parsed: TimePointSec = t.to_string().parse().unwrap();
        prop_assert_eq!(parsed, t);
    }

    #[test]
    fn account_name_grammar_is_total(name in "[a-z0-9.-]{0,20}") {
        // Must never panic; validity is decided by the grammar alone.
        let _ = AccountName::new(name);
    }

    #[test]
    fn well_formed_names_always_parse(name in "[a-z][a-z0-9]{2,15}") {
        prop_assert!(AccountName::new(name).is_ok());
    }
}
