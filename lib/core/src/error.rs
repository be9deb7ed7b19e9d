//! Error handling foundation for parley.
//!
//! Domain crates return plain error enums (`ProviderError`, `StoreError`)
//! that callers match on. Code at the process edge, such as the Telegram
//! client and server bootstrap, returns a rootcause [`Report`] around its
//! own context type through this alias.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Unreachable;

    impl fmt::Display for Unreachable {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("upstream unreachable")
        }
    }

    impl std::error::Error for Unreachable {}

    fn call(fail: bool) -> Result<u8, Unreachable> {
        if fail {
            return Err(Unreachable.into());
        }
        Ok(7)
    }

    #[test]
    fn context_converts_into_report() {
        assert_eq!(call(false).expect("should be ok"), 7);
        let err = call(true).unwrap_err();
        assert!(err.to_string().contains("upstream unreachable"));
    }
}
