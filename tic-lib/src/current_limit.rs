//! Conversion between current-limit codes and milliamps.
//!
//! Exactness matters here: an off-by-one in either direction can ask the driver
//! for more current than the motor is rated for.

use crate::constants::{CURRENT_LIMIT_UNITS_MA, MAX_CURRENT_CODE_T500, Product};

/// Milliamps produced by each T500 current-limit code.
pub const T500_CURRENT_TABLE: [u32; 33] = [
    0, 1, 174, 343, 495, 634, 762, 880, 990, 1092, 1189, 1281, 1368, 1452, 1532, 1611, 1687, 1762, 1835, 1909, 1982,
    2056, 2131, 2207, 2285, 2366, 2451, 2540, 2634, 2734, 2843, 2962, 3093,
];

#[rustfmt::skip]
const T500_RECOMMENDED_CODES: [u8; 33] = [
    0,   1,   2,   3,   4,   5,   6,   7,
    8,   9,   10,  11,  12,  13,  14,  15,
    16,  17,  18,  19,  20,  21,  22,  23,
    24,  25,  26,  27,  28,  29,  30,  31,
    32,
];

#[rustfmt::skip]
const T825_RECOMMENDED_CODES: [u8; 64] = [
    0,   1,   2,   3,   4,   5,   6,   7,
    8,   9,   10,  11,  12,  13,  14,  15,
    16,  17,  18,  19,  20,  21,  22,  23,
    24,  25,  26,  27,  28,  29,  30,  31,
    32,  34,  36,  38,  40,  42,  44,  46,
    48,  50,  52,  54,  56,  58,  60,  62,
    64,  68,  72,  76,  80,  84,  88,  92,
    96,  100, 104, 108, 112, 116, 120, 124,
];

// The last four T825 codes exceed what the T834 is rated for.
const T834_RECOMMENDED_CODE_COUNT: usize = 60;

/// Code to milliamp mapping for one product, indexed by code.
///
/// Entries are non-decreasing in code; [`ma_to_code`](Self::ma_to_code) relies on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentLimitTable {
    product: Product,
    entries: Vec<u32>,
}

impl CurrentLimitTable {
    pub fn for_product(product: Product) -> Self {
        let max_code = max_code(product);
        let entries = (0..=max_code).map(|code| code_to_ma(product, code)).collect();
        Self { product, entries }
    }

    pub fn product(&self) -> Product {
        self.product
    }

    /// Highest code in the table; larger codes are clamped to it.
    pub fn max_code(&self) -> u8 {
        max_code(self.product)
    }

    /// Milliamps for `code`, after clamping the code to [`max_code`](Self::max_code).
    pub fn code_to_ma(&self, code: u8) -> u32 {
        let index = usize::from(code.min(self.max_code()));
        self.entries.get(index).copied().unwrap_or_default()
    }

    /// Greatest code whose current does not exceed `ma`, or 0 if none does.
    ///
    /// The scan stops at the first code above `ma`, so a table that is not
    /// monotonic selects a lower code rather than a higher one.
    pub fn ma_to_code(&self, ma: u32) -> u8 {
        let mut code = 0;
        for (candidate, &entry) in self.entries.iter().enumerate() {
            if entry > ma {
                break;
            }
            code = candidate as u8;
        }
        code
    }

    /// Codes the vendor recommends offering to users, ascending.
    pub fn recommended_codes(&self) -> &'static [u8] {
        match self.product {
            Product::T500 => &T500_RECOMMENDED_CODES,
            Product::T825 => &T825_RECOMMENDED_CODES,
            Product::T834 => &T825_RECOMMENDED_CODES[..T834_RECOMMENDED_CODE_COUNT],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.entries.iter().enumerate().map(|(code, &ma)| (code as u8, ma))
    }
}

fn max_code(product: Product) -> u8 {
    match product {
        Product::T500 => MAX_CURRENT_CODE_T500,
        Product::T825 | Product::T834 => (product.max_current_ma() / CURRENT_LIMIT_UNITS_MA) as u8,
    }
}

fn code_to_ma(product: Product, code: u8) -> u32 {
    let code = code.min(max_code(product));
    match product {
        Product::T500 => T500_CURRENT_TABLE
            .get(usize::from(code))
            .copied()
            .unwrap_or(T500_CURRENT_TABLE[T500_CURRENT_TABLE.len() - 1]),
        Product::T825 | Product::T834 => {
            // One code is one unit up to 32; above that only every second code
            // is a distinct step, and above 64 every fourth.
            let code = if code > 64 {
                code & !0b11
            } else if code > 32 {
                code & !0b1
            } else {
                code
            };
            u32::from(code) * CURRENT_LIMIT_UNITS_MA
        }
    }
}
