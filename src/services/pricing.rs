//! Price table: gateway currency amount -> pre-agreed stars.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

/// Parsed `PRICE_TABLE`, e.g. `"500=217,1000=434"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    entries: BTreeMap<Decimal, Decimal>,
}

impl PriceTable {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let mut entries = BTreeMap::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (amount, stars) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("malformed price entry: {pair}"))?;
            let amount: Decimal = amount.trim().parse()?;
            let stars: Decimal = stars.trim().parse()?;
            if amount <= Decimal::ZERO || stars <= Decimal::ZERO {
                anyhow::bail!("price entry must be positive: {pair}");
            }
            entries.insert(amount.normalize(), stars);
        }
        Ok(Self { entries })
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Decimal, Decimal)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(amount, stars)| (amount.normalize(), stars))
                .collect(),
        }
    }

    /// Stars credited for paying exactly `amount`.
    pub fn stars_for(&self, amount: Decimal) -> Option<Decimal> {
        self.entries.get(&amount.normalize()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_and_looks_up_regardless_of_scale() {
        let table = PriceTable::parse("500=217, 1000=434").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.stars_for(dec!(500.000000)), Some(dec!(217)));
        assert_eq!(table.stars_for(dec!(1000)), Some(dec!(434)));
        assert_eq!(table.stars_for(dec!(750)), None);
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(PriceTable::parse("500").is_err());
        assert!(PriceTable::parse("500=abc").is_err());
        assert!(PriceTable::parse("0=10").is_err());
    }
}
