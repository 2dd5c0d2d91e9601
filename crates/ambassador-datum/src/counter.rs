//! Counter datum: `Constr 0 [count]`.

use ambassador_types::text::string_to_hex;

use crate::plutus::{Fields, PlutusData, PlutusDataExt};
use crate::{DatumError, PlutusCodec};

const ENTITY: &str = "CounterDatum";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDatum {
    pub count: u64,
}

impl CounterDatum {
    pub fn new(count: u64) -> Self {
        Self { count }
    }

    /// Datum after one member approval.
    pub fn incremented(&self) -> Result<Self, DatumError> {
        let count = self
            .count
            .checked_add(1)
            .ok_or(DatumError::IntRange { entity: ENTITY })?;
        Ok(Self { count })
    }

    /// Asset name (hex) of the member token minted at this count.
    pub fn member_token_name(&self) -> String {
        string_to_hex(&self.count.to_string())
    }
}

impl PlutusCodec for CounterDatum {
    fn to_data(&self) -> PlutusData {
        PlutusData::constr(0, vec![PlutusData::int(self.count)])
    }

    fn from_data(data: &PlutusData) -> Result<Self, DatumError> {
        let mut f = Fields::new(ENTITY, data.expect_constr(ENTITY, 0)?);
        let count = f.next_u64()?;
        f.finish()?;
        Ok(Self { count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_cbor() {
        assert_eq!(CounterDatum::new(0).to_cbor_hex().unwrap(), "d8799f00ff");
        assert_eq!(CounterDatum::from_cbor_hex("d8799f05ff").unwrap().count, 5);
    }

    #[test]
    fn test_increment_and_token_name() {
        let c = CounterDatum::new(5);
        assert_eq!(c.member_token_name(), "35");
        assert_eq!(c.incremented().unwrap().count, 6);
        assert!(CounterDatum::new(u64::MAX).incremented().is_err());
    }

    #[test]
    fn test_schema_mismatch_is_typed() {
        let wrong = PlutusData::constr(0, vec![PlutusData::bytes(vec![1])]);
        assert!(matches!(
            CounterDatum::from_data(&wrong),
            Err(DatumError::Shape { .. })
        ));
        let extra = PlutusData::constr(0, vec![PlutusData::int(1), PlutusData::int(2)]);
        assert!(matches!(
            CounterDatum::from_data(&extra),
            Err(DatumError::FieldCount { .. })
        ));
        assert!(CounterDatum::from_data(&PlutusData::constr(0, vec![PlutusData::int(-1)])).is_err());
    }
}
