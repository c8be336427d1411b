use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MosaicId(pub u64);

impl fmt::Display for MosaicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl fmt::Debug for MosaicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MosaicId({self})")
    }
}

/// An amount of a mosaic in atomic units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mosaic {
    pub id: MosaicId,
    pub amount: u64,
}

/// Native currency descriptor as reported by the node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub mosaic_id: MosaicId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub divisibility: u8,
    #[serde(default = "default_true")]
    pub transferable: bool,
    #[serde(default)]
    pub supply_mutable: bool,
}

fn default_true() -> bool {
    true
}

impl Currency {
    /// `amount` whole units scaled by the currency's divisibility.
    pub fn create_relative(&self, amount: u64) -> HarnessResult<Mosaic> {
        let overflow = || HarnessError::AmountOverflow {
            amount,
            divisibility: self.divisibility,
        };
        let scale = 10u64
            .checked_pow(u32::from(self.divisibility))
            .ok_or_else(overflow)?;
        let amount = amount.checked_mul(scale).ok_or_else(overflow)?;
        Ok(self.create_absolute(amount))
    }

    pub fn create_absolute(&self, amount: u64) -> Mosaic {
        Mosaic {
            id: self.mosaic_id,
            amount,
        }
    }
}
