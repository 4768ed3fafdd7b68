// Source: vip.stock.finance.sina.com.cn Market_Center.getHQNodeData
//
// Numeric fields arrive as numbers on most days and as strings ("", "-",
// "12.34") on others, so they stay as raw JSON values until normalisation.
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct RawQuoteRecord {
    /// Market-prefixed code, e.g. "sh600000" / "sz000001".
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    /// Last trade price.
    #[serde(default)]
    pub trade: Value,
    #[serde(default)]
    pub pb: Value,
    /// Price-to-earnings.
    #[serde(default)]
    pub per: Value,
    /// Total market cap in 万元 (ten-thousand yuan).
    #[serde(default)]
    pub mktcap: Value,
    // we ignore the other fields (changepercent, volume, nmc, ...)
}
