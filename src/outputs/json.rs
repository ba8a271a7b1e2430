//! JSON output.

use crate::error::Result;
use serde::Serialize;
use tracing::error;

/// Serialize `value` as compact JSON.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| {
        error!(error = %e, "Failed to serialize JSON");
        e.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use serde_json::{Value, json};

    #[test]
    fn test_records_to_json() {
        let records = vec![
            Record::new().with("date", "2022-07-01").with("count", 12),
            Record::new().with("date", "2022-07-02").with("count", 3),
        ];
        let out = to_json(&records).unwrap();
        let back: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            back,
            json!([
                {"date": "2022-07-01", "count": 12},
                {"date": "2022-07-02", "count": 3}
            ])
        );
    }

    #[test]
    fn test_object_key_order_preserved() {
        let row: serde_json::Map<String, Value> =
            serde_json::from_str(r#"{"Country":"Spain","Cases":1,"Asof":"2022-07-01"}"#).unwrap();
        assert_eq!(
            to_json(&[row]).unwrap(),
            r#"[{"Country":"Spain","Cases":1,"Asof":"2022-07-01"}]"#
        );
    }
}
