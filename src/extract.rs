//! Raw OCR invoice response -> [`NormalizedInvoice`].
//!
//! The vendor wraps the invoice twice: the top-level `Data` field is a JSON-encoded
//! string whose `data` field holds the invoice, itself sometimes JSON-encoded again.
//! Every lookup below is optional; only a missing/undecodable `Data` or a missing
//! `data` aborts extraction.

use crate::error::ExtractionError;
use crate::remarks::parse_remarks;
use crate::types::{FieldMap, LineItem, NormalizedInvoice};
use serde_json::{Map, Value};
use std::borrow::Cow;
use tracing::{debug, warn};

pub const PAYLOAD_FIELD: &str = "Data";
pub const INVOICE_DATA_FIELD: &str = "data";
pub const DETAILS_FIELD: &str = "invoiceDetails";
pub const REMARKS_FIELD: &str = "remarks";

pub const INVOICE_CODE: &str = "发票代码";
pub const INVOICE_NUMBER: &str = "发票号码";
pub const INVOICE_DATE: &str = "开票日期";
pub const DRAWER: &str = "开票人";
pub const REMARKS: &str = "备注";
pub const NAME: &str = "名称";
pub const TAX_NUMBER: &str = "税号";
pub const BANK_NAME: &str = "开户行";
pub const BANK_ACCOUNT: &str = "银行账号";
pub const TOTAL_AMOUNT: &str = "发票金额";
pub const PRE_TAX_AMOUNT: &str = "不含税金额";
pub const TAX_AMOUNT: &str = "发票税额";
pub const ITEM_NAME: &str = "货物名称";
pub const ITEM_QUANTITY: &str = "数量";
pub const ITEM_AMOUNT: &str = "金额";

/// Vendor field name -> display name, per output category.
const BASIC_FIELDS: &[(&str, &str)] = &[
    ("invoiceCode", INVOICE_CODE),
    ("invoiceNumber", INVOICE_NUMBER),
    ("invoiceDate", INVOICE_DATE),
    ("drawer", DRAWER),
    (REMARKS_FIELD, REMARKS),
];

const SELLER_FIELDS: &[(&str, &str)] = &[("sellerName", NAME), ("sellerTaxNumber", TAX_NUMBER)];

const PURCHASER_FIELDS: &[(&str, &str)] = &[("purchaserName", NAME), ("purchaserTaxNumber", TAX_NUMBER)];

const AMOUNT_FIELDS: &[(&str, &str)] = &[
    ("totalAmount", TOTAL_AMOUNT),
    ("invoiceAmountPreTax", PRE_TAX_AMOUNT),
    ("invoiceTax", TAX_AMOUNT),
];

const ITEM_FIELDS: &[(&str, &str)] = &[
    ("itemName", ITEM_NAME),
    ("quantity", ITEM_QUANTITY),
    ("amount", ITEM_AMOUNT),
];

/// Normalize one raw OCR response.
pub fn extract(raw: &Value) -> Result<NormalizedInvoice, ExtractionError> {
    let payload = raw
        .get(PAYLOAD_FIELD)
        .ok_or(ExtractionError::MissingPayload)?;
    let payload = decode_payload(payload)?;
    let Some(payload_obj) = payload.as_object() else {
        return Err(ExtractionError::ExtractionFailed {
            reason: format!("{}不是JSON对象", PAYLOAD_FIELD),
            raw: raw.clone(),
        });
    };

    let nested = payload_obj
        .get(INVOICE_DATA_FIELD)
        .ok_or_else(|| ExtractionError::MissingInvoiceData {
            payload: payload.clone().into_owned(),
        })?;
    let invoice_data = decode_invoice_data(nested);

    Ok(normalize(&invoice_data))
}

/// Outer payload: a JSON string must decode, anything else is used as-is.
fn decode_payload(value: &Value) -> Result<Cow<'_, Value>, ExtractionError> {
    match value {
        Value::String(text) => serde_json::from_str(text)
            .map(Cow::Owned)
            .map_err(|source| ExtractionError::MalformedPayload {
                text: text.clone(),
                source,
            }),
        other => Ok(Cow::Borrowed(other)),
    }
}

/// Nested invoice data: anything that is not (or does not decode to) an object
/// becomes an empty mapping.
fn decode_invoice_data(value: &Value) -> Cow<'_, Map<String, Value>> {
    match value {
        Value::Object(map) => Cow::Borrowed(map),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Cow::Owned(map),
            Ok(other) => {
                warn!("nested '{}' decoded to {}, using empty invoice data", INVOICE_DATA_FIELD, kind(&other));
                Cow::Owned(Map::new())
            }
            Err(e) => {
                warn!("could not decode nested '{}': {}", INVOICE_DATA_FIELD, e);
                Cow::Owned(Map::new())
            }
        },
        other => {
            warn!("nested '{}' is {}, using empty invoice data", INVOICE_DATA_FIELD, kind(other));
            Cow::Owned(Map::new())
        }
    }
}

fn normalize(data: &Map<String, Value>) -> NormalizedInvoice {
    let mut invoice = NormalizedInvoice {
        basic_info: translate(data, BASIC_FIELDS),
        seller_info: translate(data, SELLER_FIELDS),
        purchaser_info: translate(data, PURCHASER_FIELDS),
        amount_info: translate(data, AMOUNT_FIELDS),
        invoice_details: line_items(data.get(DETAILS_FIELD)),
    };

    if let Some(remarks) = data.get(REMARKS_FIELD).and_then(field_text) {
        let bank = parse_remarks(&remarks);
        invoice.basic_info.insert(REMARKS.to_string(), remarks);
        // Both keys are always set once remarks exist so table rendering sees a stable shape.
        invoice.seller_info.insert(BANK_NAME.to_string(), bank.bank_name);
        invoice.seller_info.insert(BANK_ACCOUNT.to_string(), bank.account_number);
    }

    debug!(
        basic = invoice.basic_info.len(),
        seller = invoice.seller_info.len(),
        purchaser = invoice.purchaser_info.len(),
        amount = invoice.amount_info.len(),
        items = invoice.invoice_details.len(),
        "normalized invoice"
    );
    invoice
}

/// Copy every table entry whose source value is present and truthy.
fn translate(source: &Map<String, Value>, table: &[(&str, &str)]) -> FieldMap {
    table
        .iter()
        .filter_map(|(source_key, display_name)| {
            source
                .get(*source_key)
                .and_then(field_text)
                .map(|value| ((*display_name).to_string(), value))
        })
        .collect()
}

fn line_items(value: Option<&Value>) -> Vec<LineItem> {
    let decoded = match value {
        None => return Vec::new(),
        Some(Value::String(text)) if text.is_empty() => return Vec::new(),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(v) => Cow::Owned(v),
            Err(e) => {
                warn!("could not decode '{}': {}", DETAILS_FIELD, e);
                return Vec::new();
            }
        },
        Some(other) => Cow::Borrowed(other),
    };
    let Some(items) = decoded.as_array() else {
        debug!("'{}' is {}, no line items", DETAILS_FIELD, kind(&decoded));
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| translate(item, ITEM_FIELDS))
        .filter(|item| !item.is_empty())
        .collect()
}

/// Display text for a truthy value; `None` for null, false, zero, and empty values.
fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => b.then(|| "true".to_string()),
        Value::Number(n) => {
            let zero = n.as_f64().map_or(false, |f| f == 0.0);
            (!zero).then(|| n.to_string())
        }
        Value::String(s) => (!s.is_empty()).then(|| s.clone()),
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Response shaped like the vendor's: `Data` and `data` are both JSON-encoded strings.
    fn wrap(invoice: Value) -> Value {
        let payload = json!({
            "algo_version": "",
            "data": invoice.to_string(),
            "height": 1080,
            "width": 1920,
        });
        json!({ "RequestId": "43A29C77-405E-4CC0-BC55-EE694AD00655", "Data": payload.to_string() })
    }

    fn sample_invoice() -> Value {
        json!({
            "invoiceCode": "144031900111",
            "invoiceNumber": "12345678",
            "invoiceDate": "2025年12月14日",
            "drawer": "管理员",
            "sellerName": "深圳测试科技有限公司",
            "sellerTaxNumber": "91440300MA5XXXXXX",
            "purchaserName": "北京测试有限公司",
            "purchaserTaxNumber": "91110000MA0XXXXXX",
            "totalAmount": "1234.56",
            "invoiceAmountPreTax": "1092.44",
            "invoiceTax": "142.12",
            "remarks": "销方开户银行:中国农业银行股份有限公司三明徐碧支行;银行账号:13800101040002394;",
            "invoiceDetails": json!([
                { "itemName": "*信息技术服务*测试服务费", "quantity": "1", "amount": "1092.44", "unit": "次" },
            ]).to_string(),
        })
    }

    #[test]
    fn test_full_response() {
        let invoice = extract(&wrap(sample_invoice())).unwrap();

        assert_eq!(invoice.basic_info[INVOICE_CODE], "144031900111");
        assert_eq!(invoice.basic_info[INVOICE_NUMBER], "12345678");
        assert_eq!(invoice.basic_info[INVOICE_DATE], "2025年12月14日");
        assert_eq!(invoice.basic_info[DRAWER], "管理员");
        assert_eq!(
            invoice.basic_info[REMARKS],
            "销方开户银行:中国农业银行股份有限公司三明徐碧支行;银行账号:13800101040002394;"
        );
        assert_eq!(invoice.seller_info[NAME], "深圳测试科技有限公司");
        assert_eq!(invoice.seller_info[TAX_NUMBER], "91440300MA5XXXXXX");
        assert_eq!(invoice.seller_info[BANK_NAME], "中国农业银行股份有限公司三明徐碧支行");
        assert_eq!(invoice.seller_info[BANK_ACCOUNT], "13800101040002394");
        assert_eq!(invoice.purchaser_info[NAME], "北京测试有限公司");
        assert_eq!(invoice.amount_info[TOTAL_AMOUNT], "1234.56");
        assert_eq!(invoice.amount_info[PRE_TAX_AMOUNT], "1092.44");
        assert_eq!(invoice.amount_info[TAX_AMOUNT], "142.12");
        assert_eq!(invoice.invoice_details.len(), 1);
        assert_eq!(invoice.invoice_details[0][ITEM_NAME], "*信息技术服务*测试服务费");
        assert_eq!(invoice.invoice_details[0].len(), 3);
        assert_eq!(invoice.first_item_name(), Some("*信息技术服务*测试服务费"));
    }

    #[test]
    fn test_native_objects_are_accepted() {
        let raw = json!({ "Data": { "data": { "sellerName": "A公司", "invoiceDetails": [{ "itemName": "办公用品" }] } } });
        let invoice = extract(&raw).unwrap();
        assert_eq!(invoice.seller_info[NAME], "A公司");
        assert_eq!(invoice.invoice_details[0][ITEM_NAME], "办公用品");
    }

    #[test]
    fn test_missing_payload() {
        let err = extract(&json!({ "RequestId": "x" })).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingPayload));

        let err = extract(&json!(["Data"])).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingPayload));
    }

    #[test]
    fn test_malformed_payload_keeps_text() {
        let err = extract(&json!({ "Data": "{not json" })).unwrap_err();
        match err {
            ExtractionError::MalformedPayload { text, .. } => assert_eq!(text, "{not json"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_invoice_data() {
        let raw = json!({ "Data": json!({ "algo_version": "1" }).to_string() });
        let err = extract(&raw).unwrap_err();
        match err {
            ExtractionError::MissingInvoiceData { payload } => assert_eq!(payload["algo_version"], "1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_object_payload_fails_with_raw() {
        let raw = json!({ "Data": "[1, 2, 3]" });
        let err = extract(&raw).unwrap_err();
        assert_eq!(err.to_string(), "解析过程中出错: Data不是JSON对象");
        match err {
            ExtractionError::ExtractionFailed { raw: kept, .. } => assert_eq!(kept, raw),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_invoice_data() {
        let invoice = extract(&wrap(json!({}))).unwrap();
        assert_eq!(invoice, NormalizedInvoice::default());
    }

    #[test]
    fn test_undecodable_invoice_data_degrades_to_empty() {
        let raw = json!({ "Data": json!({ "data": "{broken" }).to_string() });
        assert_eq!(extract(&raw).unwrap(), NormalizedInvoice::default());

        let raw = json!({ "Data": json!({ "data": "[1]" }).to_string() });
        assert_eq!(extract(&raw).unwrap(), NormalizedInvoice::default());
    }

    #[test]
    fn test_undecodable_line_items() {
        let mut data = sample_invoice();
        data["invoiceDetails"] = json!("[{\"itemName\": ");
        let invoice = extract(&wrap(data)).unwrap();

        assert!(invoice.invoice_details.is_empty());
        assert_eq!(invoice.basic_info[INVOICE_NUMBER], "12345678");
        assert_eq!(invoice.seller_info[NAME], "深圳测试科技有限公司");
        assert_eq!(invoice.purchaser_info[NAME], "北京测试有限公司");
        assert_eq!(invoice.amount_info[TOTAL_AMOUNT], "1234.56");
    }

    #[test]
    fn test_line_items_not_a_list() {
        let mut data = sample_invoice();
        data["invoiceDetails"] = json!({ "itemName": "单个" });
        assert!(extract(&wrap(data)).unwrap().invoice_details.is_empty());
    }

    #[test]
    fn test_empty_line_items_are_dropped() {
        let data = json!({
            "invoiceDetails": [
                { "itemName": "", "quantity": "", "amount": "" },
                "not an item",
                { "unit": "个" },
                { "quantity": 2, "amount": 0 },
            ]
        });
        let invoice = extract(&wrap(data)).unwrap();
        assert_eq!(invoice.invoice_details.len(), 1);
        assert_eq!(invoice.invoice_details[0][ITEM_QUANTITY], "2");
        assert!(!invoice.invoice_details[0].contains_key(ITEM_AMOUNT));
    }

    #[test]
    fn test_untracked_fields_never_appear() {
        let data = json!({ "sellerAddress": "深圳市南山区", "checkCode": "12345", "sellerName": "A公司" });
        let invoice = extract(&wrap(data)).unwrap();
        assert_eq!(invoice.seller_info.len(), 1);
        assert!(invoice.seller_info.values().all(|v| v == "A公司"));
        assert!(invoice.basic_info.is_empty());
    }

    #[test]
    fn test_falsy_values_are_excluded() {
        let data = json!({
            "invoiceCode": "",
            "invoiceNumber": null,
            "drawer": false,
            "totalAmount": 0,
            "invoiceTax": 0.0,
            "invoiceAmountPreTax": 1092.44,
            "sellerName": [],
            "purchaserName": {},
        });
        let invoice = extract(&wrap(data)).unwrap();
        assert!(invoice.basic_info.is_empty());
        assert!(invoice.seller_info.is_empty());
        assert!(invoice.purchaser_info.is_empty());
        assert_eq!(invoice.amount_info.len(), 1);
        assert_eq!(invoice.amount_info[PRE_TAX_AMOUNT], "1092.44");
    }

    #[test]
    fn test_remarks_without_bank_details_still_set_bank_keys() {
        let invoice = extract(&wrap(json!({ "remarks": "货到付款" }))).unwrap();
        assert_eq!(invoice.basic_info[REMARKS], "货到付款");
        assert_eq!(invoice.seller_info[BANK_NAME], "");
        assert_eq!(invoice.seller_info[BANK_ACCOUNT], "");
    }

    #[test]
    fn test_no_remarks_no_bank_keys() {
        let invoice = extract(&wrap(json!({ "sellerName": "A公司", "remarks": "" }))).unwrap();
        assert!(!invoice.seller_info.contains_key(BANK_NAME));
        assert!(!invoice.seller_info.contains_key(BANK_ACCOUNT));
        assert!(!invoice.basic_info.contains_key(REMARKS));
    }

    #[test]
    fn test_extraction_is_repeatable() {
        let raw = wrap(sample_invoice());
        assert_eq!(extract(&raw).unwrap(), extract(&raw).unwrap());
    }
}
